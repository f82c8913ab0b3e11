//! File-backed cross-reference of observed trains and stations.
//!
//! The store directory holds three JSON documents:
//!
//! - `db.json`: version marker, `{"version": 2}`
//! - `trains.json`: every train seen, unique by canonical number
//! - `stations.json`: every station seen with the trains that stop there,
//!   busiest first
//!
//! Mutations go through a [`Batch`], which flushes both collections once when
//! it is committed or dropped. A batch is all-or-nothing: both files are
//! staged as sibling temp files before either is renamed into place, and a
//! failed flush restores the files and the in-memory collections to their
//! state when the batch began.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::error::AppError;
use crate::models::{ItineraryRecord, StationRecord, TrainRecord};
use crate::normalize::canonical_train_number;

/// Layout version written by this build.
pub const STORE_VERSION: u64 = 2;

const MARKER_FILE: &str = "db.json";
const TRAINS_FILE: &str = "trains.json";
const STATIONS_FILE: &str = "stations.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainListing {
    pub rank: String,
    /// Canonical (digits only) train number.
    pub number: String,
    pub company: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationListing {
    pub name: String,
    /// Canonical numbers of trains seen stopping here, in discovery order.
    #[serde(rename = "stoppedAtBy")]
    pub stopped_at_by: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct VersionMarker {
    version: u64,
}

#[derive(Debug)]
pub struct KnowledgeStore {
    dir: PathBuf,
    trains: Vec<TrainListing>,
    stations: Vec<StationListing>,
    dirty: bool,
}

impl KnowledgeStore {
    /// Open (creating if needed) the store in `dir`, migrating older layouts
    /// before anything is read.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| AppError::Store(format!("cannot create {}: {e}", dir.display())))?;

        migrate(&dir)?;

        let trains: Vec<TrainListing> = read_json(&dir.join(TRAINS_FILE))?.unwrap_or_default();
        let stations: Vec<StationListing> =
            read_json(&dir.join(STATIONS_FILE))?.unwrap_or_default();

        let mut store = Self {
            dir,
            trains,
            stations,
            dirty: false,
        };
        store.sort_stations();

        tracing::info!(
            dir = %store.dir.display(),
            trains = store.trains.len(),
            stations = store.stations.len(),
            "Knowledge store opened"
        );
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn trains(&self) -> &[TrainListing] {
        &self.trains
    }

    /// Stations, busiest first.
    pub fn stations(&self) -> &[StationListing] {
        &self.stations
    }

    /// Start a deferred-commit scope. The mutable borrow keeps batches from
    /// nesting.
    pub fn batch(&mut self) -> Batch<'_> {
        let snapshot = Snapshot {
            trains: self.trains.clone(),
            stations: self.stations.clone(),
            dirty: self.dirty,
        };
        Batch {
            store: self,
            snapshot: Some(snapshot),
        }
    }

    /// Add a train unless its canonical number is known. Returns the
    /// canonical number either way.
    pub fn record_train(
        &mut self,
        rank: &str,
        raw_number: &str,
        company: &str,
    ) -> Result<String, AppError> {
        let mut batch = self.batch();
        let number = batch.record_train(rank, raw_number, company);
        batch.commit()?;
        Ok(number)
    }

    pub fn record_station_visit(&mut self, station: &str, number: &str) -> Result<(), AppError> {
        let mut batch = self.batch();
        batch.record_station_visit(station, number);
        batch.commit()
    }

    pub fn observe_train(&mut self, record: &TrainRecord) -> Result<(), AppError> {
        let mut batch = self.batch();
        batch.observe_train(record);
        batch.commit()
    }

    pub fn observe_station(&mut self, record: &StationRecord) -> Result<(), AppError> {
        let mut batch = self.batch();
        batch.observe_station(record);
        batch.commit()
    }

    pub fn observe_itineraries(&mut self, record: &ItineraryRecord) -> Result<(), AppError> {
        let mut batch = self.batch();
        batch.observe_itineraries(record);
        batch.commit()
    }

    fn sort_stations(&mut self) {
        // Stable: stations with equal counts keep discovery order.
        self.stations
            .sort_by(|a, b| b.stopped_at_by.len().cmp(&a.stopped_at_by.len()));
    }

    fn flush(&mut self) -> Result<(), AppError> {
        if !self.dirty {
            return Ok(());
        }
        let trains = stage_json(&self.dir, &self.trains)?;
        let stations = stage_json(&self.dir, &self.stations)?;

        let trains_path = self.dir.join(TRAINS_FILE);
        let previous_trains = read_bytes(&trains_path)?;
        persist(trains, &trains_path)?;
        if let Err(e) = persist(stations, &self.dir.join(STATIONS_FILE)) {
            restore(&self.dir, &trains_path, previous_trains);
            return Err(e);
        }

        self.dirty = false;
        tracing::debug!(
            trains = self.trains.len(),
            stations = self.stations.len(),
            "Knowledge store flushed"
        );
        Ok(())
    }
}

/// Collections as they were when a batch began.
#[derive(Debug)]
struct Snapshot {
    trains: Vec<TrainListing>,
    stations: Vec<StationListing>,
    dirty: bool,
}

/// Pending mutations against a [`KnowledgeStore`].
///
/// Changes apply to memory immediately and reach disk in a single flush on
/// [`commit`](Batch::commit). A batch dropped without commit still flushes,
/// logging any write failure. If the flush fails, every change made through
/// the batch is rolled back.
pub struct Batch<'a> {
    store: &'a mut KnowledgeStore,
    /// Taken once the batch has been flushed.
    snapshot: Option<Snapshot>,
}

impl Batch<'_> {
    pub fn record_train(&mut self, rank: &str, raw_number: &str, company: &str) -> String {
        let number = canonical_train_number(raw_number);
        if number.is_empty() {
            tracing::warn!(raw_number, "train number has no digits, not recorded");
            return number;
        }
        if !self.store.trains.iter().any(|t| t.number == number) {
            self.store.trains.push(TrainListing {
                rank: rank.to_string(),
                number: number.clone(),
                company: company.to_string(),
            });
            self.store.dirty = true;
        }
        number
    }

    pub fn record_station_visit(&mut self, station: &str, number: &str) {
        if station.is_empty() || number.is_empty() {
            return;
        }
        let stations = &mut self.store.stations;
        let index = match stations.iter().position(|s| s.name == station) {
            Some(index) => index,
            None => {
                stations.push(StationListing {
                    name: station.to_string(),
                    stopped_at_by: Vec::new(),
                });
                self.store.dirty = true;
                stations.len() - 1
            }
        };

        let visitors = &mut stations[index].stopped_at_by;
        if !visitors.iter().any(|n| n == number) {
            visitors.push(number.to_string());
            self.store.dirty = true;
        }
        self.store.sort_stations();
    }

    /// Record the train and a visit at every stop of its itinerary.
    pub fn observe_train(&mut self, record: &TrainRecord) {
        let number = self.record_train(&record.rank, &record.number, &record.operator);
        for stop in &record.stations {
            self.record_station_visit(&stop.name, &number);
        }
    }

    /// Record every listed train, its visit at the queried station, and its
    /// visits along the listed route.
    pub fn observe_station(&mut self, record: &StationRecord) {
        let items = record
            .departures
            .iter()
            .flatten()
            .chain(record.arrivals.iter().flatten());
        for item in items {
            let train = &item.train;
            let number = self.record_train(&train.rank, &train.number, &train.operator);
            self.record_station_visit(&record.station_name, &number);
            for stop in &train.route {
                self.record_station_visit(stop, &number);
            }
        }
    }

    /// Record every train ridden and its visits from boarding to alighting.
    pub fn observe_itineraries(&mut self, record: &ItineraryRecord) {
        let legs = record.itineraries.iter().flat_map(|itinerary| &itinerary.trains);
        for leg in legs {
            let number = self.record_train(&leg.rank, &leg.number, &leg.operator);
            let stops = std::iter::once(&leg.from)
                .chain(&leg.intermediate_stops)
                .chain(std::iter::once(&leg.to));
            for stop in stops {
                self.record_station_visit(stop, &number);
            }
        }
    }

    pub fn commit(mut self) -> Result<(), AppError> {
        self.finish()
    }

    fn finish(&mut self) -> Result<(), AppError> {
        let Some(snapshot) = self.snapshot.take() else {
            return Ok(());
        };
        let result = self.store.flush();
        if result.is_err() {
            self.store.trains = snapshot.trains;
            self.store.stations = snapshot.stations;
            self.store.dirty = snapshot.dirty;
            tracing::warn!("Knowledge store batch rolled back");
        }
        result
    }
}

impl Drop for Batch<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            tracing::error!(error = %e, "Failed to flush knowledge store batch");
        }
    }
}

// ---------------------------------------------------------------------------
// Migration
// ---------------------------------------------------------------------------

/// Version 1 stored visitor ids as numbers or strings and kept the raw train
/// number in `numberString` next to a numeric `number`.
#[derive(Deserialize)]
struct LegacyTrain {
    #[serde(default)]
    rank: String,
    number: Value,
    #[serde(rename = "numberString")]
    number_string: Option<String>,
    #[serde(default)]
    company: String,
}

#[derive(Deserialize)]
struct LegacyStation {
    name: String,
    #[serde(rename = "stoppedAtBy", default)]
    stopped_at_by: Vec<Value>,
}

fn legacy_id(value: &Value) -> Result<String, AppError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(AppError::Store(format!("unexpected train id {other} in legacy store"))),
    }
}

fn migrate(dir: &Path) -> Result<(), AppError> {
    match read_json::<VersionMarker>(&dir.join(MARKER_FILE))? {
        Some(VersionMarker { version: STORE_VERSION }) => return Ok(()),
        Some(VersionMarker { version }) => {
            return Err(AppError::Store(format!(
                "unsupported store version {version} in {}",
                dir.display()
            )));
        }
        None => {}
    }

    tracing::info!(dir = %dir.display(), to = STORE_VERSION, "Migrating knowledge store");

    if let Some(legacy) = read_json::<Vec<LegacyTrain>>(&dir.join(TRAINS_FILE))? {
        let mut trains: Vec<TrainListing> = Vec::with_capacity(legacy.len());
        for train in legacy {
            let raw = match train.number_string {
                Some(raw) => raw,
                None => legacy_id(&train.number)?,
            };
            let canonical = canonical_train_number(&raw);
            let number = if canonical.is_empty() { raw } else { canonical };
            if !trains.iter().any(|t| t.number == number) {
                trains.push(TrainListing {
                    rank: train.rank,
                    number,
                    company: train.company,
                });
            }
        }
        write_json(dir, TRAINS_FILE, &trains)?;
    }

    if let Some(legacy) = read_json::<Vec<LegacyStation>>(&dir.join(STATIONS_FILE))? {
        let mut stations = Vec::with_capacity(legacy.len());
        for station in legacy {
            let mut visitors: Vec<String> = Vec::with_capacity(station.stopped_at_by.len());
            for id in &station.stopped_at_by {
                let id = legacy_id(id)?;
                if !visitors.contains(&id) {
                    visitors.push(id);
                }
            }
            stations.push(StationListing {
                name: station.name,
                stopped_at_by: visitors,
            });
        }
        write_json(dir, STATIONS_FILE, &stations)?;
    }

    // Marker last: an interrupted run is redone from scratch next time.
    write_json(
        dir,
        MARKER_FILE,
        &VersionMarker {
            version: STORE_VERSION,
        },
    )
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, AppError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(AppError::Store(format!("cannot read {}: {e}", path.display()))),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| AppError::Store(format!("corrupt {}: {e}", path.display())))
}

fn read_bytes(path: &Path) -> Result<Option<Vec<u8>>, AppError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::Store(format!("cannot read {}: {e}", path.display()))),
    }
}

/// Write `bytes` to a synced temp file in `dir`, ready to be persisted.
fn stage_bytes(dir: &Path, bytes: &[u8]) -> Result<NamedTempFile, AppError> {
    let store_err =
        |e: std::io::Error| AppError::Store(format!("cannot stage write in {}: {e}", dir.display()));
    let mut tmp = NamedTempFile::new_in(dir).map_err(store_err)?;
    tmp.write_all(bytes).map_err(store_err)?;
    tmp.as_file().sync_all().map_err(store_err)?;
    Ok(tmp)
}

fn stage_json<T: Serialize + ?Sized>(dir: &Path, value: &T) -> Result<NamedTempFile, AppError> {
    let json = serde_json::to_vec_pretty(value)?;
    stage_bytes(dir, &json)
}

fn persist(tmp: NamedTempFile, target: &Path) -> Result<(), AppError> {
    tmp.persist(target)
        .map(drop)
        .map_err(|e| AppError::Store(format!("cannot write {}: {}", target.display(), e.error)))
}

/// Put `target` back the way it was before a partially persisted flush.
fn restore(dir: &Path, target: &Path, previous: Option<Vec<u8>>) {
    let restored = match previous {
        Some(bytes) => stage_bytes(dir, &bytes).and_then(|tmp| persist(tmp, target)),
        None => fs::remove_file(target)
            .map_err(|e| AppError::Store(format!("cannot remove {}: {e}", target.display()))),
    };
    if let Err(e) = restored {
        tracing::error!(error = %e, file = %target.display(), "Failed to restore knowledge store file");
    }
}

fn write_json<T: Serialize + ?Sized>(dir: &Path, file: &str, value: &T) -> Result<(), AppError> {
    let tmp = stage_json(dir, value)?;
    persist(tmp, &dir.join(file))
}

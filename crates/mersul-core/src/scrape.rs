use std::sync::Arc;

use chrono::NaiveDate;
use futures::FutureExt;
use tokio::sync::Mutex;

use crate::cache::{CacheRegistry, Cached, Clock, FetchFn, SystemClock};
use crate::config::ServiceConfig;
use crate::error::AppError;
use crate::extract::{parse_itineraries_page, parse_station_page, parse_train_page};
use crate::models::{ItineraryRecord, StationRecord, TrainRecord};
use crate::normalize::station_slug;
use crate::sequencer::railway_date;
use crate::store::{KnowledgeStore, StationListing, TrainListing};
use crate::traits::Origin;

/// Everything that affects which train page is fetched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrainKey {
    pub number: String,
    pub use_yesterday: bool,
    pub date_override: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StationKey {
    pub slug: String,
    pub date: Option<NaiveDate>,
}

/// Endpoint slugs plus the departure date; `None` means the railway's
/// current day at fetch time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItineraryKey {
    pub from: String,
    pub to: String,
    pub date: Option<NaiveDate>,
}

/// Uncached fetch → parse → observe steps, shared with the cache fetch
/// functions.
struct Pipeline<O> {
    origin: O,
    store: Arc<Mutex<KnowledgeStore>>,
    clock: Arc<dyn Clock>,
}

impl<O: Clone> Clone for Pipeline<O> {
    fn clone(&self) -> Self {
        Self {
            origin: self.origin.clone(),
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<O: Origin> Pipeline<O> {
    async fn fetch_train(&self, number: &str, date: NaiveDate) -> Result<TrainRecord, AppError> {
        tracing::info!(%number, %date, "Fetching train");
        let html = self.origin.train_page(number, date).await?;
        tracing::info!("Fetched {} bytes of train page", html.len());

        let record = parse_train_page(&html)?;
        tracing::info!(
            rank = %record.rank,
            number = %record.number,
            stops = record.stations.len(),
            "Train extracted"
        );

        self.store.lock().await.observe_train(&record)?;
        Ok(record)
    }

    async fn fetch_station(
        &self,
        slug: &str,
        date: Option<NaiveDate>,
    ) -> Result<StationRecord, AppError> {
        tracing::info!(%slug, date = ?date, "Fetching station");
        let html = self.origin.station_page(slug, date).await?;
        tracing::info!("Fetched {} bytes of station page", html.len());

        let record = parse_station_page(&html)?;
        tracing::info!(
            station = %record.station_name,
            departures = record.departures.as_ref().map_or(0, Vec::len),
            arrivals = record.arrivals.as_ref().map_or(0, Vec::len),
            "Station extracted"
        );

        self.store.lock().await.observe_station(&record)?;
        Ok(record)
    }

    async fn fetch_itineraries(
        &self,
        from: &str,
        to: &str,
        date: NaiveDate,
    ) -> Result<ItineraryRecord, AppError> {
        tracing::info!(%from, %to, %date, "Fetching itineraries");
        let html = self
            .origin
            .itinerary_page(&station_slug(from), &station_slug(to), date)
            .await?;
        tracing::info!("Fetched {} bytes of itinerary page", html.len());

        let itineraries =
            parse_itineraries_page(&html, date)?.ok_or_else(|| AppError::NoItineraries {
                from: from.to_string(),
                to: to.to_string(),
                date,
            })?;
        tracing::info!(count = itineraries.len(), "Itineraries extracted");

        let record = ItineraryRecord {
            from: from.to_string(),
            to: to.to_string(),
            date,
            itineraries,
        };
        self.store.lock().await.observe_itineraries(&record)?;
        Ok(record)
    }

    /// Calendar date a train query resolves to, evaluated at fetch time.
    fn service_date(&self, key: &TrainKey) -> NaiveDate {
        if let Some(date) = key.date_override {
            return date;
        }
        let today = railway_date(self.clock.now());
        if key.use_yesterday {
            today.pred_opt().unwrap_or(today)
        } else {
            today
        }
    }
}

/// Serves train and station records: cached per query key, recorded in the
/// knowledge store on every fresh fetch.
///
/// Generic over the [`Origin`] so tests run without network access.
pub struct ScrapeService<O: Origin> {
    pipeline: Pipeline<O>,
    trains: CacheRegistry<TrainKey, TrainRecord>,
    stations: CacheRegistry<StationKey, StationRecord>,
    itineraries: CacheRegistry<ItineraryKey, ItineraryRecord>,
}

impl<O: Origin> Clone for ScrapeService<O> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
            trains: self.trains.clone(),
            stations: self.stations.clone(),
            itineraries: self.itineraries.clone(),
        }
    }
}

impl<O: Origin> ScrapeService<O> {
    pub fn new(origin: O, store: KnowledgeStore, config: &ServiceConfig) -> Self {
        Self::with_clock(origin, store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        origin: O,
        store: KnowledgeStore,
        config: &ServiceConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            pipeline: Pipeline {
                origin,
                store: Arc::new(Mutex::new(store)),
                clock: Arc::clone(&clock),
            },
            trains: CacheRegistry::new(config.cache_ttl, config.cache_capacity, Arc::clone(&clock)),
            stations: CacheRegistry::new(config.cache_ttl, config.cache_capacity, Arc::clone(&clock)),
            itineraries: CacheRegistry::new(config.cache_ttl, config.cache_capacity, clock),
        }
    }

    /// Fetch, parse and record one train page, bypassing the cache.
    pub async fn fetch_train(&self, number: &str, date: NaiveDate) -> Result<TrainRecord, AppError> {
        self.pipeline.fetch_train(number, date).await
    }

    /// Fetch, parse and record one station page, bypassing the cache.
    pub async fn fetch_station(
        &self,
        slug: &str,
        date: Option<NaiveDate>,
    ) -> Result<StationRecord, AppError> {
        self.pipeline.fetch_station(slug, date).await
    }

    /// Train record for today (or yesterday, or `date_override`), served
    /// from cache while fresh.
    pub async fn train(
        &self,
        number: &str,
        use_yesterday: bool,
        date_override: Option<NaiveDate>,
    ) -> Result<Cached<TrainRecord>, AppError> {
        let key = TrainKey {
            number: number.trim().to_string(),
            use_yesterday,
            date_override,
        };
        let pipeline = self.pipeline.clone();
        let fetch_key = key.clone();
        self.trains
            .get(key, move || -> FetchFn<TrainRecord> {
                Arc::new(move || {
                    let pipeline = pipeline.clone();
                    let key = fetch_key.clone();
                    async move {
                        let date = pipeline.service_date(&key);
                        pipeline.fetch_train(&key.number, date).await
                    }
                    .boxed()
                })
            })
            .await
    }

    /// Station record, keyed by the slug of `name` and the optional date.
    pub async fn station(
        &self,
        name: &str,
        date: Option<NaiveDate>,
    ) -> Result<Cached<StationRecord>, AppError> {
        let key = StationKey {
            slug: station_slug(name),
            date,
        };
        let pipeline = self.pipeline.clone();
        let fetch_key = key.clone();
        self.stations
            .get(key, move || -> FetchFn<StationRecord> {
                Arc::new(move || {
                    let pipeline = pipeline.clone();
                    let key = fetch_key.clone();
                    async move { pipeline.fetch_station(&key.slug, key.date).await }.boxed()
                })
            })
            .await
    }

    /// Itineraries between two stations, departing on `date` or today.
    ///
    /// Station names are keyed by slug, so spelling variants share one
    /// cache entry; the record keeps the names as first requested.
    pub async fn itineraries(
        &self,
        from: &str,
        to: &str,
        date: Option<NaiveDate>,
    ) -> Result<Cached<ItineraryRecord>, AppError> {
        let key = ItineraryKey {
            from: station_slug(from),
            to: station_slug(to),
            date,
        };
        let pipeline = self.pipeline.clone();
        let names = (from.trim().to_string(), to.trim().to_string());
        self.itineraries
            .get(key, move || -> FetchFn<ItineraryRecord> {
                Arc::new(move || {
                    let pipeline = pipeline.clone();
                    let (from, to) = names.clone();
                    async move {
                        let date = date.unwrap_or_else(|| railway_date(pipeline.clock.now()));
                        pipeline.fetch_itineraries(&from, &to, date).await
                    }
                    .boxed()
                })
            })
            .await
    }

    /// Fetch, parse and record one itinerary search, bypassing the cache.
    pub async fn fetch_itineraries(
        &self,
        from: &str,
        to: &str,
        date: NaiveDate,
    ) -> Result<ItineraryRecord, AppError> {
        self.pipeline.fetch_itineraries(from, to, date).await
    }

    /// Train numbers with a cache entry, sorted and deduplicated.
    pub async fn cached_train_numbers(&self) -> Vec<String> {
        let mut numbers: Vec<String> = self
            .trains
            .keys()
            .await
            .into_iter()
            .map(|key| key.number)
            .collect();
        numbers.sort();
        numbers.dedup();
        numbers
    }

    pub async fn known_trains(&self) -> Vec<TrainListing> {
        self.pipeline.store.lock().await.trains().to_vec()
    }

    /// Known stations, busiest first.
    pub async fn known_stations(&self) -> Vec<StationListing> {
        self.pipeline.store.lock().await.stations().to_vec()
    }
}

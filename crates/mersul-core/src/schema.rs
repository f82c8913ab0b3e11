//! Output contracts for train, station and itinerary documents.
//!
//! Schemas are embedded at compile time. Records are converted to JSON,
//! downgraded when an older layout is requested, tagged with a `$schema`
//! URL and validated before they leave the service.

use std::sync::LazyLock;

use chrono::Timelike;
use serde_json::Value;

use crate::error::AppError;
use crate::models::{ItineraryRecord, StationRecord, TrainRecord};

static TRAIN_V1: LazyLock<Value> = LazyLock::new(|| embedded(include_str!("../schemas/train/v1.json")));
static TRAIN_V2: LazyLock<Value> = LazyLock::new(|| embedded(include_str!("../schemas/train/v2.json")));
static STATION_V2: LazyLock<Value> =
    LazyLock::new(|| embedded(include_str!("../schemas/station/v2.json")));
static ITINERARIES_V3: LazyLock<Value> =
    LazyLock::new(|| embedded(include_str!("../schemas/itineraries/v3.json")));

fn embedded(raw: &str) -> Value {
    serde_json::from_str(raw).expect("embedded schema is valid JSON")
}

/// The published schema documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    TrainV1,
    TrainV2,
    StationV2,
    ItinerariesV3,
}

impl SchemaKind {
    pub fn document(self) -> &'static Value {
        match self {
            SchemaKind::TrainV1 => &*TRAIN_V1,
            SchemaKind::TrainV2 => &*TRAIN_V2,
            SchemaKind::StationV2 => &*STATION_V2,
            SchemaKind::ItinerariesV3 => &*ITINERARIES_V3,
        }
    }

    /// Path the schema is served under, relative to the public base URL.
    pub fn path(self) -> &'static str {
        match self {
            SchemaKind::TrainV1 => "/train/.schema.json",
            SchemaKind::TrainV2 => "/v2/train/.schema.json",
            SchemaKind::StationV2 => "/v2/station/.schema.json",
            SchemaKind::ItinerariesV3 => "/v3/itineraries/.schema.json",
        }
    }

    pub fn url(self, base: &str) -> String {
        format!("{}{}", base.trim_end_matches('/'), self.path())
    }
}

/// Train document layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrainSchemaVersion {
    /// Schedule times as `H:MM` strings.
    V1,
    #[default]
    V2,
}

impl TrainSchemaVersion {
    pub fn kind(self) -> SchemaKind {
        match self {
            TrainSchemaVersion::V1 => SchemaKind::TrainV1,
            TrainSchemaVersion::V2 => SchemaKind::TrainV2,
        }
    }
}

/// Legacy train layout: every schedule timestamp becomes local `H:MM`.
pub fn to_v1(record: &TrainRecord) -> Result<Value, AppError> {
    let mut document = serde_json::to_value(record)?;
    for (index, stop) in record.stations.iter().enumerate() {
        for (key, event) in [("arrival", &stop.arrival), ("departure", &stop.departure)] {
            let Some(event) = event else { continue };
            let pointer = format!("/stations/{index}/{key}/scheduleTime");
            if let Some(slot) = document.pointer_mut(&pointer) {
                let time = event.schedule_time;
                *slot = Value::String(format!("{}:{:02}", time.hour(), time.minute()));
            }
        }
    }
    Ok(document)
}

pub fn attach_schema_url(document: &mut Value, url: &str) {
    if let Value::Object(map) = document {
        map.insert("$schema".to_string(), Value::String(url.to_string()));
    }
}

/// Check `document` against `schema`, collecting every violation.
pub fn validate(document: &Value, schema: &Value) -> Result<(), AppError> {
    let validator = jsonschema::validator_for(schema)
        .map_err(|e| AppError::SchemaValidation(format!("invalid schema: {e}")))?;

    let errors: Vec<String> = validator
        .iter_errors(document)
        .map(|e| e.to_string())
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::SchemaValidation(errors.join("; ")))
    }
}

/// Adapt, tag and validate a train record for publication.
pub fn train_document(
    record: &TrainRecord,
    version: TrainSchemaVersion,
    schema_url: &str,
) -> Result<Value, AppError> {
    let mut document = match version {
        TrainSchemaVersion::V1 => to_v1(record)?,
        TrainSchemaVersion::V2 => serde_json::to_value(record)?,
    };
    attach_schema_url(&mut document, schema_url);
    validate(&document, version.kind().document())?;
    Ok(document)
}

pub fn station_document(record: &StationRecord, schema_url: &str) -> Result<Value, AppError> {
    let mut document = serde_json::to_value(record)?;
    attach_schema_url(&mut document, schema_url);
    validate(&document, SchemaKind::StationV2.document())?;
    Ok(document)
}

pub fn itineraries_document(record: &ItineraryRecord, schema_url: &str) -> Result<Value, AppError> {
    let mut document = serde_json::to_value(record)?;
    attach_schema_url(&mut document, schema_url);
    validate(&document, SchemaKind::ItinerariesV3.document())?;
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{parse_itineraries_page, parse_station_page, parse_train_page};
    use crate::testutil::{sample_itineraries_html, sample_station_html, sample_train_html};
    use serde_json::json;

    #[test]
    fn test_embedded_schemas_compile() {
        for kind in [
            SchemaKind::TrainV1,
            SchemaKind::TrainV2,
            SchemaKind::StationV2,
            SchemaKind::ItinerariesV3,
        ] {
            assert!(jsonschema::validator_for(kind.document()).is_ok(), "{kind:?}");
        }
    }

    #[test]
    fn test_v2_train_document_validates() {
        let record = parse_train_page(&sample_train_html("1538", "10.03.2024")).unwrap();
        let doc = train_document(&record, TrainSchemaVersion::V2, "http://localhost:5000/v2/train/.schema.json").unwrap();
        assert_eq!(doc["$schema"], "http://localhost:5000/v2/train/.schema.json");
        assert_eq!(
            doc["stations"][0]["departure"]["scheduleTime"],
            "2024-03-10T08:00:00+02:00"
        );
    }

    #[test]
    fn test_v1_formats_hour_without_padding() {
        let record = parse_train_page(&sample_train_html("1538", "10.03.2024")).unwrap();
        let doc = train_document(&record, TrainSchemaVersion::V1, "x").unwrap();
        assert_eq!(doc["stations"][0]["departure"]["scheduleTime"], "8:00");
        assert_eq!(doc["stations"][1]["arrival"]["scheduleTime"], "9:10");
        assert!(doc["stations"][0]["arrival"].is_null());
    }

    #[test]
    fn test_v2_document_fails_v1_schema() {
        let record = parse_train_page(&sample_train_html("1538", "10.03.2024")).unwrap();
        let v2 = serde_json::to_value(&record).unwrap();
        let err = validate(&v2, SchemaKind::TrainV1.document()).unwrap_err();
        assert!(matches!(err, AppError::SchemaValidation(_)));
    }

    #[test]
    fn test_train_without_stops_fails_both_layouts() {
        let mut record = parse_train_page(&sample_train_html("1538", "10.03.2024")).unwrap();
        record.stations.clear();
        for version in [TrainSchemaVersion::V1, TrainSchemaVersion::V2] {
            let err = train_document(&record, version, "x").unwrap_err();
            assert!(matches!(err, AppError::SchemaValidation(_)), "{version:?}");
        }
    }

    #[test]
    fn test_station_document_validates() {
        let record = parse_station_page(&sample_station_html("Aiud", "10.03.2024")).unwrap();
        let doc = station_document(&record, &SchemaKind::StationV2.url("http://h/")).unwrap();
        assert_eq!(doc["$schema"], "http://h/v2/station/.schema.json");
        assert_eq!(doc["departures"][0]["train"]["destination"], "Brașov");
        assert_eq!(doc["arrivals"][0]["train"]["origin"], "Sibiu");
    }

    #[test]
    fn test_itineraries_document_validates() {
        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let itineraries = parse_itineraries_page(&sample_itineraries_html("10"), date)
            .unwrap()
            .unwrap();
        let record = ItineraryRecord {
            from: "Cluj Napoca".into(),
            to: "Brașov".into(),
            date,
            itineraries,
        };
        let doc = itineraries_document(&record, &SchemaKind::ItinerariesV3.url("http://h")).unwrap();
        assert_eq!(doc["$schema"], "http://h/v3/itineraries/.schema.json");
        assert_eq!(doc["date"], "10.03.2024");
        let leg = &doc["itineraries"][1]["trains"][1];
        assert_eq!(leg["from"], "Teiuș");
        assert_eq!(leg["trainRank"], "IR");
        assert_eq!(leg["trainNumber"], "1622");
        assert_eq!(leg["intermediateStops"], json!(["Sighișoara"]));
        assert_eq!(leg["departureDate"], "2024-03-10T10:40:00+02:00");
    }

    #[test]
    fn test_validation_reports_violations() {
        let err = validate(&json!({"stationName": 5}), SchemaKind::StationV2.document()).unwrap_err();
        assert!(err.to_string().contains("stationName") || err.to_string().contains("required"));
    }
}

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

/// Which event a live status report refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusState {
    Passing,
    Arrival,
    Departure,
}

/// Most recent delay report for a running train.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainStatus {
    /// Positive = late, negative = early, 0 = on time.
    #[serde(rename = "delay")]
    pub delay_minutes: i64,
    pub station: String,
    pub state: StatusState,
}

/// Delay attached to one scheduled arrival or departure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventStatus {
    #[serde(rename = "delay")]
    pub delay_minutes: i64,
    /// False when the origin marks the delay as an estimate (`*`).
    #[serde(rename = "real")]
    pub is_real: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationTimeEvent {
    pub schedule_time: DateTime<FixedOffset>,
    pub status: Option<EventStatus>,
}

/// One row of a train's itinerary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationStop {
    pub name: String,
    #[serde(rename = "km")]
    pub kilometer_mark: u32,
    /// Seconds; `None` for pass-through and terminal stops.
    #[serde(rename = "stoppingTime")]
    pub stopping_time_seconds: Option<u32>,
    pub platform: Option<String>,
    pub arrival: Option<StationTimeEvent>,
    pub departure: Option<StationTimeEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainRecord {
    /// Service class code (`IR`, `R`, `IC`, ...).
    pub rank: String,
    /// Display number; may carry a non-numeric suffix.
    pub number: String,
    #[serde(with = "ro_date")]
    pub date: NaiveDate,
    pub operator: String,
    pub route: Route,
    pub status: Option<TrainStatus>,
    pub stations: Vec<StationStop>,
}

/// The far end of a train seen from a station list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Terminus {
    /// Departures list: where the train is heading.
    #[serde(rename = "destination")]
    Destination(String),
    /// Arrivals list: where the train came from.
    #[serde(rename = "origin")]
    Origin(String),
}

impl Terminus {
    pub fn name(&self) -> &str {
        match self {
            Terminus::Destination(name) | Terminus::Origin(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationTrain {
    pub rank: String,
    pub number: String,
    pub operator: String,
    /// Station names in travel order.
    pub route: Vec<String>,
    #[serde(flatten)]
    pub terminus: Terminus,
}

/// Live status shown next to a station list item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStatus {
    #[serde(rename = "delay")]
    pub delay_minutes: i64,
    #[serde(rename = "real")]
    pub is_real: bool,
    pub cancelled: bool,
    pub platform: Option<String>,
}

/// One scheduled movement at the queried station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationArrivalDeparture {
    pub time: DateTime<FixedOffset>,
    /// Seconds; `None` means terminus, duration unknown.
    #[serde(rename = "stoppingTime")]
    pub stopping_time_seconds: Option<u32>,
    pub train: StationTrain,
    pub status: Option<ItemStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationRecord {
    pub station_name: String,
    #[serde(with = "ro_date")]
    pub date: NaiveDate,
    /// `None` when the page has no departures list at all.
    pub departures: Option<Vec<StationArrivalDeparture>>,
    pub arrivals: Option<Vec<StationArrivalDeparture>>,
}

/// One train ridden between two stations of an itinerary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryLeg {
    pub from: String,
    pub to: String,
    /// Stops between `from` and `to`, in travel order.
    pub intermediate_stops: Vec<String>,
    pub departure_date: DateTime<FixedOffset>,
    pub arrival_date: DateTime<FixedOffset>,
    pub km: u32,
    pub operator: String,
    #[serde(rename = "trainRank")]
    pub rank: String,
    #[serde(rename = "trainNumber")]
    pub number: String,
}

/// A way to travel between two stations, one leg per train.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Itinerary {
    pub trains: Vec<ItineraryLeg>,
}

/// Itineraries offered between two stations for one departure date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItineraryRecord {
    pub from: String,
    pub to: String,
    #[serde(with = "ro_date")]
    pub date: NaiveDate,
    pub itineraries: Vec<Itinerary>,
}

/// Dates travel in the origin's own `DD.MM.YYYY` form.
pub mod ro_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%d.%m.%Y";

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

use mersul_core::store::{StationListing, TrainListing};

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct TrainQuery {
    /// Look up the service that started yesterday (`y`, `yes`, `t`, `true` or `1`).
    pub use_yesterday: Option<String>,
    /// Service date, `YYYY-MM-DD` or an RFC 3339 timestamp. Wins over `use_yesterday`.
    pub date: Option<String>,
}

impl TrainQuery {
    pub fn use_yesterday(&self) -> bool {
        self.use_yesterday.as_deref().is_some_and(is_truthy)
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date.as_deref().and_then(parse_date)
    }
}

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct StationQuery {
    /// Board date, `YYYY-MM-DD` or an RFC 3339 timestamp. Defaults to today.
    pub date: Option<String>,
}

impl StationQuery {
    pub fn date(&self) -> Option<NaiveDate> {
        self.date.as_deref().and_then(parse_date)
    }
}

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct ItineraryQuery {
    /// Departure station name or slug.
    pub from: String,
    /// Arrival station name or slug.
    pub to: String,
    /// Departure date, `YYYY-MM-DD` or an RFC 3339 timestamp. Defaults to today.
    pub date: Option<String>,
}

impl ItineraryQuery {
    pub fn date(&self) -> Option<NaiveDate> {
        self.date.as_deref().and_then(parse_date)
    }
}

fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "y" | "yes" | "t" | "true" | "1"
    )
}

/// Unparseable dates are ignored rather than rejected.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TrainListingResponse {
    pub rank: String,
    pub number: String,
    pub company: String,
}

impl From<TrainListing> for TrainListingResponse {
    fn from(listing: TrainListing) -> Self {
        Self {
            rank: listing.rank,
            number: listing.number,
            company: listing.company,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct StationListingResponse {
    pub name: String,
    #[serde(rename = "stoppedAtBy")]
    pub stopped_at_by: Vec<String>,
}

impl From<StationListing> for StationListingResponse {
    fn from(listing: StationListing) -> Self {
        Self {
            name: listing.name,
            stopped_at_by: listing.stopped_at_by,
        }
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub known_trains: usize,
    pub known_stations: usize,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn train_query(use_yesterday: Option<&str>, date: Option<&str>) -> TrainQuery {
        TrainQuery {
            use_yesterday: use_yesterday.map(String::from),
            date: date.map(String::from),
        }
    }

    #[test]
    fn test_use_yesterday_flags() {
        for raw in ["y", "YES", "t", "True", "1"] {
            assert!(train_query(Some(raw), None).use_yesterday(), "{raw}");
        }
        for raw in ["", "0", "no", "false", "yesterday"] {
            assert!(!train_query(Some(raw), None).use_yesterday(), "{raw}");
        }
        assert!(!train_query(None, None).use_yesterday());
    }

    #[test]
    fn test_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 10);
        assert_eq!(train_query(None, Some("2024-03-10")).date(), expected);
        assert_eq!(
            train_query(None, Some("2024-03-10T23:30:00+02:00")).date(),
            expected
        );
        assert_eq!(train_query(None, Some("10.03.2024")).date(), None);
        assert_eq!(StationQuery { date: Some("mâine".into()) }.date(), None);
    }

    #[test]
    fn test_itinerary_query_requires_both_stations() {
        let query: ItineraryQuery =
            serde_json::from_value(serde_json::json!({"from": "Cluj Napoca", "to": "brasov", "date": "2024-03-12"}))
                .unwrap();
        assert_eq!(query.from, "Cluj Napoca");
        assert_eq!(query.date(), NaiveDate::from_ymd_opt(2024, 3, 12));
        assert!(serde_json::from_value::<ItineraryQuery>(serde_json::json!({"from": "Aiud"})).is_err());
    }
}

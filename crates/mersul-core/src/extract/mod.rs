//! Record extraction from timetable result pages.
//!
//! Structural navigation lives in [`train`] and [`station`] and goes through
//! [`MarkupNode`](crate::markup::MarkupNode) only. The sentence grammars the
//! origin renders live here, one regex per template, each with a small parse
//! function returning a typed value or a [`ParseError`].

pub mod itinerary;
pub mod station;
pub mod train;

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use regex::Regex;

use crate::error::{AppError, ParseError};
use crate::markup::parse_fragment;
use crate::models::{EventStatus, Itinerary, StationRecord, StatusState, TrainRecord, TrainStatus};

pub use itinerary::extract_itineraries;
pub use station::extract_station;
pub use train::extract_train;

/// Letters that appear in Romanian station names.
const RO_LETTERS: &str = "A-Za-zăâîșțĂÂÎȘȚşţŞŢ";

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("timetable grammar is a valid regex")
}

static TRAIN_HEADER: LazyLock<Regex> =
    LazyLock::new(|| regex(r"^([A-Z-]+) ([0-9]+[A-Za-z0-9-]*) în ([0-9]{1,2}\.[0-9]{1,2}\.[0-9]{4})$"));

static OPERATOR: LazyLock<Regex> = LazyLock::new(|| regex(r"^Operat de (.+)$"));

static ROUTE_EN_DASH: LazyLock<Regex> = LazyLock::new(|| regex(r"^Parcurs tren (.+?) ?– ?(.+)$"));

static ROUTE_HYPHEN: LazyLock<Regex> = LazyLock::new(|| {
    regex(&format!(
        r"^Parcurs tren ([{RO_LETTERS} .0-9]+)-([{RO_LETTERS} .0-9-]+)$"
    ))
});

static STATUS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    regex(
        r"^(?:Fără|([0-9]+) min) (întârziere|mai devreme) la (trecerea fără oprire prin|sosirea în|plecarea din) (.+)\.$",
    )
});

static KM: LazyLock<Regex> = LazyLock::new(|| regex(r"^km ([0-9]+)$"));

static STOP_STOPPING_TIME: LazyLock<Regex> =
    LazyLock::new(|| regex(r"^([0-9]+) (min|sec) oprire$"));

static STOP_PLATFORM: LazyLock<Regex> = LazyLock::new(|| regex(r"^linia (.+)$"));

static EVENT_STATUS: LazyLock<Regex> = LazyLock::new(|| {
    regex(r"^(?:(la timp)|([+-][0-9]+) min \((?:întârziere|mai devreme)\))(\*?)$")
});

static CLOCK: LazyLock<Regex> = LazyLock::new(|| regex(r"^([0-9]{1,2}):([0-9]{2})$"));

static STATION_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    regex(&format!(
        r"^([{RO_LETTERS}.0-9 -]+) în ([0-9]{{1,2}}\.[0-9]{{1,2}}\.[0-9]{{4}})$"
    ))
});

static ITEM_STOPPING_TIME: LazyLock<Regex> = LazyLock::new(|| {
    regex(
        r"^(?:(necunoscută \(stație terminus\))|([0-9]+) (min|sec) \((?:începând cu|până la) [0-9]{1,2}:[0-9]{2}\))$",
    )
});

static ITEM_STATUS: LazyLock<Regex> = LazyLock::new(|| {
    regex(r"^(?:(la timp)|([+-]?[0-9]+) min \((?:întârziere|mai devreme)\))(\*?)$")
});

static ITEM_PLATFORM: LazyLock<Regex> = LazyLock::new(|| regex(r"^linia ([A-Za-z0-9]+)$"));

const CANCELLED: &str = "anulat";

static LEG_TRAIN: LazyLock<Regex> =
    LazyLock::new(|| regex(r"^([0-9]+) km cu ([A-Z-]+) ([0-9]+[A-Za-z0-9-]*)$"));

static LEG_TIME: LazyLock<Regex> = LazyLock::new(|| {
    regex(r"^(?:Ple|Sos) ([0-9]{1,2}) ([a-z]+)\.? ([0-9]{1,2}):([0-9]{2})$")
});

const MONTHS: [&str; 12] = [
    "ian", "feb", "mar", "apr", "mai", "iun", "iul", "aug", "sep", "oct", "noi", "dec",
];

/// Parse a train result fragment into a [`TrainRecord`].
///
/// Parsing is kept synchronous so the non-`Send` document never lives across
/// an await point.
pub fn parse_train_page(html: &str) -> Result<TrainRecord, AppError> {
    let document = parse_fragment(html);
    extract_train(&document.root_element())
}

/// Parse a station result fragment into a [`StationRecord`].
pub fn parse_station_page(html: &str) -> Result<StationRecord, AppError> {
    let document = parse_fragment(html);
    extract_station(&document.root_element())
}

/// Parse an itinerary result fragment.
///
/// `Ok(None)` means the origin found no connection between the stations;
/// `date` is the departure date that was searched.
pub fn parse_itineraries_page(html: &str, date: NaiveDate) -> Result<Option<Vec<Itinerary>>, AppError> {
    let document = parse_fragment(html);
    extract_itineraries(&document.root_element(), date)
}

fn parse_date(field: &'static str, raw: &str, text: &str) -> Result<NaiveDate, ParseError> {
    NaiveDate::parse_from_str(raw, crate::models::ro_date::FORMAT)
        .map_err(|_| ParseError::new(field, text))
}

fn parse_u32(field: &'static str, raw: &str, text: &str) -> Result<u32, ParseError> {
    raw.parse().map_err(|_| ParseError::new(field, text))
}

fn parse_i64(field: &'static str, raw: &str, text: &str) -> Result<i64, ParseError> {
    raw.parse().map_err(|_| ParseError::new(field, text))
}

fn to_seconds(value: u32, unit: &str, text: &str) -> Result<u32, ParseError> {
    if unit != "min" {
        return Ok(value);
    }
    value
        .checked_mul(60)
        .ok_or_else(|| ParseError::new("stoppingTime", text))
}

/// `"IR 1538 în 10.03.2024"` → rank, number, date.
pub fn parse_train_header(text: &str) -> Result<(String, String, NaiveDate), ParseError> {
    let caps = TRAIN_HEADER
        .captures(text)
        .ok_or_else(|| ParseError::new("trainHeader", text))?;
    let date = parse_date("trainHeader", &caps[3], text)?;
    Ok((caps[1].to_string(), caps[2].to_string(), date))
}

/// `"Operat de CFR Călători"` → `"CFR Călători"`.
pub fn parse_operator(text: &str) -> Result<String, ParseError> {
    OPERATOR
        .captures(text)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| ParseError::new("operator", text))
}

/// `"Parcurs tren Cluj Napoca–Brașov"` → (from, to). The en-dash form is
/// tried first because it tolerates hyphenated station names.
pub fn parse_route(text: &str) -> Result<(String, String), ParseError> {
    ROUTE_EN_DASH
        .captures(text)
        .or_else(|| ROUTE_HYPHEN.captures(text))
        .map(|caps| (caps[1].trim().to_string(), caps[2].trim().to_string()))
        .ok_or_else(|| ParseError::new("route", text))
}

/// Live-status sentence under the route header. `None` on any mismatch: the
/// line is absent for trains without a live report.
pub fn parse_train_status(text: &str) -> Option<TrainStatus> {
    let caps = STATUS_LINE.captures(text)?;
    let magnitude: i64 = match caps.get(1) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    let delay_minutes = if &caps[2] == "întârziere" {
        magnitude
    } else {
        -magnitude
    };
    let state = match &caps[3] {
        "trecerea fără oprire prin" => StatusState::Passing,
        "sosirea în" => StatusState::Arrival,
        _ => StatusState::Departure,
    };
    Some(TrainStatus {
        delay_minutes,
        station: caps[4].to_string(),
        state,
    })
}

/// `"km 125"` → 125.
pub fn parse_km(text: &str) -> Result<u32, ParseError> {
    let caps = KM.captures(text).ok_or_else(|| ParseError::new("km", text))?;
    parse_u32("km", &caps[1], text)
}

/// `"2 min oprire"` → `Some(120)`; empty → `None`.
pub fn parse_stop_stopping_time(text: &str) -> Result<Option<u32>, ParseError> {
    if text.is_empty() {
        return Ok(None);
    }
    let caps = STOP_STOPPING_TIME
        .captures(text)
        .ok_or_else(|| ParseError::new("stoppingTime", text))?;
    let value = parse_u32("stoppingTime", &caps[1], text)?;
    to_seconds(value, &caps[2], text).map(Some)
}

/// `"linia 3"` → `Some("3")`; empty → `None`.
pub fn parse_stop_platform(text: &str) -> Result<Option<String>, ParseError> {
    if text.is_empty() {
        return Ok(None);
    }
    STOP_PLATFORM
        .captures(text)
        .map(|caps| Some(caps[1].to_string()))
        .ok_or_else(|| ParseError::new("platform", text))
}

/// `"14:05"` → (14, 5).
pub fn parse_clock(field: &'static str, text: &str) -> Result<(u32, u32), ParseError> {
    let caps = CLOCK.captures(text).ok_or_else(|| ParseError::new(field, text))?;
    Ok((
        parse_u32(field, &caps[1], text)?,
        parse_u32(field, &caps[2], text)?,
    ))
}

/// `"la timp"`, `"+5 min (întârziere)"`, `"-2 min (mai devreme)*"`.
pub fn parse_event_status(text: &str) -> Result<EventStatus, ParseError> {
    let caps = EVENT_STATUS
        .captures(text)
        .ok_or_else(|| ParseError::new("eventStatus", text))?;
    let delay_minutes = match caps.get(2) {
        Some(delay) => parse_i64("eventStatus", delay.as_str(), text)?,
        None => 0,
    };
    Ok(EventStatus {
        delay_minutes,
        is_real: caps[3].is_empty(),
    })
}

/// `"Brașov în 10.03.2024"` → name, date.
pub fn parse_station_header(text: &str) -> Result<(String, NaiveDate), ParseError> {
    let caps = STATION_HEADER
        .captures(text)
        .ok_or_else(|| ParseError::new("stationHeader", text))?;
    let date = parse_date("stationHeader", &caps[2], text)?;
    Ok((caps[1].trim().to_string(), date))
}

/// Stopping time of a station list item, in seconds. The terminus marker
/// yields `None`.
pub fn parse_item_stopping_time(text: &str) -> Result<Option<u32>, ParseError> {
    let caps = ITEM_STOPPING_TIME
        .captures(text)
        .ok_or_else(|| ParseError::new("stoppingTime", text))?;
    if caps.get(1).is_some() {
        return Ok(None);
    }
    let value = parse_u32("stoppingTime", &caps[2], text)?;
    to_seconds(value, &caps[3], text).map(Some)
}

/// Delay line of a station list item: (delay, is_real, cancelled).
pub fn parse_item_status(text: &str) -> Result<(i64, bool, bool), ParseError> {
    if text == CANCELLED {
        return Ok((0, true, true));
    }
    let caps = ITEM_STATUS
        .captures(text)
        .ok_or_else(|| ParseError::new("itemStatus", text))?;
    let delay = match caps.get(2) {
        Some(delay) => parse_i64("itemStatus", delay.as_str().trim_start_matches('+'), text)?,
        None => 0,
    };
    Ok((delay, caps[3].is_empty(), false))
}

/// `"linia 2A"` → `"2A"`.
pub fn parse_item_platform(text: &str) -> Result<String, ParseError> {
    ITEM_PLATFORM
        .captures(text)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| ParseError::new("platform", text))
}

/// `"210 km cu IR 1538"` → km, rank, number.
pub fn parse_leg_train(text: &str) -> Result<(u32, String, String), ParseError> {
    let caps = LEG_TRAIN
        .captures(text)
        .ok_or_else(|| ParseError::new("legTrain", text))?;
    let km = parse_u32("legTrain", &caps[1], text)?;
    Ok((km, caps[2].to_string(), caps[3].to_string()))
}

/// `"Ple 10 mar. 8:00"` → local date and time.
///
/// The page omits the year. It is taken from `searched`, moving to the next
/// year when the result would fall more than a day before the searched date.
pub fn parse_leg_time(
    field: &'static str,
    text: &str,
    searched: NaiveDate,
) -> Result<NaiveDateTime, ParseError> {
    let caps = LEG_TIME.captures(text).ok_or_else(|| ParseError::new(field, text))?;
    let day = parse_u32(field, &caps[1], text)?;
    let month = MONTHS
        .iter()
        .position(|m| *m == &caps[2])
        .and_then(|index| u32::try_from(index + 1).ok())
        .ok_or_else(|| ParseError::new(field, text))?;
    let time = NaiveTime::from_hms_opt(
        parse_u32(field, &caps[3], text)?,
        parse_u32(field, &caps[4], text)?,
        0,
    )
    .ok_or_else(|| ParseError::new(field, text))?;

    let earliest = searched - TimeDelta::days(1);
    let date = NaiveDate::from_ymd_opt(searched.year(), month, day)
        .filter(|date| *date >= earliest)
        .or_else(|| NaiveDate::from_ymd_opt(searched.year() + 1, month, day))
        .ok_or_else(|| ParseError::new(field, text))?;
    Ok(date.and_time(time))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_train_header() {
        let (rank, number, date) = parse_train_header("IR 1538 în 10.03.2024").unwrap();
        assert_eq!(rank, "IR");
        assert_eq!(number, "1538");
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());

        let (rank, number, _) = parse_train_header("R-E 74A în 1.3.2024").unwrap();
        assert_eq!(rank, "R-E");
        assert_eq!(number, "74A");

        let err = parse_train_header("Trenul nu a fost găsit").unwrap_err();
        assert_eq!(err.field, "trainHeader");
        assert_eq!(err.raw_text, "Trenul nu a fost găsit");

        assert!(parse_train_header("IR 1538 în 31.02.2024").is_err());
    }

    #[test]
    fn test_route_separators() {
        assert_eq!(
            parse_route("Parcurs tren Cluj Napoca-Brașov").unwrap(),
            ("Cluj Napoca".to_string(), "Brașov".to_string())
        );
        assert_eq!(
            parse_route("Parcurs tren Cluj-Napoca – Satu Mare").unwrap(),
            ("Cluj-Napoca".to_string(), "Satu Mare".to_string())
        );
        assert_eq!(parse_route("Parcurs").unwrap_err().field, "route");
    }

    #[test]
    fn test_train_status_late_arrival() {
        let status = parse_train_status("5 min întârziere la sosirea în Cluj-Napoca.").unwrap();
        assert_eq!(status.delay_minutes, 5);
        assert_eq!(status.state, StatusState::Arrival);
        assert_eq!(status.station, "Cluj-Napoca");
    }

    #[test]
    fn test_train_status_on_time_passing() {
        let status =
            parse_train_status("Fără întârziere la trecerea fără oprire prin Aiud.").unwrap();
        assert_eq!(status.delay_minutes, 0);
        assert_eq!(status.state, StatusState::Passing);
        assert_eq!(status.station, "Aiud");
    }

    #[test]
    fn test_train_status_early_departure() {
        let status = parse_train_status("3 min mai devreme la plecarea din Brașov.").unwrap();
        assert_eq!(status.delay_minutes, -3);
        assert_eq!(status.state, StatusState::Departure);
    }

    #[test]
    fn test_train_status_absent_on_mismatch() {
        assert!(parse_train_status("").is_none());
        assert!(parse_train_status("Informații indisponibile").is_none());
        assert!(parse_train_status("5 min întârziere la sosirea în Aiud").is_none());
    }

    #[test]
    fn test_stop_fields() {
        assert_eq!(parse_km("km 125").unwrap(), 125);
        assert_eq!(parse_km("125 km").unwrap_err().field, "km");
        assert_eq!(parse_stop_stopping_time("").unwrap(), None);
        assert_eq!(parse_stop_stopping_time("2 min oprire").unwrap(), Some(120));
        assert_eq!(parse_stop_stopping_time("30 sec oprire").unwrap(), Some(30));
        assert!(parse_stop_stopping_time("oprire").is_err());
        assert_eq!(
            parse_stop_stopping_time("4294967295 min oprire").unwrap_err().field,
            "stoppingTime"
        );
        assert_eq!(
            parse_stop_stopping_time("4294967295 sec oprire").unwrap(),
            Some(u32::MAX)
        );
        assert_eq!(parse_stop_platform("").unwrap(), None);
        assert_eq!(parse_stop_platform("linia 3 bis").unwrap(), Some("3 bis".into()));
        assert!(parse_stop_platform("peron 3").is_err());
        assert_eq!(parse_clock("scheduleTime", "7:05").unwrap(), (7, 5));
        assert!(parse_clock("scheduleTime", "7.05").is_err());
    }

    #[test]
    fn test_event_status() {
        let on_time = parse_event_status("la timp").unwrap();
        assert_eq!(on_time.delay_minutes, 0);
        assert!(on_time.is_real);

        let late = parse_event_status("+12 min (întârziere)").unwrap();
        assert_eq!(late.delay_minutes, 12);
        assert!(late.is_real);

        let early_estimate = parse_event_status("-2 min (mai devreme)*").unwrap();
        assert_eq!(early_estimate.delay_minutes, -2);
        assert!(!early_estimate.is_real);

        assert_eq!(parse_event_status("12 min").unwrap_err().field, "eventStatus");
    }

    #[test]
    fn test_station_header() {
        let (name, date) = parse_station_header("Brașov în 10.03.2024").unwrap();
        assert_eq!(name, "Brașov");
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());

        let (name, _) = parse_station_header("Halta km. 14 în 10.03.2024").unwrap();
        assert_eq!(name, "Halta km. 14");
    }

    #[test]
    fn test_item_stopping_time() {
        assert_eq!(
            parse_item_stopping_time("necunoscută (stație terminus)").unwrap(),
            None
        );
        assert_eq!(
            parse_item_stopping_time("3 min (începând cu 14:05)").unwrap(),
            Some(180)
        );
        assert_eq!(
            parse_item_stopping_time("45 sec (până la 14:06)").unwrap(),
            Some(45)
        );
        assert!(parse_item_stopping_time("3 min").is_err());
        assert_eq!(
            parse_item_stopping_time("71582789 min (începând cu 14:05)")
                .unwrap_err()
                .field,
            "stoppingTime"
        );
    }

    #[test]
    fn test_leg_train() {
        assert_eq!(
            parse_leg_train("210 km cu IR 1538").unwrap(),
            (210, "IR".to_string(), "1538".to_string())
        );
        assert_eq!(parse_leg_train("cu IR 1538").unwrap_err().field, "legTrain");
    }

    #[test]
    fn test_leg_time_infers_year() {
        let searched = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let at = |y, m, d, h, min| {
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, min, 0)
                .unwrap()
        };
        assert_eq!(
            parse_leg_time("departureDate", "Ple 10 mar. 8:00", searched).unwrap(),
            at(2024, 3, 10, 8, 0)
        );
        assert_eq!(
            parse_leg_time("arrivalDate", "Sos 9 mar 23:59", searched).unwrap(),
            at(2024, 3, 9, 23, 59)
        );

        let new_year = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        assert_eq!(
            parse_leg_time("arrivalDate", "Sos 1 ian. 0:40", new_year).unwrap(),
            at(2025, 1, 1, 0, 40)
        );

        assert_eq!(
            parse_leg_time("departureDate", "Ple 10 mrt. 8:00", searched).unwrap_err().field,
            "departureDate"
        );
        assert!(parse_leg_time("departureDate", "Ple 31 feb. 8:00", searched).is_err());
        assert!(parse_leg_time("departureDate", "Ple 10 mar. 25:00", searched).is_err());
    }

    #[test]
    fn test_item_status() {
        assert_eq!(parse_item_status("la timp").unwrap(), (0, true, false));
        assert_eq!(parse_item_status("+7 min (întârziere)*").unwrap(), (7, false, false));
        assert_eq!(parse_item_status("4 min (întârziere)").unwrap(), (4, true, false));
        assert_eq!(parse_item_status("anulat").unwrap(), (0, true, true));
        assert_eq!(parse_item_status("??").unwrap_err().field, "itemStatus");
        assert_eq!(parse_item_platform("linia 2A").unwrap(), "2A");
    }
}

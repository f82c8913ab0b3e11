//! Train result page → [`TrainRecord`].
//!
//! Page layout, top-level `div`s in order:
//!
//! 0. summary: `h2` header (`rank number în date`) and `p` operator line
//! 1. search form echo (ignored)
//! 2. legend (ignored)
//! 3. itinerary: `h4` route, a live-status line and a `ul` of stops
//!
//! A page with fewer than four sections describes a train that exists but
//! does not run on the requested day.

use chrono::{DateTime, FixedOffset};

use crate::error::{AppError, ParseError};
use crate::markup::MarkupNode;
use crate::models::{Route, StationStop, StationTimeEvent, TrainRecord};
use crate::sequencer::DaySequencer;

use super::{
    parse_clock, parse_event_status, parse_km, parse_operator, parse_route, parse_stop_platform,
    parse_stop_stopping_time, parse_train_header, parse_train_status,
};

const ITINERARY_SECTION: usize = 3;

pub fn extract_train<N: MarkupNode>(root: &N) -> Result<TrainRecord, AppError> {
    let sections = root.children_named("div");

    let summary = sections
        .first()
        .and_then(|s| s.find("div"))
        .and_then(|s| s.nth_child("div", 0))
        .ok_or_else(|| AppError::page_shape("train summary"))?;

    let header = required_text(&summary, "h2", "trainHeader")?;
    let (rank, number, date) = parse_train_header(&header)?;
    let operator = parse_operator(&required_text(&summary, "p", "operator")?)?;

    let Some(itinerary) = sections.get(ITINERARY_SECTION) else {
        return Err(AppError::TrainNotRunning { number, date });
    };
    let itinerary = itinerary
        .find("div")
        .and_then(|s| s.nth_child("div", 0))
        .ok_or_else(|| AppError::page_shape("itinerary"))?;

    let (from, to) = parse_route(&required_text(&itinerary, "h4", "route")?)?;
    let status = itinerary
        .find("div")
        .and_then(|line| parse_train_status(&line.normalized_text()));

    let rows = itinerary
        .find("ul")
        .map(|list| list.children_named("li"))
        .filter(|rows| !rows.is_empty())
        .ok_or_else(|| AppError::page_shape("itinerary stops"))?;

    let mut seq = DaySequencer::new(date);
    let stations = rows
        .iter()
        .map(|row| extract_stop(row, &mut seq))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(%rank, %number, stops = stations.len(), "extracted train record");

    Ok(TrainRecord {
        rank,
        number,
        date,
        operator,
        route: Route { from, to },
        status,
        stations,
    })
}

/// Normalized text of the first `tag` descendant; an absent element fails
/// the field's grammar with empty input.
fn required_text<N: MarkupNode>(
    node: &N,
    tag: &str,
    field: &'static str,
) -> Result<String, ParseError> {
    node.find(tag)
        .map(|el| el.normalized_text())
        .ok_or_else(|| ParseError::new(field, ""))
}

fn extract_stop<N: MarkupNode>(row: &N, seq: &mut DaySequencer) -> Result<StationStop, AppError> {
    let columns = row
        .find("div")
        .map(|grid| grid.children_named("div"))
        .unwrap_or_default();
    let [arrival_col, middle, departure_col]: [N; 3] = columns
        .try_into()
        .map_err(|_| AppError::page_shape("stop columns"))?;

    let details = middle
        .find_path(&["div", "div"])
        .and_then(|d| d.nth_child("div", 0))
        .map(|d| d.children_named("div"))
        .filter(|cells| cells.len() >= 4)
        .ok_or_else(|| AppError::page_shape("stop details"))?;

    let name = details[0].normalized_text();
    let kilometer_mark = parse_km(&details[1].normalized_text())?;
    let stopping_time_seconds = parse_stop_stopping_time(&details[2].normalized_text())?;
    let platform = parse_stop_platform(&details[3].normalized_text())?;

    // Arrival always precedes departure at the same stop.
    let arrival = extract_event(&arrival_col, seq)?;
    let departure = extract_event(&departure_col, seq)?;
    if arrival.is_none() && departure.is_none() {
        return Err(ParseError::new("stopTimes", name).into());
    }

    Ok(StationStop {
        name,
        kilometer_mark,
        stopping_time_seconds,
        platform,
        arrival,
        departure,
    })
}

fn extract_event<N: MarkupNode>(
    column: &N,
    seq: &mut DaySequencer,
) -> Result<Option<StationTimeEvent>, AppError> {
    let parts = column
        .find_path(&["div", "div"])
        .map(|cell| cell.children_named("div"))
        .unwrap_or_default();
    let Some(time_part) = parts.first() else {
        return Ok(None);
    };

    let time_text = time_part.normalized_text();
    let schedule_time = sequence(seq, "scheduleTime", &time_text)?;
    let status = match parts.get(1).map(|p| p.normalized_text()) {
        Some(text) if !text.is_empty() => Some(parse_event_status(&text)?),
        _ => None,
    };

    Ok(Some(StationTimeEvent {
        schedule_time,
        status,
    }))
}

pub(super) fn sequence(
    seq: &mut DaySequencer,
    field: &'static str,
    text: &str,
) -> Result<DateTime<FixedOffset>, ParseError> {
    let (hour, minute) = parse_clock(field, text)?;
    seq.next(hour, minute)
        .ok_or_else(|| ParseError::new(field, text))
}

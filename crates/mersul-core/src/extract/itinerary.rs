//! Itinerary search result page → [`Itinerary`] list.
//!
//! The page opens with a summary `div` (absent when no connection exists)
//! followed by a `ul` with one card per itinerary. A card's fourth panel
//! holds a list whose rows alternate between stations and the trains that
//! link them: `station, train, station, ..., station`.

use chrono::NaiveDate;

use crate::error::AppError;
use crate::markup::MarkupNode;
use crate::models::{Itinerary, ItineraryLeg};
use crate::sequencer::localize;

use super::{parse_leg_time, parse_leg_train, parse_operator};

const DETAILS_PANEL: usize = 3;

pub fn extract_itineraries<N: MarkupNode>(
    root: &N,
    date: NaiveDate,
) -> Result<Option<Vec<Itinerary>>, AppError> {
    if root.nth_child("div", 0).is_none() {
        return Ok(None);
    }

    let cards = root
        .nth_child("ul", 0)
        .map(|list| list.children_named("li"))
        .unwrap_or_default();
    let itineraries = cards
        .iter()
        .map(|card| extract_itinerary(card, date))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(itineraries = itineraries.len(), "extracted itineraries");
    Ok(Some(itineraries))
}

fn extract_itinerary<N: MarkupNode>(card: &N, date: NaiveDate) -> Result<Itinerary, AppError> {
    let rows = card
        .find_path(&["div", "div", "div"])
        .and_then(|panels| panels.nth_child("div", DETAILS_PANEL))
        .and_then(|panel| panel.nth_child("div", 0))
        .and_then(|panel| panel.nth_child("div", 1))
        .and_then(|details| details.nth_child("div", 0))
        .and_then(|details| details.nth_child("ul", 0))
        .map(|list| list.children_named("li"))
        .filter(|rows| rows.len() >= 3 && rows.len() % 2 == 1)
        .ok_or_else(|| AppError::page_shape("itinerary rows"))?;

    let stations = rows
        .iter()
        .step_by(2)
        .map(station_name)
        .collect::<Result<Vec<_>, _>>()?;

    let trains = rows
        .iter()
        .skip(1)
        .step_by(2)
        .zip(stations.windows(2))
        .map(|(row, ends)| extract_leg(row, &ends[0], &ends[1], date))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Itinerary { trains })
}

fn station_name<N: MarkupNode>(row: &N) -> Result<String, AppError> {
    row.find_path(&["div", "div", "div"])
        .and_then(|line| line.nth_child("div", 1))
        .map(|name| name.normalized_text())
        .ok_or_else(|| AppError::page_shape("itinerary station"))
}

/// Value half of a `label, value` pair.
fn value_text<N: MarkupNode>(pair: &N, what: &str) -> Result<String, AppError> {
    pair.nth_child("div", 1)
        .map(|value| value.normalized_text())
        .ok_or_else(|| AppError::page_shape(what))
}

fn extract_leg<N: MarkupNode>(
    row: &N,
    from: &str,
    to: &str,
    date: NaiveDate,
) -> Result<ItineraryLeg, AppError> {
    let [times, train]: [N; 2] = row
        .nth_child("div", 0)
        .map(|grid| grid.children_named("div"))
        .unwrap_or_default()
        .into_iter()
        .take(2)
        .collect::<Vec<_>>()
        .try_into()
        .map_err(|_| AppError::page_shape("leg columns"))?;

    let times = times.children_named("div");
    if times.len() < 4 {
        return Err(AppError::page_shape("leg times"));
    }
    let departure = parse_leg_time("departureDate", &value_text(&times[0], "leg departure")?, date)?;
    let arrival = parse_leg_time("arrivalDate", &value_text(&times[3], "leg arrival")?, date)?;

    // Stop names sit at odd positions, between separators.
    let intermediate_stops = times[2]
        .children_named("div")
        .iter()
        .skip(1)
        .step_by(2)
        .map(|stop| stop.normalized_text())
        .filter(|stop| !stop.is_empty())
        .collect();

    let info = train
        .find_path(&["div", "div", "div"])
        .map(|block| block.children_named("div"))
        .filter(|lines| lines.len() >= 2)
        .ok_or_else(|| AppError::page_shape("leg train"))?;
    let (km, rank, number) = parse_leg_train(&info[0].normalized_text())?;
    let operator = parse_operator(&info[1].normalized_text())?;

    Ok(ItineraryLeg {
        from: from.to_string(),
        to: to.to_string(),
        intermediate_stops,
        departure_date: localize(departure),
        arrival_date: localize(arrival),
        km,
        operator,
        rank,
        number,
    })
}

//! Station result page → [`StationRecord`].
//!
//! Top-level sections: `0` header, `1` search echo, `2` departures, `3`
//! arrivals. Each board is a `ul` whose items carry a data block (time,
//! terminus, train, details) and an optional live status block.

use chrono::NaiveDate;

use crate::error::{AppError, ParseError};
use crate::markup::MarkupNode;
use crate::models::{ItemStatus, StationArrivalDeparture, StationRecord, StationTrain, Terminus};
use crate::sequencer::DaySequencer;

use super::train::sequence;
use super::{parse_item_platform, parse_item_status, parse_item_stopping_time, parse_station_header};

const DEPARTURES_SECTION: usize = 2;
const ARRIVALS_SECTION: usize = 3;

#[derive(Clone, Copy)]
enum Board {
    Departures,
    Arrivals,
}

impl Board {
    fn terminus(self, name: String) -> Terminus {
        match self {
            Board::Departures => Terminus::Destination(name),
            Board::Arrivals => Terminus::Origin(name),
        }
    }
}

pub fn extract_station<N: MarkupNode>(root: &N) -> Result<StationRecord, AppError> {
    let sections = root.children_named("div");
    if sections.len() <= ARRIVALS_SECTION {
        return Err(AppError::page_shape("station boards"));
    }

    let header = sections[0]
        .find("h2")
        .map(|h2| h2.normalized_text())
        .ok_or_else(|| ParseError::new("stationHeader", ""))?;
    let (station_name, date) = parse_station_header(&header)?;

    let departures = extract_board(&sections[DEPARTURES_SECTION], Board::Departures, date)?;
    let arrivals = extract_board(&sections[ARRIVALS_SECTION], Board::Arrivals, date)?;

    tracing::debug!(
        station = %station_name,
        departures = departures.as_ref().map_or(0, Vec::len),
        arrivals = arrivals.as_ref().map_or(0, Vec::len),
        "extracted station record"
    );

    Ok(StationRecord {
        station_name,
        date,
        departures,
        arrivals,
    })
}

/// `None` when the section has no list at all; an empty list stays empty.
fn extract_board<N: MarkupNode>(
    section: &N,
    board: Board,
    date: NaiveDate,
) -> Result<Option<Vec<StationArrivalDeparture>>, AppError> {
    let Some(list) = section.find("div").and_then(|d| d.find("ul")) else {
        return Ok(None);
    };

    let mut seq = DaySequencer::new(date);
    list.children_named("li")
        .iter()
        .map(|item| extract_item(item, board, &mut seq))
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// Text of the value cell in a label/value pair: `cell > div > div > div[1]`.
fn labelled_value<N: MarkupNode>(cell: &N, what: &str) -> Result<N, AppError> {
    cell.find_path(&["div", "div"])
        .and_then(|pair| pair.nth_child("div", 1))
        .ok_or_else(|| AppError::page_shape(what))
}

fn detail_value<N: MarkupNode>(cell: &N, what: &str) -> Result<String, AppError> {
    cell.find("div")
        .and_then(|pair| pair.nth_child("div", 1))
        .map(|value| value.normalized_text())
        .ok_or_else(|| AppError::page_shape(what))
}

fn extract_item<N: MarkupNode>(
    item: &N,
    board: Board,
    seq: &mut DaySequencer,
) -> Result<StationArrivalDeparture, AppError> {
    let blocks = item.children_named("div");
    let data = blocks
        .first()
        .ok_or_else(|| AppError::page_shape("board item"))?;

    let [main, details]: [N; 2] = data
        .children_named("div")
        .into_iter()
        .take(2)
        .collect::<Vec<_>>()
        .try_into()
        .map_err(|_| AppError::page_shape("board item data"))?;

    let [time_cell, terminus_cell, train_cell]: [N; 3] = main
        .children_named("div")
        .into_iter()
        .take(3)
        .collect::<Vec<_>>()
        .try_into()
        .map_err(|_| AppError::page_shape("board item summary"))?;

    let [operator_cell, route_cell, stopping_cell]: [N; 3] = details
        .find("div")
        .map(|d| d.children_named("div"))
        .unwrap_or_default()
        .into_iter()
        .take(3)
        .collect::<Vec<_>>()
        .try_into()
        .map_err(|_| AppError::page_shape("board item details"))?;

    let time_text = labelled_value(&time_cell, "item time")?.normalized_text();
    let time = sequence(seq, "time", &time_text)?;

    let terminus = labelled_value(&terminus_cell, "item terminus")?.normalized_text();

    let train = labelled_value(&train_cell, "item train")?;
    let rank = train
        .find("span")
        .map(|span| span.normalized_text())
        .ok_or_else(|| AppError::page_shape("item train rank"))?;
    let number = train
        .find("a")
        .map(|a| a.normalized_text())
        .ok_or_else(|| AppError::page_shape("item train number"))?;

    let operator = detail_value(&operator_cell, "item operator")?;
    let route = detail_value(&route_cell, "item route")?
        .split(" - ")
        .map(str::trim)
        .filter(|stop| !stop.is_empty())
        .map(String::from)
        .collect();
    let stopping_time_seconds =
        parse_item_stopping_time(&detail_value(&stopping_cell, "item stopping time")?)?;

    let status = match blocks.get(1) {
        Some(block) => extract_item_status(block)?,
        None => None,
    };

    Ok(StationArrivalDeparture {
        time,
        stopping_time_seconds,
        train: StationTrain {
            rank,
            number,
            operator,
            route,
            terminus: board.terminus(terminus),
        },
        status,
    })
}

fn extract_item_status<N: MarkupNode>(block: &N) -> Result<Option<ItemStatus>, AppError> {
    let lines = block
        .nth_child("div", 0)
        .map(|inner| inner.children_named("div"))
        .unwrap_or_default();
    let Some(delay_line) = lines.first().map(|l| l.normalized_text()) else {
        return Ok(None);
    };
    if delay_line.is_empty() {
        return Ok(None);
    }

    let (delay_minutes, is_real, cancelled) = parse_item_status(&delay_line)?;
    let platform = match lines.get(1).map(|l| l.normalized_text()) {
        Some(text) if !text.is_empty() => Some(parse_item_platform(&text)?),
        _ => None,
    };

    Ok(Some(ItemStatus {
        delay_minutes,
        is_real,
        cancelled,
        platform,
    }))
}

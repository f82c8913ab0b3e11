//! Test utilities: mock origin, controllable clock and page fixtures.
//!
//! Enabled for this crate's unit tests and, through the `testutil` feature,
//! for downstream crates' tests. Mocks use `Arc<Mutex<_>>` so clones share
//! their queues and call counters.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};

use crate::cache::Clock;
use crate::error::AppError;
use crate::markup::MarkupNode;
use crate::models::ro_date;
use crate::traits::Origin;

// ---------------------------------------------------------------------------
// MockOrigin
// ---------------------------------------------------------------------------

type Responses = Arc<Mutex<Vec<Result<String, AppError>>>>;

/// Origin that serves queued pages. Each call pops the first queued response;
/// an empty queue answers with a fetch error.
#[derive(Clone, Default)]
pub struct MockOrigin {
    train_pages: Responses,
    station_pages: Responses,
    itinerary_pages: Responses,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockOrigin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_train_pages(pages: Vec<Result<String, AppError>>) -> Self {
        let origin = Self::default();
        *origin.train_pages.lock().unwrap() = pages;
        origin
    }

    pub fn with_station_pages(pages: Vec<Result<String, AppError>>) -> Self {
        let origin = Self::default();
        *origin.station_pages.lock().unwrap() = pages;
        origin
    }

    pub fn with_itinerary_pages(pages: Vec<Result<String, AppError>>) -> Self {
        let origin = Self::default();
        *origin.itinerary_pages.lock().unwrap() = pages;
        origin
    }

    pub fn push_train_page(&self, page: Result<String, AppError>) {
        self.train_pages.lock().unwrap().push(page);
    }

    pub fn push_station_page(&self, page: Result<String, AppError>) {
        self.station_pages.lock().unwrap().push(page);
    }

    pub fn push_itinerary_page(&self, page: Result<String, AppError>) {
        self.itinerary_pages.lock().unwrap().push(page);
    }

    /// Total number of page requests served (successful or not).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests seen so far, as `train <number> <date>`,
    /// `station <slug> <date|->` or `itineraries <from> <to> <date>`.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn serve(&self, queue: &Responses, request: String) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        let mut queue = queue.lock().unwrap();
        if queue.is_empty() {
            Err(AppError::Fetch("no response queued".into()))
        } else {
            queue.remove(0)
        }
    }
}

impl Origin for MockOrigin {
    async fn train_page(&self, number: &str, date: NaiveDate) -> Result<String, AppError> {
        let request = format!("train {number} {}", date.format(ro_date::FORMAT));
        self.serve(&self.train_pages, request)
    }

    async fn station_page(&self, slug: &str, date: Option<NaiveDate>) -> Result<String, AppError> {
        let date = date.map_or_else(|| "-".to_string(), |d| d.format(ro_date::FORMAT).to_string());
        self.serve(&self.station_pages, format!("station {slug} {date}"))
    }

    async fn itinerary_page(&self, from: &str, to: &str, date: NaiveDate) -> Result<String, AppError> {
        let request = format!("itineraries {from} {to} {}", date.format(ro_date::FORMAT));
        self.serve(&self.itinerary_pages, request)
    }
}

// ---------------------------------------------------------------------------
// ManualClock
// ---------------------------------------------------------------------------

/// Clock that only moves when told to.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn advance(&self, by: TimeDelta) {
        *self.now.lock().unwrap() += by;
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// ---------------------------------------------------------------------------
// FixtureNode
// ---------------------------------------------------------------------------

/// In-memory element tree for driving the extractor without an HTML parser.
#[derive(Debug, Clone, Default)]
pub struct FixtureNode {
    tag: String,
    text: String,
    children: Vec<FixtureNode>,
}

impl FixtureNode {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }

    pub fn text_element(tag: &str, text: &str) -> Self {
        Self {
            tag: tag.to_string(),
            text: text.to_string(),
            children: Vec::new(),
        }
    }

    pub fn child(mut self, child: FixtureNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = FixtureNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// Render the node's children as an HTML fragment, the shape the origin
    /// returns from its search endpoints.
    pub fn to_fragment(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            child.render(&mut out);
        }
        out
    }

    fn render(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        out.push('>');
        for c in self.text.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                other => out.push(other),
            }
        }
        for child in &self.children {
            child.render(out);
        }
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
    }
}

impl MarkupNode for FixtureNode {
    fn children_named(&self, tag: &str) -> Vec<Self> {
        self.children
            .iter()
            .filter(|c| c.tag == tag)
            .cloned()
            .collect()
    }

    fn find(&self, tag: &str) -> Option<Self> {
        self.children.iter().find_map(|c| {
            if c.tag == tag {
                Some(c.clone())
            } else {
                c.find(tag)
            }
        })
    }

    fn text_content(&self) -> String {
        let mut text = self.text.clone();
        for child in &self.children {
            text.push_str(&child.text_content());
        }
        text
    }
}

// ---------------------------------------------------------------------------
// Page builders
// ---------------------------------------------------------------------------

fn div() -> FixtureNode {
    FixtureNode::new("div")
}

fn text_div(text: &str) -> FixtureNode {
    FixtureNode::text_element("div", text)
}

/// Train result page. `itinerary` is `(route line, status line, stop rows)`;
/// `None` builds the page served for a day the train does not run.
pub fn train_page(
    header: &str,
    operator: &str,
    itinerary: Option<(&str, &str, Vec<FixtureNode>)>,
) -> FixtureNode {
    let summary = div().child(
        div().child(
            div()
                .child(FixtureNode::text_element("h2", header))
                .child(FixtureNode::text_element("p", operator)),
        ),
    );
    let mut root = FixtureNode::new("root")
        .child(summary)
        .child(div())
        .child(div());

    if let Some((route, status, stops)) = itinerary {
        let body = div()
            .child(FixtureNode::text_element("h4", route))
            .child(text_div(status))
            .child(FixtureNode::new("ul").with_children(stops));
        root = root.child(div().child(div().child(body)));
    }
    root
}

fn event_column(event: Option<(&str, &str)>) -> FixtureNode {
    match event {
        Some((time, status)) => div().child(
            div().child(div().child(text_div(time)).child(text_div(status))),
        ),
        None => div(),
    }
}

/// One itinerary row: `(time, status)` per side plus the middle details.
pub fn train_stop(
    arrival: Option<(&str, &str)>,
    name: &str,
    km: &str,
    stopping: &str,
    platform: &str,
    departure: Option<(&str, &str)>,
) -> FixtureNode {
    let details = div()
        .child(text_div(name))
        .child(text_div(km))
        .child(text_div(stopping))
        .child(text_div(platform));
    let middle = div().child(div().child(div().child(details)));
    FixtureNode::new("li").child(
        div()
            .child(event_column(arrival))
            .child(middle)
            .child(event_column(departure)),
    )
}

/// One departure or arrival on a station board.
#[derive(Debug, Clone)]
pub struct StationItem {
    pub time: String,
    pub terminus: String,
    pub rank: String,
    pub number: String,
    pub operator: String,
    /// Stations joined by `" - "`.
    pub route: String,
    pub stopping: String,
    /// Delay line and optional platform line.
    pub status: Option<(String, Option<String>)>,
}

fn labelled(label: &str, value: FixtureNode) -> FixtureNode {
    div().child(div().child(div().child(text_div(label)).child(value)))
}

fn detail(label: &str, value: &str) -> FixtureNode {
    div().child(div().child(text_div(label)).child(text_div(value)))
}

impl StationItem {
    fn to_node(&self) -> FixtureNode {
        let train = div()
            .child(FixtureNode::text_element("span", &self.rank))
            .child(FixtureNode::text_element("a", &self.number));
        let main = div()
            .child(labelled("Ora", text_div(&self.time)))
            .child(labelled("Către", text_div(&self.terminus)))
            .child(labelled("Tren", train));
        let details = div().child(
            div()
                .child(detail("Operator", &self.operator))
                .child(detail("Parcurs", &self.route))
                .child(detail("Staționare", &self.stopping)),
        );
        let mut item = FixtureNode::new("li").child(div().child(main).child(details));
        if let Some((delay, platform)) = &self.status {
            let mut lines = div().child(text_div(delay));
            if let Some(platform) = platform {
                lines = lines.child(text_div(platform));
            }
            item = item.child(div().child(lines));
        }
        item
    }
}

fn board(items: Option<Vec<StationItem>>) -> FixtureNode {
    match items {
        Some(items) => div().child(
            div().child(FixtureNode::new("ul").with_children(items.iter().map(StationItem::to_node))),
        ),
        None => div(),
    }
}

/// Station result page with optional departures and arrivals boards.
pub fn station_page(
    header: &str,
    departures: Option<Vec<StationItem>>,
    arrivals: Option<Vec<StationItem>>,
) -> FixtureNode {
    FixtureNode::new("root")
        .child(div().child(FixtureNode::text_element("h2", header)))
        .child(div())
        .child(board(departures))
        .child(board(arrivals))
}

/// A small running-train page as HTML, for tests that go through an origin.
pub fn sample_train_html(number: &str, date: &str) -> String {
    train_page(
        &format!("IR {number} în {date}"),
        "Operat de CFR Călători",
        Some((
            "Parcurs tren Cluj Napoca-Brașov",
            "Fără întârziere la plecarea din Cluj Napoca.",
            vec![
                train_stop(None, "Cluj Napoca", "km 0", "", "linia 1", Some(("08:00", "la timp"))),
                train_stop(
                    Some(("09:10", "la timp")),
                    "Aiud",
                    "km 67",
                    "1 min oprire",
                    "",
                    Some(("09:11", "")),
                ),
                train_stop(Some(("12:00", "")), "Brașov", "km 210", "", "", None),
            ],
        )),
    )
    .to_fragment()
}

/// A small station page as HTML with one departure and one arrival.
pub fn sample_station_html(name: &str, date: &str) -> String {
    let departure = StationItem {
        time: "10:00".into(),
        terminus: "Brașov".into(),
        rank: "IR".into(),
        number: "1538".into(),
        operator: "CFR Călători".into(),
        route: format!("Cluj Napoca - {name} - Brașov"),
        stopping: "2 min (începând cu 09:58)".into(),
        status: None,
    };
    let arrival = StationItem {
        time: "11:30".into(),
        terminus: "Sibiu".into(),
        rank: "R".into(),
        number: "3021".into(),
        operator: "Regio Călători".into(),
        route: format!("Sibiu - {name}"),
        stopping: "necunoscută (stație terminus)".into(),
        status: Some(("la timp".into(), Some("linia 2".into()))),
    };
    station_page(
        &format!("{name} în {date}"),
        Some(vec![departure]),
        Some(vec![arrival]),
    )
    .to_fragment()
}

/// One train leg on an itinerary card, in the page's own wording.
#[derive(Debug, Clone)]
pub struct ItineraryLegItem {
    /// `"Ple 10 mar. 8:00"`.
    pub departure: String,
    /// `"Sos 10 mar. 12:00"`.
    pub arrival: String,
    pub stops: Vec<String>,
    /// `"210 km cu IR 1538"`.
    pub train: String,
    /// `"Operat de CFR Călători"`.
    pub operator: String,
}

impl ItineraryLegItem {
    fn to_node(&self) -> FixtureNode {
        let stops = div().with_children(
            self.stops
                .iter()
                .flat_map(|stop| [text_div("·"), text_div(stop)]),
        );
        let times = div()
            .child(div().child(text_div("Plecare")).child(text_div(&self.departure)))
            .child(text_div("2h 30m"))
            .child(stops)
            .child(div().child(text_div("Sosire")).child(text_div(&self.arrival)));
        let train = div().child(
            div().child(
                div().child(
                    div()
                        .child(text_div(&self.train))
                        .child(text_div(&self.operator)),
                ),
            ),
        );
        FixtureNode::new("li").child(div().child(times).child(train))
    }
}

fn itinerary_station(name: &str) -> FixtureNode {
    FixtureNode::new("li").child(
        div().child(div().child(div().child(text_div("●")).child(text_div(name)))),
    )
}

/// One itinerary card: `stations` interleaved with `legs`.
pub fn itinerary_card(stations: &[&str], legs: Vec<ItineraryLegItem>) -> FixtureNode {
    let mut rows = Vec::new();
    let mut legs = legs.iter();
    for (index, station) in stations.iter().enumerate() {
        if index > 0 {
            if let Some(leg) = legs.next() {
                rows.push(leg.to_node());
            }
        }
        rows.push(itinerary_station(station));
    }
    rows.extend(legs.map(ItineraryLegItem::to_node));

    let details = div().child(div().child(FixtureNode::new("ul").with_children(rows)));
    let panels = div()
        .child(text_div("Plecare"))
        .child(text_div("Sosire"))
        .child(text_div("Durată"))
        .child(div().child(div().child(text_div("Trenuri")).child(details)));
    FixtureNode::new("li").child(div().child(div().child(panels)))
}

/// Itinerary search result. `None` builds the page served when no
/// connection exists.
pub fn itineraries_page(cards: Option<Vec<FixtureNode>>) -> FixtureNode {
    let root = FixtureNode::new("root");
    match cards {
        Some(cards) => root
            .child(text_div("Rezultate"))
            .child(FixtureNode::new("ul").with_children(cards)),
        None => root.child(FixtureNode::text_element("p", "Nu există rute")),
    }
}

/// A direct and a connecting itinerary from Cluj Napoca to Brașov, as HTML.
pub fn sample_itineraries_html(day: &str) -> String {
    let leg = |departure: String, arrival: String, train: &str, stops: &[&str]| ItineraryLegItem {
        departure,
        arrival,
        stops: stops.iter().map(|s| s.to_string()).collect(),
        train: train.to_string(),
        operator: "Operat de CFR Călători".to_string(),
    };
    let direct = itinerary_card(
        &["Cluj Napoca", "Brașov"],
        vec![leg(
            format!("Ple {day} mar. 8:00"),
            format!("Sos {day} mar. 12:00"),
            "210 km cu IR 1538",
            &["Aiud"],
        )],
    );
    let connecting = itinerary_card(
        &["Cluj Napoca", "Teiuș", "Brașov"],
        vec![
            leg(
                format!("Ple {day} mar. 9:00"),
                format!("Sos {day} mar. 10:15"),
                "75 km cu R 3021",
                &[],
            ),
            leg(
                format!("Ple {day} mar. 10:40"),
                format!("Sos {day} mar. 13:30"),
                "140 km cu IR 1622",
                &["Sighișoara"],
            ),
        ],
    );
    itineraries_page(Some(vec![direct, connecting])).to_fragment()
}

use std::sync::LazyLock;
use std::time::Duration;

use chrono::NaiveDate;
use mersul_core::error::AppError;
use mersul_core::models::ro_date;
use mersul_core::traits::Origin;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use scraper::{Html, Selector};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://mersultrenurilor.infofer.ro";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Fixed search options of the itinerary form: earliest departure first,
/// from midnight, connections allowed with at least five minutes to change.
const ITINERARY_OPTIONS: [(&str, &str); 6] = [
    ("OrderingTypeId", "0"),
    ("TimeSelectionId", "0"),
    ("MinutesInDay", "0"),
    ("ConnectionsTypeId", "1"),
    ("BetweenTrainsMinimumMinutes", "5"),
    ("ChangeStationName", ""),
];

static SEARCH_FORM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#form-search").expect("valid selector"));

static NAMED_INPUT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("input[name]").expect("valid selector"));

/// [`Origin`] backed by the public Infofer site.
///
/// Each lookup opens a fresh cookie session: the landing page sets the
/// anti-forgery cookie that the search form's hidden token is checked
/// against, then the form is posted back to the results endpoint.
#[derive(Debug, Clone)]
pub struct InfoferOrigin {
    base: Url,
    timeout: Duration,
}

impl InfoferOrigin {
    pub fn new() -> Result<Self, AppError> {
        Self::with_base_url(DEFAULT_BASE_URL, DEFAULT_TIMEOUT)
    }

    /// Read `MERSUL_ORIGIN_URL` (optional, defaults to [`DEFAULT_BASE_URL`]).
    pub fn from_env() -> Result<Self, AppError> {
        let base = std::env::var("MERSUL_ORIGIN_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self::with_base_url(&base, DEFAULT_TIMEOUT)
    }

    pub fn with_base_url(base: &str, timeout: Duration) -> Result<Self, AppError> {
        let base = Url::parse(base)
            .map_err(|e| AppError::Config(format!("Invalid origin URL '{base}': {e}")))?;
        if base.cannot_be_a_base() {
            return Err(AppError::Config(format!("Origin URL '{base}' cannot be a base")));
        }
        Ok(Self { base, timeout })
    }

    /// `{base}/ro-RO/{segments..}[?Date=DD.MM.YYYY]`, segments percent-encoded.
    fn page_url(&self, segments: &[&str], date: Option<NaiveDate>) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("ro-RO").extend(segments);
        }
        if let Some(date) = date {
            url.query_pairs_mut()
                .append_pair("Date", &date.format(ro_date::FORMAT).to_string());
        }
        url
    }

    /// `{base}/ro-RO/Rute-trenuri/{from}/{to}?DepartureDate=D.MM.YYYY&...`
    fn itinerary_url(&self, from: &str, to: &str, date: NaiveDate) -> Url {
        let mut url = self.page_url(&["Rute-trenuri", from, to], None);
        url.query_pairs_mut()
            .append_pair("DepartureDate", &date.format("%-d.%m.%Y").to_string())
            .extend_pairs(ITINERARY_OPTIONS);
        url
    }

    fn session(&self) -> Result<Client, AppError> {
        Client::builder()
            .user_agent(concat!("mersul/", env!("CARGO_PKG_VERSION")))
            .cookie_store(true)
            .timeout(self.timeout)
            .build()
            .map_err(|e| AppError::Fetch(e.to_string()))
    }

    /// Load the search page, then post its form to `result_path`.
    async fn search(&self, page: Url, result_path: &[&str]) -> Result<String, AppError> {
        let client = self.session()?;

        tracing::debug!(url = %page, "Loading search form");
        let landing = self.send(client.get(page.clone()), &page).await?;
        let fields = search_form_fields(&landing)
            .ok_or_else(|| AppError::Fetch(format!("no search form at {page}")))?;

        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&fields)
            .finish();
        let result_url = self.page_url(result_path, None);
        tracing::debug!(url = %result_url, fields = fields.len(), "Posting search form");

        let request = client
            .post(result_url.clone())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body);
        self.send(request, &result_url).await
    }

    async fn send(&self, request: RequestBuilder, url: &Url) -> Result<String, AppError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout.as_secs())
            } else if e.is_connect() {
                AppError::Fetch(format!("Connection failed: {e}"))
            } else {
                AppError::Fetch(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Fetch(format!("HTTP {} for {url}", status.as_u16())));
        }

        response.text().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout.as_secs())
            } else {
                AppError::Fetch(format!("Failed to read response body: {e}"))
            }
        })
    }
}

impl Origin for InfoferOrigin {
    async fn train_page(&self, number: &str, date: NaiveDate) -> Result<String, AppError> {
        let page = self.page_url(&["Tren", number], Some(date));
        self.search(page, &["Trains", "TrainsResult"]).await
    }

    async fn station_page(&self, slug: &str, date: Option<NaiveDate>) -> Result<String, AppError> {
        let page = self.page_url(&["Statie", slug], date);
        self.search(page, &["Stations", "StationsResult"]).await
    }

    async fn itinerary_page(&self, from: &str, to: &str, date: NaiveDate) -> Result<String, AppError> {
        let page = self.itinerary_url(from, to, date);
        self.search(page, &["Itineraries", "GetItineraries"]).await
    }
}

/// Named inputs of `#form-search`, in document order. Inputs without a
/// value attribute post an empty string.
fn search_form_fields(html: &str) -> Option<Vec<(String, String)>> {
    let document = Html::parse_document(html);
    let form = document.select(&SEARCH_FORM).next()?;
    let fields = form
        .select(&NAMED_INPUT)
        .filter_map(|input| {
            let el = input.value();
            let name = el.attr("name")?;
            Some((name.to_string(), el.attr("value").unwrap_or_default().to_string()))
        })
        .collect();
    Some(fields)
}

use std::future::Future;

use chrono::NaiveDate;

use crate::error::AppError;

/// Source of raw timetable result fragments.
///
/// Implementations perform whatever request dance the site needs and return
/// the HTML fragment the extractor consumes. Failures to reach the site map
/// to [`AppError::Fetch`] or [`AppError::Timeout`].
pub trait Origin: Send + Sync + Clone + 'static {
    /// Result fragment for train `number` on `date`. The number is passed
    /// as requested, so a suffix such as `74A` reaches the origin intact.
    fn train_page(
        &self,
        number: &str,
        date: NaiveDate,
    ) -> impl Future<Output = Result<String, AppError>> + Send;

    /// Result fragment for the station identified by `slug`, on `date` or on
    /// the origin's current day when `None`.
    fn station_page(
        &self,
        slug: &str,
        date: Option<NaiveDate>,
    ) -> impl Future<Output = Result<String, AppError>> + Send;

    /// Itinerary search result between the stations identified by the
    /// `from` and `to` slugs, departing on `date`.
    fn itinerary_page(
        &self,
        from: &str,
        to: &str,
        date: NaiveDate,
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}

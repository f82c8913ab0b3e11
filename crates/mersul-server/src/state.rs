use mersul_core::{Origin, ScrapeService};

/// Shared application state, available to all route handlers via `State<Arc<AppState<O>>>`.
pub struct AppState<O: Origin> {
    pub service: ScrapeService<O>,
    /// Base URL for `$schema` links (None = derive from the `Host` header).
    pub public_url: Option<String>,
}

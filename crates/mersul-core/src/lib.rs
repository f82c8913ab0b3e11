pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod markup;
pub mod models;
pub mod normalize;
pub mod schema;
pub mod scrape;
pub mod sequencer;
pub mod store;
pub mod traits;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use cache::{Cached, Clock, SystemClock};
pub use config::ServiceConfig;
pub use error::{AppError, ParseError};
pub use models::{ItineraryRecord, StationRecord, TrainRecord};
pub use schema::{SchemaKind, TrainSchemaVersion};
pub use scrape::ScrapeService;
pub use store::KnowledgeStore;
pub use traits::Origin;

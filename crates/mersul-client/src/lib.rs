pub mod origin;

pub use origin::{DEFAULT_BASE_URL, InfoferOrigin};

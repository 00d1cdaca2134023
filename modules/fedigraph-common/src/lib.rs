pub mod config;
pub mod error;
pub mod types;

pub use config::{
    load_config, ApiConfig, AuthorsConfig, FileConfig, HarvestConfig, RebloggersConfig,
};
pub use error::{HarvestError, Result};
pub use types::{server_of, HarvestRecord, ListingKind, WorkUnit, CANONICAL_HOST};

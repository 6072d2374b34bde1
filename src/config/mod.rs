//! Configuration schema and store

mod schema;
mod store;

pub use schema::{AppConfig, HubConfig, TranscribeConfig, WebConfig};
pub use store::{ConfigChange, ConfigStore};

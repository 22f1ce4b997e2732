pub mod config;
pub mod error;
pub mod db;
pub mod graph;
pub mod api;

pub use config::Config;
pub use error::{GraphError, Result};
pub use api::{Api, Envelope};
pub use graph::{Components, Metrics, Processes, Relationships, Uid};

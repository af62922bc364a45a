mod codec;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod pull;
pub mod queue;
pub mod store;

pub use config::Config;
pub use error::Error;
pub use queue::{MustStopProcessing, Priority, Queue};
pub use store::MigrationStore;

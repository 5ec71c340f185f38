//! HTTP transport for the crew service.
//!
//! Exposes one crew run per request in two delivery modes:
//! - `POST /api/crew` waits for the final result and replies with JSON
//! - `POST /api/crew/stream` relays progress as server-sent events
//!
//! plus `GET /api/crew` (status probe) and `GET /api/health`.
//!
//! # Example
//!
//! ```ignore
//! use crew_api::{ApiConfig, AppState, serve};
//! use crew_runtime::{CrewRunner, WorkerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ApiConfig::default();
//!     let state = AppState::new(config.clone(), CrewRunner::new(WorkerConfig::new()));
//!
//!     serve(config, state).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;
pub mod types;

pub use config::ApiConfig;
pub use error::{ApiError, Result};
pub use router::{create_router, serve};
pub use state::AppState;

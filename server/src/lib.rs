//! Snapworth Rate Service
//!
//! Serves resolved exchange rates over HTTP, backed by a PostgreSQL rate
//! cache, and refreshes the basket of major currencies on a schedule.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod scheduler;
pub mod state;
pub mod store;

pub use config::ServerConfig;
pub use routes::router;
pub use state::AppState;
pub use store::PgRateStore;

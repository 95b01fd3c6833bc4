//! HTTP server wiring

pub mod routes;
pub mod server;
pub mod state;

pub use server::{configure, run};
pub use state::AppState;

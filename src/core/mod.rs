//! The request routing and dispatch engine

pub mod forwarder;
pub mod health;
pub mod registry;
pub mod selector;
pub mod session;
pub mod types;

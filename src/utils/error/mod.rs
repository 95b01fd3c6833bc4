//! Error handling for the gateway
//!
//! This module defines all error types used throughout the gateway.

mod error;

pub use error::{GatewayError, Result};

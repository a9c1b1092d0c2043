//! The core module of the crate.
//!
//! This module contains the pieces shared by every model:
//! - Configuration types (input shape, head options, JSON model descriptions)
//! - Error handling
//! - Tracing setup

pub mod config;
pub mod errors;

pub use config::{ArchitectureConfig, DEFAULT_INPUT_SIZE, HeadConfig, InputShape};
pub use errors::{ArchError, ArchResult};

/// Initializes the tracing subscriber for logging.
///
/// This function sets up the tracing subscriber with environment filter and formatting layer.
/// It's typically called at the start of an application to enable logging.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}

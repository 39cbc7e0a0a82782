//! Asynchronous Component Base: a registry + layered settings + DI core
//! that turns a process's configuration, secrets, and external-service
//! bindings into a dependency-injection graph assembled at startup.
//!
//! See the module docs on [`registry`], [`settings`], [`di`], and
//! [`adapter`] for the four pieces that make up the core; [`bootstrap`]
//! ties them together behind a process-wide mode decision.

pub mod adapter;
pub mod bootstrap;
pub mod console;
pub mod di;
pub mod error;
pub mod prelude;
pub mod registry;
pub mod secret;
pub mod settings;

pub use error::AcbError;

/// Initialize the `tracing` subscriber the core's own modules log
/// through. Applications in `Mode::Application` call this once at
/// startup; library and test mode leave logging to the embedder.
///
/// Grounded on the teacher's `tracing_subscriber::fmt` initialization in
/// its own binary entry point.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

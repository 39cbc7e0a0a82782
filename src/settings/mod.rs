//! Layered settings hydration (§4.2): class defaults ≺ YAML ≺ secrets ≺
//! init overrides, with YAML write-back and a secret-masking sentinel type.

pub mod bundle;
pub mod loader;
pub mod secret_str;

pub use bundle::{hydrate, HydrationContext, Settings};
pub use secret_str::SecretStr;

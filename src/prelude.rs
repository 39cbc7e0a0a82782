//! Import everything you need with a single `use`.
//!
//! ```ignore
//! use acb_core::prelude::*;
//! ```

pub use crate::adapter::{Adapter, AdapterBase, AdapterGuard, Closeable};
pub use crate::bootstrap::{mode, AppInfo, ConfigRoot, DebugInfo, Mode};
pub use crate::console::{Console, ConsoleSettings, Debug};
pub use crate::di::{Container, Key, Plain, Teardown};
pub use crate::error::AcbError;
pub use crate::registry::{AdapterDescriptor, AdapterStatus, Registry};
pub use crate::secret::{MemorySecretAdapter, SecretAdapter};
pub use crate::settings::{hydrate, HydrationContext, SecretStr, Settings};

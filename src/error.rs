use std::fmt;

/// Error taxonomy for the core. Wraps backend errors but never redefines
/// their meaning; the core's own failures (config, registry, DI) are
/// distinct variants so callers can match on them precisely.
#[derive(Debug)]
pub enum AcbError {
    /// Malformed YAML, failed type coercion, or a required field missing.
    ConfigInvalid(String),
    /// `resolve(category)` was called with nothing enabled.
    NoAdapterEnabled { category: String },
    /// `enable(category, provider)` named a provider nobody registered.
    NoSuchAdapter { category: String, provider: String },
    /// `enable(category, None)` with more than one provider and no
    /// single obvious choice.
    CategoryAmbiguity { category: String, providers: Vec<String> },
    /// The secret backend could not be reached or authenticated.
    SecretUnavailable(String),
    /// A DI factory transitively requested its own key on the same task.
    CycleDetected { key: String },
    /// Operation invoked on a torn-down adapter.
    AlreadyCleanedUp,
    /// Any error surfaced by an adapter's backend.
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for AcbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcbError::ConfigInvalid(msg) => write!(f, "invalid configuration: {msg}"),
            AcbError::NoAdapterEnabled { category } => {
                write!(f, "no adapter enabled for category '{category}'")
            }
            AcbError::NoSuchAdapter { category, provider } => {
                write!(f, "no adapter '{provider}' registered for category '{category}'")
            }
            AcbError::CategoryAmbiguity { category, providers } => {
                write!(
                    f,
                    "category '{category}' has {} providers ({}) and none is preferred",
                    providers.len(),
                    providers.join(", ")
                )
            }
            AcbError::SecretUnavailable(msg) => write!(f, "secret backend unavailable: {msg}"),
            AcbError::CycleDetected { key } => {
                write!(f, "dependency cycle detected while constructing '{key}'")
            }
            AcbError::AlreadyCleanedUp => write!(f, "operation invoked on a torn-down adapter"),
            AcbError::Backend(err) => write!(f, "backend error: {err}"),
        }
    }
}

impl std::error::Error for AcbError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AcbError::Backend(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl AcbError {
    pub fn backend<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        AcbError::Backend(Box::new(err))
    }
}

//! Mode detection (§4.6) and the process-wide `ConfigRoot` (§3).
//!
//! Grounded on `acb/config.py`'s `AppConfig` (basedir/deployed/tmp/secrets
//! paths, an `init(force=...)` reset hook for tests) and on the Design
//! Notes' "pure mode-detection function with documented inputs" strategy:
//! mode is computed once from env vars and `cfg!(test)`, cached behind a
//! `OnceLock`, and never re-inspected downstream.

use std::path::PathBuf;
use std::sync::OnceLock;

/// Execution mode, decided once per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Imported by another library; eager init suppressed, write-back off,
    /// safe defaults only.
    Library,
    /// Running under a test harness: like `Library`, plus `ConfigRoot`
    /// becomes resettable between test cases.
    Test,
    /// The embedding application's entry point: eager init proceeds.
    Application,
}

pub(crate) fn env_truthy(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Decide the process mode. Pure with respect to its documented inputs
/// (`ACB_MODE`, `TESTING`, `DEPLOYED`, `cfg!(test)`); detection failures
/// (an unrecognized `ACB_MODE` value) fall back to the safest mode,
/// `Library`.
fn detect_mode() -> Mode {
    if let Ok(explicit) = std::env::var("ACB_MODE") {
        match explicit.to_lowercase().as_str() {
            "application" => return Mode::Application,
            "test" => return Mode::Test,
            "library" => return Mode::Library,
            _ => return Mode::Library,
        }
    }

    if cfg!(test) || env_truthy("TESTING") {
        return Mode::Test;
    }

    if env_truthy("DEPLOYED") {
        return Mode::Application;
    }

    Mode::Library
}

static MODE: OnceLock<Mode> = OnceLock::new();

/// The process's execution mode, computed once and cached.
pub fn mode() -> Mode {
    *MODE.get_or_init(detect_mode)
}

/// App identity sub-bundle, as loaded from `settings/app.yaml`.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct AppInfo {
    pub name: String,
    pub title: String,
    pub version: String,
    #[serde(default)]
    pub domain: Option<String>,
}

/// Debug sub-bundle, as loaded from `settings/debug.yaml`.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct DebugInfo {
    #[serde(default)]
    pub production: bool,
    #[serde(default)]
    pub secrets: bool,
    #[serde(default)]
    pub logger: bool,
}

/// The process-wide root: app identity, debug flags, and the filesystem
/// layout every other component resolves paths against.
#[derive(Debug, Clone)]
pub struct ConfigRoot {
    pub app: AppInfo,
    pub debug: DebugInfo,
    pub root: PathBuf,
    pub secrets: PathBuf,
    pub settings: PathBuf,
    pub tmp: PathBuf,
    pub deployed: bool,
}

impl ConfigRoot {
    /// Build a `ConfigRoot` rooted at `root`, with `deployed` taken from
    /// the `DEPLOYED` env var unless explicitly overridden.
    pub fn new(root: PathBuf, app: AppInfo, debug: DebugInfo) -> Self {
        let deployed = env_truthy("DEPLOYED");
        Self {
            settings: root.join("settings"),
            secrets: root.join("secrets"),
            tmp: root.join("tmp"),
            root,
            app,
            debug,
            deployed,
        }
    }

    /// Load `app.yaml` and `debug.yaml` from `root/settings`, falling back
    /// to defaults for either file that's absent.
    pub fn load(root: PathBuf) -> Result<Self, crate::error::AcbError> {
        let settings_dir = root.join("settings");

        let app_mapping = crate::settings::loader::read_mapping(&settings_dir.join("app.yaml"))?;
        let app: AppInfo = if app_mapping.is_empty() {
            AppInfo::default()
        } else {
            serde_yaml::from_value(serde_yaml::Value::Mapping(app_mapping))
                .map_err(|e| crate::error::AcbError::ConfigInvalid(format!("app.yaml: {e}")))?
        };

        let debug_mapping = crate::settings::loader::read_mapping(&settings_dir.join("debug.yaml"))?;
        let debug: DebugInfo = if debug_mapping.is_empty() {
            DebugInfo::default()
        } else {
            serde_yaml::from_value(serde_yaml::Value::Mapping(debug_mapping))
                .map_err(|e| crate::error::AcbError::ConfigInvalid(format!("debug.yaml: {e}")))?
        };

        Ok(Self::new(root, app, debug))
    }

    /// Rebuild this `ConfigRoot` in place. Only meaningful in `Mode::Test`
    /// (see §4.6); callers are responsible for quiescing outstanding work
    /// first, since this does not itself synchronize with other tasks.
    pub fn init_force(&mut self, app: AppInfo, debug: DebugInfo) {
        *self = Self::new(self.root.clone(), app, debug);
    }

    /// Load `settings/adapters.yaml` as a `{category: provider}` map.
    pub fn load_adapters_enablement(
        &self,
    ) -> Result<std::collections::HashMap<String, String>, crate::error::AcbError> {
        let mapping = crate::settings::loader::read_mapping(&self.settings.join("adapters.yaml"))?;
        let mut out = std::collections::HashMap::new();
        for (key, value) in &mapping {
            let category = key
                .as_str()
                .ok_or_else(|| crate::error::AcbError::ConfigInvalid("adapters.yaml key must be a string".into()))?;
            let provider = value.as_str().ok_or_else(|| {
                crate::error::AcbError::ConfigInvalid(format!(
                    "adapters.yaml value for '{category}' must be a string"
                ))
            })?;
            out.insert(category.to_string(), provider.to_string());
        }
        Ok(out)
    }
}

//! The settings loader (§4.2): merges class defaults, the category's YAML
//! file, secret-store substitutions, and init overrides into one typed,
//! immutable-after-construction bundle.
//!
//! Grounded on `acb/config.py`'s `AppSettings.__call__` (read the category's
//! yaml, diff its canonical form against what's on disk, write back when
//! they differ and the process isn't deployed) generalized to Rust's
//! static typing: unknown keys survive because we merge into a
//! `serde_yaml::Mapping` first and only deserialize into the concrete type
//! at the very end.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_yaml::Mapping;

use crate::error::AcbError;
use crate::secret::SecretAdapter;
use crate::settings::loader;

/// Implemented by every settings struct the loader can hydrate.
///
/// There is no derive macro for this trait in the core: concrete adapters
/// implement it by hand, the same way `acb`'s Python settings classes each
/// declare their own category and field set.
pub trait Settings: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static {
    /// The adapter category this bundle belongs to, e.g. `"cache"`. Used
    /// to locate `settings/<category>.yaml` and to form secret lookup keys.
    fn category() -> &'static str;

    /// Field names (as they appear in the YAML document) whose value is a
    /// [`crate::settings::SecretStr`][SecretStr] sentinel. The loader
    /// queries the secret adapter for `<app-name>_<category>_<field>` for
    /// each of these.
    ///
    /// [SecretStr]: crate::settings::secret_str::SecretStr
    fn secret_fields() -> &'static [&'static str] {
        &[]
    }

    /// Field names that must be present (non-null) after all four layers
    /// have been merged. A missing required field is `ConfigInvalid`; a
    /// missing non-required field just keeps its default.
    fn required_fields() -> &'static [&'static str] {
        &[]
    }

    /// When `true`, init-override keys the struct doesn't recognize are
    /// rejected instead of silently ignored.
    fn strict_unknown_fields() -> bool {
        false
    }
}

/// Inputs the loader needs beyond the settings type itself.
pub struct HydrationContext<'a> {
    pub app_name: &'a str,
    pub settings_dir: &'a std::path::Path,
    pub deployed: bool,
    /// Write-back is suppressed outside of development (deployed or test).
    pub write_back_enabled: bool,
    pub overrides: Mapping,
}

fn secret_key(app_name: &str, category: &str, field: &str) -> String {
    format!("{app_name}_{category}_{field}")
}

/// Build a fully-hydrated `T` by layering defaults ≺ yaml ≺ secrets ≺
/// overrides, in that order, and performing write-back when appropriate.
pub async fn hydrate<T: Settings>(
    secret_adapter: &dyn SecretAdapterDyn,
    ctx: HydrationContext<'_>,
) -> Result<T, AcbError> {
    let category = T::category();

    // Layer 1: class defaults.
    let defaults = T::default();
    let defaults_value = serde_yaml::to_value(&defaults)
        .map_err(|e| AcbError::ConfigInvalid(format!("serializing defaults for '{category}': {e}")))?;
    let mut merged = match defaults_value {
        serde_yaml::Value::Mapping(m) => m,
        _ => Mapping::new(),
    };

    // Layer 2: settings/<category>.yaml, if present.
    let yaml_path = ctx.settings_dir.join(format!("{category}.yaml"));
    let file_mapping = loader::read_mapping(&yaml_path)?;
    loader::merge_mapping(&mut merged, &file_mapping);

    // Write-back: compare the defaults+yaml view (never the secret layer)
    // against what's on disk, and rewrite only if they differ and we're
    // allowed to (development mode only).
    if ctx.write_back_enabled && !ctx.deployed {
        loader::write_back_if_changed(&yaml_path, &merged)?;
    }

    // Layer 3: secret store substitutions.
    for field in T::secret_fields() {
        let key = secret_key(ctx.app_name, category, field);
        match secret_adapter.get_dyn(&key, None).await? {
            Some(plaintext) => {
                merged.insert(
                    serde_yaml::Value::String((*field).to_string()),
                    serde_yaml::Value::String(plaintext),
                );
            }
            None => {
                // Missing secrets are permitted unless the field is required.
            }
        }
    }

    // Layer 4: init overrides, always win.
    if T::strict_unknown_fields() {
        let defaults_mapping = match serde_yaml::to_value(&T::default()) {
            Ok(serde_yaml::Value::Mapping(m)) => m,
            _ => Mapping::new(),
        };
        for (key, _) in &ctx.overrides {
            if !defaults_mapping.contains_key(key) {
                return Err(AcbError::ConfigInvalid(format!(
                    "unknown override key '{key:?}' for settings category '{category}' (strict mode)"
                )));
            }
        }
    }
    loader::merge_mapping(&mut merged, &ctx.overrides);

    // Required-field check, after all layers have had their say.
    for field in T::required_fields() {
        let present = merged
            .get(serde_yaml::Value::String((*field).to_string()))
            .map_or(false, |v| !v.is_null());
        if !present {
            return Err(AcbError::ConfigInvalid(format!(
                "required field '{field}' missing for settings category '{category}'"
            )));
        }
    }

    serde_yaml::from_value(serde_yaml::Value::Mapping(merged))
        .map_err(|e| AcbError::ConfigInvalid(format!("coercing settings for '{category}': {e}")))
}

/// Object-safe facade over [`SecretAdapter`] so the generic `hydrate`
/// function above doesn't need to be generic over the adapter type too.
pub trait SecretAdapterDyn: Send + Sync {
    fn get_dyn<'a>(
        &'a self,
        name: &'a str,
        version: Option<&'a str>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Option<String>, AcbError>> + Send + 'a>>;
}

impl<A: SecretAdapter + Send + Sync> SecretAdapterDyn for A {
    fn get_dyn<'a>(
        &'a self,
        name: &'a str,
        version: Option<&'a str>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Option<String>, AcbError>> + Send + 'a>>
    {
        Box::pin(self.get(name, version))
    }
}

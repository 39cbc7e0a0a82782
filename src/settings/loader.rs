//! Low-level YAML I/O: reading a category file into a mapping, merging
//! mappings layer-over-layer, and the write-back fixed point.
//!
//! Grounded on the teacher's `config::loader` module (`load_yaml_file`,
//! parse-then-walk-the-tree shape) but merging into a `serde_yaml::Mapping`
//! instead of flattening to dotted keys, since each settings category owns
//! one whole YAML document rather than sharing one dotted namespace.

use std::path::Path;

use serde_yaml::{Mapping, Value};

use crate::error::AcbError;

/// Read and parse a YAML file into a mapping. Returns an empty mapping if
/// the file does not exist (the "missing YAML file" boundary case).
pub fn read_mapping(path: &Path) -> Result<Mapping, AcbError> {
    if !path.exists() {
        return Ok(Mapping::new());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| AcbError::ConfigInvalid(format!("reading {}: {e}", path.display())))?;
    parse_mapping(&content)
}

pub fn parse_mapping(content: &str) -> Result<Mapping, AcbError> {
    if content.trim().is_empty() {
        return Ok(Mapping::new());
    }
    let value: Value = serde_yaml::from_str(content)
        .map_err(|e| AcbError::ConfigInvalid(format!("parsing yaml: {e}")))?;
    match value {
        Value::Mapping(m) => Ok(m),
        Value::Null => Ok(Mapping::new()),
        other => Err(AcbError::ConfigInvalid(format!(
            "expected a YAML mapping at the document root, found {other:?}"
        ))),
    }
}

/// Merge `overlay` onto `base`, recursing into nested mappings so that
/// partially-overridden nested structs keep the base's untouched keys.
/// Non-mapping values (including lists) are replaced wholesale.
pub fn merge_mapping(base: &mut Mapping, overlay: &Mapping) {
    for (key, overlay_value) in overlay {
        match (base.get_mut(key), overlay_value) {
            (Some(Value::Mapping(base_map)), Value::Mapping(overlay_map)) => {
                merge_mapping(base_map, overlay_map);
            }
            _ => {
                base.insert(key.clone(), overlay_value.clone());
            }
        }
    }
}

/// CRC32 checksum over the canonical serialization, used to decide whether
/// write-back would actually change the file (ignoring whitespace-only
/// differences, since we compare the canonical re-render, not raw bytes).
pub fn checksum(mapping: &Mapping) -> u32 {
    let canonical = canonical_yaml(mapping);
    crc32fast::hash(canonical.as_bytes())
}

pub fn canonical_yaml(mapping: &Mapping) -> String {
    serde_yaml::to_string(mapping).unwrap_or_default()
}

/// Write the canonical serialization of `mapping` to `path`, but only if
/// its checksum differs from what's already on disk (or the file is
/// missing). Returns whether a write happened.
pub fn write_back_if_changed(path: &Path, mapping: &Mapping) -> Result<bool, AcbError> {
    let canonical = canonical_yaml(mapping);
    let new_checksum = crc32fast::hash(canonical.as_bytes());

    if path.exists() {
        let on_disk = std::fs::read_to_string(path)
            .map_err(|e| AcbError::ConfigInvalid(format!("reading {}: {e}", path.display())))?;
        let on_disk_mapping = parse_mapping(&on_disk)?;
        if crc32fast::hash(canonical_yaml(&on_disk_mapping).as_bytes()) == new_checksum {
            return Ok(false);
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| AcbError::ConfigInvalid(format!("creating {}: {e}", parent.display())))?;
    }
    std::fs::write(path, canonical)
        .map_err(|e| AcbError::ConfigInvalid(format!("writing {}: {e}", path.display())))?;
    tracing::debug!(path = %path.display(), "wrote back settings file");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_overrides_scalars_and_recurses_into_maps() {
        let mut base = parse_mapping("host: yaml-host\nport: 6379\nnested:\n  a: 1\n  b: 2\n").unwrap();
        let overlay = parse_mapping("host: override-host\nnested:\n  a: 99\n").unwrap();
        merge_mapping(&mut base, &overlay);

        assert_eq!(
            base.get("host").unwrap().as_str().unwrap(),
            "override-host"
        );
        assert_eq!(base.get("port").unwrap().as_i64().unwrap(), 6379);
        let nested = base.get("nested").unwrap().as_mapping().unwrap();
        assert_eq!(nested.get("a").unwrap().as_i64().unwrap(), 99);
        assert_eq!(nested.get("b").unwrap().as_i64().unwrap(), 2);
    }

    #[test]
    fn missing_file_yields_empty_mapping() {
        let mapping = read_mapping(Path::new("/nonexistent/path/does-not-exist.yaml")).unwrap();
        assert!(mapping.is_empty());
    }

    #[test]
    fn write_back_is_a_fixed_point() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.yaml");
        let mapping = parse_mapping("host: localhost\nport: 6379\n").unwrap();

        assert!(write_back_if_changed(&path, &mapping).unwrap());
        assert!(!write_back_if_changed(&path, &mapping).unwrap());

        let reloaded = read_mapping(&path).unwrap();
        assert!(!write_back_if_changed(&path, &reloaded).unwrap());
    }
}

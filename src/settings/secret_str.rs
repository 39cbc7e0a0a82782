//! The secret-string sentinel: a field type that carries a reference (and,
//! once hydrated, a plaintext) without ever leaking it through `Debug`,
//! `Display`, or `serde::Serialize`.
//!
//! Grounded on `acb`'s secret-field convention (§4.2 of the spec) and built
//! on `secrecy::SecretString` for the zeroize-on-drop guarantee; this
//! newtype adds the value-based `PartialEq` and masked serialization the
//! spec requires that bare `secrecy` types don't provide on their own.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const MASK: &str = "**********";

/// A secret value. Never prints, logs, or serializes its plaintext.
#[derive(Clone)]
pub struct SecretStr(SecretString);

impl SecretStr {
    pub fn new(plaintext: impl Into<String>) -> Self {
        Self(SecretString::from(plaintext.into()))
    }

    /// The only way to get the plaintext back out.
    pub fn reveal(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for SecretStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretStr({MASK})")
    }
}

impl fmt::Display for SecretStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{MASK}")
    }
}

impl PartialEq for SecretStr {
    fn eq(&self, other: &Self) -> bool {
        self.reveal() == other.reveal()
    }
}

impl Eq for SecretStr {}

impl Serialize for SecretStr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(MASK)
    }
}

impl<'de> Deserialize<'de> for SecretStr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(SecretStr::new(s))
    }
}

impl From<String> for SecretStr {
    fn from(value: String) -> Self {
        SecretStr::new(value)
    }
}

impl From<&str> for SecretStr {
    fn from(value: &str) -> Self {
        SecretStr::new(value)
    }
}

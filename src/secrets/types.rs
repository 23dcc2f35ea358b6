//! Secure and domain types for secret material.
//!
//! [`SecretBytes`] and [`SessionToken`] keep credential material out of logs:
//! their `Debug` and `Display` output is redacted and their memory is zeroed
//! on drop. [`SecretRecord`] is the version-agnostic shape of a KV secret and
//! [`ScopedSecretName`] the validated name it lives under.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::errors::{Error, Result};

/// Raw credential bytes returned by a credential source.
///
/// # Security
///
/// - Debug output shows `SecretBytes([REDACTED; n bytes])`
/// - Memory is securely zeroed when dropped
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes(Vec<u8>);

impl SecretBytes {
    /// Wraps resolved credential bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Exposes the underlying bytes. Never log the result.
    pub fn expose_secret(&self) -> &[u8] {
        &self.0
    }

    /// Returns the length of the material without exposing it.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no bytes were resolved.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes([REDACTED; {} bytes])", self.0.len())
    }
}

impl PartialEq for SecretBytes {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SecretBytes {}

/// A backend session token obtained from an auth method.
///
/// Lives only for the duration of one call.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionToken(String);

impl SessionToken {
    /// Creates a session token from a raw token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Builds a token from resolved credential bytes.
    ///
    /// Surrounding whitespace (a trailing newline in a token file, typically)
    /// is stripped. Fails with `AuthFailed` if the bytes are not UTF-8 or
    /// nothing remains after trimming.
    pub fn from_credential(bytes: &SecretBytes) -> Result<Self> {
        let text = std::str::from_utf8(bytes.expose_secret())
            .map_err(|_| Error::auth_failed("token is not valid UTF-8"))?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(Error::auth_failed("token is empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Exposes the token. Never log the result.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken([REDACTED])")
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// Name of a logical secret within a KV mount.
///
/// Opaque to the adapter apart from `/`-separated segments, which map onto the
/// engine's path semantics. Empty names and empty, `.` or `..` segments are
/// rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopedSecretName(String);

impl ScopedSecretName {
    /// Validates and wraps a scoped name.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::invalid_argument("secret name cannot be empty"));
        }
        if name.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(Error::invalid_argument(format!(
                "secret name '{}' contains an empty or relative path segment",
                name
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments of the name, in order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl fmt::Display for ScopedSecretName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ScopedSecretName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Version-agnostic contents of a KV secret.
///
/// `data` maps field names to opaque byte values. `labels` is engine custom
/// metadata; an empty map means the secret carries no labels.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretRecord {
    pub data: BTreeMap<String, Vec<u8>>,
    pub labels: BTreeMap<String, String>,
}

impl SecretRecord {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a record from a field map, without labels.
    pub fn from_data(data: BTreeMap<String, Vec<u8>>) -> Self {
        Self { data, labels: BTreeMap::new() }
    }

    /// Adds a field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Adds a label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Labels, or `None` when the record carries none.
    pub fn labels(&self) -> Option<&BTreeMap<String, String>> {
        if self.labels.is_empty() {
            None
        } else {
            Some(&self.labels)
        }
    }

    /// Field values as UTF-8 strings, the representation the KV engines store.
    ///
    /// Fails with `InvalidArgument` naming the first field whose value is not
    /// valid UTF-8.
    pub fn string_data(&self) -> Result<BTreeMap<&str, &str>> {
        self.data
            .iter()
            .map(|(key, value)| {
                std::str::from_utf8(value).map(|value| (key.as_str(), value)).map_err(|_| {
                    Error::invalid_argument(format!(
                        "value of field '{}' is not valid UTF-8 and cannot be stored",
                        key
                    ))
                })
            })
            .collect()
    }
}

impl fmt::Debug for SecretRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretRecord")
            .field("data", &self.data.keys().collect::<Vec<_>>())
            .field("labels", &self.labels)
            .finish()
    }
}

//! Cache key derivation.
//!
//! A [`CacheKey`] is the canonical `path?query` string of a read. Query parameters are
//! sorted by name before encoding, so callers can build them in any order.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;
use url::form_urlencoded;

/// Query parameters of a read, sorted by name.
pub type QueryParams = BTreeMap<String, ParamValue>;

/// Primitive query parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(value) => f.write_str(value),
            Self::Int(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidKeyError {
    #[error("cache key path must not be empty")]
    EmptyPath,
    #[error("cache key path `{0}` must not carry a query string; pass parameters separately")]
    QueryInPath(String),
    #[error("query parameter names must not be empty")]
    EmptyParamName,
}

/// Canonical identity of a cached resource view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    canonical: String,
    path_len: usize,
}

impl CacheKey {
    /// Key for a path without query parameters.
    pub fn from_path(path: &str) -> Result<Self, InvalidKeyError> {
        compute_key(path, std::iter::empty::<(String, ParamValue)>())
    }

    /// Full `path?query` target, suitable as a request target.
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    pub fn path(&self) -> &str {
        &self.canonical[..self.path_len]
    }

    pub fn query(&self) -> Option<&str> {
        self.canonical
            .get(self.path_len + 1..)
            .filter(|query| !query.is_empty())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

/// Derive the cache key for `path` and `params`.
///
/// When the same parameter name appears twice the last value wins.
pub fn compute_key<I, K, V>(path: &str, params: I) -> Result<CacheKey, InvalidKeyError>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<ParamValue>,
{
    let path = path.trim();
    if path.is_empty() {
        return Err(InvalidKeyError::EmptyPath);
    }
    if path.contains('?') {
        return Err(InvalidKeyError::QueryInPath(path.to_string()));
    }

    let mut sorted = BTreeMap::new();
    for (name, value) in params {
        let name = name.into();
        if name.is_empty() {
            return Err(InvalidKeyError::EmptyParamName);
        }
        sorted.insert(name, value.into());
    }

    let mut canonical = path.to_string();
    if !sorted.is_empty() {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (name, value) in &sorted {
            serializer.append_pair(name, &value.to_string());
        }
        canonical.push('?');
        canonical.push_str(&serializer.finish());
    }

    Ok(CacheKey {
        canonical,
        path_len: path.len(),
    })
}

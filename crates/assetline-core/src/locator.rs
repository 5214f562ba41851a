//! Resource locator grammar.
//!
//! A locator is the only serialized surface of the pipeline:
//!
//! - `l:[bundle@]name` addresses an item of a local bundle. A missing or empty
//!   bundle segment selects the configured default bundle.
//! - `r:url` addresses a remote resource.
//!
//! Parsing normalizes a locator into a [`CacheKey`] (`l:<bundle>@<name>` or
//! `r:<url>`). Keys and locators are different grammars: never feed a key back
//! into [`parse`].

use serde::{Deserialize, Serialize};
use std::fmt;

const LOCAL_PREFIX: &str = "l:";
const REMOTE_PREFIX: &str = "r:";

/// Namespace a resource is fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Bundle-addressed.
    Local,
    /// URL-addressed.
    Remote,
    /// Unrecognized prefix. Terminal.
    Unknown,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Local => write!(f, "local"),
            Origin::Remote => write!(f, "remote"),
            Origin::Unknown => write!(f, "unknown"),
        }
    }
}

/// Canonical cache key derived from a locator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    fn local(bundle: &str, name: &str) -> Self {
        Self(format!("{LOCAL_PREFIX}{bundle}@{name}"))
    }

    fn remote(url: &str) -> Self {
        Self(format!("{REMOTE_PREFIX}{url}"))
    }

    /// Prefix shared by every key of `bundle`.
    pub fn bundle_prefix(bundle: &str) -> String {
        format!("{LOCAL_PREFIX}{bundle}@")
    }

    /// Origin implied by the key shape.
    pub fn origin(&self) -> Origin {
        if self.0.starts_with(LOCAL_PREFIX) {
            Origin::Local
        } else if self.0.starts_with(REMOTE_PREFIX) {
            Origin::Remote
        } else {
            Origin::Unknown
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Result of [`parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLocator {
    pub origin: Origin,
    pub key: CacheKey,
    /// `bundle@name` for local locators, the bare URL for remote ones, the
    /// untouched input otherwise.
    pub raw: String,
    /// Resolved bundle (local only).
    pub bundle: Option<String>,
    /// Item name for local locators, URL for remote ones.
    pub name: String,
}

impl ParsedLocator {
    fn unknown(id: &str) -> Self {
        Self {
            origin: Origin::Unknown,
            key: CacheKey(id.to_string()),
            raw: id.to_string(),
            bundle: None,
            name: String::new(),
        }
    }

    pub fn is_resolvable(&self) -> bool {
        self.origin != Origin::Unknown
    }
}

/// Parse a locator string.
///
/// Pure and infallible: anything outside the grammar yields
/// [`Origin::Unknown`].
pub fn parse(id: &str, default_bundle: &str) -> ParsedLocator {
    if let Some(rest) = id.strip_prefix(LOCAL_PREFIX) {
        let (bundle, name) = match rest.split_once('@') {
            Some((bundle, name)) if !bundle.is_empty() => (bundle, name),
            Some((_, name)) => (default_bundle, name),
            None => (default_bundle, rest),
        };
        if name.is_empty() {
            return ParsedLocator::unknown(id);
        }
        return ParsedLocator {
            origin: Origin::Local,
            key: CacheKey::local(bundle, name),
            raw: format!("{bundle}@{name}"),
            bundle: Some(bundle.to_string()),
            name: name.to_string(),
        };
    }

    if let Some(url) = id.strip_prefix(REMOTE_PREFIX) {
        if url.is_empty() {
            return ParsedLocator::unknown(id);
        }
        return ParsedLocator {
            origin: Origin::Remote,
            key: CacheKey::remote(url),
            raw: url.to_string(),
            bundle: None,
            name: url.to_string(),
        };
    }

    ParsedLocator::unknown(id)
}

/// Builders for locator strings.
pub struct Locator;

impl Locator {
    /// `l:<bundle>@<name>`
    pub fn local(bundle: &str, name: &str) -> String {
        format!("{LOCAL_PREFIX}{bundle}@{name}")
    }

    pub fn local_default(name: &str) -> String {
        format!("{LOCAL_PREFIX}{name}")
    }

    /// `r:<url>`
    pub fn remote(url: &str) -> String {
        format!("{REMOTE_PREFIX}{url}")
    }
}

//! Command-line load item syntax: `[kind=]locator`.

use anyhow::{bail, Result};
use assetline_core::{LoadItem, ResourceKind};

/// Parse one positional argument.
///
/// The kind prefix is optional; a prefix that is not a known kind is treated
/// as part of the locator (remote URLs may contain `=`).
pub fn parse_item(arg: &str, default_kind: ResourceKind) -> Result<LoadItem> {
    let (kind, locator) = match arg.split_once('=') {
        Some((prefix, rest)) => match prefix.parse::<ResourceKind>() {
            Ok(kind) => (kind, rest),
            Err(_) => (default_kind, arg),
        },
        None => (default_kind, arg),
    };

    if locator.is_empty() {
        bail!("empty locator in '{}'", arg);
    }
    Ok(LoadItem::new(kind, locator))
}

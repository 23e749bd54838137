//! ---
//! autumn_section: "01-configuration"
//! autumn_subsection: "module"
//! autumn_type: "source"
//! autumn_scope: "code"
//! autumn_description: "Runtime override properties settable at process launch."
//! autumn_version: "v0.0.0-prealpha"
//! autumn_owner: "tbd"
//! ---
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::debug;

static GLOBAL: Lazy<OverrideProperties> = Lazy::new(OverrideProperties::new);

/// Raised when a `key=value` override assignment cannot be parsed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid override assignment '{0}': expected key=value")]
pub struct OverrideSyntaxError(pub String);

/// Shared table of override properties.
///
/// Values here take precedence over bundle contents but not over the process
/// environment. Clones share the same underlying table.
#[derive(Debug, Clone, Default)]
pub struct OverrideProperties {
    values: Arc<RwLock<IndexMap<String, String>>>,
}

impl OverrideProperties {
    /// Create an isolated, empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the process-wide table populated at launch.
    pub fn global() -> Self {
        GLOBAL.clone()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        debug!(key = %key, "override property set");
        self.values.write().insert(key, value.into())
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.values.write().shift_remove(key)
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    /// Apply a `key=value` assignment such as the daemon's `-D` arguments.
    pub fn apply_assignment(&self, assignment: &str) -> Result<(), OverrideSyntaxError> {
        let (key, value) = parse_assignment(assignment)?;
        self.set(key, value);
        Ok(())
    }
}

/// Split `key=value` into its parts. The key must be non-empty; the value may be empty.
pub fn parse_assignment(assignment: &str) -> Result<(String, String), OverrideSyntaxError> {
    let Some((key, value)) = assignment.split_once('=') else {
        return Err(OverrideSyntaxError(assignment.to_owned()));
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(OverrideSyntaxError(assignment.to_owned()));
    }
    Ok((key.to_owned(), value.to_owned()))
}

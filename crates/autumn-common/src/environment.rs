//! ---
//! autumn_section: "01-configuration"
//! autumn_subsection: "module"
//! autumn_type: "source"
//! autumn_scope: "code"
//! autumn_description: "Environment variable layer of configuration resolution."
//! autumn_version: "v0.0.0-prealpha"
//! autumn_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::fmt;

/// Source of environment variables consulted before any other layer.
pub trait Environment: Send + Sync + fmt::Debug {
    /// Return the variable named exactly `key`, if set.
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads the real process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// In-memory environment, used when embedding the resolver or under test.
#[derive(Debug, Default, Clone)]
pub struct MapEnvironment {
    vars: HashMap<String, String>,
}

impl MapEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }
}

impl Environment for MapEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

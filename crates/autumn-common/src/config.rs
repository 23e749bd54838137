//! ---
//! autumn_section: "01-configuration"
//! autumn_subsection: "module"
//! autumn_type: "source"
//! autumn_scope: "code"
//! autumn_description: "Layered configuration resolution and bundle materialization."
//! autumn_version: "v0.0.0-prealpha"
//! autumn_owner: "tbd"
//! ---
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::archive::{ArchiveSource, ZipArchiveSource};
use crate::environment::{Environment, ProcessEnvironment};
use crate::logging::LogFormat;
use crate::overrides::OverrideProperties;
use crate::properties::Properties;
use crate::resources::{entry_name, ResourceLoader};

/// Properties key selecting the log output format.
pub const LOG_FORMAT_KEY: &str = "autumn.log.format";
/// Properties key enabling rolling file output in the given directory.
pub const LOG_DIRECTORY_KEY: &str = "autumn.log.directory";
/// Properties key overriding the log file prefix.
pub const LOG_PREFIX_KEY: &str = "autumn.log.prefix";

/// Raised when a present configuration value cannot be interpreted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for '{key}': {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// Resolves configuration values across the environment, override, bundle
/// and default layers, and materializes named bundles.
///
/// Resolution never fails on I/O: unreadable or missing sources are logged
/// and degrade to an empty mapping.
#[derive(Debug, Clone)]
pub struct ConfigurationResolver {
    resources: ResourceLoader,
    archive: Option<Arc<dyn ArchiveSource>>,
    environment: Arc<dyn Environment>,
    overrides: OverrideProperties,
}

impl ConfigurationResolver {
    /// Resolver over `resources` using the process environment and the global
    /// override table, without an archive fallback.
    pub fn new(resources: ResourceLoader) -> Self {
        Self {
            resources,
            archive: None,
            environment: Arc::new(ProcessEnvironment),
            overrides: OverrideProperties::global(),
        }
    }

    /// Resolver wired the way the daemon runs: resource path from the
    /// environment and the packaged archive located from the executable.
    pub fn system() -> Self {
        let mut resolver = Self::new(ResourceLoader::from_env());
        if let Some(archive) = ZipArchiveSource::locate() {
            debug!(archive = %archive.path().display(), "packaged archive located");
            resolver.archive = Some(Arc::new(archive));
        }
        resolver
    }

    pub fn with_archive(mut self, archive: impl ArchiveSource + 'static) -> Self {
        self.archive = Some(Arc::new(archive));
        self
    }

    pub fn without_archive(mut self) -> Self {
        self.archive = None;
        self
    }

    pub fn with_environment(mut self, environment: impl Environment + 'static) -> Self {
        self.environment = Arc::new(environment);
        self
    }

    pub fn with_overrides(mut self, overrides: OverrideProperties) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn resources(&self) -> &ResourceLoader {
        &self.resources
    }

    pub fn overrides(&self) -> &OverrideProperties {
        &self.overrides
    }

    /// Materialize the bundle addressed by `name`.
    ///
    /// The bundled resource is loaded first; entries from the packaged
    /// archive are then copied in only for keys the resource did not define.
    pub fn resolve_bundle(&self, name: &str) -> Properties {
        if name.trim().is_empty() {
            return Properties::new();
        }
        debug!(bundle = name, "materializing configuration bundle");

        let mut properties = match self.resources.read(name) {
            Ok(Some(text)) => parse_or_empty(name, "resource path", &text),
            Ok(None) => {
                debug!(bundle = name, "bundle not found on resource path");
                Properties::new()
            }
            Err(err) => {
                warn!(bundle = name, error = %err, "unable to read bundle; continuing with empty mapping");
                Properties::new()
            }
        };

        if let Some(archive) = &self.archive {
            let entry = entry_name(name);
            match archive.read_entry(entry) {
                Ok(Some(text)) => {
                    let packaged = parse_or_empty(name, &archive.describe(), &text);
                    let added = properties.merge_absent(&packaged);
                    debug!(bundle = name, archive = %archive.describe(), added, "merged packaged defaults");
                }
                Ok(None) => {
                    debug!(bundle = name, archive = %archive.describe(), "bundle not present in archive");
                }
                Err(err) => {
                    warn!(bundle = name, error = %err, "unable to read packaged archive");
                }
            }
        }

        debug!(bundle = name, keys = properties.len(), "bundle materialized");
        properties
    }

    /// Resolve `key`: environment, then override, then `mapping`, then `default`.
    ///
    /// `mapping` is only the override's fallback: an override that is set but
    /// empty resolves to `default` without consulting `mapping`. Empty
    /// environment and mapping values count as absent.
    pub fn resolve_value(
        &self,
        key: &str,
        mapping: &Properties,
        default: Option<&str>,
    ) -> Option<String> {
        if let Some(value) = non_empty(self.environment.var(key)) {
            return Some(value);
        }
        let layered = match self.overrides.get(key) {
            Some(value) => Some(value),
            None => mapping.get(key).map(str::to_owned),
        };
        non_empty(layered).or_else(|| default.map(str::to_owned))
    }

    pub fn resolve_or(&self, key: &str, mapping: &Properties, default: &str) -> String {
        self.resolve_value(key, mapping, Some(default))
            .unwrap_or_else(|| default.to_owned())
    }

    /// Resolve and parse `key`; `Ok(None)` when no layer defines it.
    pub fn resolve_parsed<T>(&self, key: &str, mapping: &Properties) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let Some(raw) = self.resolve_value(key, mapping, None) else {
            return Ok(None);
        };
        raw.trim()
            .parse::<T>()
            .map(Some)
            .map_err(|err| ConfigError::Invalid {
                key: key.to_owned(),
                value: raw.clone(),
                reason: err.to_string(),
            })
    }

    /// Resolve a boolean flag, accepting `true/false`, `yes/no`, `on/off` and `1/0`.
    pub fn resolve_flag(
        &self,
        key: &str,
        mapping: &Properties,
        default: bool,
    ) -> Result<bool, ConfigError> {
        match self.resolve_value(key, mapping, None) {
            Some(raw) => parse_flag(&raw).ok_or_else(|| ConfigError::Invalid {
                key: key.to_owned(),
                value: raw.clone(),
                reason: "expected a boolean".to_owned(),
            }),
            None => Ok(default),
        }
    }
}

/// Parse the flag spellings accepted by [`ConfigurationResolver::resolve_flag`].
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

fn parse_or_empty(bundle: &str, origin: &str, text: &str) -> Properties {
    match Properties::parse(text) {
        Ok(properties) => properties,
        Err(err) => {
            warn!(bundle, origin, error = %err, "unable to parse bundle; continuing with empty mapping");
            Properties::new()
        }
    }
}

/// Logging settings resolved from configuration keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Directory for the daily rolling log file; stdout only when absent.
    pub directory: Option<PathBuf>,
    pub format: LogFormat,
    pub file_prefix: Option<String>,
}

impl LoggingConfig {
    /// Resolve `autumn.log.*` keys through the usual precedence.
    pub fn resolve(
        resolver: &ConfigurationResolver,
        mapping: &Properties,
    ) -> Result<Self, ConfigError> {
        let format = resolver
            .resolve_parsed::<LogFormat>(LOG_FORMAT_KEY, mapping)?
            .unwrap_or_default();
        Ok(Self {
            directory: resolver
                .resolve_value(LOG_DIRECTORY_KEY, mapping, None)
                .map(PathBuf::from),
            format,
            file_prefix: resolver.resolve_value(LOG_PREFIX_KEY, mapping, None),
        })
    }
}

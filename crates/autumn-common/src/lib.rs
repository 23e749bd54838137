//! ---
//! autumn_section: "01-configuration"
//! autumn_subsection: "module"
//! autumn_type: "source"
//! autumn_scope: "code"
//! autumn_description: "Shared configuration and logging primitives."
//! autumn_version: "v0.0.0-prealpha"
//! autumn_owner: "tbd"
//! ---
//! Shared primitives for the Autumn workspace.
//! This crate exposes the properties bundle format, layered configuration
//! resolution (environment, overrides, bundles, packaged archive) and the
//! tracing bootstrap consumed by the daemon.

pub mod archive;
pub mod config;
pub mod environment;
pub mod logging;
pub mod overrides;
pub mod properties;
pub mod resources;

pub use archive::{ArchiveError, ArchiveSource, EmbeddedArchive, ZipArchiveSource};
pub use config::{parse_flag, ConfigError, ConfigurationResolver, LoggingConfig};
pub use environment::{Environment, MapEnvironment, ProcessEnvironment};
pub use logging::{init_tracing, LogFormat};
pub use overrides::{parse_assignment, OverrideProperties, OverrideSyntaxError};
pub use properties::{decode_bundle, Properties, PropertiesError};
pub use resources::{entry_name, ResourceLoader};

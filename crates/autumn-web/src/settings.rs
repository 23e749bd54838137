//! ---
//! autumn_section: "04-web"
//! autumn_subsection: "module"
//! autumn_type: "source"
//! autumn_scope: "code"
//! autumn_description: "HTTP settings resolved from the web bundle."
//! autumn_version: "v0.0.0-prealpha"
//! autumn_owner: "tbd"
//! ---
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use autumn_common::{ConfigError, ConfigurationResolver, Properties};

/// Bundle holding web settings.
pub const PROPERTY_NAME: &str = "/web.properties";

pub const HTTP_ENABLED_KEY: &str = "application.http.enabled";
pub const HTTP_PORT_KEY: &str = "application.http.port";
pub const HTTP_CONTEXT_PATH_KEY: &str = "application.http.context.path";
pub const HTTP_BIND_KEY: &str = "application.http.bind";
/// Recognised but not served; TLS termination is left to a fronting proxy.
pub const HTTPS_ENABLED_KEY: &str = "application.https.enabled";

pub const DEFAULT_HTTP_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    pub enabled: bool,
    pub port: u16,
    /// Normalized to a leading `/` and no trailing `/`, except the root itself.
    pub context_path: String,
    pub bind: IpAddr,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            port: DEFAULT_HTTP_PORT,
            context_path: "/".to_owned(),
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        }
    }
}

impl HttpSettings {
    pub fn resolve(
        resolver: &ConfigurationResolver,
        properties: &Properties,
    ) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            enabled: resolver.resolve_flag(HTTP_ENABLED_KEY, properties, defaults.enabled)?,
            port: resolver
                .resolve_parsed(HTTP_PORT_KEY, properties)?
                .unwrap_or(defaults.port),
            context_path: normalize_context_path(
                resolver
                    .resolve_value(HTTP_CONTEXT_PATH_KEY, properties, None)
                    .as_deref()
                    .unwrap_or("/"),
            ),
            bind: resolver
                .resolve_parsed(HTTP_BIND_KEY, properties)?
                .unwrap_or(defaults.bind),
        })
    }

    /// Materialize [`PROPERTY_NAME`] and resolve it.
    pub fn load(resolver: &ConfigurationResolver) -> Result<Self, ConfigError> {
        Self::resolve(resolver, &resolver.resolve_bundle(PROPERTY_NAME))
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn is_root_context(&self) -> bool {
        self.context_path == "/"
    }
}

fn normalize_context_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_owned()
    } else {
        format!("/{trimmed}")
    }
}

//! ---
//! autumn_section: "04-web"
//! autumn_subsection: "module"
//! autumn_type: "source"
//! autumn_scope: "code"
//! autumn_description: "Wiring module and enablement lookup for web services."
//! autumn_version: "v0.0.0-prealpha"
//! autumn_owner: "tbd"
//! ---
use autumn_common::{ConfigError, ConfigurationResolver};
use autumn_service::{Binder, InjectError, Module, ServiceRef};
use tracing::debug;

use crate::server::HttpService;
use crate::settings::{HttpSettings, HTTPS_ENABLED_KEY, HTTP_ENABLED_KEY, PROPERTY_NAME};

/// Binds [`HttpSettings`] resolved from `/web.properties`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebModule;

impl Module for WebModule {
    fn configure(&self, binder: &mut Binder) -> Result<(), InjectError> {
        debug!(bundle = PROPERTY_NAME, "binding web properties");
        let settings =
            HttpSettings::load(binder.resolver()).map_err(InjectError::module::<Self, _>)?;
        debug!(port = settings.port, enabled = settings.enabled, "bound web properties");
        binder.bind(settings)
    }
}

/// Web services whose enable flag is set in `/web.properties`.
pub fn enabled_web_services(
    resolver: &ConfigurationResolver,
) -> Result<Vec<ServiceRef>, ConfigError> {
    let properties = resolver.resolve_bundle(PROPERTY_NAME);
    let mut services = Vec::new();
    if resolver.resolve_flag(HTTP_ENABLED_KEY, &properties, false)? {
        services.push(ServiceRef::of::<HttpService>());
    }
    if let Some(raw) = resolver.resolve_value(HTTPS_ENABLED_KEY, &properties, None) {
        debug!(key = HTTPS_ENABLED_KEY, value = %raw, "https service is not available; key ignored");
    }
    debug!(count = services.len(), "resolved enabled web services");
    Ok(services)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use autumn_common::{
        EmbeddedArchive, MapEnvironment, OverrideProperties, Properties, ResourceLoader,
    };
    use autumn_service::Configuration;

    fn resolver(env: MapEnvironment) -> ConfigurationResolver {
        static PACKAGED: &[(&str, &str)] = &[("web.properties", "application.http.enabled=false")];
        ConfigurationResolver::new(ResourceLoader::default())
            .with_environment(env)
            .with_overrides(OverrideProperties::new())
            .with_archive(EmbeddedArchive::new(PACKAGED))
    }

    #[test]
    fn disabled_by_bundle() {
        let services = enabled_web_services(&resolver(MapEnvironment::new())).expect("valid");
        assert!(services.is_empty());
    }

    #[test]
    fn environment_enables_http() {
        let env = MapEnvironment::new().with(HTTP_ENABLED_KEY, "true");
        let services = enabled_web_services(&resolver(env)).expect("valid");
        assert_eq!(services, vec![ServiceRef::of::<HttpService>()]);
    }

    #[test]
    fn https_flag_is_ignored() {
        let env = MapEnvironment::new().with(HTTPS_ENABLED_KEY, "true");
        let services = enabled_web_services(&resolver(env)).expect("valid");
        assert!(services.is_empty());

        let env = MapEnvironment::new()
            .with(HTTPS_ENABLED_KEY, "not-a-flag")
            .with(HTTP_ENABLED_KEY, "yes");
        let services = enabled_web_services(&resolver(env)).expect("https value is not parsed");
        assert_eq!(services, vec![ServiceRef::of::<HttpService>()]);
    }

    #[test]
    fn invalid_settings_are_attributed_to_the_module() {
        let env = MapEnvironment::new().with(crate::settings::HTTP_PORT_KEY, "eighty");
        let resolver = Arc::new(resolver(env));
        let mut binder = Binder::new(Configuration::new(resolver, Properties::new()));
        let err = binder.install::<WebModule>().expect_err("port is not numeric");
        assert!(matches!(err, InjectError::Module { module: "WebModule", .. }));
    }

    #[test]
    fn invalid_flag_is_an_error() {
        let env = MapEnvironment::new().with(HTTP_ENABLED_KEY, "perhaps");
        assert!(enabled_web_services(&resolver(env)).is_err());
    }
}

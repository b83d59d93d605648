//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use rum_core::{BuildEnv, Configuration, UserConfiguration, ValidationError};

/// Agent settings holding free-form strings.
///
/// Environment values are parsed loosely (`RUM_CLIENT_TOKEN=12345` would
/// become a number), so these are read verbatim instead.
const STRING_KEYS: [&str; 9] = [
    "client_token",
    "public_api_key",
    "application_id",
    "site",
    "internal_monitoring_api_key",
    "rum_endpoint",
    "logs_endpoint",
    "trace_endpoint",
    "internal_monitoring_endpoint",
];

/// Application configuration.
#[derive(Clone, Default)]
pub struct Config {
    /// Agent settings, as a host page would pass them to `init`.
    pub agent: UserConfiguration,

    /// Honor intake endpoint overrides (end-to-end test builds).
    pub e2e_test: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");
        f.debug_struct("Config")
            .field("client_token", &redacted(&self.agent.client_token))
            .field("public_api_key", &redacted(&self.agent.public_api_key))
            .field("application_id", &self.agent.application_id)
            .field("site", &self.agent.site)
            .field("sample_rate", &self.agent.sample_rate)
            .field("resource_sample_rate", &self.agent.resource_sample_rate)
            .field(
                "internal_monitoring_api_key",
                &redacted(&self.agent.internal_monitoring_api_key),
            )
            .field("e2e_test", &self.e2e_test)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Loads configuration from default locations, optionally merging a
    /// specific file on top.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(UserConfiguration::default()))
            .merge(Serialized::default("e2e_test", false));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // RUM_SAMPLE_RATE, RUM_E2E_TEST, ...
        figment = figment.merge(Env::prefixed("RUM_").ignore(&STRING_KEYS));
        // RUM_CLIENT_TOKEN, RUM_APPLICATION_ID, ...
        for (key, value) in Env::prefixed("RUM_").only(&STRING_KEYS).iter() {
            figment = figment.merge(Serialized::default(key.as_str(), value));
        }

        Ok(Self {
            agent: figment.extract()?,
            e2e_test: figment.extract_inner("e2e_test")?,
        })
    }

    pub const fn build_env(&self) -> BuildEnv {
        if self.e2e_test {
            BuildEnv::E2eTest
        } else {
            BuildEnv::Release
        }
    }

    /// Validates the agent settings.
    pub fn configuration(&self) -> Result<Configuration, ValidationError> {
        Configuration::build(&self.agent, self.build_env())
    }
}

/// Returns the platform-specific config directory for rum.
///
/// On Linux: `~/.config/rum`
pub fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("rum"))
}

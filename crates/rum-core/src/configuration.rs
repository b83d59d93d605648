//! Agent configuration: user input, validation and intake endpoints.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::{ClientToken, Percentage, ValidationError};

/// Site hosting the intake endpoints when none is configured.
pub const DEFAULT_SITE: &str = "rum-intake.net";

/// Configuration as supplied by the user, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_token: Option<String>,
    /// Older name for the client token; wins over `client_token` when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    /// Percentage of sessions tracked at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<f64>,
    /// Percentage of tracked sessions that also collect resources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_sample_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_collecting_error: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_monitoring_api_key: Option<String>,

    // Endpoint overrides, honored by end-to-end test builds only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rum_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_monitoring_endpoint: Option<String>,
}

impl UserConfiguration {
    /// The effective client token, preferring `public_api_key`.
    pub fn token(&self) -> Option<&str> {
        self.public_api_key
            .as_deref()
            .or(self.client_token.as_deref())
            .filter(|token| !token.trim().is_empty())
    }
}

/// Which build of the agent is running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BuildEnv {
    #[default]
    Release,
    /// End-to-end test build: intake endpoints may be redirected.
    E2eTest,
}

/// Intake endpoint families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntakeKind {
    Logs,
    Rum,
    Trace,
}

impl IntakeKind {
    const fn subdomain(self) -> &'static str {
        match self {
            Self::Logs => "browser",
            Self::Rum => "rum",
            Self::Trace => "public-trace",
        }
    }
}

/// Validated agent configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Configuration {
    pub client_token: ClientToken,
    pub site: String,
    pub sample_rate: Percentage,
    pub resource_sample_rate: Percentage,
    pub is_collecting_error: bool,
    pub logs_endpoint: Url,
    pub rum_endpoint: Url,
    pub trace_endpoint: Url,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_monitoring_endpoint: Option<Url>,
}

impl Configuration {
    /// Validates user input and builds the intake endpoints.
    pub fn build(user: &UserConfiguration, env: BuildEnv) -> Result<Self, ValidationError> {
        let client_token = ClientToken::new(user.token().unwrap_or_default())?;
        let site = user
            .site
            .clone()
            .filter(|site| !site.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SITE.to_string());

        let sample_rate = user
            .sample_rate
            .map(|rate| Percentage::new("sample rate", rate))
            .transpose()?
            .unwrap_or_default();
        let resource_sample_rate = user
            .resource_sample_rate
            .map(|rate| Percentage::new("resource sample rate", rate))
            .transpose()?
            .unwrap_or_default();

        let overrides = env == BuildEnv::E2eTest;
        let endpoint = |field: &'static str, kind: IntakeKind, custom: Option<&str>| {
            match custom.filter(|_| overrides) {
                Some(custom) => parse_endpoint(field, custom),
                None => parse_endpoint(
                    field,
                    &intake_url(kind.subdomain(), &site, client_token.as_str()),
                ),
            }
        };

        let logs_endpoint = endpoint("logs endpoint", IntakeKind::Logs, user.logs_endpoint.as_deref())?;
        let rum_endpoint = endpoint("rum endpoint", IntakeKind::Rum, user.rum_endpoint.as_deref())?;
        let trace_endpoint =
            endpoint("trace endpoint", IntakeKind::Trace, user.trace_endpoint.as_deref())?;

        let internal_monitoring_endpoint = match (
            user.internal_monitoring_endpoint.as_deref().filter(|_| overrides),
            user.internal_monitoring_api_key.as_deref(),
        ) {
            (Some(custom), _) => Some(parse_endpoint("internal monitoring endpoint", custom)?),
            (None, Some(api_key)) if !api_key.trim().is_empty() => Some(parse_endpoint(
                "internal monitoring endpoint",
                &intake_url(IntakeKind::Logs.subdomain(), &site, api_key),
            )?),
            (None, _) => None,
        };

        Ok(Self {
            client_token,
            site,
            sample_rate,
            resource_sample_rate,
            is_collecting_error: user.is_collecting_error.unwrap_or(true),
            logs_endpoint,
            rum_endpoint,
            trace_endpoint,
            internal_monitoring_endpoint,
        })
    }

    /// Every endpoint the agent uploads to.
    pub fn intake_endpoints(&self) -> impl Iterator<Item = &Url> {
        [&self.logs_endpoint, &self.rum_endpoint, &self.trace_endpoint]
            .into_iter()
            .chain(self.internal_monitoring_endpoint.as_ref())
    }

    /// Whether `url` targets one of the agent's own intake endpoints.
    ///
    /// Matching is by origin: intake paths and query strings carry per-client
    /// parameters that vary between uploads. Unparsable URLs never match.
    pub fn is_intake_url(&self, url: &str) -> bool {
        let Ok(url) = Url::parse(url) else {
            return false;
        };
        let origin = url.origin();
        self.intake_endpoints()
            .any(|endpoint| endpoint.origin() == origin)
    }
}

fn intake_url(subdomain: &str, site: &str, token: &str) -> String {
    format!("https://{subdomain}-http-intake.logs.{site}/v1/input/{token}?source=browser")
}

fn parse_endpoint(field: &'static str, value: &str) -> Result<Url, ValidationError> {
    Url::parse(value).map_err(|err| ValidationError::InvalidUrl {
        field,
        value: value.to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIENT_TOKEN: &str = "some_client_token";

    fn user() -> UserConfiguration {
        UserConfiguration {
            client_token: Some(CLIENT_TOKEN.to_string()),
            ..UserConfiguration::default()
        }
    }

    #[test]
    fn builds_endpoints_containing_the_client_token() {
        let configuration = Configuration::build(&user(), BuildEnv::Release).unwrap();
        assert!(configuration.logs_endpoint.as_str().contains(CLIENT_TOKEN));
        assert_eq!(
            configuration.rum_endpoint.as_str(),
            "https://rum-http-intake.logs.rum-intake.net/v1/input/some_client_token?source=browser"
        );
        assert_eq!(
            configuration.trace_endpoint.host_str(),
            Some("public-trace-http-intake.logs.rum-intake.net")
        );
    }

    #[test]
    fn release_build_ignores_endpoint_overrides() {
        let endpoint = "https://bbbbbbbbbbbbbbb.com/";
        let configuration = Configuration::build(
            &UserConfiguration {
                rum_endpoint: Some(endpoint.to_string()),
                internal_monitoring_endpoint: Some(endpoint.to_string()),
                ..user()
            },
            BuildEnv::Release,
        )
        .unwrap();

        assert_ne!(configuration.rum_endpoint.as_str(), endpoint);
        assert!(configuration.internal_monitoring_endpoint.is_none());
    }

    #[test]
    fn e2e_build_honors_endpoint_overrides() {
        let endpoint = "https://bbbbbbbbbbbbbbb.com/";
        let configuration = Configuration::build(
            &UserConfiguration {
                rum_endpoint: Some(endpoint.to_string()),
                ..user()
            },
            BuildEnv::E2eTest,
        )
        .unwrap();

        assert_eq!(configuration.rum_endpoint.as_str(), endpoint);
    }

    #[test]
    fn internal_monitoring_endpoint_requires_api_key() {
        let configuration = Configuration::build(&user(), BuildEnv::Release).unwrap();
        assert!(configuration.internal_monitoring_endpoint.is_none());

        let configuration = Configuration::build(
            &UserConfiguration {
                internal_monitoring_api_key: Some(CLIENT_TOKEN.to_string()),
                ..user()
            },
            BuildEnv::Release,
        )
        .unwrap();
        let endpoint = configuration.internal_monitoring_endpoint.unwrap();
        assert!(endpoint.as_str().contains(CLIENT_TOKEN));
    }

    #[test]
    fn is_collecting_error_defaults_to_true() {
        let configuration = Configuration::build(&user(), BuildEnv::Release).unwrap();
        assert!(configuration.is_collecting_error);

        let configuration = Configuration::build(
            &UserConfiguration {
                is_collecting_error: Some(false),
                ..user()
            },
            BuildEnv::Release,
        )
        .unwrap();
        assert!(!configuration.is_collecting_error);
    }

    #[test]
    fn public_api_key_replaces_client_token() {
        let configuration = Configuration::build(
            &UserConfiguration {
                public_api_key: Some("legacy_key".to_string()),
                ..user()
            },
            BuildEnv::Release,
        )
        .unwrap();
        assert_eq!(configuration.client_token.as_str(), "legacy_key");
    }

    #[test]
    fn rejects_missing_token_and_bad_rates() {
        assert_eq!(
            Configuration::build(&UserConfiguration::default(), BuildEnv::Release),
            Err(ValidationError::Empty {
                field: "client token"
            })
        );

        let err = Configuration::build(
            &UserConfiguration {
                resource_sample_rate: Some(101.0),
                ..user()
            },
            BuildEnv::Release,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::NotAPercentage {
                field: "resource sample rate",
                ..
            }
        ));
    }

    #[test]
    fn rejects_unparsable_override() {
        let err = Configuration::build(
            &UserConfiguration {
                logs_endpoint: Some("not a url".to_string()),
                ..user()
            },
            BuildEnv::E2eTest,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidUrl {
                field: "logs endpoint",
                ..
            }
        ));
    }

    #[test]
    fn intake_urls_match_by_origin() {
        let configuration = Configuration::build(&user(), BuildEnv::Release).unwrap();

        assert!(configuration.is_intake_url(
            "https://rum-http-intake.logs.rum-intake.net/v1/input/other_token?source=browser&x=1"
        ));
        assert!(configuration.is_intake_url("https://browser-http-intake.logs.rum-intake.net/"));
        assert!(!configuration.is_intake_url("http://rum-http-intake.logs.rum-intake.net/v1/input"));
        assert!(!configuration.is_intake_url("https://my-domain.com/hello?a=b"));
        assert!(!configuration.is_intake_url("/relative/path"));
    }
}

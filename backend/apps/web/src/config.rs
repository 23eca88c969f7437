//! Web Settings
//!
//! Read from the environment (after `.env`) with ASP.NET-style keys.
//! Parsing works over a plain key lookup so it can be tested without
//! touching the process environment.

use std::net::SocketAddr;

use base64::Engine;
use base64::engine::general_purpose;
use identity::application::{IdentityConfig, OAuthProvider};
use url::Url;

pub const CONNECTION_STRING_KEY: &str = "ConnectionStrings__DefaultConnection";
pub const ENVIRONMENT_KEY: &str = "APP_ENVIRONMENT";
pub const BASE_URI_KEY: &str = "APP_BASE_URI";
pub const LISTEN_ADDR_KEY: &str = "APP_LISTEN_ADDR";
pub const SECRET_KEY: &str = "IDENTITY_SECRET";
pub const PROVIDERS_KEY: &str = "Authentication__Providers";

const DEFAULT_BASE_URI: &str = "http://localhost:5000/";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:5000";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Connection string 'DefaultConnection' not found.")]
    MissingConnectionString,

    #[error("{SECRET_KEY} must be set outside development")]
    MissingSecret,

    #[error("{SECRET_KEY} must be the base64 encoding of 32 bytes")]
    InvalidSecret,

    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("External provider '{provider}' is missing {key}")]
    MissingProviderSetting { provider: String, key: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }

    fn parse(value: Option<String>) -> Result<Self, ConfigError> {
        match value.as_deref().map(str::trim) {
            None | Some("") if cfg!(debug_assertions) => Ok(Environment::Development),
            None | Some("") => Ok(Environment::Production),
            Some(v) if v.eq_ignore_ascii_case("development") => Ok(Environment::Development),
            Some(v) if v.eq_ignore_ascii_case("production") => Ok(Environment::Production),
            Some(v) => Err(ConfigError::InvalidValue {
                key: ENVIRONMENT_KEY.to_string(),
                value: v.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebSettings {
    pub environment: Environment,
    pub connection_string: String,
    pub listen_addr: SocketAddr,
    pub identity: IdentityConfig,
    pub providers: Vec<OAuthProvider>,
}

impl WebSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = Environment::parse(get(ENVIRONMENT_KEY))?;
        let connection_string = get(CONNECTION_STRING_KEY).ok_or(ConfigError::MissingConnectionString)?;

        let base_uri = parse_value::<Url>(BASE_URI_KEY, get(BASE_URI_KEY), DEFAULT_BASE_URI)?;
        let listen_addr =
            parse_value::<SocketAddr>(LISTEN_ADDR_KEY, get(LISTEN_ADDR_KEY), DEFAULT_LISTEN_ADDR)?;

        let identity = match (get(SECRET_KEY), environment) {
            (Some(secret), _) => {
                IdentityConfig::development(base_uri).with_secret(decode_secret(&secret)?)
            }
            (None, Environment::Development) => IdentityConfig::development(base_uri),
            (None, Environment::Production) => return Err(ConfigError::MissingSecret),
        };
        let identity = IdentityConfig {
            cookie_secure: !environment.is_development(),
            ..identity
        };

        let providers = match get(PROVIDERS_KEY) {
            Some(names) => names
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(|name| parse_provider(name, &get))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        Ok(Self {
            environment,
            connection_string,
            listen_addr,
            identity,
            providers,
        })
    }
}

fn parse_value<T: std::str::FromStr>(
    key: &str,
    value: Option<String>,
    default: &str,
) -> Result<T, ConfigError> {
    let value = value.unwrap_or_else(|| default.to_string());
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

fn decode_secret(encoded: &str) -> Result<[u8; 32], ConfigError> {
    let bytes = general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|_| ConfigError::InvalidSecret)?;
    bytes.try_into().map_err(|_| ConfigError::InvalidSecret)
}

/// `Authentication__{name}__*` settings of one OAuth2 provider.
fn parse_provider(
    name: &str,
    get: &impl Fn(&str) -> Option<String>,
) -> Result<OAuthProvider, ConfigError> {
    let setting = |field: &str| get(&format!("Authentication__{name}__{field}"));
    let required = |field: &str| {
        setting(field).ok_or_else(|| ConfigError::MissingProviderSetting {
            provider: name.to_string(),
            key: field.to_string(),
        })
    };
    let endpoint = |field: &str| -> Result<Url, ConfigError> {
        let value = required(field)?;
        Url::parse(value.trim()).map_err(|_| ConfigError::InvalidValue {
            key: format!("Authentication__{name}__{field}"),
            value,
        })
    };

    Ok(OAuthProvider {
        name: name.to_string(),
        display_name: setting("DisplayName").unwrap_or_else(|| name.to_string()),
        client_id: required("ClientId")?,
        client_secret: required("ClientSecret")?,
        authorization_endpoint: endpoint("AuthorizationEndpoint")?,
        token_endpoint: endpoint("TokenEndpoint")?,
        user_info_endpoint: endpoint("UserInfoEndpoint")?,
        scopes: setting("Scopes")
            .map(|s| s.split([' ', ',']).filter(|s| !s.is_empty()).map(str::to_string).collect())
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_connection_string_is_fatal() {
        let err = WebSettings::from_lookup(lookup(&[(ENVIRONMENT_KEY, "Development")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingConnectionString));
        assert_eq!(err.to_string(), "Connection string 'DefaultConnection' not found.");
    }

    #[test]
    fn test_development_defaults() {
        let settings = WebSettings::from_lookup(lookup(&[
            (ENVIRONMENT_KEY, "Development"),
            (CONNECTION_STRING_KEY, "postgres://localhost/identity"),
        ]))
        .unwrap();

        assert!(settings.environment.is_development());
        assert_eq!(settings.listen_addr, DEFAULT_LISTEN_ADDR.parse().unwrap());
        assert_eq!(settings.identity.base_uri.as_str(), DEFAULT_BASE_URI);
        assert!(!settings.identity.cookie_secure);
        assert!(settings.providers.is_empty());
    }

    #[test]
    fn test_production_requires_secret() {
        let err = WebSettings::from_lookup(lookup(&[
            (ENVIRONMENT_KEY, "Production"),
            (CONNECTION_STRING_KEY, "postgres://db/identity"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingSecret));

        let secret = general_purpose::STANDARD.encode([7u8; 32]);
        let settings = WebSettings::from_lookup(lookup(&[
            (ENVIRONMENT_KEY, "Production"),
            (CONNECTION_STRING_KEY, "postgres://db/identity"),
            (SECRET_KEY, &secret),
        ]))
        .unwrap();
        assert_eq!(settings.identity.secret, [7u8; 32]);
        assert!(settings.identity.cookie_secure);
    }

    #[test]
    fn test_short_secret_is_rejected() {
        let secret = general_purpose::STANDARD.encode([7u8; 16]);
        let err = WebSettings::from_lookup(lookup(&[
            (CONNECTION_STRING_KEY, "postgres://db/identity"),
            (SECRET_KEY, &secret),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSecret));
    }

    #[test]
    fn test_external_providers() {
        let settings = WebSettings::from_lookup(lookup(&[
            (ENVIRONMENT_KEY, "Development"),
            (CONNECTION_STRING_KEY, "postgres://localhost/identity"),
            (PROVIDERS_KEY, "GitHub"),
            ("Authentication__GitHub__ClientId", "client"),
            ("Authentication__GitHub__ClientSecret", "secret"),
            ("Authentication__GitHub__AuthorizationEndpoint", "https://github.com/login/oauth/authorize"),
            ("Authentication__GitHub__TokenEndpoint", "https://github.com/login/oauth/access_token"),
            ("Authentication__GitHub__UserInfoEndpoint", "https://api.github.com/user"),
            ("Authentication__GitHub__Scopes", "read:user user:email"),
        ]))
        .unwrap();

        let github = &settings.providers[0];
        assert_eq!(github.name, "GitHub");
        assert_eq!(github.display_name, "GitHub");
        assert_eq!(github.scopes, vec!["read:user", "user:email"]);
    }

    #[test]
    fn test_provider_without_client_id() {
        let err = WebSettings::from_lookup(lookup(&[
            (CONNECTION_STRING_KEY, "postgres://localhost/identity"),
            (PROVIDERS_KEY, "GitHub"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingProviderSetting { ref key, .. } if key == "ClientId"
        ));
    }
}

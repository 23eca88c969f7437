//! External Login Providers
//!
//! Generic OAuth2 authorization-code providers. The challenge sends the
//! browser to the provider with the protected [`AuthenticationProperties`]
//! as `state`; the callback exchanges the code, fetches the user info and
//! leaves an [`ExternalLoginInfo`] in the external cookie for the account
//! pages to pick up.

use platform::protector::TicketProtector;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{IdentityError, IdentityResult};

pub const EXTERNAL_PURPOSE: &str = "Identity.External";
const STATE_PURPOSE: &str = "Identity.ExternalState";

/// What came back from a provider, kept in the external cookie between
/// the callback and the page that consumes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalLoginInfo {
    pub login_provider: String,
    pub provider_key: String,
    pub provider_display_name: String,
    pub email: Option<String>,
    pub name: Option<String>,
    /// Set when the challenge links a login to an already signed-in user.
    pub xsrf_user_id: Option<String>,
}

/// Round-trips through the provider as the `state` parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationProperties {
    /// Local page to return to once the callback has run.
    pub redirect_uri: String,
    pub provider: String,
    pub xsrf_user_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OAuthProvider {
    /// Scheme name, used in routes and stored as the login provider.
    pub name: String,
    pub display_name: String,
    pub client_id: String,
    pub client_secret: String,
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    pub user_info_endpoint: Url,
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderScheme {
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Clone)]
pub struct ExternalProviders {
    providers: Vec<OAuthProvider>,
    http: reqwest::Client,
}

impl Default for ExternalProviders {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ExternalProviders {
    pub fn new(providers: Vec<OAuthProvider>) -> Self {
        Self {
            providers,
            http: reqwest::Client::new(),
        }
    }

    pub fn find(&self, name: &str) -> IdentityResult<&OAuthProvider> {
        self.providers
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| IdentityError::UnknownProvider(name.to_string()))
    }

    pub fn schemes(&self) -> Vec<ProviderScheme> {
        self.providers
            .iter()
            .map(|p| ProviderScheme {
                name: p.name.clone(),
                display_name: p.display_name.clone(),
            })
            .collect()
    }

    pub fn protect_state(
        &self,
        protector: &TicketProtector,
        properties: &AuthenticationProperties,
        expires_at_ms: i64,
    ) -> IdentityResult<String> {
        Ok(protector.protect(STATE_PURPOSE, properties, expires_at_ms)?)
    }

    pub fn unprotect_state(
        &self,
        protector: &TicketProtector,
        state: &str,
        now_ms: i64,
    ) -> IdentityResult<AuthenticationProperties> {
        Ok(protector.unprotect(STATE_PURPOSE, state, now_ms)?)
    }

    /// The provider's authorize URL for this challenge.
    pub fn authorization_url(
        &self,
        provider: &OAuthProvider,
        callback_uri: &str,
        state: &str,
    ) -> Url {
        let mut url = provider.authorization_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &provider.client_id)
            .append_pair("redirect_uri", callback_uri)
            .append_pair("scope", &provider.scopes.join(" "))
            .append_pair("state", state);
        url
    }

    /// Authorization code → access token → user info.
    pub async fn exchange(
        &self,
        provider: &OAuthProvider,
        code: &str,
        callback_uri: &str,
    ) -> IdentityResult<ExternalLoginInfo> {
        let token: TokenResponse = self
            .http
            .post(provider.token_endpoint.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", callback_uri),
                ("client_id", provider.client_id.as_str()),
                ("client_secret", provider.client_secret.as_str()),
            ])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| IdentityError::ExternalProvider(format!("token request failed: {e}")))?
            .json()
            .await
            .map_err(|e| IdentityError::ExternalProvider(format!("token response unreadable: {e}")))?;

        let user_info: Value = self
            .http
            .get(provider.user_info_endpoint.clone())
            .bearer_auth(&token.access_token)
            .header(reqwest::header::USER_AGENT, "barebones-identity")
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| IdentityError::ExternalProvider(format!("user info request failed: {e}")))?
            .json()
            .await
            .map_err(|e| IdentityError::ExternalProvider(format!("user info unreadable: {e}")))?;

        login_info_from_user_info(provider, &user_info)
    }
}

/// Map a user-info document onto a login. `sub` wins over `id`; numeric
/// ids are accepted.
fn login_info_from_user_info(
    provider: &OAuthProvider,
    user_info: &Value,
) -> IdentityResult<ExternalLoginInfo> {
    let provider_key = ["sub", "id"]
        .iter()
        .find_map(|key| match user_info.get(*key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
        .ok_or_else(|| {
            IdentityError::ExternalProvider("user info has no subject identifier".to_string())
        })?;

    let text = |key: &str| {
        user_info
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    Ok(ExternalLoginInfo {
        login_provider: provider.name.clone(),
        provider_key,
        provider_display_name: provider.display_name.clone(),
        email: text("email"),
        name: text("name"),
        xsrf_user_id: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider() -> OAuthProvider {
        OAuthProvider {
            name: "GitHub".into(),
            display_name: "GitHub".into(),
            client_id: "client".into(),
            client_secret: "secret".into(),
            authorization_endpoint: Url::parse("https://github.com/login/oauth/authorize").unwrap(),
            token_endpoint: Url::parse("https://github.com/login/oauth/access_token").unwrap(),
            user_info_endpoint: Url::parse("https://api.github.com/user").unwrap(),
            scopes: vec!["read:user".into(), "user:email".into()],
        }
    }

    #[test]
    fn test_authorization_url_carries_state() {
        let providers = ExternalProviders::new(vec![provider()]);
        let github = providers.find("github").unwrap();
        let url = providers.authorization_url(github, "https://app.example/signin-external/GitHub", "abc");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("state".into(), "abc".into())));
        assert!(pairs.contains(&("scope".into(), "read:user user:email".into())));
        assert!(pairs.contains(&("response_type".into(), "code".into())));
    }

    #[test]
    fn test_unknown_provider() {
        let providers = ExternalProviders::default();
        assert!(matches!(
            providers.find("Nope"),
            Err(IdentityError::UnknownProvider(name)) if name == "Nope"
        ));
    }

    #[test]
    fn test_state_round_trip_is_bound_to_purpose() {
        let providers = ExternalProviders::default();
        let protector = TicketProtector::new([3u8; 32]);
        let properties = AuthenticationProperties {
            redirect_uri: "/accounts/external-login?action=SignInCallback".into(),
            provider: "GitHub".into(),
            xsrf_user_id: None,
        };
        let state = providers.protect_state(&protector, &properties, i64::MAX).unwrap();
        assert_eq!(providers.unprotect_state(&protector, &state, 0).unwrap(), properties);
        assert!(protector
            .unprotect::<AuthenticationProperties>(EXTERNAL_PURPOSE, &state, 0)
            .is_err());
    }

    #[test]
    fn test_user_info_mapping() {
        let info = login_info_from_user_info(
            &provider(),
            &json!({"id": 583231, "email": "octo@example.com", "name": ""}),
        )
        .unwrap();
        assert_eq!(info.provider_key, "583231");
        assert_eq!(info.email.as_deref(), Some("octo@example.com"));
        assert_eq!(info.name, None);

        assert!(login_info_from_user_info(&provider(), &json!({"email": "x@example.com"})).is_err());
    }
}

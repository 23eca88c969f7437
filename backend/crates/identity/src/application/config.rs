//! Identity Configuration

use std::time::Duration;

use platform::cookie::{CookieConfig, SameSite};
use platform::password::PasswordPolicy;
use platform::protector::TicketProtector;
use url::Url;

pub const APPLICATION_COOKIE: &str = "Identity.Application";
pub const EXTERNAL_COOKIE: &str = "Identity.External";
pub const TWO_FACTOR_USER_ID_COOKIE: &str = "Identity.TwoFactorUserId";
pub const TWO_FACTOR_REMEMBER_ME_COOKIE: &str = "Identity.TwoFactorRememberMe";

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Issuer shown in authenticator apps.
    pub application_name: String,
    /// Absolute base every redirect and emailed link is resolved against.
    pub base_uri: Url,
    /// Key for every protected ticket (cookies, tokens, OAuth state).
    pub secret: [u8; 32],
    pub cookie_secure: bool,

    pub application_cookie_name: String,
    pub external_cookie_name: String,
    pub two_factor_user_cookie_name: String,
    pub two_factor_remember_me_cookie_name: String,

    /// Application cookie lifetime, renewed on every revalidation.
    pub application_cookie_ttl: Duration,
    pub external_cookie_ttl: Duration,
    pub two_factor_user_ttl: Duration,
    pub remember_machine_ttl: Duration,
    /// Email confirmation, change-email and password reset tokens.
    pub token_lifespan: Duration,
    pub revalidation_interval: Duration,

    pub require_confirmed_account: bool,
    pub max_failed_access_attempts: i32,
    pub lockout_duration: Duration,
    pub recovery_code_count: usize,

    pub password_policy: PasswordPolicy,
    /// Password pepper (optional, application-wide secret)
    pub password_pepper: Option<Vec<u8>>,
}

impl IdentityConfig {
    pub fn new(base_uri: Url, secret: [u8; 32]) -> Self {
        Self {
            application_name: "Barebones".to_string(),
            base_uri,
            secret,
            cookie_secure: true,
            application_cookie_name: APPLICATION_COOKIE.to_string(),
            external_cookie_name: EXTERNAL_COOKIE.to_string(),
            two_factor_user_cookie_name: TWO_FACTOR_USER_ID_COOKIE.to_string(),
            two_factor_remember_me_cookie_name: TWO_FACTOR_REMEMBER_ME_COOKIE.to_string(),
            application_cookie_ttl: Duration::from_secs(14 * 24 * 3600),
            external_cookie_ttl: Duration::from_secs(5 * 60),
            two_factor_user_ttl: Duration::from_secs(5 * 60),
            remember_machine_ttl: Duration::from_secs(14 * 24 * 3600),
            token_lifespan: Duration::from_secs(24 * 3600),
            revalidation_interval: Duration::from_secs(30 * 60),
            require_confirmed_account: true,
            max_failed_access_attempts: 5,
            lockout_duration: Duration::from_secs(5 * 60),
            recovery_code_count: 10,
            password_policy: PasswordPolicy::default(),
            password_pepper: None,
        }
    }

    /// Config with a random secret. Tickets do not survive a restart.
    pub fn with_random_secret(base_uri: Url) -> Self {
        use rand::RngCore;
        let mut secret = [0u8; 32];
        rand::rng().fill_bytes(&mut secret);
        Self::new(base_uri, secret)
    }

    /// Create config for development (insecure cookies, random secret)
    pub fn development(base_uri: Url) -> Self {
        Self {
            cookie_secure: false,
            ..Self::with_random_secret(base_uri)
        }
    }

    pub fn with_secret(mut self, secret: [u8; 32]) -> Self {
        self.secret = secret;
        self
    }

    pub fn protector(&self) -> TicketProtector {
        TicketProtector::new(self.secret)
    }

    pub fn pepper(&self) -> Option<&[u8]> {
        self.password_pepper.as_deref()
    }

    /// Persistent sign-ins get a Max-Age; the rest are session cookies.
    pub fn application_cookie(&self, is_persistent: bool) -> CookieConfig {
        let max_age = is_persistent.then(|| secs(self.application_cookie_ttl));
        self.cookie(&self.application_cookie_name, max_age)
    }

    pub fn external_cookie(&self) -> CookieConfig {
        self.cookie(&self.external_cookie_name, Some(secs(self.external_cookie_ttl)))
    }

    pub fn two_factor_user_cookie(&self) -> CookieConfig {
        self.cookie(
            &self.two_factor_user_cookie_name,
            Some(secs(self.two_factor_user_ttl)),
        )
    }

    pub fn two_factor_remember_me_cookie(&self) -> CookieConfig {
        self.cookie(
            &self.two_factor_remember_me_cookie_name,
            Some(secs(self.remember_machine_ttl)),
        )
    }

    fn cookie(&self, name: &str, max_age_secs: Option<i64>) -> CookieConfig {
        CookieConfig::new(name)
            .secure(self.cookie_secure)
            .same_site(SameSite::Lax)
            .max_age_secs(max_age_secs)
    }
}

pub(crate) fn secs(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}

pub(crate) fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> IdentityConfig {
        IdentityConfig::development(Url::parse("http://localhost:5000/").unwrap())
    }

    #[test]
    fn test_defaults() {
        let config = config();
        assert_eq!(config.application_name, "Barebones");
        assert!(!config.cookie_secure);
        assert_eq!(config.revalidation_interval, Duration::from_secs(1800));
        assert_eq!(config.recovery_code_count, 10);
        assert!(config.require_confirmed_account);
        assert_ne!(config.secret, [0u8; 32]);
    }

    #[test]
    fn test_application_cookie_persistence() {
        let config = config();
        assert_eq!(config.application_cookie(false).max_age_secs, None);
        assert_eq!(
            config.application_cookie(true).max_age_secs,
            Some(14 * 24 * 3600)
        );
        assert!(!config.application_cookie(true).secure);
    }
}

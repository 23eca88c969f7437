//! Flow and router tests for the identity crate.
//!
//! Everything runs against `InMemoryIdentityStore`; HTTP tests drive the
//! router with `oneshot`.

#[cfg(test)]
mod support {
    use http::Method;
    use platform::cookie::SetCookies;
    use url::Url;

    use crate::application::config::IdentityConfig;
    use crate::application::context::RequestContext;
    use crate::application::email_sender::NoOpEmailSender;
    use crate::application::external::ExternalProviders;
    use crate::application::principal::Principal;
    use crate::application::services::IdentityServices;
    use crate::domain::entity::User;
    use crate::domain::value_object::Email;
    use crate::infra::memory::InMemoryIdentityStore;

    pub type TestServices = IdentityServices<InMemoryIdentityStore, NoOpEmailSender>;

    pub const PASSWORD: &str = "Passw0rd!";

    pub fn services() -> TestServices {
        IdentityServices::new(
            InMemoryIdentityStore::new(),
            IdentityConfig::development(Url::parse("http://localhost/").unwrap()),
            NoOpEmailSender,
            ExternalProviders::default(),
        )
    }

    pub async fn confirmed_user(services: &TestServices, email: &str) -> User {
        let mut user = User::new(Email::new(email).unwrap());
        user.email_confirmed = true;
        services.users.create(user, Some(PASSWORD)).await.unwrap()
    }

    pub async fn principal(services: &TestServices, user: &User) -> Principal {
        services
            .sign_in
            .create_principal(user, false, "pwd")
            .await
            .unwrap()
    }

    pub async fn signed_in(services: &TestServices, user: &User, method: Method, uri: &str) -> RequestContext {
        RequestContext::new(method, uri).with_principal(Some(principal(services, user).await))
    }

    /// `name=value` of the last `Set-Cookie` written for `name`.
    pub fn cookie_pair(cookies: &SetCookies, name: &str) -> String {
        cookies
            .find(name)
            .and_then(|c| c.split(';').next())
            .unwrap()
            .to_string()
    }

    pub fn cookie_value(cookies: &SetCookies, name: &str) -> String {
        cookie_pair(cookies, name)
            .split_once('=')
            .map(|(_, value)| value.to_string())
            .unwrap()
    }
}

#[cfg(test)]
mod account_flow_tests {
    use http::Method;
    use platform::cookie::SetCookies;
    use url::Url;

    use super::support::*;
    use crate::application::accounts::{
        ConfirmEmailPage, ConfirmEmailQuery, EmailForm, ExternalLoginForm, ExternalLoginPage,
        ExternalLoginQuery, ForgotPasswordPage, RecoveryCodeForm, RecoveryCodeSignInPage,
        ResetPasswordForm, ResetPasswordPage, ResetPasswordQuery, ReturnUrlQuery, SignInForm,
        SignInPage, SignUpConfirmationPage, SignUpConfirmationQuery, SignUpForm, SignUpPage,
        TwoFactorForm, TwoFactorQuery, TwoFactorSignInPage,
    };
    use crate::application::config::{APPLICATION_COOKIE, EXTERNAL_COOKIE, TWO_FACTOR_USER_ID_COOKIE};
    use crate::application::context::RequestContext;
    use crate::application::external::ExternalLoginInfo;
    use crate::domain::entity::User;
    use crate::domain::value_object::AuthenticatorKey;
    use crate::navigation::routes::{HOME, SIGN_IN_CALLBACK_ACTION, accounts};

    #[tokio::test]
    async fn test_sign_up_then_confirm_email() {
        let services = services();
        let mut cookies = SetCookies::new();
        let flow = SignUpPage::new(&services)
            .submit(
                &mut cookies,
                &ReturnUrlQuery::default(),
                SignUpForm {
                    email: "bob@example.com".into(),
                    password: PASSWORD.into(),
                    confirm_password: PASSWORD.into(),
                },
            )
            .await
            .unwrap();

        let redirect = flow.redirect().unwrap();
        assert!(redirect.location().starts_with(accounts::SIGN_UP_CONFIRMATION));
        assert!(cookies.find(APPLICATION_COOKIE).is_none());

        let flow = SignUpConfirmationPage::new(&services)
            .initialize(&SignUpConfirmationQuery {
                email: Some("bob@example.com".into()),
                return_url: None,
            })
            .await
            .unwrap();
        let link = flow
            .page()
            .unwrap()
            .data
            .email_confirmation_link
            .clone()
            .unwrap();

        let link = Url::parse(&link).unwrap();
        assert_eq!(link.path(), accounts::CONFIRM_EMAIL);
        let param = |key: &str| {
            link.query_pairs()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.into_owned())
        };

        let flow = ConfirmEmailPage::new(&services)
            .initialize(&ConfirmEmailQuery {
                user_id: param("userId"),
                code: param("code"),
            })
            .await
            .unwrap();
        assert_eq!(
            flow.page().unwrap().status_message.as_deref(),
            Some("Thank you for confirming your email.")
        );

        let user = services.users.find_by_email("bob@example.com").await.unwrap().unwrap();
        assert!(user.email_confirmed);
    }

    #[tokio::test]
    async fn test_confirm_email_without_code_goes_home() {
        let services = services();
        let flow = ConfirmEmailPage::new(&services)
            .initialize(&ConfirmEmailQuery::default())
            .await
            .unwrap();
        assert_eq!(flow.redirect().unwrap().location(), HOME);
    }

    #[tokio::test]
    async fn test_sign_in_succeeds_and_follows_return_url() {
        let services = services();
        confirmed_user(&services, "alice@example.com").await;

        let ctx = RequestContext::new(Method::POST, accounts::SIGN_IN);
        let mut cookies = SetCookies::new();
        let flow = SignInPage::new(&services)
            .submit(
                &ctx,
                &mut cookies,
                &ReturnUrlQuery {
                    return_url: Some("/accounts/manage".into()),
                },
                SignInForm {
                    email: "alice@example.com".into(),
                    password: PASSWORD.into(),
                    remember_me: false,
                },
            )
            .await
            .unwrap();

        assert_eq!(flow.redirect().unwrap().location(), "/accounts/manage");
        assert!(cookies.find(APPLICATION_COOKIE).is_some());
    }

    #[tokio::test]
    async fn test_sign_in_with_wrong_password_renders_inline_error() {
        let services = services();
        confirmed_user(&services, "alice@example.com").await;

        let ctx = RequestContext::new(Method::POST, accounts::SIGN_IN);
        let mut cookies = SetCookies::new();
        let flow = SignInPage::new(&services)
            .submit(
                &ctx,
                &mut cookies,
                &ReturnUrlQuery::default(),
                SignInForm {
                    email: "alice@example.com".into(),
                    password: "Wrong0ne!".into(),
                    remember_me: false,
                },
            )
            .await
            .unwrap();

        let page = flow.page().unwrap();
        assert_eq!(page.message.as_deref(), Some("Error: Invalid login attempt."));
        assert!(cookies.find(APPLICATION_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_sign_in_validation_errors() {
        let services = services();
        let ctx = RequestContext::new(Method::POST, accounts::SIGN_IN);
        let mut cookies = SetCookies::new();
        let flow = SignInPage::new(&services)
            .submit(&ctx, &mut cookies, &ReturnUrlQuery::default(), SignInForm::default())
            .await
            .unwrap();

        let page = flow.page().unwrap();
        assert!(page.errors.iter().any(|e| e.field == "email"));
        assert!(page.errors.iter().any(|e| e.field == "password"));
    }

    fn now() -> u64 {
        u64::try_from(chrono::Utc::now().timestamp()).unwrap()
    }

    /// A six digit code the key rejects across the whole skew window.
    fn wrong_code(key: &AuthenticatorKey) -> String {
        let now = now();
        (0..10)
            .map(|d| d.to_string().repeat(6))
            .find(|code| {
                !key.verify(code, now).unwrap() && !key.verify(code, now + 30).unwrap()
            })
            .unwrap()
    }

    async fn two_factor_user(services: &TestServices, email: &str) -> (User, AuthenticatorKey) {
        let mut user = confirmed_user(services, email).await;
        let key = services.users.reset_authenticator_key(&mut user).await.unwrap();
        services.users.set_two_factor_enabled(&mut user, true).await.unwrap();
        (user, key)
    }

    /// Password step of a two-factor user; returns the pending user cookie.
    async fn pass_password_step(services: &TestServices, email: &str) -> String {
        let ctx = RequestContext::new(Method::POST, accounts::SIGN_IN);
        let mut cookies = SetCookies::new();
        let flow = SignInPage::new(services)
            .submit(
                &ctx,
                &mut cookies,
                &ReturnUrlQuery::default(),
                SignInForm {
                    email: email.into(),
                    password: PASSWORD.into(),
                    remember_me: false,
                },
            )
            .await
            .unwrap();

        let location = flow.redirect().unwrap().location();
        assert!(location.starts_with(accounts::SIGN_IN_TWO_FACTOR), "{location}");
        assert!(location.contains("rememberMe=false"), "{location}");
        assert!(cookies.find(APPLICATION_COOKIE).is_none());
        cookie_value(&cookies, TWO_FACTOR_USER_ID_COOKIE)
    }

    fn pending_context(uri: &str, pending: &str) -> RequestContext {
        RequestContext::new(Method::POST, uri).with_cookie(TWO_FACTOR_USER_ID_COOKIE, pending)
    }

    async fn submit_authenticator_code(
        services: &TestServices,
        pending: &str,
        code: &str,
        cookies: &mut SetCookies,
    ) -> crate::application::flow::Flow<crate::application::accounts::TwoFactorView> {
        TwoFactorSignInPage::new(services)
            .submit(
                &pending_context(accounts::SIGN_IN_TWO_FACTOR, pending),
                cookies,
                &TwoFactorQuery {
                    return_url: Some("/accounts/manage".into()),
                    remember_me: false,
                },
                TwoFactorForm {
                    two_factor_code: code.into(),
                    remember_machine: false,
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_two_factor_sign_in_with_authenticator_code() {
        let services = services();
        let (_, key) = two_factor_user(&services, "alice@example.com").await;
        let pending = pass_password_step(&services, "alice@example.com").await;

        let mut cookies = SetCookies::new();
        let flow = submit_authenticator_code(&services, &pending, &wrong_code(&key), &mut cookies).await;
        assert_eq!(
            flow.page().unwrap().message.as_deref(),
            Some("Error: Invalid authenticator code.")
        );
        assert!(cookies.find(APPLICATION_COOKIE).is_none());

        let flow = submit_authenticator_code(&services, &pending, &key.code_at(now()), &mut cookies).await;
        assert_eq!(flow.redirect().unwrap().location(), "/accounts/manage");
        assert!(cookies.find(APPLICATION_COOKIE).is_some());
    }

    #[tokio::test]
    async fn test_repeated_bad_authenticator_codes_lock_the_account() {
        let services = services();
        let (user, key) = two_factor_user(&services, "alice@example.com").await;
        let pending = pass_password_step(&services, "alice@example.com").await;
        let code = wrong_code(&key);

        let max_attempts = services.config.max_failed_access_attempts;
        let mut cookies = SetCookies::new();
        for _ in 1..max_attempts {
            let flow = submit_authenticator_code(&services, &pending, &code, &mut cookies).await;
            assert_eq!(
                flow.page().unwrap().message.as_deref(),
                Some("Error: Invalid authenticator code.")
            );
        }

        let flow = submit_authenticator_code(&services, &pending, &code, &mut cookies).await;
        assert_eq!(flow.redirect().unwrap().location(), accounts::LOCKOUT);

        let stored = services.users.find_by_id(&user.id).await.unwrap().unwrap();
        assert!(services.users.is_locked_out(&stored));

        // Even the right code is refused while locked out.
        let flow = submit_authenticator_code(&services, &pending, &key.code_at(now()), &mut cookies).await;
        assert_eq!(flow.redirect().unwrap().location(), accounts::LOCKOUT);
        assert!(cookies.find(APPLICATION_COOKIE).is_none());
    }

    async fn submit_recovery_code(
        services: &TestServices,
        pending: &str,
        code: &str,
        cookies: &mut SetCookies,
    ) -> crate::application::flow::Flow<crate::application::accounts::RecoveryCodeView> {
        RecoveryCodeSignInPage::new(services)
            .submit(
                &pending_context(accounts::SIGN_IN_RECOVERY_CODE, pending),
                cookies,
                &ReturnUrlQuery::default(),
                RecoveryCodeForm {
                    recovery_code: code.into(),
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_recovery_code_signs_in_once() {
        let services = services();
        let (mut user, _) = two_factor_user(&services, "alice@example.com").await;
        let codes = services.users.generate_recovery_codes(&mut user, 10).await.unwrap();
        let pending = pass_password_step(&services, "alice@example.com").await;

        let mut cookies = SetCookies::new();
        let flow = submit_recovery_code(&services, &pending, &codes[0], &mut cookies).await;
        assert_eq!(flow.redirect().unwrap().location(), HOME);
        assert!(cookies.find(APPLICATION_COOKIE).is_some());

        let mut cookies = SetCookies::new();
        let flow = submit_recovery_code(&services, &pending, &codes[0], &mut cookies).await;
        assert_eq!(
            flow.page().unwrap().message.as_deref(),
            Some("Error: Invalid recovery code entered.")
        );
        assert!(cookies.find(APPLICATION_COOKIE).is_none());
        assert_eq!(services.users.count_recovery_codes(&user).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_locked_out_user_is_sent_to_lockout() {
        let services = services();
        let mut user = confirmed_user(&services, "alice@example.com").await;
        user.lockout_end = Some(chrono::Utc::now() + chrono::Duration::hours(1));
        services.users.update(&mut user).await.unwrap();

        let ctx = RequestContext::new(Method::POST, accounts::SIGN_IN);
        let mut cookies = SetCookies::new();
        let flow = SignInPage::new(&services)
            .submit(
                &ctx,
                &mut cookies,
                &ReturnUrlQuery::default(),
                SignInForm {
                    email: "alice@example.com".into(),
                    password: PASSWORD.into(),
                    remember_me: false,
                },
            )
            .await
            .unwrap();

        assert_eq!(flow.redirect().unwrap().location(), accounts::LOCKOUT);
        assert!(cookies.find(APPLICATION_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_forgot_password_does_not_reveal_unknown_email() {
        let services = services();
        confirmed_user(&services, "alice@example.com").await;

        for email in ["alice@example.com", "nobody@example.com"] {
            let flow = ForgotPasswordPage::new(&services)
                .submit(EmailForm { email: email.into() })
                .await
                .unwrap();
            assert_eq!(
                flow.redirect().unwrap().location(),
                accounts::FORGOT_PASSWORD_CONFIRMATION
            );
        }
    }

    #[tokio::test]
    async fn test_reset_password_without_code_is_invalid() {
        let services = services();
        let flow = ResetPasswordPage::new(&services).initialize(&ResetPasswordQuery { code: None });
        assert_eq!(flow.redirect().unwrap().location(), accounts::INVALID_PASSWORD_RESET);
    }

    #[tokio::test]
    async fn test_reset_password_token_works_once() {
        let services = services();
        let user = confirmed_user(&services, "alice@example.com").await;
        let code = services.users.generate_password_reset_token(&user).unwrap();

        let reset = |password: &str| ResetPasswordForm {
            email: "alice@example.com".into(),
            password: password.into(),
            confirm_password: password.into(),
            code: code.clone(),
        };

        let flow = ResetPasswordPage::new(&services)
            .submit(reset("N3wPassw0rd!"))
            .await
            .unwrap();
        assert_eq!(
            flow.redirect().unwrap().location(),
            accounts::RESET_PASSWORD_CONFIRMATION
        );
        let stored = services.users.find_by_id(&user.id).await.unwrap().unwrap();
        assert!(services.users.check_password(&stored, "N3wPassw0rd!").await.unwrap());

        // The reset rotated the security stamp the token was bound to.
        let flow = ResetPasswordPage::new(&services)
            .submit(reset("0therPassw0rd!"))
            .await
            .unwrap();
        assert_eq!(flow.page().unwrap().message.as_deref(), Some("Error: Invalid token."));
        let stored = services.users.find_by_id(&user.id).await.unwrap().unwrap();
        assert!(services.users.check_password(&stored, "N3wPassw0rd!").await.unwrap());
    }

    fn external_callback_context(services: &TestServices, method: Method) -> RequestContext {
        let info = ExternalLoginInfo {
            login_provider: "GitHub".into(),
            provider_key: "98765".into(),
            provider_display_name: "GitHub".into(),
            email: Some("carol@example.com".into()),
            name: None,
            xsrf_user_id: None,
        };
        let mut external = SetCookies::new();
        services.sign_in.store_external_login_info(&mut external, &info).unwrap();

        let uri = format!("{}?action={SIGN_IN_CALLBACK_ACTION}", accounts::EXTERNAL_LOGIN);
        RequestContext::new(method, &uri)
            .with_cookie(EXTERNAL_COOKIE, &cookie_value(&external, EXTERNAL_COOKIE))
    }

    #[tokio::test]
    async fn test_external_login_creates_account() {
        let services = services();
        let query = ExternalLoginQuery {
            action: Some(SIGN_IN_CALLBACK_ACTION.into()),
            ..Default::default()
        };

        let ctx = external_callback_context(&services, Method::GET);
        let mut cookies = SetCookies::new();
        let flow = ExternalLoginPage::new(&services)
            .initialize(&ctx, &mut cookies, &query)
            .await
            .unwrap();
        let view = &flow.page().unwrap().data;
        assert_eq!(view.email, "carol@example.com");
        assert_eq!(view.provider_display_name, "GitHub");

        let ctx = external_callback_context(&services, Method::POST);
        let flow = ExternalLoginPage::new(&services)
            .submit(
                &ctx,
                &mut cookies,
                &query,
                ExternalLoginForm {
                    email: "carol@example.com".into(),
                },
            )
            .await
            .unwrap();
        let location = flow.redirect().unwrap().location();
        assert!(location.starts_with(accounts::SIGN_UP_CONFIRMATION), "{location}");
        assert!(cookies.find(APPLICATION_COOKIE).is_none());

        let user = services
            .users
            .find_by_login("GitHub", "98765")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.email_str(), "carol@example.com");
        assert!(!user.has_password());

        // Same provider account again.
        let flow = ExternalLoginPage::new(&services)
            .submit(
                &ctx,
                &mut cookies,
                &query,
                ExternalLoginForm {
                    email: "other@example.com".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(
            flow.page().unwrap().message.as_deref(),
            Some("Error: A user with this login already exists.")
        );
        assert!(
            services
                .users
                .find_by_email("other@example.com")
                .await
                .unwrap()
                .is_none()
        );
    }
}

#[cfg(test)]
mod manage_flow_tests {
    use http::Method;
    use platform::cookie::SetCookies;

    use super::support::*;
    use crate::application::config::{APPLICATION_COOKIE, EXTERNAL_COOKIE};
    use crate::application::external::ExternalLoginInfo;
    use crate::application::manage::{
        ChangePasswordForm, ChangePasswordPage, DeletePersonalDataPage, EnableAuthenticatorPage,
        ExternalLoginsPage, ExternalLoginsQuery, PasswordForm, ProfileForm, ProfilePage,
        VerificationCodeForm,
    };
    use crate::application::principal::Principal;
    use crate::application::context::RequestContext;
    use crate::navigation::routes::{LINK_SIGN_IN_CALLBACK_ACTION, accounts, manage};

    #[tokio::test]
    async fn test_change_password_with_wrong_current_password() {
        let services = services();
        let user = confirmed_user(&services, "alice@example.com").await;
        let ctx = signed_in(&services, &user, Method::POST, manage::CHANGE_PASSWORD).await;

        let mut cookies = SetCookies::new();
        let flow = ChangePasswordPage::new(&services)
            .submit(
                &ctx,
                &mut cookies,
                ChangePasswordForm {
                    old_password: "Wrong0ne!".into(),
                    new_password: "N3wPassw0rd!".into(),
                    confirm_password: "N3wPassw0rd!".into(),
                },
            )
            .await
            .unwrap();

        assert_eq!(
            flow.page().unwrap().message.as_deref(),
            Some("Error: Incorrect password.")
        );
        assert!(cookies.is_empty());
    }

    #[tokio::test]
    async fn test_change_password_refreshes_sign_in() {
        let services = services();
        let user = confirmed_user(&services, "alice@example.com").await;
        let ctx = signed_in(&services, &user, Method::POST, manage::CHANGE_PASSWORD).await;

        let mut cookies = SetCookies::new();
        let flow = ChangePasswordPage::new(&services)
            .submit(
                &ctx,
                &mut cookies,
                ChangePasswordForm {
                    old_password: PASSWORD.into(),
                    new_password: "N3wPassw0rd!".into(),
                    confirm_password: "N3wPassw0rd!".into(),
                },
            )
            .await
            .unwrap();

        let redirect = flow.redirect().unwrap();
        assert_eq!(redirect.location(), manage::CHANGE_PASSWORD);
        assert_eq!(redirect.status_message(), Some("Your password has been changed"));
        assert!(cookies.find(APPLICATION_COOKIE).is_some());

        let stored = services.users.find_by_id(&user.id).await.unwrap().unwrap();
        assert_ne!(stored.security_stamp, user.security_stamp);
        assert!(services.users.check_password(&stored, "N3wPassw0rd!").await.unwrap());
    }

    #[tokio::test]
    async fn test_change_password_confirmation_mismatch() {
        let services = services();
        let user = confirmed_user(&services, "alice@example.com").await;
        let ctx = signed_in(&services, &user, Method::POST, manage::CHANGE_PASSWORD).await;

        let mut cookies = SetCookies::new();
        let flow = ChangePasswordPage::new(&services)
            .submit(
                &ctx,
                &mut cookies,
                ChangePasswordForm {
                    old_password: PASSWORD.into(),
                    new_password: "N3wPassw0rd!".into(),
                    confirm_password: "Different1!".into(),
                },
            )
            .await
            .unwrap();

        let page = flow.page().unwrap();
        assert!(page.errors.iter().any(|e| e.field == "confirmPassword"));
    }

    #[tokio::test]
    async fn test_change_password_for_missing_user_redirects_to_invalid_user() {
        let services = services();
        let user = confirmed_user(&services, "alice@example.com").await;
        let principal: Principal = principal(&services, &user).await;
        let stored = services.users.find_by_id(&user.id).await.unwrap().unwrap();
        services.users.delete(&stored).await.unwrap();

        let ctx = RequestContext::new(Method::GET, manage::CHANGE_PASSWORD).with_principal(Some(principal));
        let flow = ChangePasswordPage::new(&services).initialize(&ctx).await.unwrap();
        assert!(flow.redirect().unwrap().location().starts_with(accounts::INVALID_USER));
    }

    #[tokio::test]
    async fn test_profile_updates_phone_number() {
        let services = services();
        let user = confirmed_user(&services, "alice@example.com").await;
        let ctx = signed_in(&services, &user, Method::POST, manage::INDEX).await;

        let mut cookies = SetCookies::new();
        let flow = ProfilePage::new(&services)
            .submit(
                &ctx,
                &mut cookies,
                ProfileForm {
                    phone_number: Some("+1 555 0100".into()),
                },
            )
            .await
            .unwrap();

        assert_eq!(
            flow.redirect().unwrap().status_message(),
            Some("Your profile has been updated")
        );
        let stored = services.users.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.phone_number.as_deref(), Some("+1 555 0100"));
    }

    async fn link_callback(
        services: &TestServices,
        user: &crate::domain::entity::User,
    ) -> crate::application::flow::Flow<crate::application::manage::ExternalLoginsView> {
        let info = ExternalLoginInfo {
            login_provider: "GitHub".into(),
            provider_key: "12345".into(),
            provider_display_name: "GitHub".into(),
            email: Some("alice@example.com".into()),
            name: None,
            xsrf_user_id: Some(user.id.to_string()),
        };
        let mut external = SetCookies::new();
        services
            .sign_in
            .store_external_login_info(&mut external, &info)
            .unwrap();

        let uri = format!("{}?action={LINK_SIGN_IN_CALLBACK_ACTION}", manage::EXTERNAL_LOGINS);
        let ctx = signed_in(services, user, Method::GET, &uri)
            .await
            .with_cookie(EXTERNAL_COOKIE, &cookie_value(&external, EXTERNAL_COOKIE));

        let mut cookies = SetCookies::new();
        ExternalLoginsPage::new(services)
            .initialize(
                &ctx,
                &mut cookies,
                &ExternalLoginsQuery {
                    action: Some(LINK_SIGN_IN_CALLBACK_ACTION.into()),
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_link_same_external_login_twice_is_rejected() {
        let services = services();
        let alice = confirmed_user(&services, "alice@example.com").await;
        let bob = confirmed_user(&services, "bob@example.com").await;

        let first = link_callback(&services, &alice).await;
        assert_eq!(
            first.redirect().unwrap().status_message(),
            Some("The external login was added.")
        );

        let second = link_callback(&services, &bob).await;
        assert_eq!(
            second.redirect().unwrap().status_message(),
            Some("Error: The external login was not added. External logins can only be associated with one account.")
        );

        let owner = services.users.find_by_login("GitHub", "12345").await.unwrap().unwrap();
        assert_eq!(owner.id, alice.id);
    }

    #[tokio::test]
    async fn test_link_callback_rejects_cookie_of_another_user() {
        let services = services();
        let alice = confirmed_user(&services, "alice@example.com").await;
        let bob = confirmed_user(&services, "bob@example.com").await;

        let info = ExternalLoginInfo {
            login_provider: "GitHub".into(),
            provider_key: "12345".into(),
            provider_display_name: "GitHub".into(),
            email: None,
            name: None,
            xsrf_user_id: Some(alice.id.to_string()),
        };
        let mut external = SetCookies::new();
        services.sign_in.store_external_login_info(&mut external, &info).unwrap();

        let uri = format!("{}?action={LINK_SIGN_IN_CALLBACK_ACTION}", manage::EXTERNAL_LOGINS);
        let ctx = signed_in(&services, &bob, Method::GET, &uri)
            .await
            .with_cookie(EXTERNAL_COOKIE, &cookie_value(&external, EXTERNAL_COOKIE));
        let mut cookies = SetCookies::new();
        let flow = ExternalLoginsPage::new(&services)
            .initialize(
                &ctx,
                &mut cookies,
                &ExternalLoginsQuery {
                    action: Some(LINK_SIGN_IN_CALLBACK_ACTION.into()),
                },
            )
            .await
            .unwrap();

        assert_eq!(
            flow.redirect().unwrap().status_message(),
            Some("Error: Could not load external login info.")
        );
    }

    #[tokio::test]
    async fn test_enable_authenticator_verifies_code_and_issues_recovery_codes() {
        let services = services();
        let user = confirmed_user(&services, "alice@example.com").await;

        let ctx = signed_in(&services, &user, Method::GET, manage::ENABLE_AUTHENTICATOR).await;
        let mut cookies = SetCookies::new();
        let flow = EnableAuthenticatorPage::new(&services)
            .initialize(&ctx, &mut cookies)
            .await
            .unwrap();
        let view = &flow.page().unwrap().data;
        assert!(view.authenticator_uri.starts_with("otpauth://totp/"));
        assert!(view.recovery_codes.is_empty());

        let stored = services.users.find_by_id(&user.id).await.unwrap().unwrap();
        let key = services.users.get_authenticator_key(&stored).await.unwrap().unwrap();
        let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap();

        let ctx = signed_in(&services, &stored, Method::POST, manage::ENABLE_AUTHENTICATOR).await;
        let mut cookies = SetCookies::new();
        let flow = EnableAuthenticatorPage::new(&services)
            .submit(
                &ctx,
                &mut cookies,
                VerificationCodeForm {
                    code: "12345".into(),
                },
            )
            .await
            .unwrap();
        assert!(flow.page().unwrap().errors.iter().any(|e| e.field == "code"));

        let wrong = (0..10)
            .map(|d| d.to_string().repeat(6))
            .find(|code| !key.verify(code, now).unwrap() && !key.verify(code, now + 30).unwrap())
            .unwrap();
        let flow = EnableAuthenticatorPage::new(&services)
            .submit(&ctx, &mut cookies, VerificationCodeForm { code: wrong })
            .await
            .unwrap();
        assert_eq!(
            flow.page().unwrap().message.as_deref(),
            Some("Error: Verification code is invalid.")
        );
        assert!(
            !services
                .users
                .find_by_id(&user.id)
                .await
                .unwrap()
                .unwrap()
                .two_factor_enabled
        );

        let flow = EnableAuthenticatorPage::new(&services)
            .submit(
                &ctx,
                &mut cookies,
                VerificationCodeForm {
                    code: key.code_at(now),
                },
            )
            .await
            .unwrap();
        let page = flow.page().unwrap();
        assert_eq!(
            page.status_message.as_deref(),
            Some("Your authenticator app has been verified.")
        );
        assert_eq!(page.data.recovery_codes.len(), services.config.recovery_code_count);
        assert!(cookies.find(APPLICATION_COOKIE).is_some());

        let stored = services.users.find_by_id(&user.id).await.unwrap().unwrap();
        assert!(stored.two_factor_enabled);
        assert_eq!(
            services.users.count_recovery_codes(&stored).await.unwrap(),
            services.config.recovery_code_count
        );
    }

    #[tokio::test]
    async fn test_delete_personal_data_requires_password() {
        let services = services();
        let user = confirmed_user(&services, "alice@example.com").await;
        let ctx = signed_in(&services, &user, Method::POST, manage::DELETE_PERSONAL_DATA).await;

        let mut cookies = SetCookies::new();
        let flow = DeletePersonalDataPage::new(&services)
            .submit(
                &ctx,
                &mut cookies,
                PasswordForm {
                    password: "Wrong0ne!".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(
            flow.page().unwrap().message.as_deref(),
            Some("Error: Incorrect password.")
        );
        assert!(cookies.is_empty());
        assert!(services.users.find_by_id(&user.id).await.unwrap().is_some());

        let flow = DeletePersonalDataPage::new(&services)
            .submit(
                &ctx,
                &mut cookies,
                PasswordForm {
                    password: PASSWORD.into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(flow.redirect().unwrap().location(), manage::DELETE_PERSONAL_DATA);
        assert_eq!(
            cookie_pair(&cookies, APPLICATION_COOKIE),
            format!("{APPLICATION_COOKIE}=")
        );
        assert!(services.users.find_by_id(&user.id).await.unwrap().is_none());
        assert!(
            services
                .users
                .find_by_email("alice@example.com")
                .await
                .unwrap()
                .is_none()
        );
    }
}

#[cfg(test)]
mod router_tests {
    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::response::Response;
    use http::{Request, StatusCode, header};
    use platform::cookie::SetCookies;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::support::*;
    use crate::application::config::APPLICATION_COOKIE;
    use crate::navigation::STATUS_COOKIE_NAME;
    use crate::presentation::router::identity_router;

    const FORM: &str = "application/x-www-form-urlencoded";

    async fn send(app: Router, request: Request<Body>) -> Response {
        tokio_test::assert_ok!(app.oneshot(request).await)
    }

    async fn json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn location(response: &Response) -> &str {
        response.headers()[header::LOCATION].to_str().unwrap()
    }

    fn set_cookies(response: &Response) -> Vec<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    async fn application_cookie(
        services: &TestServices,
        user: &crate::domain::entity::User,
        validated_at_ms: i64,
        stamp: Option<&str>,
    ) -> String {
        let mut principal = principal(services, user).await;
        principal.validated_at_ms = validated_at_ms;
        if let Some(stamp) = stamp {
            principal.security_stamp = Some(stamp.to_string());
        }
        let mut cookies = SetCookies::new();
        services
            .sign_in
            .issue_application_cookie(&mut cookies, &principal)
            .unwrap();
        cookie_pair(&cookies, APPLICATION_COOKIE)
    }

    #[tokio::test]
    async fn test_anonymous_manage_redirects_to_sign_in() {
        let app = identity_router(services());
        let response = send(
            app,
            Request::get("/accounts/manage/email").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            location(&response),
            "/accounts/signin?returnUrl=%2Faccounts%2Fmanage%2Femail"
        );
    }

    #[tokio::test]
    async fn test_sign_in_then_open_profile() {
        let services = services();
        confirmed_user(&services, "alice@example.com").await;
        let app = identity_router(services);

        let response = send(
            app.clone(),
            Request::post("/accounts/signin")
                .header(header::CONTENT_TYPE, FORM)
                .body(Body::from("email=alice%40example.com&password=Passw0rd%21"))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/");
        let cookie = set_cookies(&response)
            .into_iter()
            .find(|c| c.starts_with(&format!("{APPLICATION_COOKIE}=")))
            .unwrap();
        let cookie = cookie.split(';').next().unwrap().to_string();

        let response = send(
            app,
            Request::get("/accounts/manage")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["data"]["username"], "alice@example.com");
        assert_eq!(body["statusMessage"], Value::Null);
    }

    #[tokio::test]
    async fn test_status_message_is_shown_once() {
        let app = identity_router(services());

        let response = send(
            app.clone(),
            Request::get("/accounts/lockout")
                .header(header::COOKIE, format!("{STATUS_COOKIE_NAME}=Account%20locked"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        let deleted = set_cookies(&response)
            .into_iter()
            .any(|c| c.starts_with(&format!("{STATUS_COOKIE_NAME}=;")) && c.contains("Max-Age=0"));
        assert!(deleted);
        assert_eq!(json(response).await["statusMessage"], "Account locked");

        let response = send(
            app,
            Request::get("/accounts/lockout").body(Body::empty()).unwrap(),
        )
        .await;
        assert!(set_cookies(&response).is_empty());
        assert_eq!(json(response).await["statusMessage"], Value::Null);
    }

    #[tokio::test]
    async fn test_sign_out_never_redirects_off_site() {
        let app = identity_router(services());
        for return_url in [
            "https%3A%2F%2Fevil.example%2Fx",
            "%2F%2Fevil.example%2Fx",
            "%2F.%2F%2Fevil.example%2Fx",
            "%2Fa%2F..%2F%2Fevil.example%2Fx",
        ] {
            let response = send(
                app.clone(),
                Request::post("/signout")
                    .header(header::CONTENT_TYPE, FORM)
                    .body(Body::from(format!("returnUrl={return_url}")))
                    .unwrap(),
            )
            .await;

            assert_eq!(response.status(), StatusCode::FOUND);
            let target = location(&response);
            assert!(target.starts_with('/'), "{return_url} -> {target}");
            assert!(!target.starts_with("//"), "{return_url} -> {target}");
            assert!(!target.contains("evil.example"), "{return_url} -> {target}");
            assert!(
                set_cookies(&response)
                    .iter()
                    .any(|c| c.starts_with(&format!("{APPLICATION_COOKIE}=;")))
            );
        }
    }

    #[tokio::test]
    async fn test_stale_security_stamp_signs_out() {
        let services = services();
        let user = confirmed_user(&services, "alice@example.com").await;
        let cookie = application_cookie(&services, &user, 0, Some("stale-stamp")).await;
        let app = identity_router(services);

        let response = send(
            app,
            Request::get("/accounts/manage")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert!(location(&response).starts_with("/accounts/signin"));
        assert!(
            set_cookies(&response)
                .iter()
                .any(|c| c.starts_with(&format!("{APPLICATION_COOKIE}=;")) && c.contains("Max-Age=0"))
        );
    }

    #[tokio::test]
    async fn test_valid_principal_is_reissued_after_interval() {
        let services = services();
        let user = confirmed_user(&services, "alice@example.com").await;
        let cookie = application_cookie(&services, &user, 0, None).await;
        let app = identity_router(services);

        let response = send(
            app,
            Request::get("/accounts/manage")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let reissued = set_cookies(&response)
            .into_iter()
            .find(|c| c.starts_with(&format!("{APPLICATION_COOKIE}=")))
            .unwrap();
        assert!(!reissued.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_download_personal_data_is_an_attachment() {
        let services = services();
        let user = confirmed_user(&services, "alice@example.com").await;
        let cookie = application_cookie(&services, &user, chrono::Utc::now().timestamp_millis(), None).await;
        let app = identity_router(services);

        let response = send(
            app,
            Request::post("/accounts/manage/download-personal-data")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"PersonalData.json\""
        );
        assert!(json(response).await.is_object());
    }

    #[tokio::test]
    async fn test_unknown_external_provider_is_bad_request() {
        let app = identity_router(services());
        let response = send(
            app,
            Request::post("/perform-external-signin")
                .header(header::CONTENT_TYPE, FORM)
                .body(Body::from("provider=Nowhere"))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_home_reports_anonymous_visitor() {
        let app = identity_router(services());
        let response = send(app, Request::get("/").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["data"]["isAuthenticated"], false);
    }
}

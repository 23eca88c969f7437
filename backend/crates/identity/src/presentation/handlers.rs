//! HTTP Handlers
//!
//! Thin adapters: extract, run the page step, render the flow. Every page
//! has a `GET` for its initialization and a form `POST` for its submit.

use std::sync::Arc;

use axum::Form;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use platform::cookie::SetCookies;
use serde::Serialize;

use crate::application::accounts::{
    ConfirmEmailChangePage, ConfirmEmailChangeQuery, ConfirmEmailPage, ConfirmEmailQuery,
    EmailForm, ExternalLoginForm, ExternalLoginPage, ExternalLoginQuery, ForgotPasswordPage,
    RecoveryCodeForm, RecoveryCodeSignInPage, ResendEmailConfirmationPage, ResetPasswordForm,
    ResetPasswordPage, ResetPasswordQuery, ReturnUrlQuery, SignInForm, SignInPage,
    SignUpConfirmationPage, SignUpConfirmationQuery, SignUpForm, SignUpPage, TwoFactorForm,
    TwoFactorQuery, TwoFactorSignInPage,
};
use crate::application::context::RequestContext;
use crate::application::email_sender::EmailSender;
use crate::application::endpoints::{
    AccountEndpoints, ExternalCallbackQuery, ExternalSignInForm, LinkProviderForm, SignOutForm,
};
use crate::application::flow::Flow;
use crate::application::manage::{
    ChangeEmailForm, ChangePasswordForm, ChangePasswordPage, DeletePersonalDataPage,
    DisableTwoFactorPage, EnableAuthenticatorPage, ExternalLoginsPage, ExternalLoginsQuery,
    GenerateRecoveryCodesPage, ManageEmailPage, PasswordForm, PersonalDataPage, ProfileForm,
    ProfilePage, RemoveLoginForm, ResetAuthenticatorPage, SetPasswordForm, SetPasswordPage,
    TwoFactorStatusPage, VerificationCodeForm,
};
use crate::application::services::IdentityServices;
use crate::domain::repository::IdentityStore;
use crate::error::IdentityResult;
use crate::presentation::dto::{HomeView, flow_response};

/// Shared state for identity handlers
pub struct IdentityAppState<S, E>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    pub services: Arc<IdentityServices<S, E>>,
}

impl<S, E> Clone for IdentityAppState<S, E>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            services: self.services.clone(),
        }
    }
}

impl<S, E> IdentityAppState<S, E>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    pub fn new(services: IdentityServices<S, E>) -> Self {
        Self {
            services: Arc::new(services),
        }
    }

    fn render<T: Serialize>(&self, ctx: &RequestContext, cookies: SetCookies, flow: Flow<T>) -> Response {
        flow_response(&self.services.redirects, ctx, cookies, flow)
    }

    fn render_result<T: Serialize>(
        &self,
        ctx: &RequestContext,
        cookies: SetCookies,
        flow: IdentityResult<Flow<T>>,
    ) -> IdentityResult<Response> {
        Ok(self.render(ctx, cookies, flow?))
    }
}

// ============================================================================
// Static Pages
// ============================================================================

/// `GET /`
pub async fn home<S, E>(State(state): State<IdentityAppState<S, E>>, ctx: RequestContext) -> Response
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let view = HomeView::from_context(&ctx);
    state.render(&ctx, SetCookies::new(), Flow::render(view))
}

/// Pages with nothing but their status message: lockout, the various
/// confirmation pages, invalid user, access denied.
pub async fn static_page<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
) -> Response
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    state.render(&ctx, SetCookies::new(), Flow::render(()))
}

// ============================================================================
// Sign In
// ============================================================================

/// GET /accounts/signin
pub async fn sign_in_page<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
    Query(query): Query<ReturnUrlQuery>,
) -> Response
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let mut cookies = SetCookies::new();
    let flow = SignInPage::new(&state.services).initialize(&ctx, &mut cookies, &query);
    state.render(&ctx, cookies, flow)
}

/// POST /accounts/signin
pub async fn sign_in<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
    Query(query): Query<ReturnUrlQuery>,
    Form(form): Form<SignInForm>,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let mut cookies = SetCookies::new();
    let flow = SignInPage::new(&state.services)
        .submit(&ctx, &mut cookies, &query, form)
        .await;
    state.render_result(&ctx, cookies, flow)
}

/// GET /accounts/signin-two-factor
pub async fn two_factor_page<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
    Query(query): Query<TwoFactorQuery>,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let flow = TwoFactorSignInPage::new(&state.services)
        .initialize(&ctx, &query)
        .await;
    state.render_result(&ctx, SetCookies::new(), flow)
}

/// POST /accounts/signin-two-factor
pub async fn two_factor_sign_in<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
    Query(query): Query<TwoFactorQuery>,
    Form(form): Form<TwoFactorForm>,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let mut cookies = SetCookies::new();
    let flow = TwoFactorSignInPage::new(&state.services)
        .submit(&ctx, &mut cookies, &query, form)
        .await;
    state.render_result(&ctx, cookies, flow)
}

/// GET /accounts/signin-recovery-code
pub async fn recovery_code_page<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
    Query(query): Query<ReturnUrlQuery>,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let flow = RecoveryCodeSignInPage::new(&state.services)
        .initialize(&ctx, &query)
        .await;
    state.render_result(&ctx, SetCookies::new(), flow)
}

/// POST /accounts/signin-recovery-code
pub async fn recovery_code_sign_in<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
    Query(query): Query<ReturnUrlQuery>,
    Form(form): Form<RecoveryCodeForm>,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let mut cookies = SetCookies::new();
    let flow = RecoveryCodeSignInPage::new(&state.services)
        .submit(&ctx, &mut cookies, &query, form)
        .await;
    state.render_result(&ctx, cookies, flow)
}

// ============================================================================
// Sign Up / Email Confirmation
// ============================================================================

/// GET /accounts/signup
pub async fn sign_up_page<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
    Query(query): Query<ReturnUrlQuery>,
) -> Response
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let flow = SignUpPage::new(&state.services).initialize(&query);
    state.render(&ctx, SetCookies::new(), flow)
}

/// POST /accounts/signup
pub async fn sign_up<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
    Query(query): Query<ReturnUrlQuery>,
    Form(form): Form<SignUpForm>,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let mut cookies = SetCookies::new();
    let flow = SignUpPage::new(&state.services)
        .submit(&mut cookies, &query, form)
        .await;
    state.render_result(&ctx, cookies, flow)
}

/// GET /accounts/signup-confirmation
pub async fn sign_up_confirmation_page<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
    Query(query): Query<SignUpConfirmationQuery>,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let flow = SignUpConfirmationPage::new(&state.services)
        .initialize(&query)
        .await;
    state.render_result(&ctx, SetCookies::new(), flow)
}

/// GET /accounts/confirm-email
pub async fn confirm_email_page<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
    Query(query): Query<ConfirmEmailQuery>,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let flow = ConfirmEmailPage::new(&state.services).initialize(&query).await;
    state.render_result(&ctx, SetCookies::new(), flow)
}

/// GET /accounts/confirm-email-change
pub async fn confirm_email_change_page<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
    Query(query): Query<ConfirmEmailChangeQuery>,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let mut cookies = SetCookies::new();
    let flow = ConfirmEmailChangePage::new(&state.services)
        .initialize(&ctx, &mut cookies, &query)
        .await;
    state.render_result(&ctx, cookies, flow)
}

/// GET /accounts/resend-email-confirmation
pub async fn resend_email_confirmation_page<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
) -> Response
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let flow = ResendEmailConfirmationPage::new(&state.services).initialize();
    state.render(&ctx, SetCookies::new(), flow)
}

/// POST /accounts/resend-email-confirmation
pub async fn resend_email_confirmation<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
    Form(form): Form<EmailForm>,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let flow = ResendEmailConfirmationPage::new(&state.services)
        .submit(form)
        .await;
    state.render_result(&ctx, SetCookies::new(), flow)
}

// ============================================================================
// Password Recovery
// ============================================================================

/// GET /accounts/forgot-password
pub async fn forgot_password_page<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
) -> Response
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let flow = ForgotPasswordPage::new(&state.services).initialize();
    state.render(&ctx, SetCookies::new(), flow)
}

/// POST /accounts/forgot-password
pub async fn forgot_password<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
    Form(form): Form<EmailForm>,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let flow = ForgotPasswordPage::new(&state.services).submit(form).await;
    state.render_result(&ctx, SetCookies::new(), flow)
}

/// GET /accounts/reset-password
pub async fn reset_password_page<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
    Query(query): Query<ResetPasswordQuery>,
) -> Response
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let flow = ResetPasswordPage::new(&state.services).initialize(&query);
    state.render(&ctx, SetCookies::new(), flow)
}

/// POST /accounts/reset-password
pub async fn reset_password<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
    Form(form): Form<ResetPasswordForm>,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let flow = ResetPasswordPage::new(&state.services).submit(form).await;
    state.render_result(&ctx, SetCookies::new(), flow)
}

// ============================================================================
// External Login
// ============================================================================

/// GET /accounts/external-login
pub async fn external_login_page<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
    Query(query): Query<ExternalLoginQuery>,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let mut cookies = SetCookies::new();
    let flow = ExternalLoginPage::new(&state.services)
        .initialize(&ctx, &mut cookies, &query)
        .await;
    state.render_result(&ctx, cookies, flow)
}

/// POST /accounts/external-login
pub async fn external_login_confirmation<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
    Query(query): Query<ExternalLoginQuery>,
    Form(form): Form<ExternalLoginForm>,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let mut cookies = SetCookies::new();
    let flow = ExternalLoginPage::new(&state.services)
        .submit(&ctx, &mut cookies, &query, form)
        .await;
    state.render_result(&ctx, cookies, flow)
}

/// POST /perform-external-signin
pub async fn perform_external_sign_in<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    Form(form): Form<ExternalSignInForm>,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let challenge = AccountEndpoints::new(&state.services).perform_external_sign_in(&form)?;
    Ok(challenge.into_response())
}

/// POST /link-external-signin-provider
pub async fn link_external_sign_in_provider<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
    Form(form): Form<LinkProviderForm>,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let mut cookies = SetCookies::new();
    let outcome = AccountEndpoints::new(&state.services)
        .link_external_sign_in_provider(&ctx, &mut cookies, &form)
        .await?;
    Ok(match outcome {
        Ok(challenge) => (cookies, challenge).into_response(),
        Err(redirect) => (cookies, redirect).into_response(),
    })
}

/// GET /signin-external/{provider}
pub async fn external_callback<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    Path(provider): Path<String>,
    Query(query): Query<ExternalCallbackQuery>,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let mut cookies = SetCookies::new();
    let redirect = AccountEndpoints::new(&state.services)
        .external_callback(&mut cookies, &provider, &query)
        .await?;
    Ok((cookies, redirect).into_response())
}

/// POST /signout
pub async fn sign_out<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
    Form(form): Form<SignOutForm>,
) -> Response
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let mut cookies = SetCookies::new();
    let redirect = AccountEndpoints::new(&state.services).sign_out(&ctx, &mut cookies, &form);
    (cookies, redirect).into_response()
}

// ============================================================================
// Manage: Profile / Email / Password
// ============================================================================

/// GET /accounts/manage
pub async fn profile_page<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let flow = ProfilePage::new(&state.services).initialize(&ctx).await;
    state.render_result(&ctx, SetCookies::new(), flow)
}

/// POST /accounts/manage
pub async fn update_profile<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
    Form(form): Form<ProfileForm>,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let mut cookies = SetCookies::new();
    let flow = ProfilePage::new(&state.services)
        .submit(&ctx, &mut cookies, form)
        .await;
    state.render_result(&ctx, cookies, flow)
}

/// GET /accounts/manage/email
pub async fn email_page<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let flow = ManageEmailPage::new(&state.services).initialize(&ctx).await;
    state.render_result(&ctx, SetCookies::new(), flow)
}

/// POST /accounts/manage/email
pub async fn change_email<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
    Form(form): Form<ChangeEmailForm>,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let flow = ManageEmailPage::new(&state.services)
        .change_email(&ctx, form)
        .await;
    state.render_result(&ctx, SetCookies::new(), flow)
}

/// POST /accounts/manage/email/send-verification
pub async fn send_verification_email<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let flow = ManageEmailPage::new(&state.services)
        .send_verification_email(&ctx)
        .await;
    state.render_result(&ctx, SetCookies::new(), flow)
}

/// GET /accounts/manage/change-password
pub async fn change_password_page<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let flow = ChangePasswordPage::new(&state.services).initialize(&ctx).await;
    state.render_result(&ctx, SetCookies::new(), flow)
}

/// POST /accounts/manage/change-password
pub async fn change_password<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
    Form(form): Form<ChangePasswordForm>,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let mut cookies = SetCookies::new();
    let flow = ChangePasswordPage::new(&state.services)
        .submit(&ctx, &mut cookies, form)
        .await;
    state.render_result(&ctx, cookies, flow)
}

/// GET /accounts/manage/set-password
pub async fn set_password_page<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let flow = SetPasswordPage::new(&state.services).initialize(&ctx).await;
    state.render_result(&ctx, SetCookies::new(), flow)
}

/// POST /accounts/manage/set-password
pub async fn set_password<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
    Form(form): Form<SetPasswordForm>,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let mut cookies = SetCookies::new();
    let flow = SetPasswordPage::new(&state.services)
        .submit(&ctx, &mut cookies, form)
        .await;
    state.render_result(&ctx, cookies, flow)
}

// ============================================================================
// Manage: Two-Factor
// ============================================================================

/// GET /accounts/manage/two-factor-authentication
pub async fn two_factor_status_page<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let flow = TwoFactorStatusPage::new(&state.services).initialize(&ctx).await;
    state.render_result(&ctx, SetCookies::new(), flow)
}

/// POST /accounts/manage/two-factor-authentication (forget this browser)
pub async fn forget_browser<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let mut cookies = SetCookies::new();
    let flow = TwoFactorStatusPage::new(&state.services)
        .forget_browser(&ctx, &mut cookies)
        .await;
    state.render_result(&ctx, cookies, flow)
}

/// GET /accounts/manage/disable-two-factor-auth
pub async fn disable_two_factor_page<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let flow = DisableTwoFactorPage::new(&state.services).initialize(&ctx).await;
    state.render_result(&ctx, SetCookies::new(), flow)
}

/// POST /accounts/manage/disable-two-factor-auth
pub async fn disable_two_factor<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let mut cookies = SetCookies::new();
    let flow = DisableTwoFactorPage::new(&state.services)
        .submit(&ctx, &mut cookies)
        .await;
    state.render_result(&ctx, cookies, flow)
}

/// GET /accounts/manage/enable-authenticator
pub async fn enable_authenticator_page<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let mut cookies = SetCookies::new();
    let flow = EnableAuthenticatorPage::new(&state.services)
        .initialize(&ctx, &mut cookies)
        .await;
    state.render_result(&ctx, cookies, flow)
}

/// POST /accounts/manage/enable-authenticator
pub async fn enable_authenticator<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
    Form(form): Form<VerificationCodeForm>,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let mut cookies = SetCookies::new();
    let flow = EnableAuthenticatorPage::new(&state.services)
        .submit(&ctx, &mut cookies, form)
        .await;
    state.render_result(&ctx, cookies, flow)
}

/// GET /accounts/manage/reset-authenticator
pub async fn reset_authenticator_page<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let flow = ResetAuthenticatorPage::new(&state.services)
        .initialize(&ctx)
        .await;
    state.render_result(&ctx, SetCookies::new(), flow)
}

/// POST /accounts/manage/reset-authenticator
pub async fn reset_authenticator<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let mut cookies = SetCookies::new();
    let flow = ResetAuthenticatorPage::new(&state.services)
        .submit(&ctx, &mut cookies)
        .await;
    state.render_result(&ctx, cookies, flow)
}

/// GET /accounts/manage/generate-recovery-codes
pub async fn generate_recovery_codes_page<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let flow = GenerateRecoveryCodesPage::new(&state.services)
        .initialize(&ctx)
        .await;
    state.render_result(&ctx, SetCookies::new(), flow)
}

/// POST /accounts/manage/generate-recovery-codes
pub async fn generate_recovery_codes<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let flow = GenerateRecoveryCodesPage::new(&state.services)
        .submit(&ctx)
        .await;
    state.render_result(&ctx, SetCookies::new(), flow)
}

// ============================================================================
// Manage: External Logins / Personal Data
// ============================================================================

/// GET /accounts/manage/external-logins
pub async fn external_logins_page<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
    Query(query): Query<ExternalLoginsQuery>,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let mut cookies = SetCookies::new();
    let flow = ExternalLoginsPage::new(&state.services)
        .initialize(&ctx, &mut cookies, &query)
        .await;
    state.render_result(&ctx, cookies, flow)
}

/// POST /accounts/manage/external-logins
pub async fn remove_login<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
    Form(form): Form<RemoveLoginForm>,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let mut cookies = SetCookies::new();
    let flow = ExternalLoginsPage::new(&state.services)
        .remove_login(&ctx, &mut cookies, form)
        .await;
    state.render_result(&ctx, cookies, flow)
}

/// GET /accounts/manage/personal-data
pub async fn personal_data_page<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let flow = PersonalDataPage::new(&state.services).initialize(&ctx).await;
    state.render_result(&ctx, SetCookies::new(), flow)
}

/// POST /accounts/manage/download-personal-data
pub async fn download_personal_data<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    Ok(match PersonalDataPage::new(&state.services).download(&ctx).await? {
        Ok(download) => download.into_response(),
        Err(redirect) => redirect.into_response(),
    })
}

/// GET /accounts/manage/delete-personal-data
pub async fn delete_personal_data_page<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let flow = DeletePersonalDataPage::new(&state.services)
        .initialize(&ctx)
        .await;
    state.render_result(&ctx, SetCookies::new(), flow)
}

/// POST /accounts/manage/delete-personal-data
pub async fn delete_personal_data<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    ctx: RequestContext,
    Form(form): Form<PasswordForm>,
) -> IdentityResult<Response>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let mut cookies = SetCookies::new();
    let flow = DeletePersonalDataPage::new(&state.services)
        .submit(&ctx, &mut cookies, form)
        .await;
    state.render_result(&ctx, cookies, flow)
}

//! Fixed paths of the account UI.

pub const HOME: &str = "/";
pub const ERROR: &str = "/error";
pub const ACCESS_DENIED: &str = "/access-denied";
pub const SIGN_OUT: &str = "/signout";
pub const PERFORM_EXTERNAL_SIGN_IN: &str = "/perform-external-signin";
pub const LINK_EXTERNAL_SIGN_IN_PROVIDER: &str = "/link-external-signin-provider";
/// Provider callback, followed by `/{provider}`.
pub const EXTERNAL_CALLBACK_PREFIX: &str = "/signin-external";

/// `action` values carried through an external login round trip.
pub const SIGN_IN_CALLBACK_ACTION: &str = "SignInCallback";
pub const LINK_SIGN_IN_CALLBACK_ACTION: &str = "LinkSignInCallback";

pub mod accounts {
    pub const SIGN_IN: &str = "/accounts/signin";
    pub const SIGN_UP: &str = "/accounts/signup";
    pub const SIGN_UP_CONFIRMATION: &str = "/accounts/signup-confirmation";
    pub const CONFIRM_EMAIL: &str = "/accounts/confirm-email";
    pub const CONFIRM_EMAIL_CHANGE: &str = "/accounts/confirm-email-change";
    pub const EXTERNAL_LOGIN: &str = "/accounts/external-login";
    pub const FORGOT_PASSWORD: &str = "/accounts/forgot-password";
    pub const FORGOT_PASSWORD_CONFIRMATION: &str = "/accounts/forgot-password-confirmation";
    pub const INVALID_PASSWORD_RESET: &str = "/accounts/invalid-password-reset";
    pub const INVALID_USER: &str = "/accounts/invalid-user";
    pub const LOCKOUT: &str = "/accounts/lockout";
    pub const SIGN_IN_RECOVERY_CODE: &str = "/accounts/signin-recovery-code";
    pub const SIGN_IN_TWO_FACTOR: &str = "/accounts/signin-two-factor";
    pub const RESEND_EMAIL_CONFIRMATION: &str = "/accounts/resend-email-confirmation";
    pub const RESET_PASSWORD: &str = "/accounts/reset-password";
    pub const RESET_PASSWORD_CONFIRMATION: &str = "/accounts/reset-password-confirmation";
}

pub mod manage {
    pub const INDEX: &str = "/accounts/manage";
    pub const CHANGE_PASSWORD: &str = "/accounts/manage/change-password";
    pub const DELETE_PERSONAL_DATA: &str = "/accounts/manage/delete-personal-data";
    pub const DISABLE_TWO_FACTOR: &str = "/accounts/manage/disable-two-factor-auth";
    pub const DOWNLOAD_PERSONAL_DATA: &str = "/accounts/manage/download-personal-data";
    pub const EMAIL: &str = "/accounts/manage/email";
    pub const SEND_VERIFICATION_EMAIL: &str = "/accounts/manage/email/send-verification";
    pub const ENABLE_AUTHENTICATOR: &str = "/accounts/manage/enable-authenticator";
    pub const EXTERNAL_LOGINS: &str = "/accounts/manage/external-logins";
    pub const GENERATE_RECOVERY_CODES: &str = "/accounts/manage/generate-recovery-codes";
    pub const PERSONAL_DATA: &str = "/accounts/manage/personal-data";
    pub const RESET_AUTHENTICATOR: &str = "/accounts/manage/reset-authenticator";
    pub const SET_PASSWORD: &str = "/accounts/manage/set-password";
    pub const TWO_FACTOR_AUTHENTICATION: &str = "/accounts/manage/two-factor-authentication";
}

//! Account pages reachable without a signed-in user.

pub mod email;
pub mod external_login;
pub mod password;
pub mod sign_in;
pub mod sign_up;

pub use email::{
    ConfirmEmailChangePage, ConfirmEmailChangeQuery, ConfirmEmailPage, ConfirmEmailQuery,
    EmailForm, EmailView, ResendEmailConfirmationPage,
};
pub use external_login::{ExternalLoginForm, ExternalLoginPage, ExternalLoginQuery, ExternalLoginView};
pub use password::{
    ForgotPasswordPage, ResetPasswordForm, ResetPasswordPage, ResetPasswordQuery,
    ResetPasswordView,
};
pub use sign_in::{
    RecoveryCodeForm, RecoveryCodeSignInPage, RecoveryCodeView, ReturnUrlQuery, SignInForm,
    SignInPage, SignInView, TwoFactorForm, TwoFactorQuery, TwoFactorSignInPage, TwoFactorView,
};
pub use sign_up::{
    SignUpConfirmationPage, SignUpConfirmationQuery, SignUpConfirmationView, SignUpForm,
    SignUpPage, SignUpView,
};

//! Account management pages.
//!
//! Every page here needs a signed-in user. The router guarantees a
//! principal; the user behind it is resolved per request and a missing
//! one turns into the invalid-user redirect.

pub mod email;
pub mod external_logins;
pub mod password;
pub mod personal_data;
pub mod profile;
pub mod two_factor;

pub use email::{ChangeEmailForm, ManageEmailPage, ManageEmailView};
pub use external_logins::{ExternalLoginsPage, ExternalLoginsQuery, ExternalLoginsView, RemoveLoginForm};
pub use password::{
    ChangePasswordForm, ChangePasswordPage, SetPasswordForm, SetPasswordPage,
};
pub use personal_data::{
    DeletePersonalDataPage, DeletePersonalDataView, PasswordForm, PersonalDataDownload,
    PersonalDataPage,
};
pub use profile::{ProfileForm, ProfilePage, ProfileView};
pub use two_factor::{
    DisableTwoFactorPage, EnableAuthenticatorPage, EnableAuthenticatorView,
    GenerateRecoveryCodesPage, RecoveryCodesView, ResetAuthenticatorPage, TwoFactorStatusPage,
    TwoFactorStatusView, VerificationCodeForm,
};

use crate::application::context::RequestContext;
use crate::application::email_sender::EmailSender;
use crate::application::services::IdentityServices;
use crate::application::user_accessor::UserResolution;
use crate::domain::entity::User;
use crate::domain::repository::IdentityStore;
use crate::error::IdentityResult;
use crate::navigation::Redirect;

/// The signed-in user, or the redirect to show instead.
pub(crate) async fn current_user<S: IdentityStore, E: EmailSender + Sync + 'static>(
    services: &IdentityServices<S, E>,
    ctx: &RequestContext,
) -> IdentityResult<Result<User, Redirect>> {
    Ok(match services.accessor.resolve(ctx).await? {
        UserResolution::Resolved(user) => Ok(user),
        UserResolution::Unavailable(redirect) => Err(redirect),
    })
}

//! Identity Router

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::application::email_sender::EmailSender;
use crate::application::services::IdentityServices;
use crate::domain::repository::IdentityStore;
use crate::navigation::routes::{
    ACCESS_DENIED, ERROR, EXTERNAL_CALLBACK_PREFIX, HOME, LINK_EXTERNAL_SIGN_IN_PROVIDER,
    PERFORM_EXTERNAL_SIGN_IN, SIGN_OUT, accounts, manage,
};
use crate::presentation::handlers::{self, IdentityAppState};
use crate::presentation::middleware::{authenticate, require_authenticated};

/// Every identity route, behind the authentication middleware.
pub fn identity_router<S, E>(services: IdentityServices<S, E>) -> Router
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let state = IdentityAppState::new(services);

    let public = Router::new()
        .route(HOME, get(handlers::home::<S, E>))
        .route(ERROR, get(handlers::static_page::<S, E>))
        .route(ACCESS_DENIED, get(handlers::static_page::<S, E>))
        .route(
            accounts::SIGN_IN,
            get(handlers::sign_in_page::<S, E>).post(handlers::sign_in::<S, E>),
        )
        .route(
            accounts::SIGN_IN_TWO_FACTOR,
            get(handlers::two_factor_page::<S, E>).post(handlers::two_factor_sign_in::<S, E>),
        )
        .route(
            accounts::SIGN_IN_RECOVERY_CODE,
            get(handlers::recovery_code_page::<S, E>)
                .post(handlers::recovery_code_sign_in::<S, E>),
        )
        .route(accounts::LOCKOUT, get(handlers::static_page::<S, E>))
        .route(
            accounts::SIGN_UP,
            get(handlers::sign_up_page::<S, E>).post(handlers::sign_up::<S, E>),
        )
        .route(
            accounts::SIGN_UP_CONFIRMATION,
            get(handlers::sign_up_confirmation_page::<S, E>),
        )
        .route(accounts::CONFIRM_EMAIL, get(handlers::confirm_email_page::<S, E>))
        .route(
            accounts::CONFIRM_EMAIL_CHANGE,
            get(handlers::confirm_email_change_page::<S, E>),
        )
        .route(
            accounts::RESEND_EMAIL_CONFIRMATION,
            get(handlers::resend_email_confirmation_page::<S, E>)
                .post(handlers::resend_email_confirmation::<S, E>),
        )
        .route(
            accounts::FORGOT_PASSWORD,
            get(handlers::forgot_password_page::<S, E>).post(handlers::forgot_password::<S, E>),
        )
        .route(
            accounts::FORGOT_PASSWORD_CONFIRMATION,
            get(handlers::static_page::<S, E>),
        )
        .route(
            accounts::RESET_PASSWORD,
            get(handlers::reset_password_page::<S, E>).post(handlers::reset_password::<S, E>),
        )
        .route(
            accounts::RESET_PASSWORD_CONFIRMATION,
            get(handlers::static_page::<S, E>),
        )
        .route(accounts::INVALID_PASSWORD_RESET, get(handlers::static_page::<S, E>))
        .route(accounts::INVALID_USER, get(handlers::static_page::<S, E>))
        .route(
            accounts::EXTERNAL_LOGIN,
            get(handlers::external_login_page::<S, E>)
                .post(handlers::external_login_confirmation::<S, E>),
        )
        .route(
            PERFORM_EXTERNAL_SIGN_IN,
            post(handlers::perform_external_sign_in::<S, E>),
        )
        .route(
            &format!("{EXTERNAL_CALLBACK_PREFIX}/{{provider}}"),
            get(handlers::external_callback::<S, E>),
        )
        .route(SIGN_OUT, post(handlers::sign_out::<S, E>));

    let protected = Router::new()
        .route(
            manage::INDEX,
            get(handlers::profile_page::<S, E>).post(handlers::update_profile::<S, E>),
        )
        .route(
            manage::EMAIL,
            get(handlers::email_page::<S, E>).post(handlers::change_email::<S, E>),
        )
        .route(
            manage::SEND_VERIFICATION_EMAIL,
            post(handlers::send_verification_email::<S, E>),
        )
        .route(
            manage::CHANGE_PASSWORD,
            get(handlers::change_password_page::<S, E>).post(handlers::change_password::<S, E>),
        )
        .route(
            manage::SET_PASSWORD,
            get(handlers::set_password_page::<S, E>).post(handlers::set_password::<S, E>),
        )
        .route(
            manage::TWO_FACTOR_AUTHENTICATION,
            get(handlers::two_factor_status_page::<S, E>).post(handlers::forget_browser::<S, E>),
        )
        .route(
            manage::DISABLE_TWO_FACTOR,
            get(handlers::disable_two_factor_page::<S, E>)
                .post(handlers::disable_two_factor::<S, E>),
        )
        .route(
            manage::ENABLE_AUTHENTICATOR,
            get(handlers::enable_authenticator_page::<S, E>)
                .post(handlers::enable_authenticator::<S, E>),
        )
        .route(
            manage::RESET_AUTHENTICATOR,
            get(handlers::reset_authenticator_page::<S, E>)
                .post(handlers::reset_authenticator::<S, E>),
        )
        .route(
            manage::GENERATE_RECOVERY_CODES,
            get(handlers::generate_recovery_codes_page::<S, E>)
                .post(handlers::generate_recovery_codes::<S, E>),
        )
        .route(
            manage::EXTERNAL_LOGINS,
            get(handlers::external_logins_page::<S, E>).post(handlers::remove_login::<S, E>),
        )
        .route(manage::PERSONAL_DATA, get(handlers::personal_data_page::<S, E>))
        .route(
            manage::DOWNLOAD_PERSONAL_DATA,
            post(handlers::download_personal_data::<S, E>),
        )
        .route(
            manage::DELETE_PERSONAL_DATA,
            get(handlers::delete_personal_data_page::<S, E>)
                .post(handlers::delete_personal_data::<S, E>),
        )
        .route(
            LINK_EXTERNAL_SIGN_IN_PROVIDER,
            post(handlers::link_external_sign_in_provider::<S, E>),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_authenticated::<S, E>,
        ));

    public
        .merge(protected)
        .layer(middleware::from_fn_with_state(state.clone(), authenticate::<S, E>))
        .with_state(state)
}

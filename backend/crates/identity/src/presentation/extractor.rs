//! Request Context Extractor

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use http::request::Parts;

use crate::application::context::RequestContext;
use crate::application::principal::Principal;

/// Builds the context from the request line, the cookies and whatever
/// principal the authentication middleware left in the extensions.
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let principal = parts.extensions.get::<Principal>().cloned();
        Ok(RequestContext::from_parts(&parts.method, &parts.uri, &parts.headers)
            .with_principal(principal))
    }
}

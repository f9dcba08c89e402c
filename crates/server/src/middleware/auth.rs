use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use jsonwebtoken::{decode, DecodingKey, Validation};

use crate::{error::AppError, routes::auth::Claims, AppState};

#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: String,
}

/// Resolves the bearer token, if any, into an [`AuthUser`] request extension.
///
/// Requests without a token pass through anonymously; handlers that need a user
/// extract `AuthUser`, handlers that tolerate guests extract `Option<AuthUser>`.
pub async fn identify(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(TypedHeader(Authorization(bearer))) = bearer {
        let token_data = decode::<Claims>(
            bearer.token(),
            &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| {
            tracing::debug!("rejected bearer token: {e}");
            AppError::Unauthenticated
        })?;

        request.extensions_mut().insert(AuthUser {
            id: token_data.claims.sub,
        });
    }

    Ok(next.run(request).await)
}

// Extractor for getting the authenticated user from request extensions
#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AppError::Unauthenticated)
    }
}

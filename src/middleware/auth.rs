use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::auth::{AuthError, TokenService};
use crate::database::models::UserId;
use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated actor for one request. Only ever built from a verified token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
}

impl Principal {
    /// Ownership gate used by every mutating handler.
    pub fn ensure_owns(&self, owner_id: UserId, action: &str) -> Result<(), ApiError> {
        if self.user_id == owner_id {
            Ok(())
        } else {
            tracing::warn!(
                "User {} attempted to {} a resource owned by {}",
                self.user_id,
                action,
                owner_id
            );
            Err(ApiError::forbidden(format!(
                "Not allowed to {} a resource you do not own",
                action
            )))
        }
    }
}

/// Extract the token from `Authorization: Bearer <token>`
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AuthError::MalformedCredential)?;

    match auth_str.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("Bearer") => {
            let token = token.trim();
            if token.split_whitespace().count() != 1 {
                return Err(AuthError::MalformedCredential);
            }
            Ok(token)
        }
        _ => Err(AuthError::MalformedCredential),
    }
}

/// Resolve the acting principal from request headers. Every protected route
/// goes through here; nothing else turns a client-supplied value into a user id.
pub fn extract_principal(headers: &HeaderMap, tokens: &TokenService) -> Result<Principal, AuthError> {
    let token = extract_bearer_token(headers)?;
    let user_id = tokens.resolve(token)?;
    Ok(Principal { user_id })
}

/// Rejects unauthenticated requests before any later layer or handler runs and
/// makes the [`Principal`] available through request extensions.
pub async fn require_authentication(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = extract_principal(request.headers(), &state.tokens).map_err(|err| {
        tracing::debug!("Rejected {} {}: {}", request.method(), request.uri().path(), err);
        ApiError::from(err)
    })?;

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

#[async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(*principal);
        }
        Ok(extract_principal(&parts.headers, &state.tokens)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::Duration;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn tokens() -> TokenService {
        TokenService::new(b"middleware-secret".to_vec(), Duration::hours(1))
    }

    #[test]
    fn missing_header() {
        assert_eq!(
            extract_bearer_token(&HeaderMap::new()),
            Err(AuthError::MissingCredential)
        );
    }

    #[test]
    fn wrong_scheme_or_shape() {
        let values = [
            "Basic abc",
            "Bearer",
            "Bearer ",
            "token-only",
            "Bearer a b",
            "Bearer a\tb",
        ];
        for value in values {
            assert_eq!(
                extract_bearer_token(&headers(value)),
                Err(AuthError::MalformedCredential),
                "{value}"
            );
        }
    }

    #[test]
    fn bearer_token_is_extracted() {
        assert_eq!(extract_bearer_token(&headers("Bearer abc.def")), Ok("abc.def"));
        assert_eq!(extract_bearer_token(&headers("bearer abc.def")), Ok("abc.def"));
    }

    #[test]
    fn principal_comes_from_token() {
        let tokens = tokens();
        let issued = tokens.issue(42).unwrap();
        let principal =
            extract_principal(&headers(&format!("Bearer {}", issued.token)), &tokens).unwrap();
        assert_eq!(principal, Principal { user_id: 42 });
    }

    #[test]
    fn token_from_other_key_is_rejected() {
        let issued = TokenService::new(b"other".to_vec(), Duration::hours(1))
            .issue(42)
            .unwrap();
        let result = extract_principal(&headers(&format!("Bearer {}", issued.token)), &tokens());
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn ownership_mismatch_is_forbidden() {
        let principal = Principal { user_id: 1 };
        assert!(principal.ensure_owns(1, "edit").is_ok());
        assert_eq!(principal.ensure_owns(2, "edit").unwrap_err().status_code(), 403);
    }
}

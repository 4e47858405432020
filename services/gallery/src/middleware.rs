//! Auth gate: token verification at the request boundary

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::error::error_response;
use crate::jwt::{TokenCodec, TokenError};
use crate::models::IdentityId;

/// Identity established by the auth gate for the current request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerId(pub IdentityId);

/// Raw token carried by the `Authorization` header
///
/// A `Bearer` scheme, in any letter case, is stripped when present; a bare
/// token is taken as is.
fn extract_token(headers: &HeaderMap) -> Result<&str, &'static str> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or("missing authorization token")?
        .to_str()
        .map_err(|_| "malformed authorization header")?;

    let token = match value.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest,
        _ => value,
    }
    .trim();
    if token.is_empty() {
        return Err("missing authorization token");
    }
    Ok(token)
}

/// Verify the request's token and hand the caller id to the handler
///
/// Rejections answer 401 with the reason in the JSON body; the downstream
/// handler is not invoked.
pub async fn auth_middleware(
    State(tokens): State<TokenCodec>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let verified: Result<IdentityId, String> = match extract_token(req.headers()) {
        Ok(token) => tokens.verify(token).map_err(|e| {
            if !matches!(e, TokenError::Missing) {
                warn!("Failed to validate token: {}", e);
            }
            e.to_string()
        }),
        Err(reason) => Err(reason.to_string()),
    };

    match verified {
        Ok(id) => {
            req.extensions_mut().insert(CallerId(id));
            next.run(req).await
        }
        Err(reason) => error_response(StatusCode::UNAUTHORIZED, reason),
    }
}

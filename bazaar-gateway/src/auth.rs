use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, StatusCode},
    response::Response,
};
use bazaar_core::{BazaarContext, SenderType};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing;

/// Role an authenticated principal holds on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    Seller,
}

impl Role {
    /// Chat-side identity for the two conversation roles; admins have none.
    pub fn sender_type(&self) -> Option<SenderType> {
        match self {
            Role::Admin => None,
            Role::User => Some(SenderType::User),
            Role::Seller => Some(SenderType::Seller),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub principal_id: String,
    pub role: Role,
    pub exp: usize,
}

/// Authenticated principal attached to request extensions by the middleware.
#[derive(Debug, Clone)]
pub struct Principal {
    pub principal_id: String,
    pub role: Role,
}

fn extract_token(auth_header: Option<&str>) -> Option<String> {
    auth_header?
        .strip_prefix("Bearer ")
        .map(|s| s.trim().to_string())
}

pub fn generate_token(
    principal_id: &str,
    role: Role,
    secret: &str,
    expires_in_days: u64,
) -> anyhow::Result<String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)?
        .as_secs() as usize;

    let claims = Claims {
        principal_id: principal_id.to_string(),
        role,
        exp: now + (expires_in_days * 24 * 60 * 60) as usize,
    };

    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?)
}

pub fn verify_token(token: &str, secret: &str) -> Result<Principal, StatusCode> {
    let decoding_key = DecodingKey::from_secret(secret.as_ref());
    let validation = Validation::default();

    match decode::<Claims>(token, &decoding_key, &validation) {
        Ok(token_data) => Ok(Principal {
            principal_id: token_data.claims.principal_id,
            role: token_data.claims.role,
        }),
        Err(e) => {
            tracing::debug!("JWT verification failed: {}", e);
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// Bearer-token middleware for the HTTP surface. The WebSocket route carries
/// its token in the query string and the token mint endpoint is open.
pub async fn auth_middleware(
    mut req: Request,
    next: axum::middleware::Next,
) -> Result<Response, StatusCode> {
    let path = req.uri().path();
    if path == "/health" || path.starts_with("/ws") || path == "/api/v1/auth/token" {
        return Ok(next.run(req).await);
    }

    let auth_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match extract_token(auth_header) {
        Some(t) => t,
        None => {
            tracing::debug!("Missing Authorization header");
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    let ctx = req
        .extensions()
        .get::<BazaarContext>()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

    let principal = verify_token(&token, &ctx.config.server.jwt_secret)?;

    tracing::debug!("Authenticated principal: {}", principal.principal_id);
    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip_preserves_principal() {
        let token = generate_token("seller-7", Role::Seller, "test-secret", 1).unwrap();
        let principal = verify_token(&token, "test-secret").unwrap();

        assert_eq!(principal.principal_id, "seller-7");
        assert_eq!(principal.role, Role::Seller);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_token("user-1", Role::User, "secret-a", 1).unwrap();
        assert!(verify_token(&token, "secret-b").is_err());
    }

    #[test]
    fn bearer_prefix_is_required() {
        assert!(extract_token(Some("Token abc")).is_none());
        assert_eq!(extract_token(Some("Bearer abc")), Some("abc".to_string()));
        assert!(extract_token(None).is_none());
    }

    #[test]
    fn admin_role_has_no_chat_identity() {
        assert_eq!(Role::Admin.sender_type(), None);
        assert_eq!(Role::Seller.sender_type(), Some(SenderType::Seller));
    }
}

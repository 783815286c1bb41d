use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::models::Gym;

/// Token lifetime (24 hours).
const TOKEN_TTL_SECS: i64 = 86400;

/// The three roles the platform knows. Closed set; anything else fails to
/// deserialize and the token is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    GymOwner,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: i64,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Resolves caller identity from a signed token carried in the
/// `Authorization: Bearer` header or a `token` cookie. Login/registration
/// lives outside this service; `issue` exists for operator tooling and tests.
pub struct AuthGate {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl AuthGate {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }

    pub fn issue(&self, user_id: i64, role: Role) -> Result<String, jsonwebtoken::errors::Error> {
        self.issue_with_ttl(user_id, role, TOKEN_TTL_SECS)
    }

    pub(crate) fn issue_with_ttl(
        &self,
        user_id: i64,
        role: Role,
        ttl_secs: i64,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: user_id,
            role,
            iat: now,
            exp: now + ttl_secs,
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    pub fn decode_token(&self, token: &str) -> Option<Claims> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .ok()
    }

    /// Establish the caller's identity from request headers, or fail with an
    /// authentication error (distinct from the authorization failures below).
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Claims, ApiError> {
        let token = bearer_token(headers)
            .or_else(|| cookie_token(headers))
            .ok_or_else(|| ApiError::unauthorized("Unauthorized access, token not found"))?;

        self.decode_token(&token)
            .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.to_string())
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies
        .split(';')
        .filter_map(|pair| pair.trim().strip_prefix("token="))
        .next()
        .map(|t| t.to_string())
}

// ── Capability checks ──

pub fn ensure_admin(claims: &Claims) -> Result<(), ApiError> {
    if claims.role != Role::Admin {
        return Err(ApiError::forbidden("Access denied: Admin only"));
    }
    Ok(())
}

pub fn ensure_gym_owner_role(claims: &Claims) -> Result<(), ApiError> {
    if claims.role != Role::GymOwner && claims.role != Role::Admin {
        return Err(ApiError::forbidden("Access denied: Gym Owner only"));
    }
    Ok(())
}

/// The caller must own this gym. Admins pass.
pub fn ensure_gym_owner(claims: &Claims, gym: &Gym) -> Result<(), ApiError> {
    if claims.role == Role::Admin {
        return Ok(());
    }
    if claims.role != Role::GymOwner {
        return Err(ApiError::forbidden("Access denied: Gym Owner only"));
    }
    if gym.owner_id != claims.sub {
        return Err(ApiError::forbidden("Access denied: not the gym owner"));
    }
    Ok(())
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> AuthGate {
        AuthGate::new("test-secret")
    }

    fn gym_owned_by(owner_id: i64) -> Gym {
        Gym {
            id: 1,
            name: "Iron Temple".into(),
            owner_id,
            price_per_hour: Some(750),
            payout_account_id: None,
            created_at: "2026-01-01 10:00:00".into(),
        }
    }

    fn headers_with(name: header::HeaderName, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, value.parse().unwrap());
        headers
    }

    #[test]
    fn test_issue_and_decode_roundtrip() {
        let gate = gate();
        let token = gate.issue(42, Role::GymOwner).unwrap();
        let claims = gate.decode_token(&token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, Role::GymOwner);
    }

    #[test]
    fn test_decode_rejects_wrong_secret() {
        let token = gate().issue(42, Role::User).unwrap();
        let other = AuthGate::new("different-secret");
        assert!(other.decode_token(&token).is_none());
    }

    #[test]
    fn test_decode_rejects_expired() {
        let gate = gate();
        let token = gate.issue_with_ttl(42, Role::User, -120).unwrap();
        assert!(gate.decode_token(&token).is_none());
    }

    #[test]
    fn test_authenticate_bearer_header() {
        let gate = gate();
        let token = gate.issue(7, Role::User).unwrap();
        let headers = headers_with(header::AUTHORIZATION, &format!("Bearer {}", token));
        let claims = gate.authenticate(&headers).unwrap();
        assert_eq!(claims.sub, 7);
    }

    #[test]
    fn test_authenticate_cookie() {
        let gate = gate();
        let token = gate.issue(9, Role::Admin).unwrap();
        let headers = headers_with(
            header::COOKIE,
            &format!("theme=dark; token={}; lang=en", token),
        );
        let claims = gate.authenticate(&headers).unwrap();
        assert_eq!(claims.sub, 9);
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn test_authenticate_missing_token() {
        let err = gate().authenticate(&HeaderMap::new()).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[test]
    fn test_authenticate_garbage_token() {
        let headers = headers_with(header::AUTHORIZATION, "Bearer not.a.jwt");
        let err = gate().authenticate(&headers).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[test]
    fn test_role_serde_names() {
        assert_eq!(serde_json::to_string(&Role::GymOwner).unwrap(), "\"gym_owner\"");
        assert_eq!(
            serde_json::from_str::<Role>("\"admin\"").unwrap(),
            Role::Admin
        );
        assert!(serde_json::from_str::<Role>("\"superuser\"").is_err());
    }

    #[test]
    fn test_ensure_admin() {
        let gate = gate();
        let admin = gate
            .decode_token(&gate.issue(1, Role::Admin).unwrap())
            .unwrap();
        let user = gate
            .decode_token(&gate.issue(2, Role::User).unwrap())
            .unwrap();
        assert!(ensure_admin(&admin).is_ok());
        assert!(matches!(
            ensure_admin(&user),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn test_ensure_gym_owner_matches_identity() {
        let gate = gate();
        let owner = gate
            .decode_token(&gate.issue(5, Role::GymOwner).unwrap())
            .unwrap();
        assert!(ensure_gym_owner(&owner, &gym_owned_by(5)).is_ok());
        assert!(matches!(
            ensure_gym_owner(&owner, &gym_owned_by(6)),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn test_ensure_gym_owner_rejects_plain_user() {
        let gate = gate();
        let user = gate
            .decode_token(&gate.issue(5, Role::User).unwrap())
            .unwrap();
        assert!(ensure_gym_owner(&user, &gym_owned_by(5)).is_err());
    }

    #[test]
    fn test_ensure_gym_owner_admin_override() {
        let gate = gate();
        let admin = gate
            .decode_token(&gate.issue(99, Role::Admin).unwrap())
            .unwrap();
        assert!(ensure_gym_owner(&admin, &gym_owned_by(5)).is_ok());
    }
}

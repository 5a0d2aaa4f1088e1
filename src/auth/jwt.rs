use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use uuid::Uuid;

use crate::model::role::Role;
use crate::models::{Claims, TokenType};

fn now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as usize)
        .unwrap_or_default()
}

fn sign(claims: &Claims, secret: &str) -> Result<String, Error> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Token carried by the session cookie. The returned claims hold the `jti`
/// that must be persisted in `sessions`.
pub fn generate_session_token(
    user_id: u64,
    email: &str,
    role: Role,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    let claims = Claims {
        user_id,
        sub: email.to_string(),
        role: role.to_string(),
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type: TokenType::Session,
    };

    let token = sign(&claims, secret)?;
    Ok((token, claims))
}

/// Token embedded in the emailed verification link.
pub fn generate_verification_token(
    user_id: u64,
    email: &str,
    secret: &str,
    ttl: usize,
) -> Result<String, Error> {
    let claims = Claims {
        user_id,
        sub: email.to_string(),
        role: Role::Member.to_string(),
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type: TokenType::EmailVerification,
    };

    sign(&claims, secret)
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn session_token_round_trips() {
        let (token, issued) = generate_session_token(7, "taro@example.com", Role::Admin, SECRET, 60).unwrap();
        let claims = verify_token(&token, SECRET).unwrap();

        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.sub, "taro@example.com");
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.jti, issued.jti);
        assert_eq!(claims.token_type, TokenType::Session);
    }

    #[test]
    fn verification_token_is_typed() {
        let token = generate_verification_token(7, "taro@example.com", SECRET, 60).unwrap();
        let claims = verify_token(&token, SECRET).unwrap();
        assert_eq!(claims.token_type, TokenType::EmailVerification);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let (token, _) = generate_session_token(7, "taro@example.com", Role::Member, SECRET, 60).unwrap();
        assert!(verify_token(&token, "other-secret").is_err());
        assert!(verify_token("not-a-jwt", SECRET).is_err());
    }
}

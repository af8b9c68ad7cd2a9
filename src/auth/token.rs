use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::user::{Role, User};

/// Bearer token payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, user: &User) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|err| AppError::Internal(format!("token signing failed: {err}")))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|err| AppError::Unauthorized(format!("invalid token: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::TokenService;
    use crate::error::AppError;
    use crate::models::user::{Role, User};

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            first_name: "Emma".to_string(),
            last_name: "Brown".to_string(),
            email: "emma.brown@deliveryapp.com".to_string(),
            phone: "+1 (555) 456-7890".to_string(),
            password_hash: String::new(),
            role,
            is_verified: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn issued_token_carries_identity_and_role() {
        let tokens = TokenService::new("test-secret", Duration::days(7));
        let driver = user(Role::Driver);

        let token = tokens.issue(&driver).unwrap();
        let claims = tokens.verify(&token).unwrap();

        assert_eq!(claims.id, driver.id);
        assert_eq!(claims.email, driver.email);
        assert_eq!(claims.role, Role::Driver);
        assert_eq!(claims.exp - claims.iat, Duration::days(7).num_seconds());
    }

    #[test]
    fn token_from_another_secret_is_rejected() {
        let issuer = TokenService::new("one", Duration::days(7));
        let verifier = TokenService::new("two", Duration::days(7));

        let token = issuer.issue(&user(Role::Customer)).unwrap();
        assert!(matches!(verifier.verify(&token), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = TokenService::new("test-secret", Duration::hours(-2));
        let token = tokens.issue(&user(Role::Customer)).unwrap();
        assert!(tokens.verify(&token).is_err());
    }
}

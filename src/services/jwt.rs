use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::models::Role;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Account ID
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

/// HS256 access and refresh tokens, each signed with its own secret.
#[derive(Clone)]
pub struct JwtService {
    secret: String,
    refresh_secret: String,
    expiry: i64,
    refresh_expiry: i64,
}

impl JwtService {
    pub fn new(secret: String, refresh_secret: String, expiry: i64, refresh_expiry: i64) -> Self {
        JwtService { secret, refresh_secret, expiry, refresh_expiry }
    }

    pub fn from_config() -> Self {
        Self::new(
            Config::jwt_secret(),
            Config::jwt_refresh_secret(),
            Config::jwt_expiry(),
            Config::jwt_refresh_expiry(),
        )
    }

    fn issue(&self, account_id: &ObjectId, role: Role, secret: &str, ttl: i64) -> Result<String, jsonwebtoken::errors::Error> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: account_id.to_hex(),
            role,
            exp: now + ttl,
            iat: now,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
    }

    pub fn generate_access_token(&self, account_id: &ObjectId, role: Role) -> Result<String, jsonwebtoken::errors::Error> {
        self.issue(account_id, role, &self.secret, self.expiry)
    }

    pub fn generate_refresh_token(&self, account_id: &ObjectId, role: Role) -> Result<String, jsonwebtoken::errors::Error> {
        self.issue(account_id, role, &self.refresh_secret, self.refresh_expiry)
    }

    pub fn verify_token(&self, token: &str, is_refresh: bool) -> Result<Claims, jsonwebtoken::errors::Error> {
        let secret = if is_refresh { &self.refresh_secret } else { &self.secret };
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new("access".to_string(), "refresh".to_string(), 900, 3600)
    }

    #[test]
    fn access_token_carries_subject_and_role() {
        let jwt = service();
        let id = ObjectId::new();
        let token = jwt.generate_access_token(&id, Role::Employer).unwrap();

        let claims = jwt.verify_token(&token, false).unwrap();
        assert_eq!(claims.sub, id.to_hex());
        assert_eq!(claims.role, Role::Employer);
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn tokens_are_not_interchangeable() {
        let jwt = service();
        let id = ObjectId::new();
        let access = jwt.generate_access_token(&id, Role::Employee).unwrap();
        let refresh = jwt.generate_refresh_token(&id, Role::Employee).unwrap();

        assert!(jwt.verify_token(&access, true).is_err());
        assert!(jwt.verify_token(&refresh, false).is_err());
        assert!(jwt.verify_token(&refresh, true).is_ok());
    }

    #[test]
    fn expired_token_is_rejected() {
        let jwt = JwtService::new("access".to_string(), "refresh".to_string(), -3600, 3600);
        let token = jwt.generate_access_token(&ObjectId::new(), Role::Admin).unwrap();
        assert!(jwt.verify_token(&token, false).is_err());
    }
}

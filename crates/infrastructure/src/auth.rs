//! JWT 认证基础设施实现
//!
//! 令牌声明沿用 `sub`（用户名）+ `role` + `exp` 的形状；角色随令牌
//! 签发后即固定，连接存续期间不再回查。

use config::JwtConfig;
use domain::{AuthError, Identity, Role, TokenVerifier, Username};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// JWT Claims 结构
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    role: Role,
    exp: i64,
}

/// JWT 令牌服务：签发 + 验证。
///
/// 签发端主要服务于管理工具和测试；核心只消费 [`TokenVerifier`] 一侧。
#[derive(Clone)]
pub struct JwtAuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_hours: i64,
}

impl JwtAuthService {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            expiration_hours: config.expiration_hours,
        }
    }

    /// 为用户签发访问令牌。
    pub fn issue_token(
        &self,
        username: &Username,
        role: Role,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let exp = time::OffsetDateTime::now_utc().unix_timestamp()
            + self.expiration_hours * 3600;
        let claims = Claims {
            sub: username.to_string(),
            role,
            exp,
        };
        encode(&Header::default(), &claims, &self.encoding_key)
    }
}

impl TokenVerifier for JwtAuthService {
    fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let data =
            decode::<Claims>(token, &self.decoding_key, &Validation::default()).map_err(|err| {
                match err.kind() {
                    ErrorKind::ExpiredSignature => AuthError::Expired,
                    ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                    _ => AuthError::Malformed,
                }
            })?;

        let username = Username::parse(data.claims.sub).map_err(|_| AuthError::Malformed)?;
        Ok(Identity::new(username, data.claims.role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(secret: &str) -> JwtAuthService {
        JwtAuthService::new(&JwtConfig {
            secret: secret.to_string(),
            expiration_hours: 1,
        })
    }

    #[test]
    fn issued_token_round_trips() {
        let auth = service("test-secret");
        let username = Username::parse("alice").unwrap();
        let token = auth.issue_token(&username, Role::Admin).unwrap();

        let identity = auth.verify(&token).unwrap();
        assert_eq!(identity.username, username);
        assert_eq!(identity.role, Role::Admin);
    }

    #[test]
    fn wrong_secret_is_invalid_signature() {
        let auth = service("secret-a");
        let other = service("secret-b");
        let token = auth
            .issue_token(&Username::parse("alice").unwrap(), Role::User)
            .unwrap();

        assert_eq!(other.verify(&token), Err(AuthError::InvalidSignature));
    }

    #[test]
    fn garbage_token_is_malformed() {
        let auth = service("test-secret");
        assert_eq!(auth.verify("not.a.jwt"), Err(AuthError::Malformed));
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let auth = JwtAuthService {
            encoding_key: EncodingKey::from_secret(b"test-secret"),
            decoding_key: DecodingKey::from_secret(b"test-secret"),
            expiration_hours: -1,
        };
        let token = auth
            .issue_token(&Username::parse("alice").unwrap(), Role::User)
            .unwrap();

        assert_eq!(auth.verify(&token), Err(AuthError::Expired));
    }
}

use super::ports::{AuthError, SessionClaims, UserInfo};
use chrono::Utc;
use config::OAuthConfig;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::str::FromStr;

/// Issues and verifies the stateless session tokens stored in the auth cookie.
pub struct SessionTokens {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime_secs: i64,
}

impl SessionTokens {
    pub fn new(secret: &str, algorithm: &str, lifetime_hours: i64) -> Result<Self, AuthError> {
        let algorithm = Algorithm::from_str(algorithm)
            .map_err(|e| AuthError::ConfigError(format!("Unsupported JWT algorithm: {e}")))?;
        if !matches!(
            algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(AuthError::ConfigError(format!(
                "JWT algorithm {algorithm:?} needs a key pair, only HMAC is supported"
            )));
        }

        let lifetime_secs = lifetime_hours.checked_mul(3600).ok_or_else(|| {
            AuthError::ConfigError(format!("Session lifetime of {lifetime_hours} hours is out of range"))
        })?;

        Ok(Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            lifetime_secs,
        })
    }

    pub fn from_config(config: &OAuthConfig) -> Result<Self, AuthError> {
        Self::new(
            &config.jwt_secret,
            &config.jwt_algorithm,
            config.jwt_expiration_hours,
        )
    }

    pub fn lifetime_secs(&self) -> i64 {
        self.lifetime_secs
    }

    /// Mint a token for `user`, valid from now for the configured lifetime.
    pub fn issue(&self, user: &UserInfo) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let exp = now
            .checked_add(self.lifetime_secs)
            .ok_or_else(|| AuthError::TokenIssue("session expiry out of range".to_string()))?;
        let claims = SessionClaims {
            sub: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            picture: user.picture.clone(),
            iat: now,
            exp,
        };
        self.encode_claims(&claims)
    }

    fn encode_claims(&self, claims: &SessionClaims) -> Result<String, AuthError> {
        encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenIssue(e.to_string()))
    }

    /// Signature and expiry check. Any failure means "no session".
    pub fn verify(&self, token: &str) -> Option<SessionClaims> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;

        match decode::<SessionClaims>(token, &self.decoding_key, &validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!(error = %e, "Rejected session token");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> UserInfo {
        UserInfo {
            id: "google-123".to_string(),
            email: "alice@example.com".to_string(),
            name: Some("Alice".to_string()),
            picture: None,
            email_verified: true,
        }
    }

    #[test]
    fn test_issue_then_verify() {
        let tokens = SessionTokens::new("secret", "HS256", 24).unwrap();
        let token = tokens.issue(&alice()).unwrap();

        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.sub, "google-123");
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.name.as_deref(), Some("Alice"));
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = SessionTokens::new("secret-a", "HS256", 24).unwrap();
        let verifier = SessionTokens::new("secret-b", "HS256", 24).unwrap();

        let token = issuer.issue(&alice()).unwrap();
        assert!(verifier.verify(&token).is_none());
    }

    #[test]
    fn test_expired_token_rejected() {
        let tokens = SessionTokens::new("secret", "HS256", 1).unwrap();
        let now = Utc::now().timestamp();
        let token = tokens
            .encode_claims(&SessionClaims {
                sub: "google-123".to_string(),
                email: "alice@example.com".to_string(),
                name: None,
                picture: None,
                iat: now - 7200,
                exp: now - 3600,
            })
            .unwrap();

        assert!(tokens.verify(&token).is_none());
    }

    #[test]
    fn test_garbage_rejected() {
        let tokens = SessionTokens::new("secret", "HS256", 24).unwrap();
        assert!(tokens.verify("not-a-jwt").is_none());
        assert!(tokens.verify("").is_none());
    }

    #[test]
    fn test_algorithm_mismatch_rejected() {
        let hs256 = SessionTokens::new("secret", "HS256", 24).unwrap();
        let hs512 = SessionTokens::new("secret", "HS512", 24).unwrap();

        let token = hs512.issue(&alice()).unwrap();
        assert!(hs256.verify(&token).is_none());
    }

    #[test]
    fn test_oversized_lifetime_refused() {
        assert!(matches!(
            SessionTokens::new("secret", "HS256", 9_223_372_036_854_775),
            Err(AuthError::ConfigError(_))
        ));

        // Fits in seconds but not once added to the current time
        let tokens = SessionTokens::new("secret", "HS256", i64::MAX / 3600).unwrap();
        assert!(matches!(
            tokens.issue(&alice()),
            Err(AuthError::TokenIssue(_))
        ));
    }

    #[test]
    fn test_asymmetric_algorithm_refused() {
        assert!(matches!(
            SessionTokens::new("secret", "RS256", 24),
            Err(AuthError::ConfigError(_))
        ));
        assert!(SessionTokens::new("secret", "nope", 24).is_err());
    }
}

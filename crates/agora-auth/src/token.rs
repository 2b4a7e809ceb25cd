//! API tokens are HS256 signed JWTs carrying [`ApiClaim`]: `sub` is the user id,
//! `exp` the expiry in unix seconds and `roles` the roles the user had when the
//! token was issued. Expiry is checked without leeway.

use std::time::{Duration, SystemTime};

use agora_types::claim::{ApiClaim, TimeLimited};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Issues and checks API tokens signed with the server secret
pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    default_validity: Duration,
    header: Header,
    validation: Validation,
}

impl TokenManager {
    pub fn new(secret: impl AsRef<[u8]>, default_validity: Duration) -> Self {
        let secret = secret.as_ref();
        let mut validation = Validation::default();
        validation.leeway = 0;
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            default_validity,
            header: Header::default(),
            validation,
        }
    }

    /// Signs claims valid for the default validity from now
    pub fn issue(&self, claims: impl Serialize + TimeLimited) -> Result<String> {
        self.sign(claims, SystemTime::now() + self.default_validity)
    }

    #[cfg(test)]
    fn issue_expired(&self, claims: impl Serialize + TimeLimited) -> Result<String> {
        self.sign(claims, SystemTime::now() - self.default_validity)
    }

    fn sign(&self, mut claims: impl Serialize + TimeLimited, until: SystemTime) -> Result<String> {
        claims.set_validity(until);
        let token = encode(&self.header, &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Checks signature and expiry and decodes claims
    pub fn validate<T>(&self, token: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let data = decode::<T>(token, &self.decoding_key, &self.validation).inspect_err(|e| {
            debug!("Token rejected: {e}");
        })?;
        Ok(data.claims)
    }

    /// Like [`TokenManager::validate`], additionally the subject must be a user id
    pub fn validate_api_claim(&self, token: &str) -> Result<ApiClaim> {
        let claim: ApiClaim = self.validate(token)?;
        if claim.user_id().is_none() {
            debug!("Token subject {} is not user id", claim.sub);
            return Err(Error::InvalidSubject(claim.sub));
        }
        Ok(claim)
    }

    pub fn default_validity(&self) -> Duration {
        self.default_validity
    }
}

#[cfg(test)]
mod tests {
    use agora_types::claim::{Authorization, Role};

    use super::*;

    fn manager(secret: &str) -> TokenManager {
        TokenManager::new(secret, Duration::from_secs(3600))
    }

    fn now_secs() -> u64 {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    #[test]
    fn test_token() {
        let manager = manager("secret");
        let token = manager
            .issue(ApiClaim::new_expired(123, [Role::Librarian]))
            .unwrap();
        let claim = manager.validate_api_claim(&token).unwrap();
        assert_eq!(claim.user_id(), Some(123));
        assert!(claim.has_role(Role::Librarian));
        assert!(claim.exp > now_secs());
        assert!(claim.exp <= now_secs() + 3600);
    }

    #[test]
    fn test_token_expiration() {
        let manager = manager("secret");
        let token = manager
            .issue_expired(ApiClaim::new_expired(123, [Role::Member]))
            .unwrap();
        let err = manager.validate_api_claim(&token).unwrap_err();
        assert!(err.is_expired());
    }

    #[test]
    fn test_token_wrong_secret() {
        let token = manager("secret")
            .issue(ApiClaim::new_expired(1, [Role::Admin]))
            .unwrap();
        let err = manager("other secret")
            .validate_api_claim(&token)
            .unwrap_err();
        assert!(!err.is_expired());
    }

    #[test]
    fn test_token_subject_must_be_user() {
        let manager = manager("secret");
        let token = manager
            .issue(ApiClaim::new_expired("service", [Role::Admin]))
            .unwrap();
        // signature is fine, so plain validation accepts it
        assert!(manager.validate::<ApiClaim>(&token).is_ok());
        let err = manager.validate_api_claim(&token).unwrap_err();
        assert!(matches!(err, Error::InvalidSubject(ref sub) if sub == "service"));
        assert!(!err.is_expired());
    }
}

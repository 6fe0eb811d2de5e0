use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::{
    auth::claims::{Claims, Identity},
    config::JwtConfig,
    state::AppState,
};

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl From<&JwtConfig> for JwtKeys {
    fn from(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::from_secs((cfg.ttl_minutes.max(0) as u64) * 60),
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::from(&state.config.jwt)
    }
}

impl JwtKeys {
    fn sign_at(&self, identity: &Identity, now: OffsetDateTime) -> anyhow::Result<String> {
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            user_id: identity.user_id,
            email: identity.email.clone(),
            role: identity.role,
            name: identity.name.clone(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %identity.user_id, "jwt signed");
        Ok(token)
    }

    pub fn sign(&self, identity: &Identity) -> anyhow::Result<String> {
        self.sign_at(identity, OffsetDateTime::now_utc())
    }

    /// Checks signature, expiry, issuer and audience.
    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.user_id, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::Role;
    use uuid::Uuid;

    fn make_keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        JwtKeys::from(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes: 60 * 24 * 7,
        })
    }

    fn alice() -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            email: "a@x.com".into(),
            role: Role::Donor,
            name: Some("Alice".into()),
        }
    }

    #[test]
    fn sign_and_verify_roundtrip() {
        let keys = make_keys("dev-secret", "test-issuer", "test-aud");
        let who = alice();
        let token = keys.sign(&who).expect("sign");
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
        assert_eq!(Identity::from(claims), who);
    }

    #[test]
    fn claims_use_camel_case_user_id() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let token = keys.sign(&alice()).expect("sign");
        let mut validation = Validation::default();
        validation.set_audience(&["aud"]);
        let json = decode::<serde_json::Value>(&token, &keys.decoding, &validation)
            .unwrap()
            .claims;
        assert!(json.get("userId").is_some());
        assert_eq!(json["role"], "donor");
    }

    #[test]
    fn verify_rejects_tampered_signature() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let token = keys.sign(&alice()).expect("sign");
        let mut chars: Vec<char> = token.chars().collect();
        let i = chars.len() - 10;
        chars[i] = if chars[i] == 'A' { 'B' } else { 'A' };
        let token: String = chars.into_iter().collect();
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_foreign_secret() {
        let ours = make_keys("secret-one", "iss", "aud");
        let theirs = make_keys("secret-two", "iss", "aud");
        let token = theirs.sign(&alice()).expect("sign");
        assert!(ours.verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_expired_token() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let eight_days_ago = OffsetDateTime::now_utc() - TimeDuration::days(8);
        let token = keys.sign_at(&alice(), eight_days_ago).expect("sign");
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_wrong_issuer_or_audience() {
        let good_keys = make_keys("same-secret", "good-iss", "good-aud");
        let bad_keys = make_keys("same-secret", "bad-iss", "bad-aud");
        let token = good_keys.sign(&alice()).expect("sign");
        assert!(bad_keys.verify(&token).is_err());
    }

    #[test]
    fn token_without_name_still_verifies() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let who = Identity { name: None, ..alice() };
        let token = keys.sign(&who).expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.name, None);
    }
}

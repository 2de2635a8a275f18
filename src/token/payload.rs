use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::TokenError;

/// Capabilities every token payload provides
pub trait Claims {
    fn subject(&self) -> &str;
    fn issued_at(&self) -> DateTime<Utc>;
    fn expires_at(&self) -> DateTime<Utc>;

    fn valid(&self) -> Result<(), TokenError> {
        if Utc::now() > self.expires_at() {
            return Err(TokenError::Expired);
        }
        Ok(())
    }
}

/// Token claims
///
/// Timestamps are serialized as JWT NumericDate (seconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(rename = "jti")]
    pub id: Uuid,
    #[serde(rename = "sub")]
    pub username: String,
    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,
    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl Payload {
    pub fn new(username: &str, duration: Duration) -> Result<Self, TokenError> {
        let ttl = chrono::Duration::from_std(duration).map_err(|_| TokenError::InvalidDuration)?;
        let issued_at = Utc::now();
        let expires_at = issued_at
            .checked_add_signed(ttl)
            .ok_or(TokenError::InvalidDuration)?;

        Ok(Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            issued_at,
            expires_at,
        })
    }
}

impl Claims for Payload {
    fn subject(&self) -> &str {
        &self.username
    }

    fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_payload_window() {
        let payload = Payload::new("alice", Duration::from_secs(60)).unwrap();
        assert_eq!(payload.subject(), "alice");
        assert_eq!(
            (payload.expires_at() - payload.issued_at()).num_seconds(),
            60
        );
        assert!(payload.valid().is_ok());
    }

    #[test]
    fn test_unique_ids() {
        let a = Payload::new("alice", Duration::from_secs(1)).unwrap();
        let b = Payload::new("alice", Duration::from_secs(1)).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_expired_payload() {
        let mut payload = Payload::new("alice", Duration::from_secs(60)).unwrap();
        payload.expires_at = Utc::now() - chrono::Duration::seconds(5);
        assert_eq!(payload.valid(), Err(TokenError::Expired));
    }

    #[test]
    fn test_out_of_range_duration() {
        let err = Payload::new("alice", Duration::from_secs(u64::MAX)).unwrap_err();
        assert_eq!(err, TokenError::InvalidDuration);
    }

    #[test]
    fn test_claim_names() {
        let payload = Payload::new("alice", Duration::from_secs(60)).unwrap();
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["sub"], "alice");
        assert!(json["exp"].is_i64());
        assert!(json["iat"].is_i64());
    }
}

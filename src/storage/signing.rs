use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use crate::error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

/// Issues and checks time-limited download links for stored blobs.
#[derive(Clone)]
pub struct UrlSigner {
    key: HmacSha256,
    ttl: Duration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

impl UrlSigner {
    pub fn new(secret: impl AsRef<[u8]>, ttl_secs: i64) -> AppResult<Self> {
        let key = HmacSha256::new_from_slice(secret.as_ref())
            .map_err(|e| AppError::Validation(format!("URL signing secret rejected: {}", e)))?;
        Ok(Self {
            key,
            ttl: Duration::seconds(ttl_secs),
        })
    }

    fn mac(&self, path: &str, expires: i64) -> HmacSha256 {
        let mut mac = self.key.clone();
        mac.update(path.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        mac
    }

    pub fn sign(&self, path: &str) -> SignedUrl {
        self.sign_at(path, Utc::now())
    }

    pub fn sign_at(&self, path: &str, now: DateTime<Utc>) -> SignedUrl {
        let expires = (now + self.ttl).timestamp();
        let signature = hex::encode(self.mac(path, expires).finalize().into_bytes());
        SignedUrl {
            url: format!("/files/{}?expires={}&signature={}", path, expires, signature),
            expires_at: Utc.timestamp_opt(expires, 0).single().unwrap_or(now + self.ttl),
        }
    }

    pub fn verify(&self, path: &str, expires: i64, signature: &str) -> AppResult<()> {
        self.verify_at(path, expires, signature, Utc::now())
    }

    pub fn verify_at(&self, path: &str, expires: i64, signature: &str, now: DateTime<Utc>) -> AppResult<()> {
        if now.timestamp() > expires {
            return Err(AppError::Unauthenticated);
        }
        let provided = hex::decode(signature).map_err(|_| AppError::Unauthenticated)?;
        self.mac(path, expires)
            .verify_slice(&provided)
            .map_err(|_| AppError::Unauthenticated)
    }
}

//! Secure Cookie Codec
//!
//! 把任意可序列化的值编码为防篡改（可选加密）的 cookie 值。
//!
//! 编码格式：
//!
//! ```text
//! base64url( timestamp "|" base64url(payload) "|" base64url(mac) )
//!
//! payload = JSON                                   (仅签名)
//!         = nonce || AES-GCM(JSON, aad = name)     (签名 + 加密)
//! mac     = HMAC-SHA256(signing_key, name "|" timestamp "|" base64url(payload))
//! ```
//!
//! 解码先校验 MAC，再检查过期，最后解密与反序列化。任何一步失败都返回同一个
//! `CookieError::Decode`，不暴露失败阶段。

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use cookie::time::OffsetDateTime;
use cookie::Cookie;
use hmac::{Hmac, Mac};
use http::{header, Request};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_128_GCM, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::Sha256;
use thiserror::Error;

use crate::error::ApplicationError;

type HmacSha256 = Hmac<Sha256>;

/// 编码后 cookie 值的最大长度
pub const MAX_COOKIE_LENGTH: usize = 4096;

/// 默认有效期：30 天
pub const DEFAULT_MAX_AGE_SECS: i64 = 86400 * 30;

/// Cookie 编解码错误
#[derive(Debug, Error)]
pub enum CookieError {
    #[error("invalid cookie key: {0}")]
    InvalidKey(String),

    #[error("invalid hex secret: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("failed to serialize cookie value: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to encrypt cookie value")]
    Encrypt,

    #[error("encoded cookie value is too long")]
    TooLong,

    #[error("the cookie value is not valid")]
    Decode,
}

impl From<CookieError> for ApplicationError {
    fn from(err: CookieError) -> Self {
        match err {
            CookieError::Decode => ApplicationError::unauthorized().with_cause(err),
            _ => ApplicationError::internal_server_error().with_cause(err),
        }
    }
}

// ============================================================================
// Keys
// ============================================================================

/// 进程级密钥材料，启动后只读
pub struct CookieKeys {
    signing: Vec<u8>,
    encryption: Option<LessSafeKey>,
}

impl CookieKeys {
    /// 签名密钥任意非空长度；加密密钥 16 字节（AES-128-GCM）或 32 字节（AES-256-GCM）
    pub fn new(signing: impl Into<Vec<u8>>, encryption: Option<&[u8]>) -> Result<Self, CookieError> {
        let signing = signing.into();
        if signing.is_empty() {
            return Err(CookieError::InvalidKey(
                "signing key cannot be empty".to_string(),
            ));
        }

        let encryption = match encryption {
            Some(key) => {
                let algorithm = match key.len() {
                    16 => &AES_128_GCM,
                    32 => &AES_256_GCM,
                    n => {
                        return Err(CookieError::InvalidKey(format!(
                            "encryption key must be 16 or 32 bytes, got {}",
                            n
                        )))
                    }
                };
                let unbound = UnboundKey::new(algorithm, key)
                    .map_err(|_| CookieError::InvalidKey("rejected encryption key".to_string()))?;
                Some(LessSafeKey::new(unbound))
            }
            None => None,
        };

        Ok(Self { signing, encryption })
    }

    /// 从 hex 编码的共享密钥构造
    pub fn from_hex(signing: &str, encryption: Option<&str>) -> Result<Self, CookieError> {
        let signing = hex::decode(signing.trim())?;
        let encryption = encryption.map(|s| hex::decode(s.trim())).transpose()?;
        Self::new(signing, encryption.as_deref())
    }

    pub fn is_encrypted(&self) -> bool {
        self.encryption.is_some()
    }
}

impl fmt::Debug for CookieKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieKeys")
            .field("signing", &"<redacted>")
            .field("encrypted", &self.is_encrypted())
            .finish()
    }
}

// ============================================================================
// Codec
// ============================================================================

/// 签名（可选加密）cookie 编解码器
#[derive(Debug, Clone)]
pub struct SecureCookie {
    keys: Arc<CookieKeys>,
    max_age_secs: i64,
    rng: SystemRandom,
}

impl SecureCookie {
    pub fn new(keys: CookieKeys) -> Self {
        Self::from_shared(Arc::new(keys))
    }

    pub fn from_shared(keys: Arc<CookieKeys>) -> Self {
        Self {
            keys,
            max_age_secs: DEFAULT_MAX_AGE_SECS,
            rng: SystemRandom::new(),
        }
    }

    /// 设置有效期（秒），0 表示不过期
    pub fn with_max_age(mut self, secs: i64) -> Self {
        self.max_age_secs = secs.max(0);
        self
    }

    pub fn max_age_secs(&self) -> i64 {
        self.max_age_secs
    }

    /// 编码一个值，`name` 参与 MAC 与 AAD 计算
    pub fn encode<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<String, CookieError> {
        self.encode_at(name, value, Utc::now().timestamp())
    }

    fn encode_at<T: Serialize + ?Sized>(
        &self,
        name: &str,
        value: &T,
        timestamp: i64,
    ) -> Result<String, CookieError> {
        let mut payload = serde_json::to_vec(value).map_err(CookieError::Serialize)?;
        if let Some(key) = &self.keys.encryption {
            payload = self.seal(key, name, payload)?;
        }

        let payload = URL_SAFE_NO_PAD.encode(payload);
        let timestamp = timestamp.to_string();
        let tag = self.mac(name, &timestamp, &payload)?.finalize().into_bytes();

        let envelope = format!("{}|{}|{}", timestamp, payload, URL_SAFE_NO_PAD.encode(tag));
        let encoded = URL_SAFE_NO_PAD.encode(envelope);
        if encoded.len() > MAX_COOKIE_LENGTH {
            return Err(CookieError::TooLong);
        }
        Ok(encoded)
    }

    /// 编码并写入 cookie 的 value 字段
    pub fn encode_cookie<'c, T: Serialize + ?Sized>(
        &self,
        mut cookie: Cookie<'c>,
        value: &T,
    ) -> Result<Cookie<'c>, CookieError> {
        let encoded = self.encode(cookie.name(), value)?;
        cookie.set_value(encoded);
        Ok(cookie)
    }

    /// 解码；任何失败都是 `CookieError::Decode`
    pub fn decode<T: DeserializeOwned>(&self, name: &str, value: &str) -> Result<T, CookieError> {
        self.open(name, value).ok_or_else(|| {
            tracing::debug!(cookie = %name, "Rejected secure cookie");
            CookieError::Decode
        })
    }

    pub fn decode_cookie<T: DeserializeOwned>(&self, cookie: &Cookie<'_>) -> Result<T, CookieError> {
        self.decode(cookie.name(), cookie.value())
    }

    fn open<T: DeserializeOwned>(&self, name: &str, value: &str) -> Option<T> {
        if value.len() > MAX_COOKIE_LENGTH {
            return None;
        }

        let envelope = String::from_utf8(URL_SAFE_NO_PAD.decode(value).ok()?).ok()?;
        let mut parts = envelope.splitn(3, '|');
        let timestamp = parts.next()?;
        let payload = parts.next()?;
        let tag = URL_SAFE_NO_PAD.decode(parts.next()?).ok()?;

        self.mac(name, timestamp, payload).ok()?.verify_slice(&tag).ok()?;

        let issued_at: i64 = timestamp.parse().ok()?;
        if self.max_age_secs > 0 && issued_at < Utc::now().timestamp() - self.max_age_secs {
            return None;
        }

        let mut bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
        if let Some(key) = &self.keys.encryption {
            bytes = unseal(key, name, bytes)?;
        }
        serde_json::from_slice(&bytes).ok()
    }

    fn mac(&self, name: &str, timestamp: &str, payload: &str) -> Result<HmacSha256, CookieError> {
        let mut mac = HmacSha256::new_from_slice(&self.keys.signing)
            .map_err(|e| CookieError::InvalidKey(e.to_string()))?;
        mac.update(name.as_bytes());
        mac.update(b"|");
        mac.update(timestamp.as_bytes());
        mac.update(b"|");
        mac.update(payload.as_bytes());
        Ok(mac)
    }

    fn seal(&self, key: &LessSafeKey, name: &str, mut plaintext: Vec<u8>) -> Result<Vec<u8>, CookieError> {
        let mut nonce = [0u8; NONCE_LEN];
        self.rng.fill(&mut nonce).map_err(|_| CookieError::Encrypt)?;
        key.seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce),
            Aad::from(name.as_bytes()),
            &mut plaintext,
        )
        .map_err(|_| CookieError::Encrypt)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + plaintext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&plaintext);
        Ok(sealed)
    }
}

fn unseal(key: &LessSafeKey, name: &str, sealed: Vec<u8>) -> Option<Vec<u8>> {
    if sealed.len() < NONCE_LEN {
        return None;
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    let nonce = Nonce::try_assume_unique_for_key(nonce).ok()?;
    let mut buffer = ciphertext.to_vec();
    let plaintext = key
        .open_in_place(nonce, Aad::from(name.as_bytes()), &mut buffer)
        .ok()?;
    Some(plaintext.to_vec())
}

// ============================================================================
// Helpers
// ============================================================================

/// 删除 cookie：空值、根路径、HttpOnly、过期时间为 Unix 纪元
pub fn deletion_cookie(mut cookie: Cookie<'_>) -> Cookie<'_> {
    cookie.set_value("");
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_expires(OffsetDateTime::UNIX_EPOCH);
    cookie
}

/// 从请求的 Cookie header 中查找指定名称的 cookie
pub fn request_cookie<B>(request: &Request<B>, name: &str) -> Option<Cookie<'static>> {
    request
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| Cookie::split_parse_encoded(value.to_string()))
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
}

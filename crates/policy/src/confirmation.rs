//! Time-limited confirmation tokens.
//!
//! A tool that requires confirmation is first denied with a freshly minted
//! token; the caller presents that token on the retry. Tokens are bound to
//! (session, tool) with an HMAC over a per-process key, so one cannot be
//! replayed for a different tool or session, and they expire on a short
//! wall-clock TTL.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// A minted token handed back inside a ConfirmationRequired denial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationToken {
    pub token: String,
    pub tool_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Why a presented token was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("confirmation token is malformed")]
    Malformed,
    #[error("confirmation token has expired")]
    Expired,
    #[error("confirmation token does not match this call")]
    Mismatch,
}

/// Mints and verifies confirmation tokens with a process-local key.
///
/// The key never leaves the process, so tokens are valid only against the
/// minter that issued them — which is exactly the lifetime we want, since
/// confirmation is a per-session, per-process concern.
pub struct TokenMinter {
    key: [u8; 32],
    ttl: Duration,
}

impl TokenMinter {
    pub fn new(ttl_secs: u64) -> Self {
        // Two v4 uuids give 32 bytes of process-local randomness.
        let mut key = [0u8; 32];
        key[..16].copy_from_slice(Uuid::new_v4().as_bytes());
        key[16..].copy_from_slice(Uuid::new_v4().as_bytes());
        Self {
            key,
            ttl: Duration::seconds(ttl_secs as i64),
        }
    }

    /// Mint a token binding (session, tool) until now + ttl.
    pub fn mint(&self, session_id: &str, tool_id: &str) -> ConfirmationToken {
        let expires_at = Utc::now() + self.ttl;
        let tag = self.tag(session_id, tool_id, expires_at.timestamp());
        let token = URL_SAFE_NO_PAD.encode(format!("{}:{tag}", expires_at.timestamp()));
        ConfirmationToken {
            token,
            tool_id: tool_id.to_string(),
            expires_at,
        }
    }

    /// Verify a presented token against the call it accompanies.
    pub fn verify(&self, token: &str, session_id: &str, tool_id: &str) -> Result<(), TokenError> {
        let decoded = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| TokenError::Malformed)?;
        let decoded = String::from_utf8(decoded).map_err(|_| TokenError::Malformed)?;
        let (ts, tag) = decoded.split_once(':').ok_or(TokenError::Malformed)?;
        let ts: i64 = ts.parse().map_err(|_| TokenError::Malformed)?;

        if self.tag(session_id, tool_id, ts) != tag {
            return Err(TokenError::Mismatch);
        }
        if Utc::now().timestamp() > ts {
            return Err(TokenError::Expired);
        }
        Ok(())
    }

    fn tag(&self, session_id: &str, tool_id: &str, expires_ts: i64) -> String {
        // Key length is valid for HMAC by construction.
        let mut mac = HmacSha256::new_from_slice(&self.key).unwrap_or_else(|_| unreachable!());
        mac.update(session_id.as_bytes());
        mac.update(b"\0");
        mac.update(tool_id.as_bytes());
        mac.update(b"\0");
        mac.update(expires_ts.to_string().as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_token_verifies_for_its_call() {
        let minter = TokenMinter::new(60);
        let token = minter.mint("session-1", "delete_file");
        assert!(minter.verify(&token.token, "session-1", "delete_file").is_ok());
    }

    #[test]
    fn token_is_bound_to_session_and_tool() {
        let minter = TokenMinter::new(60);
        let token = minter.mint("session-1", "delete_file");
        assert_eq!(
            minter.verify(&token.token, "session-2", "delete_file"),
            Err(TokenError::Mismatch)
        );
        assert_eq!(
            minter.verify(&token.token, "session-1", "send_email"),
            Err(TokenError::Mismatch)
        );
    }

    #[test]
    fn expired_token_rejected() {
        let minter = TokenMinter::new(0);
        let token = minter.mint("s", "t");
        // ttl of zero expires within the same second boundary; force it.
        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert_eq!(minter.verify(&token.token, "s", "t"), Err(TokenError::Expired));
    }

    #[test]
    fn garbage_tokens_are_malformed() {
        let minter = TokenMinter::new(60);
        assert_eq!(minter.verify("not base64 !!", "s", "t"), Err(TokenError::Malformed));
        assert_eq!(
            minter.verify(&URL_SAFE_NO_PAD.encode("no-separator"), "s", "t"),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn tokens_from_another_minter_rejected() {
        let a = TokenMinter::new(60);
        let b = TokenMinter::new(60);
        let token = a.mint("s", "t");
        assert_eq!(b.verify(&token.token, "s", "t"), Err(TokenError::Mismatch));
    }
}

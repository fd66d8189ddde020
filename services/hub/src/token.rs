// Token minter (C1): produces opaque bearer tokens for the streaming
// endpoint. Pure and self-contained -- the hub signs and can itself verify,
// since sessions are ephemeral and there is no separate streaming process to
// share a side table with. Rotation on restart is an accepted tradeoff
// (spec.md 4.1): the signing key lives only in process memory.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

use lt_protocol::StreamTokenClaims;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_TTL_SECS: u64 = 24 * 60 * 60;

#[derive(Clone)]
pub struct TokenMinter {
    key: [u8; 32],
}

impl TokenMinter {
    /// Generate a minter with a fresh random signing key.
    pub fn new() -> Self {
        let mut key = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut key);
        Self { key }
    }

    pub fn from_key(key: [u8; 32]) -> Self {
        Self { key }
    }

    pub fn mint(
        &self,
        track_id: usize,
        media_file_id: &str,
        format: Option<String>,
        max_bit_rate: Option<u32>,
    ) -> String {
        let expires_at_unix = now_unix() + TOKEN_TTL_SECS;
        let claims = StreamTokenClaims {
            track_id: track_id.to_string(),
            media_file_id: media_file_id.to_owned(),
            format,
            max_bit_rate,
            expires_at_unix,
        };
        self.encode(&claims)
    }

    fn encode(&self, claims: &StreamTokenClaims) -> String {
        let payload = serde_json::to_vec(claims).expect("claims must serialize");
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload);
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(payload_b64.as_bytes());
        let sig = mac.finalize().into_bytes();
        format!("{}.{}", payload_b64, hex::encode(sig))
    }

    /// Decode and verify a token, rejecting a bad signature or an expired
    /// claim. Returns `None` on any failure -- the streaming endpoint has no
    /// use for *why* a token is rejected.
    pub fn verify(&self, token: &str) -> Option<StreamTokenClaims> {
        let (payload_b64, sig_hex) = token.split_once('.')?;
        let sig = hex::decode(sig_hex).ok()?;
        let mut mac = HmacSha256::new_from_slice(&self.key).ok()?;
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&sig).ok()?;
        let payload = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
        let claims: StreamTokenClaims = serde_json::from_slice(&payload).ok()?;
        if claims.expires_at_unix < now_unix() {
            return None;
        }
        Some(claims)
    }
}

impl Default for TokenMinter {
    fn default() -> Self {
        Self::new()
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs()
}

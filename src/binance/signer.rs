//! HMAC-SHA256 signing of Binance query strings.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct HmacSigner {
    api_key: String,
    secret: String,
}

impl std::fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSigner").finish_non_exhaustive()
    }
}

impl HmacSigner {
    pub fn new(api_key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret: secret.into(),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Lowercase hex HMAC-SHA256 of `payload`.
    pub fn sign(&self, payload: &str) -> String {
        // HMAC pads or hashes the key, so no key length is rejected.
        let mut mac =
            HmacSha256::new_from_slice(self.secret.as_bytes()).expect("HMAC can take any size");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Append `timestamp` and `signature` to an already encoded query.
    pub fn signed_query(&self, query: &str, timestamp_ms: i64) -> String {
        let mut q = String::with_capacity(query.len() + 96);
        q.push_str(query);
        if !q.is_empty() {
            q.push('&');
        }
        q.push_str("timestamp=");
        q.push_str(&timestamp_ms.to_string());
        let signature = self.sign(&q);
        q.push_str("&signature=");
        q.push_str(&signature);
        q
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binance_documented_vector() {
        let signer = HmacSigner::new(
            "vmPUZE6mv9SD5VNHk4HlWFsOr6aKE2zvsw0MuIgwCIPy6utIco14y7Ju91duEh8A",
            "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j",
        );
        let data = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        assert_eq!(
            signer.sign(data),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_signed_query_layout() {
        let signer = HmacSigner::new(
            "key",
            "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j",
        );
        let q = signer.signed_query(
            "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000",
            1_499_827_319_559,
        );
        assert!(q.ends_with(
            "&timestamp=1499827319559&signature=c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        ));
    }

    #[test]
    fn test_empty_query() {
        let signer = HmacSigner::new("k", "s");
        let q = signer.signed_query("", 5);
        assert!(q.starts_with("timestamp=5&signature="));
        assert_eq!(q.len(), "timestamp=5&signature=".len() + 64);
    }

    #[test]
    fn test_debug_hides_secret() {
        let signer = HmacSigner::new("public", "very-secret");
        assert!(!format!("{signer:?}").contains("very-secret"));
    }
}

//! Bearer tokens and request throttling for the account endpoints.

use axum::http::HeaderMap;
use base64::Engine;
use chrono::Utc;
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::ApiError;

type HmacSha256 = Hmac<Sha256>;

/// Default token lifetime
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 24 * 60 * 60;

// ============================================================================
// Signed Tokens
// ============================================================================

/// Identity carried by a valid bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
    pub username: String,
}

/// HMAC-signed bearer token generator/validator
#[derive(Clone)]
pub struct TokenSigner {
    secret: Arc<Vec<u8>>,
    ttl_secs: u64,
}

impl TokenSigner {
    pub fn new(secret: &[u8], ttl_secs: u64) -> Self {
        Self {
            secret: Arc::new(secret.to_vec()),
            ttl_secs,
        }
    }

    /// Random 32-byte secret; tokens die with the process
    pub fn with_random_secret(ttl_secs: u64) -> Self {
        use rand::RngCore;
        let mut secret = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);
        Self::new(&secret, ttl_secs)
    }

    fn mac(&self) -> Option<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret).ok()
    }

    /// Create a signed token
    /// Format: base64url(user_id:expiry:username:signature)
    pub fn create_token(&self, user_id: &str, username: &str) -> Option<String> {
        let expiry = Utc::now().timestamp() + self.ttl_secs as i64;
        self.create_token_with_expiry(user_id, username, expiry)
    }

    fn create_token_with_expiry(&self, user_id: &str, username: &str, expiry: i64) -> Option<String> {
        let payload = format!("{}:{}:{}", user_id, expiry, username);

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = mac.finalize().into_bytes();

        let engine = base64::engine::general_purpose::STANDARD;
        let token_data = format!("{}:{}", payload, engine.encode(signature));
        Some(base64::engine::general_purpose::URL_SAFE.encode(token_data))
    }

    /// Returns the identity if the token is authentic and unexpired
    pub fn validate_token(&self, token: &str) -> Option<AuthUser> {
        let token_data = base64::engine::general_purpose::URL_SAFE.decode(token).ok()?;
        let token_str = String::from_utf8(token_data).ok()?;

        // Usernames may contain ':', signatures (standard base64) cannot
        let (payload, signature_b64) = token_str.rsplit_once(':')?;
        let mut parts = payload.splitn(3, ':');
        let user_id = parts.next()?;
        let expiry: i64 = parts.next()?.parse().ok()?;
        let username = parts.next()?;

        let now = Utc::now().timestamp();
        if now > expiry {
            warn!("Token expired for user {}: {} > {}", username, now, expiry);
            return None;
        }

        let signature = base64::engine::general_purpose::STANDARD
            .decode(signature_b64)
            .ok()?;
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        if mac.verify_slice(&signature).is_err() {
            warn!("Token signature invalid");
            return None;
        }

        Some(AuthUser {
            user_id: user_id.to_string(),
            username: username.to_string(),
        })
    }

    /// Extract and validate `Authorization: Bearer <token>`
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<AuthUser, ApiError> {
        let token = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

        self.validate_token(token.trim())
            .ok_or_else(|| ApiError::Unauthorized("Invalid or expired token".to_string()))
    }
}

// ============================================================================
// Rate Limiting
// ============================================================================

/// Extra attempts charged for a failed login
const FAILURE_COST: u32 = 2;

struct Window {
    attempts: u32,
    started: Instant,
}

impl Window {
    fn fresh(now: Instant) -> Self {
        Self { attempts: 0, started: now }
    }

    fn expired(&self, now: Instant, length: Duration) -> bool {
        now.duration_since(self.started) > length
    }
}

/// Fixed-window attempt counter per client address.
///
/// Expired windows are swept at most once per window length, so the map only
/// holds clients seen recently.
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<DashMap<String, Window>>,
    max_attempts: u32,
    window: Duration,
    created: Instant,
    /// Milliseconds after `created` of the last sweep
    last_sweep_ms: Arc<AtomicU64>,
}

impl RateLimiter {
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            windows: Arc::new(DashMap::new()),
            max_attempts,
            window,
            created: Instant::now(),
            last_sweep_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Count an attempt. Returns false once the client is over the limit.
    pub fn check(&self, client: &str) -> bool {
        let now = Instant::now();
        // Sweep before holding a shard guard
        self.sweep_if_due(now);

        let mut window = self
            .windows
            .entry(client.to_string())
            .or_insert_with(|| Window::fresh(now));
        if window.expired(now, self.window) {
            *window = Window::fresh(now);
        }

        if window.attempts >= self.max_attempts {
            return false;
        }
        window.attempts += 1;
        true
    }

    /// Charge a failed login against the client's current window
    pub fn record_failure(&self, client: &str) {
        let now = Instant::now();
        let mut window = self
            .windows
            .entry(client.to_string())
            .or_insert_with(|| Window::fresh(now));
        if window.expired(now, self.window) {
            *window = Window::fresh(now);
        }
        window.attempts = window.attempts.saturating_add(FAILURE_COST);
    }

    /// Drop every expired window, returning how many were removed
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows.retain(|_, window| !window.expired(now, self.window));
        let removed = before.saturating_sub(self.windows.len());
        if removed > 0 {
            debug!("Rate limiter evicted {} idle clients", removed);
        }
        removed
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    fn sweep_if_due(&self, now: Instant) {
        let elapsed = u64::try_from(now.duration_since(self.created).as_millis()).unwrap_or(u64::MAX);
        let last = self.last_sweep_ms.load(Ordering::Relaxed);
        let interval = u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX);

        if elapsed.saturating_sub(last) < interval {
            return;
        }
        // Only one caller sweeps per interval
        if self
            .last_sweep_ms
            .compare_exchange(last, elapsed, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            self.evict_expired();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_token_round_trip() {
        let signer = TokenSigner::new(b"test-secret", DEFAULT_TOKEN_TTL_SECS);
        let token = signer.create_token("user-1", "gm:alice").unwrap();

        let user = signer.validate_token(&token).unwrap();
        assert_eq!(user.user_id, "user-1");
        assert_eq!(user.username, "gm:alice");
    }

    #[test]
    fn test_token_rejects_other_secret() {
        let signer = TokenSigner::new(b"one", DEFAULT_TOKEN_TTL_SECS);
        let other = TokenSigner::new(b"two", DEFAULT_TOKEN_TTL_SECS);
        let token = signer.create_token("user-1", "alice").unwrap();

        assert!(other.validate_token(&token).is_none());
        assert!(signer.validate_token("not-a-token").is_none());
    }

    #[test]
    fn test_token_expiry() {
        let signer = TokenSigner::new(b"secret", DEFAULT_TOKEN_TTL_SECS);
        let expired = signer
            .create_token_with_expiry("user-1", "alice", Utc::now().timestamp() - 10)
            .unwrap();
        assert!(signer.validate_token(&expired).is_none());
    }

    #[test]
    fn test_authenticate_header() {
        let signer = TokenSigner::with_random_secret(60);
        let token = signer.create_token("user-9", "bob").unwrap();

        let mut headers = HeaderMap::new();
        assert!(matches!(signer.authenticate(&headers), Err(ApiError::Unauthorized(_))));

        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        assert_eq!(signer.authenticate(&headers).unwrap().username, "bob");
    }

    #[test]
    fn test_rate_limiter_window() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.1"));
        limiter.record_failure("10.0.0.1");
        assert!(!limiter.check("10.0.0.1"));

        // Other clients are unaffected
        assert!(limiter.check("10.0.0.2"));
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_rate_limiter_forgets_idle_clients() {
        let limiter = RateLimiter::new(1, Duration::from_millis(50));
        assert!(limiter.check("10.0.0.1"));
        assert!(!limiter.check("10.0.0.1"));
        limiter.record_failure("10.0.0.2");
        assert_eq!(limiter.tracked_clients(), 2);

        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(limiter.evict_expired(), 2);
        assert_eq!(limiter.tracked_clients(), 0);

        // A new window opens after expiry
        assert!(limiter.check("10.0.0.1"));
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_rate_limiter_sweeps_during_check() {
        let limiter = RateLimiter::new(5, Duration::from_millis(30));
        for n in 0..20 {
            limiter.check(&format!("10.0.1.{}", n));
        }
        assert_eq!(limiter.tracked_clients(), 20);

        std::thread::sleep(Duration::from_millis(70));
        assert!(limiter.check("10.0.2.1"));
        assert_eq!(limiter.tracked_clients(), 1);
    }
}

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use rand::Rng;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

const MAX_ATTEMPTS: u8 = 5;

struct PendingCode {
    digest: [u8; 32],
    expires_at: Instant,
    attempts: u8,
}

/// One-time codes keyed by phone number. At most one live code per number;
/// a matching verification consumes it.
#[derive(Clone)]
pub struct OtpStore {
    ttl: Duration,
    pending: Arc<Mutex<HashMap<String, PendingCode>>>,
}

impl OtpStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Creates a fresh six digit code, replacing any earlier one.
    pub async fn issue(&self, phone_number: &str) -> String {
        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));
        self.store(phone_number, &code).await;
        code
    }

    async fn store(&self, phone_number: &str, code: &str) {
        let now = Instant::now();
        let mut pending = self.pending.lock().await;
        pending.retain(|_, entry| entry.expires_at > now);
        pending.insert(
            normalize_phone(phone_number),
            PendingCode {
                digest: digest(code),
                expires_at: now + self.ttl,
                attempts: 0,
            },
        );
    }

    pub async fn verify(&self, phone_number: &str, code: &str) -> bool {
        let key = normalize_phone(phone_number);
        let mut pending = self.pending.lock().await;
        let Some(entry) = pending.get_mut(&key) else {
            return false;
        };
        if entry.expires_at <= Instant::now() {
            pending.remove(&key);
            return false;
        }
        if entry.digest == digest(code.trim()) {
            pending.remove(&key);
            return true;
        }
        entry.attempts += 1;
        if entry.attempts >= MAX_ATTEMPTS {
            pending.remove(&key);
        }
        false
    }
}

pub fn normalize_phone(phone_number: &str) -> String {
    phone_number
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect()
}

fn digest(code: &str) -> [u8; 32] {
    Sha256::digest(code.as_bytes()).into()
}

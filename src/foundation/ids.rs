use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

static NEXT_REQUEST: AtomicU64 = AtomicU64::new(0);

/// Short per-request correlation token threaded through logs and error bodies.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    /// 8 lowercase hex characters, unique per process for practical purposes.
    pub fn generate() -> Self {
        let seq = NEXT_REQUEST.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();

        let mut seed = [0u8; 16];
        seed[..8].copy_from_slice(&nanos.to_le_bytes());
        seed[8..].copy_from_slice(&seq.to_le_bytes());
        let h = xxhash_rust::xxh3::xxh3_64(&seed);
        Self(format!("{:08x}", (h >> 32) as u32))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

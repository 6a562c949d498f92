//! Authorization key generation.
//!
//! Keys are short and advisory: they make casual guessing within one
//! rotation window impractical, nothing more.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

/// Length of a generated key.
pub const KEY_LEN: usize = 8;

/// Base-36 alphabet, matching the look of the codes shown on the teacher page.
const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Produces the per-code authorization key.
pub trait KeyGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Key generator drawing from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomKeyGenerator;

impl KeyGenerator for RandomKeyGenerator {
    fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..KEY_LEN)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect()
    }
}

/// Deterministic key generator for tests.
/// WARNING: keys are predictable (`mock0000`, `mock0001`, ...).
#[derive(Debug, Default)]
pub struct MockKeyGenerator {
    counter: AtomicU64,
}

impl MockKeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyGenerator for MockKeyGenerator {
    fn generate(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("mock{:04}", n % 10_000)
    }
}

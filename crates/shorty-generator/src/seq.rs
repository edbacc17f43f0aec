use crate::Generator;
use shorty_core::ShortCode;
use std::sync::atomic::{AtomicU64, Ordering};

const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const WIDTH: usize = 6;

/// A deterministic generator counting upwards in lower-case base36.
///
/// Produces `"wh000000"`, `"wh000001"`, ... `"wh00000z"`, `"wh000010"`.
/// Digits have no upper-case twins, so no two counter values fold onto
/// the same code. Counters past 36^6 simply grow wider. Handy for tests and for
/// single-node deployments that want reproducible codes; each node
/// should use its own prefix.
#[derive(Debug)]
pub struct SeqGenerator {
    counter: AtomicU64,
    prefix: String,
}

impl Clone for SeqGenerator {
    fn clone(&self) -> Self {
        Self {
            counter: AtomicU64::new(self.counter.load(Ordering::SeqCst)),
            prefix: self.prefix.clone(),
        }
    }
}

impl SeqGenerator {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self::with_offset(prefix, 0)
    }

    /// Starts counting at `offset`, e.g. to resume after a restart.
    pub fn with_offset(prefix: impl Into<String>, offset: u64) -> Self {
        Self {
            counter: AtomicU64::new(offset),
            prefix: prefix.into(),
        }
    }
}

fn encode_base36(mut value: u64) -> String {
    let mut buf = Vec::with_capacity(WIDTH);
    while value > 0 {
        buf.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    while buf.len() < WIDTH {
        buf.push(b'0');
    }
    buf.reverse();
    buf.into_iter().map(char::from).collect()
}

impl Generator for SeqGenerator {
    fn generate(&self) -> ShortCode {
        let count = self.counter.fetch_add(1, Ordering::SeqCst);
        ShortCode::new(format!("{}{}", self.prefix, encode_base36(count)))
    }
}

//! Human-friendly code generation for keys, invitations and agent codes.
//!
//! All codes come from [`CodeGenerator`], which owns the process-wide
//! sequence counter. Randomness is drawn from the OS; if that source fails the
//! generator falls back to a time-seeded PRNG and logs a warning, it never
//! returns an error.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};

/// Full alphabet for plain random codes.
pub const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Alphabet without `0`, `1`, `O`, `I`, `L`.
pub const UNAMBIGUOUS_CHARSET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

const AMBIGUOUS: &[char] = &['0', '1', 'O', 'I', 'L'];

pub const INVITE_CODE_LEN: usize = 8;
pub const AGENT_CODE_LEN: usize = 6;
pub const SHARE_CODE_LEN: usize = 16;
pub const ACTIVATION_CODE_LEN: usize = 8;
const COMPOSITE_RANDOM_LEN: usize = 4;

#[derive(Debug, Default)]
pub struct CodeGenerator {
    counter: AtomicU64,
}

impl CodeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the shared sequence and return the new value.
    fn next_sequence(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn random_bytes(&self, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        if let Err(e) = OsRng.try_fill_bytes(&mut buf) {
            tracing::warn!("OS randomness unavailable, using time-seeded fallback: {}", e);
            let seed = nanos_now() ^ self.counter.load(Ordering::Relaxed);
            StdRng::seed_from_u64(seed).fill_bytes(&mut buf);
        }
        buf
    }

    fn draw(&self, len: usize, alphabet: &[u8]) -> String {
        self.random_bytes(len)
            .into_iter()
            .map(|b| char::from(alphabet[usize::from(b) % alphabet.len()]))
            .collect()
    }

    /// `length` characters drawn from [`CHARSET`].
    pub fn random_code(&self, length: usize) -> String {
        self.draw(length, CHARSET)
    }

    pub fn invite_code(&self) -> String {
        self.random_code(INVITE_CODE_LEN)
    }

    pub fn agent_code(&self) -> String {
        self.random_code(AGENT_CODE_LEN)
    }

    /// Activation code for keys minted by a salesperson:
    /// `KEY` + base36(nanos) + base36(sequence) + 4 random chars.
    pub fn salesperson_key_code(&self) -> String {
        self.composite("KEY")
    }

    /// Share code for keys minted by a salesperson, `CODE`-prefixed.
    pub fn salesperson_sale_code(&self) -> String {
        self.composite("CODE")
    }

    fn composite(&self, tag: &str) -> String {
        let seq = self.next_sequence();
        format!(
            "{}{}{}{}",
            tag,
            to_base36(nanos_now()),
            to_base36(seq),
            self.random_code(COMPOSITE_RANDOM_LEN)
        )
    }

    /// Exactly `length` characters with no visually confusable characters.
    pub fn unambiguous_code(&self, length: usize) -> String {
        self.next_sequence();
        let mut code: String = self
            .random_code(length)
            .chars()
            .filter(|c| !AMBIGUOUS.contains(c))
            .collect();
        if code.len() < length {
            code.push_str(&self.draw(length - code.len(), UNAMBIGUOUS_CHARSET));
        }
        code.truncate(length);
        code
    }

    /// Admin share code, `XXXX-XXXX-XXXX-XXXX`.
    pub fn share_code(&self) -> String {
        group(&self.unambiguous_code(SHARE_CODE_LEN), 4)
    }

    /// Admin activation code, 8 unambiguous characters.
    pub fn activation_code(&self) -> String {
        self.unambiguous_code(ACTIVATION_CODE_LEN)
    }
}

fn nanos_now() -> u64 {
    Utc::now()
        .timestamp_nanos_opt()
        .and_then(|n| u64::try_from(n).ok())
        .unwrap_or_default()
}

pub fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

fn group(code: &str, size: usize) -> String {
    code.as_bytes()
        .chunks(size)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join("-")
}

//! Content fingerprints for render caching
//!
//! A fingerprint is a SHA-256 digest over a canonical encoding of a JSON
//! payload. Object keys are visited in sorted order so two payloads that only
//! differ in key insertion order hash identically.

use std::fmt;

use serde_json::{Number, Value};
use sha2::{Digest, Sha256};

/// Number of digest bytes kept in the hex fingerprint
const FINGERPRINT_BYTES: usize = 16;

/// Largest magnitude below which every integral `f64` is exact
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Stable hash of a data payload
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the fingerprint of `data`.
pub fn fingerprint(data: &Value) -> Fingerprint {
    let mut hasher = Sha256::new();
    write_value(&mut hasher, data);
    let digest = hasher.finalize();
    Fingerprint(hex::encode(&digest[..FINGERPRINT_BYTES]))
}

// Each value is prefixed with a type tag and strings are length-prefixed so
// that distinct structures can never produce the same byte stream.
fn write_value(h: &mut Sha256, v: &Value) {
    match v {
        Value::Null => h.update([0u8]),
        Value::Bool(b) => h.update([1u8, u8::from(*b)]),
        Value::Number(n) => {
            h.update([2u8]);
            write_str(h, &number_text(n));
        }
        Value::String(s) => {
            h.update([3u8]);
            write_str(h, s);
        }
        Value::Array(items) => {
            h.update([4u8]);
            h.update((items.len() as u64).to_le_bytes());
            for item in items {
                write_value(h, item);
            }
        }
        Value::Object(map) => {
            h.update([5u8]);
            h.update((map.len() as u64).to_le_bytes());
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                write_str(h, key);
                write_value(h, &map[key.as_str()]);
            }
        }
    }
}

/// Integral floats are written as integers so `1` and `1.0` hash alike.
fn number_text(n: &Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < MAX_EXACT_INTEGER => (f as i64).to_string(),
        _ => n.to_string(),
    }
}

fn write_str(h: &mut Sha256, s: &str) {
    h.update((s.len() as u64).to_le_bytes());
    h.update(s.as_bytes());
}

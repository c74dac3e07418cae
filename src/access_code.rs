//! Access codes handed out to participants
//!
//! A code is `<name><anniversary digits>-<suffix>`, lowercased with whitespace
//! removed. The base is predictable; the random suffix is what keeps one
//! participant from guessing another's code. Once a suffix is stored on a
//! participant it must never change, or the code already handed out stops
//! working.

use rand::Rng;

/// Characters a suffix is drawn from
pub const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

pub const SUFFIX_LENGTH: usize = 6;

/// The deterministic part of a code.
pub fn base(name: &str, anniversary: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .chain(anniversary.chars().filter(|c| *c != '/'))
        .collect::<String>()
        .to_lowercase()
}

/// Build a code, drawing a fresh suffix when none is supplied.
pub fn generate(name: &str, anniversary: &str, suffix: Option<&str>) -> String {
    let suffix = match suffix {
        Some(suffix) => suffix.to_string(),
        None => random_suffix(SUFFIX_LENGTH),
    };
    format!("{}-{}", base(name, anniversary), suffix)
}

/// Uniform sample from [`SUFFIX_ALPHABET`]. Not cryptographically strong.
pub fn random_suffix(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect()
}

/// Lowercase with all whitespace removed; codes compare in this form.
pub fn canonical(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

pub fn matches(submitted: &str, expected: &str) -> bool {
    let submitted = canonical(submitted);
    !submitted.is_empty() && submitted == canonical(expected)
}

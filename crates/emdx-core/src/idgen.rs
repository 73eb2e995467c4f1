//! Execution id, branch slug, and short-hash generation.

use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use num_traits::Zero;
use sha2::{Digest, Sha256};

/// Base36 alphabet (0-9, a-z).
const BASE36_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Leading phrases stripped from prompts before slugging.
///
/// Ordered longest-first so compound prefixes strip before their parts.
const SLUG_STOP_PREFIXES: &[&str] = &[
    "could you please",
    "can you please",
    "i would like to",
    "i want you to",
    "i need you to",
    "could you",
    "can you",
    "please",
    "help me",
    "go ahead and",
    "let's",
    "lets",
];

/// Maximum words kept in a slug.
const SLUG_MAX_WORDS: usize = 5;

/// Maximum slug length in bytes.
const SLUG_MAX_LEN: usize = 40;

/// Converts a byte slice to a base36 string of the specified length.
pub fn encode_base36(data: &[u8], length: usize) -> String {
    let mut num = BigUint::from_bytes_be(data);
    let base = BigUint::from(36u32);
    let zero = BigUint::zero();

    let mut chars: Vec<u8> = Vec::with_capacity(length);
    while num > zero {
        let rem = &num % &base;
        num /= &base;
        let digits = rem.to_u32_digits();
        let i = if digits.is_empty() { 0 } else { digits[0] as usize };
        chars.push(BASE36_ALPHABET[i]);
    }
    chars.reverse();

    let mut s = String::from_utf8(chars).expect("base36 chars are valid UTF-8");
    if s.len() < length {
        s = "0".repeat(length - s.len()) + &s;
    }
    if s.len() > length {
        s = s[s.len() - length..].to_owned();
    }
    s
}

/// Generates a unique execution id from wall-clock millis, the host pid,
/// and a hash-derived random suffix.
///
/// Format: `<millis>-<pid>-<base36(6)>`. The nonce lets callers retry on
/// the (vanishingly rare) collision without waiting for the clock to move.
pub fn generate_execution_id(now: DateTime<Utc>, pid: u32, nonce: u32) -> String {
    let millis = now.timestamp_millis();
    let seed = format!("{millis}|{pid}|{nonce}");
    let hash = Sha256::digest(seed.as_bytes());
    let suffix = encode_base36(&hash[..4], 6);
    format!("{millis}-{pid}-{suffix}")
}

/// Derives a filesystem/branch-safe slug from a prompt.
///
/// Strips the curated stop-prefixes, keeps the first few words, lowercases,
/// and joins with hyphens. Falls back to "task" for prompts that slug to
/// nothing.
pub fn slug_from_prompt(prompt: &str) -> String {
    let mut text = prompt.trim().to_lowercase();

    // Strip stop-prefixes repeatedly; "could you please fix" sheds two.
    loop {
        let mut stripped = false;
        for prefix in SLUG_STOP_PREFIXES {
            if let Some(rest) = text.strip_prefix(prefix) {
                let rest = rest.trim_start_matches([' ', ',', ':']);
                if !rest.is_empty() {
                    text = rest.to_owned();
                    stripped = true;
                    break;
                }
            }
        }
        if !stripped {
            break;
        }
    }

    let words: Vec<String> = text
        .split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
        })
        .filter(|w| !w.is_empty())
        .take(SLUG_MAX_WORDS)
        .collect();

    let mut slug = words.join("-");
    if slug.len() > SLUG_MAX_LEN {
        slug.truncate(SLUG_MAX_LEN);
        slug = slug.trim_end_matches('-').to_owned();
    }
    if slug.is_empty() {
        slug = "task".to_owned();
    }
    slug
}

/// Hex short-hash of arbitrary input, for branch and worktree names.
pub fn short_hash(input: &str, length: usize) -> String {
    let hash = Sha256::digest(input.as_bytes());
    let hex: String = hash.iter().map(|b| format!("{b:02x}")).collect();
    hex[..length.min(hex.len())].to_owned()
}

/// Builds a branch name `<prefix>/<slug>-<5hex>` for a delegate run.
///
/// The nonce feeds the hash so collision retries get a fresh suffix.
pub fn branch_name(prefix: &str, prompt: &str, nonce: u32) -> String {
    let slug = slug_from_prompt(prompt);
    let suffix = short_hash(&format!("{prompt}|{nonce}"), 5);
    format!("{prefix}/{slug}-{suffix}")
}

/// Builds a worktree directory name `<slug>-<shorthash>` for a delegate run.
pub fn worktree_name(prompt: &str, execution_id: &str) -> String {
    let slug = slug_from_prompt(prompt);
    let suffix = short_hash(execution_id, 8);
    format!("{slug}-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn encode_base36_basic() {
        assert_eq!(encode_base36(&[], 4), "0000");
        assert_eq!(encode_base36(&[0xFF, 0xFF], 4).len(), 4);
    }

    #[test]
    fn execution_id_format() {
        let now = Utc::now();
        let id = generate_execution_id(now, 4242, 0);
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1], "4242");
        assert_eq!(parts[2].len(), 6);
    }

    #[test]
    fn execution_id_nonce_changes_suffix() {
        let now = Utc::now();
        let a = generate_execution_id(now, 1, 0);
        let b = generate_execution_id(now, 1, 1);
        assert_ne!(a, b);
    }

    #[test]
    fn slug_strips_stop_prefixes() {
        assert_eq!(
            slug_from_prompt("please fix the login timeout bug"),
            "fix-the-login-timeout-bug"
        );
        assert_eq!(
            slug_from_prompt("Could you please add retry logic to the client"),
            "add-retry-logic-to-the"
        );
    }

    #[test]
    fn slug_drops_punctuation() {
        assert_eq!(
            slug_from_prompt("Refactor: storage/engine (v2)!"),
            "refactor-storageengine-v2"
        );
    }

    #[test]
    fn slug_never_empty() {
        assert_eq!(slug_from_prompt("   "), "task");
        assert_eq!(slug_from_prompt("???"), "task");
    }

    #[test]
    fn branch_name_shape() {
        let name = branch_name("emdx", "please fix the bug", 0);
        assert!(name.starts_with("emdx/fix-the-bug-"));
        let suffix = name.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 5);
    }

    #[test]
    fn branch_name_nonce_varies() {
        let a = branch_name("emdx", "fix the bug", 0);
        let b = branch_name("emdx", "fix the bug", 1);
        assert_ne!(a, b);
    }

    #[test]
    fn worktree_name_deterministic() {
        let a = worktree_name("fix the bug", "1712-1-abcdef");
        let b = worktree_name("fix the bug", "1712-1-abcdef");
        assert_eq!(a, b);
    }
}

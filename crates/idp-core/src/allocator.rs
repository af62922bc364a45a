use idp_store::DocumentStore;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::error::Error;

/// Identifiers are generated from an ambiguity-free alphabet (no `0`/`O`,
/// `1`/`I`/`l`), spec.md §6.
const V3_ALPHABET: &[u8] = b"abcdefghijkmnopqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const V3_LENGTH: usize = 23;

/// Bound on the probe-until-unique loop (spec.md §9's redesign flag:
/// "the current unbounded loop is a latent hazard under heavy collision").
pub const DEFAULT_MAX_ATTEMPTS: u32 = 64;

/// `freshV3()`: draw a 23-character candidate and probe the store until one
/// is unused. Grounded on `controller.py::_get_unique_v3`'s probe loop,
/// bounded per the redesign flag above instead of looping forever.
pub fn fresh_v3(store: &DocumentStore, max_attempts: u32) -> Result<String, Error> {
    let mut rng = SmallRng::from_entropy();
    for _ in 0..max_attempts {
        let candidate = generate_v3(&mut rng);
        if !store.exists_v3(&candidate)? {
            return Ok(candidate);
        }
    }
    Err(Error::AllocatorExhausted(max_attempts))
}

fn generate_v3(rng: &mut impl Rng) -> String {
    (0..V3_LENGTH).map(|_| V3_ALPHABET[rng.gen_range(0..V3_ALPHABET.len())] as char).collect()
}

/// `freshV2(issn, year)`: format `S{issn}{year}{9-digit suffix}` and probe
/// the store until unique. Fails with `CannotAllocateV2` when either input
/// is missing (spec.md §4.2).
pub fn fresh_v2(store: &DocumentStore, issn: &str, year: &str, max_attempts: u32) -> Result<String, Error> {
    if issn.is_empty() || year.is_empty() {
        return Err(Error::CannotAllocateV2);
    }
    let issn_digits: String = issn.chars().filter(char::is_ascii_digit).collect();
    for _ in 0..max_attempts {
        let candidate = format!("S{issn_digits}{year}{}", v2_suffix()).to_uppercase();
        if !store.exists_v2(&candidate)? {
            return Ok(candidate);
        }
    }
    Err(Error::AllocatorExhausted(max_attempts))
}

/// Digits of the current Unix timestamp, discarding the first five and
/// zero-padding the remainder on the right to nine digits (spec.md §4.2).
fn v2_suffix() -> String {
    let ts = time::OffsetDateTime::now_utc().unix_timestamp().max(0) as u64;
    let ts_str = ts.to_string();
    let tail = if ts_str.len() > 5 { &ts_str[5..] } else { "" };
    format!("{tail:0<9}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_v3_has_expected_length_and_alphabet() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path(), 10 * 1024 * 1024).unwrap();
        let v3 = fresh_v3(&store, DEFAULT_MAX_ATTEMPTS).unwrap();
        assert_eq!(v3.len(), V3_LENGTH);
        assert!(v3.bytes().all(|b| V3_ALPHABET.contains(&b)));
    }

    #[test]
    fn fresh_v2_rejects_missing_issn_or_year() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path(), 10 * 1024 * 1024).unwrap();
        assert!(matches!(fresh_v2(&store, "", "2022", DEFAULT_MAX_ATTEMPTS), Err(Error::CannotAllocateV2)));
        assert!(matches!(fresh_v2(&store, "12349876", "", DEFAULT_MAX_ATTEMPTS), Err(Error::CannotAllocateV2)));
    }

    #[test]
    fn fresh_v2_matches_format() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path(), 10 * 1024 * 1024).unwrap();
        let v2 = fresh_v2(&store, "1234-9876", "2022", DEFAULT_MAX_ATTEMPTS).unwrap();
        assert!(v2.starts_with("S123498762022"));
        assert_eq!(v2.len(), 1 + 8 + 4 + 9);
    }
}

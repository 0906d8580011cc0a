//! Random identifier generation for scan tokens, checkpoint codes and
//! attendee IDs.
//!
//! Generation only proposes candidates. Uniqueness is decided by the store,
//! which inserts with a conflict guard and asks for a new candidate when the
//! value is already taken.

use rand::Rng;

/// Alphabet for scan tokens and checkpoint codes: uppercase ASCII letters
/// and digits.
pub const SCAN_TOKEN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of a generated scan token.
pub const SCAN_TOKEN_LEN: usize = 12;

/// Length of a generated checkpoint code.
pub const CHECKPOINT_CODE_LEN: usize = 16;

/// How many candidates a store should try before giving up.
pub const MAX_GENERATION_ATTEMPTS: usize = 16;

/// Draw `len` characters uniformly from a non-empty `alphabet`.
pub fn random_string(rng: &mut impl Rng, alphabet: &[u8], len: usize) -> String {
  (0..len)
    .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn random_string_respects_length_and_alphabet() {
    let mut rng = rand::thread_rng();
    for _ in 0..100 {
      let s = random_string(&mut rng, SCAN_TOKEN_ALPHABET, SCAN_TOKEN_LEN);
      assert_eq!(s.len(), SCAN_TOKEN_LEN);
      assert!(s.bytes().all(|b| SCAN_TOKEN_ALPHABET.contains(&b)), "{s}");
    }
  }

  #[test]
  fn digits_only_alphabet() {
    let s = random_string(&mut rand::thread_rng(), b"0123456789", 5);
    assert_eq!(s.len(), 5);
    assert!(s.bytes().all(|b| b.is_ascii_digit()));
  }

  #[test]
  fn every_symbol_is_reachable() {
    let s = random_string(&mut rand::thread_rng(), b"AB", 256);
    assert!(s.contains('A') && s.contains('B'));
  }
}

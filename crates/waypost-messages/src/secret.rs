//! Delete-key generation.

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Length of a delete key, in characters.
pub const DELETE_KEY_LEN: usize = 64;

/// Generates a fresh delete key: 64 characters sampled uniformly from
/// the 62-symbol alphanumeric alphabet.
///
/// Called exactly once per successful message creation. The key does
/// not need to be cryptographically secure, but at ~381 bits of entropy
/// it is not guessable through the rate-limited deletion endpoint.
pub fn delete_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(DELETE_KEY_LEN)
        .map(char::from)
        .collect()
}

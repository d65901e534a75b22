//! Second-factor challenge-response seam.
//!
//! The engine never talks to hardware. It hands the vault's shared 64-byte
//! challenge to an implementation of [`SecondFactor`] and combines the
//! response into the KEK (see [`crate::crypto::combine_with_second_factor`]).

use std::time::Duration;

use zeroize::Zeroizing;

use crate::error::Result;
use crate::keyslot::CHALLENGE_SIZE;

/// A challenge-response device such as an HMAC token.
///
/// Implementations make one blocking attempt bounded by `timeout`; the
/// engine never retries.
pub trait SecondFactor: Send + Sync {
    /// Answer `challenge`.
    ///
    /// # Errors
    ///
    /// `SecondFactorUnavailable` when no device is present,
    /// `SecondFactorFailed` on timeout or a device error.
    fn respond(
        &self,
        challenge: &[u8; CHALLENGE_SIZE],
        timeout: Duration,
    ) -> Result<Zeroizing<Vec<u8>>>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use sha2::{Digest, Sha256};

    /// Answers with SHA-256(secret || challenge).
    pub(crate) struct FakeToken {
        pub(crate) secret: Vec<u8>,
    }

    impl SecondFactor for FakeToken {
        fn respond(
            &self,
            challenge: &[u8; CHALLENGE_SIZE],
            _timeout: Duration,
        ) -> Result<Zeroizing<Vec<u8>>> {
            let mut hasher = Sha256::new();
            hasher.update(&self.secret);
            hasher.update(challenge);
            Ok(Zeroizing::new(hasher.finalize().to_vec()))
        }
    }
}

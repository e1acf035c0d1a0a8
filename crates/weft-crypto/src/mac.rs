//! Pooled CBC-MAC over AES-128.
//!
//! Hop-field authentication runs on every forwarded packet, concurrently
//! from many pipeline workers, so the expensive part — the expanded AES key
//! schedule — is shared through a pool of reusable chaining contexts. A
//! context's chaining state is reset to the fixed IV before it re-enters
//! the pool; a context handed out with residual state from a prior caller
//! would produce tags that depend on unrelated packets.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;

use crate::error::CryptoError;

/// AES block size in bytes; also the length of a full MAC tag.
pub const BLOCK_SIZE: usize = 16;

/// Key length for AES-128.
pub const KEY_SIZE: usize = 16;

/// The fixed chaining seed every context starts from and is reset to.
const IV: [u8; BLOCK_SIZE] = [0u8; BLOCK_SIZE];

/// One reusable chained-encryption context.
struct MacContext {
    cipher: Aes128,
    chain: [u8; BLOCK_SIZE],
}

impl MacContext {
    fn new(cipher: Aes128) -> Self {
        Self { cipher, chain: IV }
    }

    /// CBC-encrypt `msg` in place and return the final ciphertext block.
    /// `msg` must already be block-aligned.
    fn encrypt(&mut self, msg: &mut [u8]) -> [u8; BLOCK_SIZE] {
        for block in msg.chunks_exact_mut(BLOCK_SIZE) {
            for (b, c) in block.iter_mut().zip(self.chain.iter()) {
                *b ^= c;
            }
            self.cipher
                .encrypt_block(GenericArray::from_mut_slice(block));
            self.chain.copy_from_slice(block);
        }
        let mut tag = [0u8; BLOCK_SIZE];
        tag.copy_from_slice(&msg[msg.len() - BLOCK_SIZE..]);
        tag
    }

    /// Restore the chaining state to the fixed IV.
    fn reset(&mut self) {
        self.chain = IV;
    }
}

/// Shared pool of reusable CBC-MAC contexts.
///
/// The key schedule is expanded once at construction; each pooled context
/// owns its own cipher copy, so concurrent computations never share
/// chaining state. Access follows acquire → use → reset → release, and the
/// reset happens before release — contexts in the freelist are always
/// clean.
pub struct MacPool {
    cipher: Aes128,
    free: Mutex<Vec<MacContext>>,
}

impl fmt::Debug for MacPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MacPool").finish_non_exhaustive()
    }
}

impl MacPool {
    /// Expand the AES-128 key schedule and create an empty pool.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let key: &[u8; KEY_SIZE] =
            key.try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: KEY_SIZE,
                    actual: key.len(),
                })?;
        Ok(Self {
            cipher: Aes128::new(key.into()),
            free: Mutex::new(Vec::new()),
        })
    }

    /// Compute the CBC-MAC of `msg`, which must be a non-empty multiple of
    /// [`BLOCK_SIZE`] bytes — anything else is a
    /// [`CryptoError::BlockAlignment`], never silently truncated or padded.
    ///
    /// The message is encrypted **in place**; callers that still need the
    /// plaintext must copy it first. The tag is the final ciphertext block.
    pub fn compute_mac(&self, msg: &mut [u8]) -> Result<[u8; BLOCK_SIZE], CryptoError> {
        if msg.is_empty() || !msg.len().is_multiple_of(BLOCK_SIZE) {
            return Err(CryptoError::BlockAlignment {
                len: msg.len(),
                block_size: BLOCK_SIZE,
            });
        }
        let mut ctx = self.acquire();
        let tag = ctx.encrypt(msg);
        ctx.reset();
        self.release(ctx);
        Ok(tag)
    }

    /// Number of idle contexts currently pooled.
    pub fn idle(&self) -> usize {
        self.lock_free().len()
    }

    fn acquire(&self) -> MacContext {
        match self.lock_free().pop() {
            Some(ctx) => ctx,
            None => MacContext::new(self.cipher.clone()),
        }
    }

    fn release(&self, ctx: MacContext) {
        self.lock_free().push(ctx);
    }

    fn lock_free(&self) -> std::sync::MutexGuard<'_, Vec<MacContext>> {
        // A context is only ever in the freelist after reset, so a panic in
        // another caller cannot leave dirty state behind.
        self.free.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod support {
    use super::*;

    /// Independent one-shot CBC reference: encrypt with the `cbc` crate and
    /// take the final block.
    pub fn reference_mac(key: &[u8; KEY_SIZE], msg: &[u8]) -> [u8; BLOCK_SIZE] {
        use cbc::cipher::block_padding::NoPadding;
        use cbc::cipher::{BlockEncryptMut, KeyIvInit};

        let enc = cbc::Encryptor::<Aes128>::new(key.into(), (&IV).into());
        let mut out = vec![0u8; msg.len()];
        enc.encrypt_padded_b2b_mut::<NoPadding>(msg, &mut out)
            .expect("output buffer is block-aligned and same size as input");
        let mut tag = [0u8; BLOCK_SIZE];
        tag.copy_from_slice(&out[out.len() - BLOCK_SIZE..]);
        tag
    }
}


#[cfg(test)]
mod proptests {
    use super::support::reference_mac;
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn pooled_mac_matches_reference(
            key in any::<[u8; KEY_SIZE]>(),
            blocks in 1usize..8,
            seed in any::<u8>(),
        ) {
            let pool = MacPool::new(&key).unwrap();
            let msg: Vec<u8> = (0..blocks * BLOCK_SIZE)
                .map(|i| seed.wrapping_add(i as u8))
                .collect();
            let mut buf = msg.clone();
            let tag = pool.compute_mac(&mut buf).unwrap();
            prop_assert_eq!(tag, reference_mac(&key, &msg));
        }
    }
}

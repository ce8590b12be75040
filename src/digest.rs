//! The multi-algorithm digest aggregator, `DigestContext`.
//!
//! A single signing session may need to feed the same message bytes to
//! several different hash algorithms at once -- e.g. a DSA recipient
//! needs SHA-1 while an RSA-v3 recipient needs MD5 -- and later fork off
//! an independent branch per signature so that each signature's trailer
//! can be hashed without disturbing the others. This mirrors
//! `sequoia_openpgp::crypto::hash::Context`, generalized from "one
//! algorithm" to "a set of concurrently updated algorithms".

use std::collections::BTreeMap;

use digest::Digest;

use crate::types::HashAlgorithm;

/// One concrete hash algorithm's running state.
///
/// Mirrors the `nettle::Hash` trait wrapped by
/// `crypto::hash::Context` in sequoia-openpgp: update in place, read
/// out the digest size, and clone the state without consuming it.
trait HashState: Send {
    fn update(&mut self, data: &[u8]);
    fn digest_size(&self) -> usize;
    /// Writes the digest into `out` without resetting the internal
    /// state -- callers that need to keep accumulating call `update`
    /// again afterwards only via a fresh `clone()`.
    fn digest(&self, out: &mut [u8]);
    fn box_clone(&self) -> Box<dyn HashState>;
}

macro_rules! hash_state_impl {
    ($name:ident, $inner:ty) => {
        #[derive(Clone)]
        struct $name($inner);

        impl HashState for $name {
            fn update(&mut self, data: &[u8]) {
                Digest::update(&mut self.0, data);
            }
            fn digest_size(&self) -> usize {
                <$inner as Digest>::output_size()
            }
            fn digest(&self, out: &mut [u8]) {
                let result = self.0.clone().finalize();
                let n = out.len().min(result.len());
                out[..n].copy_from_slice(&result[..n]);
            }
            fn box_clone(&self) -> Box<dyn HashState> {
                Box::new(self.clone())
            }
        }
    };
}

hash_state_impl!(Md5State, md5::Md5);
hash_state_impl!(Sha1State, sha1::Sha1);
hash_state_impl!(Sha224State, sha2::Sha224);
hash_state_impl!(Sha256State, sha2::Sha256);
hash_state_impl!(Sha384State, sha2::Sha384);
hash_state_impl!(Sha512State, sha2::Sha512);

fn new_state(algo: HashAlgorithm) -> Box<dyn HashState> {
    match algo {
        HashAlgorithm::MD5 => Box::new(Md5State(md5::Md5::new())),
        HashAlgorithm::SHA1 => Box::new(Sha1State(sha1::Sha1::new())),
        HashAlgorithm::SHA224 => Box::new(Sha224State(sha2::Sha224::new())),
        HashAlgorithm::SHA256 => Box::new(Sha256State(sha2::Sha256::new())),
        HashAlgorithm::SHA384 => Box::new(Sha384State(sha2::Sha384::new())),
        HashAlgorithm::SHA512 => Box::new(Sha512State(sha2::Sha512::new())),
    }
}

/// A digest context with zero or more enabled algorithms.
///
/// `write` fans out to every enabled algorithm. `clone` deep-copies every
/// branch's running state, which is how one pass over the input can
/// serve N differently-trailered signatures.
pub struct DigestContext {
    branches: BTreeMap<HashAlgorithm, Branch>,
}

struct Branch {
    state: Box<dyn HashState>,
    finalized: bool,
}

impl Clone for DigestContext {
    fn clone(&self) -> Self {
        DigestContext {
            branches: self
                .branches
                .iter()
                .map(|(algo, b)| {
                    (
                        *algo,
                        Branch {
                            state: b.state.box_clone(),
                            finalized: b.finalized,
                        },
                    )
                })
                .collect(),
        }
    }
}

impl DigestContext {
    /// Opens a digest context with no algorithms enabled.
    pub fn open() -> Self {
        DigestContext {
            branches: BTreeMap::new(),
        }
    }

    /// Enables `algo`. Idempotent. Callers must finish selecting
    /// algorithms before the first `write`; enabling one after hashing
    /// has started would silently under-hash it.
    pub fn enable(&mut self, algo: HashAlgorithm) {
        self.branches
            .entry(algo)
            .or_insert_with(|| Branch {
                state: new_state(algo),
                finalized: false,
            });
    }

    /// Is `algo` enabled on this context?
    pub fn is_enabled(&self, algo: HashAlgorithm) -> bool {
        self.branches.contains_key(&algo)
    }

    /// Feeds `data` to every enabled, non-finalized algorithm.
    pub fn write(&mut self, data: &[u8]) {
        for branch in self.branches.values_mut() {
            if !branch.finalized {
                branch.state.update(data);
            }
        }
    }

    /// Returns an independent copy of this context, including every
    /// algorithm's running state.
    pub fn clone_context(&self) -> Self {
        self.clone()
    }

    /// Finalizes `algo`'s branch and returns its digest. Terminal: no
    /// further `write` reaches this branch afterwards.
    pub fn finalize(&mut self, algo: HashAlgorithm) -> crate::error::Result<Vec<u8>> {
        let branch = self.branches.get_mut(&algo).ok_or_else(|| {
            crate::error::Error::Bug(format!("{algo} was never enabled"))
        })?;
        let mut out = vec![0u8; branch.state.digest_size()];
        branch.state.digest(&mut out);
        branch.finalized = true;
        Ok(out)
    }
}

impl std::io::Write for DigestContext {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        DigestContext::write(self, buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

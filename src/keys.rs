//! Key-list resolution.
//!
//! Keyring storage, lookup and passphrase prompting are external
//! collaborators; this module only defines the boundary
//! traits the drivers call through, plus an in-memory implementation
//! used by the tests and the `sq-sign` demo binary.

use crate::error::Result;
use crate::signature::SecretKey;

/// An ordered, order-preserving list of secret keys requested by the
/// user. An empty list means "the default key", which the
/// [`SecretKeyStore`] implementation is responsible for resolving.
#[derive(Clone, Debug, Default)]
pub struct KeyList(pub Vec<SecretKey>);

impl KeyList {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn iter(&self) -> std::slice::Iter<SecretKey> {
        self.0.iter()
    }
    /// Whether every key in the list is RSA v3, the `old_style`
    /// tie-break for choosing packet framing.
    pub fn all_old_style(&self) -> bool {
        self.0.iter().all(|sk| sk.is_old_style())
    }
}

/// Resolves user-supplied selectors (key IDs, fingerprints, user IDs --
/// the concrete syntax is a collaborator concern) to secret keys, and
/// unlocks them for signing.
pub trait SecretKeyStore {
    /// Populates a key list from `selectors`. An empty slice resolves
    /// to the implementation's notion of "the default key(s)". Fails
    /// fast if any selector does not resolve.
    fn build_sk_list(&self, selectors: &[String]) -> Result<KeyList>;

    /// Unlocks `sk` for signing, prompting for a passphrase if needed.
    fn check_secret_key(&self, sk: &SecretKey) -> Result<()>;
}

/// A trivial in-memory keyring: selectors are just indices into a
/// fixed vector of keys, and the default key is the first one. Good
/// enough to drive the sign/clearsign/export tests end to end without
/// a real keyring format.
#[derive(Clone, Debug, Default)]
pub struct MemoryKeyStore {
    pub keys: Vec<SecretKey>,
}

impl MemoryKeyStore {
    pub fn new(keys: Vec<SecretKey>) -> Self {
        MemoryKeyStore { keys }
    }
}

impl SecretKeyStore for MemoryKeyStore {
    fn build_sk_list(&self, selectors: &[String]) -> Result<KeyList> {
        if selectors.is_empty() {
            return Ok(KeyList(self.keys.iter().take(1).cloned().collect()));
        }
        let mut out = Vec::with_capacity(selectors.len());
        for sel in selectors {
            let keyid = u64::from_str_radix(sel.trim_start_matches("0x"), 16)
                .map_err(|_| crate::error::Error::UserNotFound(sel.clone()))?;
            let sk = self
                .keys
                .iter()
                .find(|k| k.keyid == keyid)
                .ok_or_else(|| crate::error::Error::UserNotFound(sel.clone()))?;
            out.push(sk.clone());
        }
        Ok(KeyList(out))
    }

    fn check_secret_key(&self, _sk: &SecretKey) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::PublicKeyAlgorithm;

    fn key(id: u64) -> SecretKey {
        SecretKey {
            keyid: id,
            version: 4,
            pubkey_algo: PublicKeyAlgorithm::RSA,
            skey: vec![vec![1, 0]],
        }
    }

    #[test]
    fn empty_selectors_resolve_to_default_key() {
        let store = MemoryKeyStore::new(vec![key(1), key(2)]);
        let list = store.build_sk_list(&[]).unwrap();
        assert_eq!(list.0.len(), 1);
        assert_eq!(list.0[0].keyid, 1);
    }

    #[test]
    fn unresolved_selector_fails_fast() {
        let store = MemoryKeyStore::new(vec![key(1)]);
        assert!(store.build_sk_list(&["ffffffffffffffff".into()]).is_err());
    }
}

//! Streams key-ring entries as raw packet sequences through an
//! optional armor/compress stack.
//!
//! Keyring storage and lookup are external collaborators; this module
//! only defines the boundary traits (`KeyringSource`/`KeyBlockIterator`)
//! the driver calls through, plus an in-memory reference implementation
//! for tests. A single multiplexed "enumerate keyblocks" entry point is
//! modeled here as three separate operations instead; a dedicated
//! close operation has no Rust counterpart since the iterator's `Drop`
//! impl does that job.

use std::collections::HashMap;

use crate::config::Options;
use crate::error::{Error, Result};
use crate::iobuf::filters::{ArmorFilter, ArmorKind, CompressFilter};
use crate::iobuf::IOBuf;
use crate::packet::OpaquePacket;
use crate::types::CompressionAlgorithm;

/// A key's primary packet followed by its user IDs, subkeys and
/// signatures, exactly as stored in a keyring. Opaque to this crate:
/// export only replays the packets, never interprets them.
#[derive(Clone, Debug, Default)]
pub struct KeyBlock {
    pub packets: Vec<OpaquePacket>,
}

/// Resolves selectors to key-blocks and iterates a whole ring.
pub trait KeyringSource {
    /// Opens an iterator over every key-block in storage order.
    fn open_iterator(&self, secret: bool) -> Result<Box<dyn KeyBlockIterator + '_>>;

    fn find_keyblock_by_name(&self, name: &str) -> Result<Option<KeyBlock>>;

    fn find_secret_keyblock_by_name(&self, name: &str) -> Result<Option<KeyBlock>>;
}

/// The `next` half of `enum_keyblocks`; `open_iterator` is the `open`
/// half and dropping the iterator is the `close` half.
pub trait KeyBlockIterator {
    fn next(&mut self) -> Result<Option<KeyBlock>>;
}

/// A reference keyring backed by two in-memory vectors, named by
/// insertion-order index or by an explicit selector string. Enough to
/// drive the export tests without a real on-disk keyring format.
#[derive(Clone, Debug, Default)]
pub struct MemoryKeyring {
    public: Vec<KeyBlock>,
    secret: Vec<KeyBlock>,
    public_names: HashMap<String, usize>,
    secret_names: HashMap<String, usize>,
}

impl MemoryKeyring {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_public(&mut self, name: &str, block: KeyBlock) {
        self.public_names.insert(name.to_string(), self.public.len());
        self.public.push(block);
    }

    pub fn add_secret(&mut self, name: &str, block: KeyBlock) {
        self.secret_names.insert(name.to_string(), self.secret.len());
        self.secret.push(block);
    }
}

struct VecIter(std::vec::IntoIter<KeyBlock>);

impl KeyBlockIterator for VecIter {
    fn next(&mut self) -> Result<Option<KeyBlock>> {
        Ok(self.0.next())
    }
}

impl KeyringSource for MemoryKeyring {
    fn open_iterator(&self, secret: bool) -> Result<Box<dyn KeyBlockIterator + '_>> {
        let blocks = if secret { self.secret.clone() } else { self.public.clone() };
        Ok(Box::new(VecIter(blocks.into_iter())))
    }

    fn find_keyblock_by_name(&self, name: &str) -> Result<Option<KeyBlock>> {
        Ok(self.public_names.get(name).map(|&i| self.public[i].clone()))
    }

    fn find_secret_keyblock_by_name(&self, name: &str) -> Result<Option<KeyBlock>> {
        Ok(self.secret_names.get(name).map(|&i| self.secret[i].clone()))
    }
}

/// Exports the key-blocks matching `selectors` (empty = all) from
/// `keyring` to `out`. Logs and continues past a selector miss;
/// cancels and warns if nothing was written at all.
pub fn export(
    out: IOBuf,
    selectors: &[String],
    secret: bool,
    keyring: &dyn KeyringSource,
    opts: &Options,
) -> Result<()> {
    let mut out = out;
    match export_body(&mut out, selectors, secret, keyring, opts) {
        Ok(count) if count > 0 => {
            log::info!("exported {count} key(s)");
            out.close()
        }
        Ok(_) => {
            log::warn!("nothing exported");
            out.cancel()
        }
        Err(e) => {
            out.cancel()?;
            Err(e)
        }
    }
}

fn export_body(
    out: &mut IOBuf,
    selectors: &[String],
    secret: bool,
    keyring: &dyn KeyringSource,
    opts: &Options,
) -> Result<usize> {
    if opts.armor {
        let kind = if secret { ArmorKind::SecretKey } else { ArmorKind::PublicKey };
        out.push_filter(move |w| ArmorFilter::new(w, kind))?;
    }
    if opts.compress_keys && opts.compress {
        out.push_filter(|w| CompressFilter::new(w, CompressionAlgorithm::Zlib))?;
    }

    let mut count = 0usize;
    if selectors.is_empty() {
        let mut it = keyring.open_iterator(secret)?;
        while let Some(block) = it.next()? {
            write_keyblock(out, &block)?;
            count += 1;
        }
    } else {
        for sel in selectors {
            let found = if secret {
                keyring.find_secret_keyblock_by_name(sel)?
            } else {
                keyring.find_keyblock_by_name(sel)?
            };
            match found {
                Some(block) => {
                    write_keyblock(out, &block)?;
                    count += 1;
                }
                None => log::warn!("{sel}: user not found"),
            }
        }
    }
    Ok(count)
}

fn write_keyblock(out: &mut IOBuf, block: &KeyBlock) -> Result<()> {
    for pkt in &block.packets {
        pkt.serialize(out).map_err(Error::WriteFile)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::Tag;

    fn block(names: &[&str]) -> KeyBlock {
        KeyBlock {
            packets: names
                .iter()
                .map(|n| OpaquePacket::new(Tag::UserID, n.as_bytes().to_vec()))
                .collect(),
        }
    }

    #[test]
    fn export_all_on_empty_keyring_warns_and_cancels() {
        let keyring = MemoryKeyring::new();
        let opts = Options::new();
        let path = std::env::temp_dir().join(format!("export-empty-test-{}", std::process::id()));
        let out = IOBuf::create(&path).unwrap();
        export(out, &[], false, &keyring, &opts).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn selector_miss_mid_export_continues() {
        let mut keyring = MemoryKeyring::new();
        keyring.add_public("alice", block(&["Alice <alice@example.org>"]));
        let opts = Options::new();

        let mut out_bytes = Vec::new();
        export(
            IOBuf::wrap(&mut out_bytes),
            &["alice".to_string(), "bob".to_string()],
            false,
            &keyring,
            &opts,
        )
        .unwrap();

        assert!(out_bytes.windows(5).any(|w| w == b"Alice"));
    }

    #[test]
    fn export_all_replays_every_block_in_storage_order() {
        let mut keyring = MemoryKeyring::new();
        keyring.add_public("alice", block(&["Alice"]));
        keyring.add_public("bob", block(&["Bob"]));
        let opts = Options::new();

        let mut out_bytes = Vec::new();
        export(IOBuf::wrap(&mut out_bytes), &[], false, &keyring, &opts).unwrap();

        let alice_pos = out_bytes.windows(5).position(|w| w == b"Alice").unwrap();
        let bob_pos = out_bytes.windows(3).position(|w| w == b"Bob").unwrap();
        assert!(alice_pos < bob_pos);
    }
}

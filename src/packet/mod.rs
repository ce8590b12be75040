//! OpenPGP packet types the core emits.
//!
//! Signature packets live in [`crate::signature`] since their body
//! construction is inseparable from the hash machinery; this module
//! covers the packets the sign/clearsign/export drivers build directly.

pub mod header;
pub mod writer;

use std::io::{self, Write};

use crate::error::Result;
use crate::types::{PublicKeyAlgorithm, Tag};

use header::{write_new_format_header, write_old_format_tag_and_length};

/// A one-pass-signature header packet, emitted before the
/// literal data so a streaming verifier knows what signatures to
/// expect.
#[derive(Clone, Debug)]
pub struct OnePassSig {
    pub version: u8,
    pub sig_class: u8,
    pub digest_algo: u8,
    pub pubkey_algo: PublicKeyAlgorithm,
    pub keyid: u64,
    pub last: bool,
}

impl OnePassSig {
    pub fn new(sig_class: u8, digest_algo: u8, pubkey_algo: PublicKeyAlgorithm, keyid: u64) -> Self {
        OnePassSig {
            version: 3,
            sig_class,
            digest_algo,
            pubkey_algo,
            keyid,
            last: false,
        }
    }

    /// Serializes this packet (always old-style-independent; a
    /// one-pass-signature packet is always tag 4 new or old format is
    /// a caller-level choice, see `old_style`).
    pub fn serialize<W: Write>(&self, w: &mut W, old_style: bool) -> Result<()> {
        let body_len = 1 + 1 + 1 + 1 + 8 + 1; // version,class,digest,pk,keyid,last
        if old_style {
            write_old_format_tag_and_length(w, Tag::OnePassSig, body_len)?;
        } else {
            write_new_format_header(w, Tag::OnePassSig, body_len)?;
        }
        w.write_all(&[self.version, self.sig_class, self.digest_algo, self.pubkey_algo.into()])?;
        w.write_all(&self.keyid.to_be_bytes())?;
        w.write_all(&[if self.last { 1 } else { 0 }])?;
        Ok(())
    }
}

/// A packet captured verbatim from a keyring --
/// `PublicKey`/`SecretKey`/`UserId`/`PublicSubkey`/`SecretSubkey`/
/// `Trust`. The export driver re-emits these byte-identical, including
/// the header-framing style the packet was read in with, so a
/// keyring entry stored in old-format framing isn't silently
/// re-framed on export; this crate never needs to interpret the body,
/// only replay it.
#[derive(Clone, Debug)]
pub struct OpaquePacket {
    pub tag: Tag,
    pub body: Vec<u8>,
    pub old_format: bool,
}

impl OpaquePacket {
    /// Builds a packet for re-export with new-format header framing.
    pub fn new(tag: Tag, body: Vec<u8>) -> Self {
        OpaquePacket { tag, body, old_format: false }
    }

    /// Builds a packet that replays the old-format (RFC 1991) header
    /// framing it was originally stored under.
    pub fn new_old_format(tag: Tag, body: Vec<u8>) -> Self {
        OpaquePacket { tag, body, old_format: true }
    }

    /// Re-emits the packet byte-identically to how it was read from
    /// storage: same body, same header-framing style.
    pub fn serialize<W: Write>(&self, w: &mut W) -> io::Result<()> {
        if self.old_format {
            write_old_format_tag_and_length(w, self.tag, self.body.len() as u32)?;
        } else {
            write_new_format_header(w, self.tag, self.body.len() as u32)?;
        }
        w.write_all(&self.body)
    }
}

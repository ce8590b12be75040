//! Signature-hash construction and packet emission.
//!
//! The raw cryptographic primitives (PKCS#1/DSA encoding, the
//! public-key sign operation itself, MPI arithmetic) are out of scope
//! they're modeled as the [`PubkeyBackend`] trait so the
//! core can be tested without a real crypto library wired in.

use std::io::{self, Write};

use crate::digest::DigestContext;
use crate::error::Result;
use crate::packet::header::{write_new_format_header, write_old_format_tag_and_length};
use crate::types::{HashAlgorithm, PublicKeyAlgorithm, SignatureType, Tag};

/// A secret key as the sign driver sees it: enough to pick a digest
/// algorithm, address it by key ID, and hand its secret material to
/// [`PubkeyBackend::pubkey_sign`].
#[derive(Clone, Debug)]
pub struct SecretKey {
    pub keyid: u64,
    /// `3` for an RSA key stored in the legacy v3 format, `4` otherwise
    /// format, `4` otherwise.
    pub version: u8,
    pub pubkey_algo: PublicKeyAlgorithm,
    /// Secret MPIs, opaque to this crate beyond their bit width.
    pub skey: Vec<Vec<u8>>,
}

impl SecretKey {
    /// Whether this key forces old-style (RFC 1991) framing: an RSA
    /// key stored in the v3 format.
    pub fn is_old_style(&self) -> bool {
        self.version == 3 && matches!(self.pubkey_algo, PublicKeyAlgorithm::RSA)
    }

    /// Bit width of the modulus/prime (`skey[0]`), used to size the
    /// PKCS#1/DSA encoding.
    pub fn nbits(&self) -> usize {
        mpi_bit_length(self.skey.first().map(|v| v.as_slice()).unwrap_or(&[]))
    }
}

/// The collaborator boundary for the public-key sign primitive and its
/// digest encoding.
pub trait PubkeyBackend {
    /// PKCS#1 (RSA) or DSA-style encoding of a message digest to the
    /// given bit width.
    fn encode_md_value(
        &self,
        pubkey_algo: PublicKeyAlgorithm,
        digest: &[u8],
        digest_algo: HashAlgorithm,
        nbits: usize,
    ) -> Result<Vec<u8>>;

    /// Signs `encoded` with `sk`, returning the signature's MPI
    /// sequence.
    fn pubkey_sign(
        &self,
        pubkey_algo: PublicKeyAlgorithm,
        encoded: &[u8],
        sk: &SecretKey,
    ) -> Result<Vec<Vec<u8>>>;
}

/// A signature packet, v3 or v4.
#[derive(Clone, Debug)]
pub struct Signature {
    pub version: u8,
    pub sig_class: SignatureType,
    pub timestamp: u32,
    pub keyid: u64,
    pub pubkey_algo: PublicKeyAlgorithm,
    pub digest_algo: HashAlgorithm,
    pub digest_start: [u8; 2],
    /// v4 only; empty (and unused) for v3.
    pub hashed_subpackets: Vec<u8>,
    /// v4 only; empty (and unused) for v3.
    pub unhashed_subpackets: Vec<u8>,
    pub data: Vec<Vec<u8>>,
}

fn mpi_bit_length(b: &[u8]) -> usize {
    match b.first() {
        None => 0,
        Some(&lead) => (b.len() - 1) * 8 + (8 - lead.leading_zeros() as usize),
    }
}

fn write_mpi<W: Write>(w: &mut W, b: &[u8]) -> io::Result<()> {
    let bits = mpi_bit_length(b) as u16;
    w.write_all(&bits.to_be_bytes())?;
    w.write_all(b)
}

/// Per-key digest algorithm selection: a user
/// override wins outright; otherwise DSA keys get SHA-1 and RSA keys
/// get MD5, matching the historical GnuPG default.
pub fn hash_for(pubkey_algo: PublicKeyAlgorithm, user_override: Option<HashAlgorithm>) -> HashAlgorithm {
    if let Some(h) = user_override {
        return h;
    }
    match pubkey_algo {
        PublicKeyAlgorithm::DSA => HashAlgorithm::SHA1,
        PublicKeyAlgorithm::RSA => HashAlgorithm::MD5,
    }
}

/// Builds the signature-over-data byte sequence for `sk` on a clone of
/// the message digest, invokes the sign primitive, and returns the
/// completed packet.
///
/// `md` must already have every byte of the signed material written to
/// it (and `digest_algo` enabled) before this is called; this function
/// only appends the trailer and finalizes.
pub fn build_signature(
    mut md: DigestContext,
    sig_class: SignatureType,
    timestamp: u32,
    sk: &SecretKey,
    digest_algo: HashAlgorithm,
    hashed_subpackets: Vec<u8>,
    old_style: bool,
    backend: &dyn PubkeyBackend,
) -> Result<Signature> {
    let version: u8 = if old_style { 3 } else { 4 };

    if version >= 4 {
        md.write(&[version]);
    }
    md.write(&[sig_class.as_u8()]);
    if version < 4 {
        md.write(&timestamp.to_be_bytes());
    }

    let mut n: u32 = 6;
    if version >= 4 {
        md.write(&[sk.pubkey_algo.into(), digest_algo.into()]);
        if !hashed_subpackets.is_empty() {
            let hlen = ((hashed_subpackets[0] as u32) << 8) | hashed_subpackets[1] as u32;
            md.write(&hashed_subpackets[..hlen as usize + 2]);
            n = hlen + 6;
        }
        let trailer = [
            version,
            0xff,
            (n >> 24) as u8,
            (n >> 16) as u8,
            (n >> 8) as u8,
            n as u8,
        ];
        md.write(&trailer);
    }

    let digest = md.finalize(digest_algo)?;
    let mut digest_start = [0u8; 2];
    digest_start.copy_from_slice(&digest[..2]);

    let encoded = backend.encode_md_value(sk.pubkey_algo, &digest, digest_algo, sk.nbits())?;
    let data = backend.pubkey_sign(sk.pubkey_algo, &encoded, sk)?;

    Ok(Signature {
        version,
        sig_class,
        timestamp,
        keyid: sk.keyid,
        pubkey_algo: sk.pubkey_algo,
        digest_algo,
        digest_start,
        hashed_subpackets: if version >= 4 { hashed_subpackets } else { Vec::new() },
        unhashed_subpackets: Vec::new(),
        data,
    })
}

impl Signature {
    fn body_len(&self) -> usize {
        if self.version < 4 {
            // version(1) + hashed-material-length(1) + sig_class(1) +
            // timestamp(4) + keyid(8) + pubkey_algo(1) + digest_algo(1)
            // + digest_start(2) + MPIs.
            1 + 1 + 1 + 4 + 8 + 1 + 1 + 2 + self.mpi_bytes()
        } else {
            1 + 1
                + 1
                + 1
                + 2
                + self.hashed_subpackets.len()
                + 2
                + self.unhashed_subpackets.len()
                + 2
                + self.mpi_bytes()
        }
    }

    fn mpi_bytes(&self) -> usize {
        self.data.iter().map(|m| 2 + m.len()).sum()
    }

    /// Serializes this packet.
    pub fn serialize<W: Write>(&self, w: &mut W, old_style: bool) -> Result<()> {
        let len = self.body_len() as u32;
        if old_style {
            write_old_format_tag_and_length(w, Tag::Signature, len)?;
        } else {
            write_new_format_header(w, Tag::Signature, len)?;
        }

        if self.version < 4 {
            w.write_all(&[self.version, 5, self.sig_class.as_u8()])?;
            w.write_all(&self.timestamp.to_be_bytes())?;
            w.write_all(&self.keyid.to_be_bytes())?;
            w.write_all(&[self.pubkey_algo.into(), self.digest_algo.into()])?;
        } else {
            w.write_all(&[
                self.version,
                self.sig_class.as_u8(),
                self.pubkey_algo.into(),
                self.digest_algo.into(),
            ])?;
            w.write_all(&self.hashed_subpackets)?;
            if self.hashed_subpackets.is_empty() {
                w.write_all(&[0, 0])?;
            }
            w.write_all(&self.unhashed_subpackets)?;
            if self.unhashed_subpackets.is_empty() {
                w.write_all(&[0, 0])?;
            }
        }
        w.write_all(&self.digest_start)?;
        for mpi in &self.data {
            write_mpi(w, mpi)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct StubBackend;
    impl PubkeyBackend for StubBackend {
        fn encode_md_value(
            &self,
            _pubkey_algo: PublicKeyAlgorithm,
            digest: &[u8],
            _digest_algo: HashAlgorithm,
            _nbits: usize,
        ) -> Result<Vec<u8>> {
            Ok(digest.to_vec())
        }
        fn pubkey_sign(
            &self,
            _pubkey_algo: PublicKeyAlgorithm,
            encoded: &[u8],
            _sk: &SecretKey,
        ) -> Result<Vec<Vec<u8>>> {
            // A deterministic stand-in: "sign" is identity. Good enough
            // to exercise packet framing and hash-trailer correctness
            // without a real RSA/DSA implementation.
            Ok(vec![encoded.to_vec()])
        }
    }

    fn rsa_key(keyid: u64, version: u8) -> SecretKey {
        SecretKey {
            keyid,
            version,
            pubkey_algo: PublicKeyAlgorithm::RSA,
            skey: vec![vec![0x01, 0x00]], // a 9-bit "modulus", irrelevant here
        }
    }

    #[test]
    fn hash_for_tie_break() {
        assert_eq!(hash_for(PublicKeyAlgorithm::DSA, None), HashAlgorithm::SHA1);
        assert_eq!(hash_for(PublicKeyAlgorithm::RSA, None), HashAlgorithm::MD5);
        assert_eq!(
            hash_for(PublicKeyAlgorithm::RSA, Some(HashAlgorithm::SHA256)),
            HashAlgorithm::SHA256
        );
    }

    #[test]
    fn v3_signature_hashes_class_and_timestamp_only() {
        let mut md = DigestContext::open();
        md.enable(HashAlgorithm::MD5);
        md.write(b"hello world");

        let sig = build_signature(
            md,
            SignatureType::Binary,
            0x6020_0101,
            &rsa_key(0x1111_1111_1111_1111, 3),
            HashAlgorithm::MD5,
            Vec::new(),
            true,
            &StubBackend,
        )
        .unwrap();

        assert_eq!(sig.version, 3);
        assert_eq!(sig.keyid, 0x1111_1111_1111_1111);
        assert_eq!(sig.pubkey_algo, PublicKeyAlgorithm::RSA);

        let expected = {
            use digest::Digest;
            let mut h = md5::Md5::new();
            h.update(b"hello world");
            h.update([SignatureType::Binary.as_u8()]);
            h.update(0x6020_0101u32.to_be_bytes());
            h.finalize().to_vec()
        };
        assert_eq!(&sig.digest_start, &expected[..2]);
    }

    #[test]
    fn v4_signature_includes_hashed_subpacket_trailer() {
        let mut md = DigestContext::open();
        md.enable(HashAlgorithm::SHA1);
        md.write(b"a\r\nb\r\n");

        let sig = build_signature(
            md,
            SignatureType::Text,
            0,
            &SecretKey {
                keyid: 0x2222_2222_2222_2222,
                version: 4,
                pubkey_algo: PublicKeyAlgorithm::DSA,
                skey: vec![vec![0xff; 20]],
            },
            HashAlgorithm::SHA1,
            Vec::new(),
            false,
            &StubBackend,
        )
        .unwrap();

        assert_eq!(sig.version, 4);
        assert_eq!(sig.sig_class, SignatureType::Text);

        let mut out = Vec::new();
        sig.serialize(&mut out, false).unwrap();
        // New-format tag octet for Signature (tag 2): 0b11_000010.
        assert_eq!(out[0], 0xC2);
    }

    #[test]
    fn serialized_signature_length_matches_body() {
        let mut md = DigestContext::open();
        md.enable(HashAlgorithm::SHA256);
        md.write(b"x");
        let sig = build_signature(
            md,
            SignatureType::Binary,
            1,
            &rsa_key(1, 4),
            HashAlgorithm::SHA256,
            Vec::new(),
            false,
            &StubBackend,
        )
        .unwrap();
        let mut out = Vec::new();
        sig.serialize(&mut out, false).unwrap();
        assert_eq!(out.len() as u32, 2 + sig.body_len() as u32);
    }
}

//! Wire-level enumerations shared by the packet, digest and signature
//! layers.

use std::fmt;

/// A hash algorithm identifier, as used by [`Signature`] and
/// [`crate::digest::DigestContext`].
///
/// [`Signature`]: crate::signature::Signature
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HashAlgorithm {
    MD5,
    SHA1,
    SHA224,
    SHA256,
    SHA384,
    SHA512,
}

impl HashAlgorithm {
    /// All algorithms the digest manager knows how to compute.
    pub const ALL: [HashAlgorithm; 6] = [
        HashAlgorithm::MD5,
        HashAlgorithm::SHA1,
        HashAlgorithm::SHA224,
        HashAlgorithm::SHA256,
        HashAlgorithm::SHA384,
        HashAlgorithm::SHA512,
    ];
}

impl From<HashAlgorithm> for u8 {
    fn from(a: HashAlgorithm) -> u8 {
        match a {
            HashAlgorithm::MD5 => 1,
            HashAlgorithm::SHA1 => 2,
            HashAlgorithm::SHA256 => 8,
            HashAlgorithm::SHA384 => 9,
            HashAlgorithm::SHA512 => 10,
            HashAlgorithm::SHA224 => 11,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            HashAlgorithm::MD5 => "MD5",
            HashAlgorithm::SHA1 => "SHA1",
            HashAlgorithm::SHA224 => "SHA224",
            HashAlgorithm::SHA256 => "SHA256",
            HashAlgorithm::SHA384 => "SHA384",
            HashAlgorithm::SHA512 => "SHA512",
        };
        f.write_str(s)
    }
}

/// A public-key algorithm identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublicKeyAlgorithm {
    RSA,
    DSA,
}

impl From<PublicKeyAlgorithm> for u8 {
    fn from(a: PublicKeyAlgorithm) -> u8 {
        match a {
            PublicKeyAlgorithm::RSA => 1,
            PublicKeyAlgorithm::DSA => 17,
        }
    }
}

/// A (de)compression algorithm, used by [`crate::iobuf::filters::CompressFilter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompressionAlgorithm {
    Uncompressed,
    Zip,
    Zlib,
}

impl From<CompressionAlgorithm> for u8 {
    fn from(a: CompressionAlgorithm) -> u8 {
        match a {
            CompressionAlgorithm::Uncompressed => 0,
            CompressionAlgorithm::Zip => 1,
            CompressionAlgorithm::Zlib => 2,
        }
    }
}

/// `sig_class`: selects what kind of material a signature covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureType {
    /// `0x00`, a signature over binary data.
    Binary,
    /// `0x01`, a signature over canonical text.
    Text,
}

impl SignatureType {
    pub fn as_u8(self) -> u8 {
        match self {
            SignatureType::Binary => 0x00,
            SignatureType::Text => 0x01,
        }
    }
}

/// Plaintext packet content disposition (OpenPGP `format` octet).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataFormat {
    Binary,
    Text,
}

impl DataFormat {
    pub fn as_u8(self) -> u8 {
        match self {
            DataFormat::Binary => b'b',
            DataFormat::Text => b't',
        }
    }
}

/// The packet tag, i.e. the kind of packet a header introduces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tag {
    Signature,
    OnePassSig,
    SecretKey,
    PublicKey,
    SecretSubkey,
    PublicSubkey,
    CompressedData,
    Literal,
    Trust,
    UserID,
}

impl From<Tag> for u8 {
    fn from(t: Tag) -> u8 {
        match t {
            Tag::PublicKey => 6,
            Tag::SecretKey => 5,
            Tag::CompressedData => 8,
            Tag::Literal => 11,
            Tag::Trust => 12,
            Tag::UserID => 13,
            Tag::PublicSubkey => 14,
            Tag::SecretSubkey => 7,
            Tag::Signature => 2,
            Tag::OnePassSig => 4,
        }
    }
}

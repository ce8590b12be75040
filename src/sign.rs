//! The multi-key signing orchestrator: embedded/detached binary and
//! text signing. Clearsign is its own specialization in
//! [`crate::clearsign`] since it neither armors the body nor frames it
//! as a literal packet.

use std::cell::RefCell;
use std::io::{self, Read, Write};
use std::rc::Rc;

use crate::config::Options;
use crate::digest::DigestContext;
use crate::error::{Error, Result};
use crate::iobuf::filters::{ArmorFilter, ArmorKind, CompressFilter, MdFilter, TextFilter};
use crate::iobuf::IOBuf;
use crate::keys::KeyList;
use crate::packet::writer::{begin_literal_unknown_length, write_literal_header_known_length};
use crate::packet::OnePassSig;
use crate::signature::{build_signature, hash_for, PubkeyBackend};
use crate::types::{CompressionAlgorithm, DataFormat, SignatureType};

fn sig_class(textmode: bool) -> SignatureType {
    if textmode {
        SignatureType::Text
    } else {
        SignatureType::Binary
    }
}

fn data_format(textmode: bool) -> DataFormat {
    if textmode {
        DataFormat::Text
    } else {
        DataFormat::Binary
    }
}

/// Builds the output-side filter stack, outer-to-inner armor then
/// compress, suppressing both when an explicit outfile was given.
/// Encryption is the remaining entry of this layer's filter list but
/// has no recipients to encrypt for here -- it's out of scope for this
/// core (see the crate-level documentation).
fn build_output_stack(out: &mut IOBuf, opts: &Options, explicit_outfile: bool, armor_kind: ArmorKind) -> Result<()> {
    if !explicit_outfile && opts.armor {
        out.push_filter(|w| ArmorFilter::new(w, armor_kind))?;
    }
    if !explicit_outfile && opts.compress {
        out.push_filter(|w| CompressFilter::new(w, CompressionAlgorithm::Zlib))?;
    }
    Ok(())
}

/// Enables, on a fresh [`DigestContext`], every digest algorithm the
/// key list's signatures will need.
fn open_digest_for(keys: &KeyList, opts: &Options) -> DigestContext {
    let mut md = DigestContext::open();
    for sk in keys.iter() {
        md.enable(hash_for(sk.pubkey_algo, opts.def_digest_algo));
    }
    md
}

/// Emits the per-key `Signature` packets following the literal or
/// detached data, in forward key-list order, each hashed on its own
/// clone of `digest` with the per-key trailer appended.
fn emit_signatures(
    out: &mut IOBuf,
    digest: &DigestContext,
    keys: &KeyList,
    opts: &Options,
    sig_class: SignatureType,
    timestamp: u32,
    old_style: bool,
    backend: &dyn PubkeyBackend,
) -> Result<()> {
    for sk in keys.iter() {
        let algo = hash_for(sk.pubkey_algo, opts.def_digest_algo);
        let md = digest.clone_context();
        let sig = build_signature(md, sig_class, timestamp, sk, algo, Vec::new(), old_style, backend)?;
        sig.serialize(out, old_style)?;
        if opts.verbose {
            log::info!("signature made by key {:016X}", sk.keyid);
        }
    }
    Ok(())
}

/// Signs `input` and emits a self-contained (non-detached) packet
/// stream: one-pass headers, the literal data, then the signatures.
///
/// `name` is the filename recorded in the `Plaintext` packet; pass an
/// empty slice for stdin input. `explicit_outfile` disables armor,
/// compression and text mode, matching the reference behaviour for a
/// caller-supplied output path (see the design notes on this
/// surprising default).
pub fn sign_embedded<R: Read>(
    mut input: R,
    out: IOBuf,
    keys: &KeyList,
    opts: &Options,
    backend: &dyn PubkeyBackend,
    name: &[u8],
    timestamp: u32,
    explicit_outfile: bool,
) -> Result<()> {
    let mut out = out;
    let result = sign_embedded_body(
        &mut input,
        &mut out,
        keys,
        opts,
        backend,
        name,
        timestamp,
        explicit_outfile,
    );
    out.finish(result)
}

fn sign_embedded_body<R: Read>(
    input: &mut R,
    out: &mut IOBuf,
    keys: &KeyList,
    opts: &Options,
    backend: &dyn PubkeyBackend,
    name: &[u8],
    timestamp: u32,
    explicit_outfile: bool,
) -> Result<()> {
    if keys.is_empty() {
        return Err(Error::Bug("sign_embedded: empty key list".into()));
    }
    if name.len() > 255 {
        return Err(Error::PacketBuild("literal packet name exceeds 255 bytes".into()));
    }

    let old_style = opts.rfc1991 || keys.all_old_style();
    // A textmode request is silently dropped when an explicit outfile
    // is given, matching the reference implementation.
    let textmode = opts.textmode && !explicit_outfile;

    let digest = Rc::new(RefCell::new(open_digest_for(keys, opts)));

    build_output_stack(out, opts, explicit_outfile, ArmorKind::Message)?;

    if !old_style {
        let n = keys.iter().count();
        for (i, sk) in keys.iter().rev().enumerate() {
            let algo = hash_for(sk.pubkey_algo, opts.def_digest_algo);
            let mut ops = OnePassSig::new(sig_class(textmode).as_u8(), algo.into(), sk.pubkey_algo, sk.keyid);
            ops.last = i + 1 == n;
            ops.serialize(out, old_style)?;
        }
    }

    if old_style {
        // Old-format framing has no partial-length encoding, so the
        // body length must be known before the header is written;
        // buffer the (possibly text-canonicalized) body first.
        let mut canon = Vec::new();
        {
            let mut buf = IOBuf::wrap(&mut canon);
            if textmode {
                buf.push_filter(TextFilter::new)?;
            }
            io::copy(input, &mut buf).map_err(Error::ReadFile)?;
            buf.close()?;
        }
        digest.borrow_mut().write(&canon);
        write_literal_header_known_length(out, data_format(textmode), name, timestamp, canon.len() as u32)?;
        out.write_all(&canon).map_err(Error::WriteFile)?;
    } else {
        out.try_push_filter(|top| begin_literal_unknown_length(top, data_format(textmode), name, timestamp))?;
        out.push_filter(|top| MdFilter::new(top, digest.clone()))?;
        if textmode {
            out.push_filter(TextFilter::new)?;
        }
        io::copy(input, out).map_err(Error::ReadFile)?;
        // Finish the body-framing filters only (text/digest/literal),
        // leaving compress/armor open for the signatures that follow.
        out.pop_filter()?;
        out.pop_filter()?;
        if textmode {
            out.pop_filter()?;
        }
    }

    let digest = Rc::try_unwrap(digest)
        .map_err(|_| Error::Bug("digest still shared after body was written".into()))?
        .into_inner();
    emit_signatures(out, &digest, keys, opts, sig_class(textmode), timestamp, old_style, backend)
}

/// Signs `input` and writes only the `Signature` packet(s) to `out` --
/// no one-pass headers, no literal data.
pub fn sign_detached_single<R: Read>(
    mut input: R,
    out: IOBuf,
    keys: &KeyList,
    opts: &Options,
    backend: &dyn PubkeyBackend,
    timestamp: u32,
    explicit_outfile: bool,
) -> Result<()> {
    let mut out = out;
    let result = sign_detached_body(
        &mut [&mut input as &mut dyn Read].into_iter(),
        &mut out,
        keys,
        opts,
        backend,
        timestamp,
        explicit_outfile,
    );
    out.finish(result)
}

/// Signs several inputs as one combined detached signature, hashing
/// them in reverse of the supplied order (the nesting convention that
/// pairs with forward-ordered signature packets).
pub fn sign_detached_multi<'a>(
    inputs: impl DoubleEndedIterator<Item = &'a mut dyn Read>,
    out: IOBuf,
    keys: &KeyList,
    opts: &Options,
    backend: &dyn PubkeyBackend,
    timestamp: u32,
    explicit_outfile: bool,
) -> Result<()> {
    let mut out = out;
    let result = sign_detached_body(
        &mut inputs.rev(),
        &mut out,
        keys,
        opts,
        backend,
        timestamp,
        explicit_outfile,
    );
    out.finish(result)
}

fn sign_detached_body<'a>(
    inputs: &mut dyn Iterator<Item = &'a mut dyn Read>,
    out: &mut IOBuf,
    keys: &KeyList,
    opts: &Options,
    backend: &dyn PubkeyBackend,
    timestamp: u32,
    explicit_outfile: bool,
) -> Result<()> {
    if keys.is_empty() {
        return Err(Error::Bug("sign_detached: empty key list".into()));
    }
    let old_style = opts.rfc1991 || keys.all_old_style();
    let textmode = opts.textmode && !explicit_outfile;

    build_output_stack(out, opts, explicit_outfile, ArmorKind::Signature)?;

    let digest = Rc::new(RefCell::new(open_digest_for(keys, opts)));
    for input in inputs {
        let mut sink = IOBuf::wrap(io::sink());
        sink.push_filter(|w| MdFilter::new(w, digest.clone()))?;
        if textmode {
            sink.push_filter(TextFilter::new)?;
        }
        io::copy(input, &mut sink).map_err(Error::ReadFile)?;
        sink.close()?;
    }

    let digest = Rc::try_unwrap(digest)
        .map_err(|_| Error::Bug("digest still shared after inputs were drained".into()))?
        .into_inner();
    emit_signatures(out, &digest, keys, opts, sig_class(textmode), timestamp, old_style, backend)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::signature::SecretKey;
    use crate::types::{HashAlgorithm, PublicKeyAlgorithm};

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
            Ok(vec![encoded.to_vec()])
        }
    }

    fn rsa_v3_key(keyid: u64) -> SecretKey {
        SecretKey {
            keyid,
            version: 3,
            pubkey_algo: PublicKeyAlgorithm::RSA,
            skey: vec![vec![0x01, 0x00]],
        }
    }

    fn dsa_key(keyid: u64) -> SecretKey {
        SecretKey {
            keyid,
            version: 4,
            pubkey_algo: PublicKeyAlgorithm::DSA,
            skey: vec![vec![0xff; 20]],
        }
    }

    #[test]
    fn binary_detached_rsa_v3() {
        let keys = KeyList(vec![rsa_v3_key(0x1111_1111_1111_1111)]);
        let opts = Options::new();
        let mut out_bytes = Vec::new();
        let out = IOBuf::wrap(&mut out_bytes);
        sign_detached_single(&b"hello world"[..], out, &keys, &opts, &StubBackend, 0x6020_0101, false)
            .unwrap();

        // A single new-format Signature packet (tag 2): 0b11_000010.
        assert_eq!(out_bytes[0], 0xC2);
        assert_eq!(out_bytes[2], 3); // v3
        let expected = {
            use digest::Digest;
            let mut h = md5::Md5::new();
            h.update(b"hello world");
            h.update([SignatureType::Binary.as_u8()]);
            h.update(0x6020_0101u32.to_be_bytes());
            h.finalize().to_vec()
        };
        // 2 header bytes (tag, 1-byte length) + version + the fixed "5"
        // marker + sig_class + timestamp(4) + keyid(8) + pubkey_algo +
        // digest_algo, then digest_start.
        let ds_off = 2 + 3 + 4 + 8 + 2;
        assert_eq!(&out_bytes[ds_off..ds_off + 2], &expected[..2]);
    }

    #[test]
    fn embedded_text_two_keys_ordering() {
        let keys = KeyList(vec![dsa_key(0x1111_1111_1111_1111), dsa_key(0x2222_2222_2222_2222)]);
        let mut opts = Options::new();
        opts.textmode = true;
        let mut out_bytes = Vec::new();
        let out = IOBuf::wrap(&mut out_bytes);
        sign_embedded(
            &b"a\r\nb\n"[..],
            out,
            &keys,
            &opts,
            &StubBackend,
            b"in.txt",
            0,
            false,
        )
        .unwrap();

        // Each OnePassSig packet is 2 header bytes + 13 body bytes = 15
        // bytes: tag, length, version, sig_class, digest_algo,
        // pubkey_algo, keyid(8), last.
        // OnePassSig(K2,last=0), OnePassSig(K1,last=1), Plaintext, Sig(K1), Sig(K2).
        assert_eq!(out_bytes[0], 0xC4); // OnePassSig tag
        let keyid_at = |offset: usize| -> u64 {
            u64::from_be_bytes(out_bytes[offset..offset + 8].try_into().unwrap())
        };
        assert_eq!(keyid_at(6), 0x2222_2222_2222_2222);
        assert_eq!(out_bytes[14], 0); // last = false
        assert_eq!(out_bytes[15], 0xC4);
        assert_eq!(keyid_at(21), 0x1111_1111_1111_1111);
        assert_eq!(out_bytes[29], 1); // last = true

        // Somewhere after the two one-pass headers, a literal packet
        // carries the canonicalized body.
        assert!(out_bytes.windows(7).any(|w| w == b"a\r\nb\r\n"));
    }

    #[test]
    fn detached_multi_hashes_in_reverse_order() {
        // sign_detached_multi hashes [A, B] in reverse, i.e. B then A;
        // that must match a single detached signature over the
        // concatenation "BA".
        let keys = KeyList(vec![rsa_v3_key(1)]);
        let opts = Options::new();

        let mut a: &[u8] = b"A";
        let mut b: &[u8] = b"B";
        let mut out_multi = Vec::new();
        sign_detached_multi(
            vec![&mut a as &mut dyn Read, &mut b as &mut dyn Read].into_iter(),
            IOBuf::wrap(&mut out_multi),
            &keys,
            &opts,
            &StubBackend,
            0,
            false,
        )
        .unwrap();

        let mut out_single = Vec::new();
        sign_detached_single(
            &b"BA"[..],
            IOBuf::wrap(&mut out_single),
            &keys,
            &opts,
            &StubBackend,
            0,
            false,
        )
        .unwrap();

        assert_eq!(out_multi, out_single);
    }
}

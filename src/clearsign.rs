//! Clearsign: a specialization of the sign driver that leaves the body
//! as readable text (dash-escaped) and only armors the trailing
//! signature block.

use std::io::{Read, Write};

use crate::digest::DigestContext;
use crate::error::{Error, Result};
use crate::iobuf::filters::{ArmorFilter, ArmorKind};
use crate::iobuf::IOBuf;
use crate::keys::KeyList;
use crate::signature::{build_signature, hash_for, PubkeyBackend};
use crate::types::{HashAlgorithm, SignatureType};

/// Clearsigns `input`: header block, dash-escaped body, then an
/// armored signature block for every key in `keys` (forward order).
pub fn clearsign<R: Read>(
    mut input: R,
    out: IOBuf,
    keys: &KeyList,
    opts: &crate::config::Options,
    backend: &dyn PubkeyBackend,
    timestamp: u32,
) -> Result<()> {
    let mut out = out;
    let result = clearsign_body(&mut input, &mut out, keys, opts, backend, timestamp);
    out.finish(result)
}

fn clearsign_body<R: Read>(
    input: &mut R,
    out: &mut IOBuf,
    keys: &KeyList,
    opts: &crate::config::Options,
    backend: &dyn PubkeyBackend,
    timestamp: u32,
) -> Result<()> {
    if keys.is_empty() {
        return Err(Error::Bug("clearsign: empty key list".into()));
    }
    let old_style = opts.rfc1991 || keys.all_old_style();

    let mut algos: Vec<HashAlgorithm> = Vec::new();
    for sk in keys.iter() {
        let a = hash_for(sk.pubkey_algo, opts.def_digest_algo);
        if !algos.contains(&a) {
            algos.push(a);
        }
    }

    out.writestr("-----BEGIN PGP SIGNED MESSAGE-----\n")?;
    if old_style || algos == [HashAlgorithm::MD5] {
        out.writestr("\n")?;
    } else {
        let names: Vec<String> = algos.iter().map(|a| a.to_string()).collect();
        out.writestr(&format!("Hash: {}\n\n", names.join(",")))?;
    }

    let mut digest = DigestContext::open();
    for a in &algos {
        digest.enable(*a);
    }

    dash_escape_and_hash(input, out, &mut digest)?;

    out.writestr("\n")?;
    out.push_filter(|w| ArmorFilter::new(w, ArmorKind::Signature))?;

    for sk in keys.iter() {
        let algo = hash_for(sk.pubkey_algo, opts.def_digest_algo);
        let md = digest.clone_context();
        let sig = build_signature(md, SignatureType::Text, timestamp, sk, algo, Vec::new(), old_style, backend)?;
        sig.serialize(out, old_style)?;
    }
    Ok(())
}

struct RawLine<'a> {
    content: &'a [u8],
    terminator: &'a [u8],
}

/// Splits `data` into lines, preserving each original line terminator
/// (`\n`, `\r\n`, or a bare `\r`) so the output side can reproduce it
/// verbatim while the digest side re-canonicalizes to CRLF.
fn split_lines(data: &[u8]) -> Vec<RawLine<'_>> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'\n' => {
                lines.push(RawLine { content: &data[start..i], terminator: &data[i..=i] });
                i += 1;
                start = i;
            }
            b'\r' => {
                if i + 1 < data.len() && data[i + 1] == b'\n' {
                    lines.push(RawLine { content: &data[start..i], terminator: &data[i..i + 2] });
                    i += 2;
                } else {
                    lines.push(RawLine { content: &data[start..i], terminator: &data[i..=i] });
                    i += 1;
                }
                start = i;
            }
            _ => i += 1,
        }
    }
    if start < data.len() {
        lines.push(RawLine { content: &data[start..], terminator: &[] });
    }
    lines
}

/// Dash-escapes and writes each line to `out`, preserving its original
/// terminator, while feeding the canonicalized (CRLF, unescaped) form
/// to `digest`. Leading empty lines are dropped from both streams
/// before any real content has been seen.
fn dash_escape_and_hash<R: Read>(input: &mut R, out: &mut IOBuf, digest: &mut DigestContext) -> Result<()> {
    let mut data = Vec::new();
    input.read_to_end(&mut data).map_err(Error::ReadFile)?;

    let mut seen_content = false;
    for line in split_lines(&data) {
        if line.content.is_empty() && !seen_content {
            continue;
        }
        seen_content = true;

        if line.content.first() == Some(&b'-') {
            out.writestr("- ")?;
        }
        out.write_all(line.content).map_err(Error::WriteFile)?;
        out.write_all(line.terminator).map_err(Error::WriteFile)?;

        digest.write(line.content);
        if !line.terminator.is_empty() {
            digest.write(b"\r\n");
        }
    }
    Ok(())
}

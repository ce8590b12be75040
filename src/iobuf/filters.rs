//! The pluggable transforms of the sign/export pipeline: text
//! canonicalization, a digest tap, compression and ASCII armor. Each is
//! a [`Stackable`]
//! that wraps the next filter down; `push_filter` grows the chain
//! outward.
//!
//! The sign driver assembles, innermost first: `TextFilter` (if
//! textmode) → `MdFilter` (digest tap) → the literal packet's
//! length-framing writer → `CompressFilter` → `ArmorFilter`. Bytes
//! written at the outer (`TextFilter`) end flow down to the raw file at
//! the bottom, getting canonicalized, hashed, framed, compressed and
//! armored along the way -- one pass, bounded memory.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::digest::DigestContext;
use crate::iobuf::Stackable;
use crate::types::CompressionAlgorithm;

/// Canonicalizes line endings to CRLF and strips trailing whitespace on
/// each line, per the OpenPGP text-mode signing rule.
/// Idempotent on already-canonical input: re-running it over its own
/// output reproduces that output byte for byte.
pub struct TextFilter {
    inner: Box<dyn Stackable>,
    pending: Vec<u8>,
}

impl TextFilter {
    pub fn new(inner: Box<dyn Stackable>) -> Box<dyn Stackable> {
        Box::new(TextFilter {
            inner,
            pending: Vec::new(),
        })
    }

    fn emit_line(inner: &mut dyn Write, line: &[u8]) -> io::Result<()> {
        let mut end = line.len();
        while end > 0 && matches!(line[end - 1], b' ' | b'\t' | b'\r') {
            end -= 1;
        }
        inner.write_all(&line[..end])?;
        inner.write_all(b"\r\n")
    }
}

impl Write for TextFilter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &b in buf {
            if b == b'\n' {
                let line = std::mem::take(&mut self.pending);
                Self::emit_line(&mut self.inner, &line)?;
            } else {
                self.pending.push(b);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Stackable for TextFilter {
    fn into_inner(mut self: Box<Self>) -> io::Result<Option<Box<dyn Stackable>>> {
        if !self.pending.is_empty() {
            let mut end = self.pending.len();
            while end > 0 && matches!(self.pending[end - 1], b' ' | b'\t') {
                end -= 1;
            }
            self.inner.write_all(&self.pending[..end])?;
        }
        Ok(Some(self.inner))
    }
}

/// A passthrough that taps every byte into a shared [`DigestContext`].
/// Never modifies the stream.
pub struct MdFilter {
    inner: Box<dyn Stackable>,
    digest: Rc<RefCell<DigestContext>>,
}

impl MdFilter {
    pub fn new(inner: Box<dyn Stackable>, digest: Rc<RefCell<DigestContext>>) -> Box<dyn Stackable> {
        Box::new(MdFilter { inner, digest })
    }
}

impl Write for MdFilter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.digest.borrow_mut().write(&buf[..n]);
        Ok(n)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Stackable for MdFilter {
    fn into_inner(self: Box<Self>) -> io::Result<Option<Box<dyn Stackable>>> {
        Ok(Some(self.inner))
    }
}

/// Compresses everything written through it as a single OpenPGP
/// compressed-data body; the packet framing itself is
/// applied by the caller before pushing this filter.
pub struct CompressFilter {
    inner: CompressInner,
}

enum CompressInner {
    Store(Box<dyn Stackable>),
    Zip(flate2::write::DeflateEncoder<Box<dyn Stackable>>),
    Zlib(flate2::write::ZlibEncoder<Box<dyn Stackable>>),
}

impl CompressFilter {
    pub fn new(inner: Box<dyn Stackable>, algo: CompressionAlgorithm) -> Box<dyn Stackable> {
        let inner = match algo {
            CompressionAlgorithm::Uncompressed => CompressInner::Store(inner),
            CompressionAlgorithm::Zip => CompressInner::Zip(
                flate2::write::DeflateEncoder::new(inner, flate2::Compression::default()),
            ),
            CompressionAlgorithm::Zlib => CompressInner::Zlib(
                flate2::write::ZlibEncoder::new(inner, flate2::Compression::default()),
            ),
        };
        Box::new(CompressFilter { inner })
    }
}

impl Write for CompressFilter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.inner {
            CompressInner::Store(w) => w.write(buf),
            CompressInner::Zip(w) => w.write(buf),
            CompressInner::Zlib(w) => w.write(buf),
        }
    }
    fn flush(&mut self) -> io::Result<()> {
        match &mut self.inner {
            CompressInner::Store(w) => w.flush(),
            CompressInner::Zip(w) => w.flush(),
            CompressInner::Zlib(w) => w.flush(),
        }
    }
}

impl Stackable for CompressFilter {
    fn into_inner(self: Box<Self>) -> io::Result<Option<Box<dyn Stackable>>> {
        let next = match self.inner {
            CompressInner::Store(w) => w,
            CompressInner::Zip(w) => w.finish()?,
            CompressInner::Zlib(w) => w.finish()?,
        };
        Ok(Some(next))
    }
}

/// What kind of armor block is being written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArmorKind {
    Message,
    PublicKey,
    SecretKey,
    Signature,
}

impl ArmorKind {
    fn label(self) -> &'static str {
        match self {
            ArmorKind::Message => "MESSAGE",
            ArmorKind::PublicKey => "PUBLIC KEY BLOCK",
            ArmorKind::SecretKey => "PRIVATE KEY BLOCK",
            ArmorKind::Signature => "SIGNATURE",
        }
    }
}

/// The number of base64 characters per armored line (GnuPG uses 64;
/// RFC 4880 permits up to 76).
const LINE_LENGTH: usize = 64;
/// Raw bytes that encode to exactly one full line.
const RAW_PER_LINE: usize = LINE_LENGTH / 4 * 3;

struct Crc24(u32);

impl Crc24 {
    fn new() -> Self {
        Crc24(0x00B7_04CE)
    }
    fn update(&mut self, data: &[u8]) {
        for &b in data {
            self.0 ^= (b as u32) << 16;
            for _ in 0..8 {
                self.0 <<= 1;
                if self.0 & 0x0100_0000 != 0 {
                    self.0 ^= 0x0186_4CFB;
                }
            }
        }
    }
    fn finalize(&self) -> [u8; 3] {
        let v = self.0 & 0x00FF_FFFF;
        [(v >> 16) as u8, (v >> 8) as u8, v as u8]
    }
}

/// Wraps output in `-----BEGIN PGP <what>-----` / `-----END PGP
/// <what>-----` framing with a Radix-64 body and a CRC-24 `=XXXX`
/// trailer.
pub struct ArmorFilter {
    inner: Box<dyn Stackable>,
    kind: ArmorKind,
    raw_buf: Vec<u8>,
    crc: Crc24,
    header_written: bool,
}

impl ArmorFilter {
    pub fn new(inner: Box<dyn Stackable>, kind: ArmorKind) -> Box<dyn Stackable> {
        Box::new(ArmorFilter {
            inner,
            kind,
            raw_buf: Vec::new(),
            crc: Crc24::new(),
            header_written: false,
        })
    }

    fn ensure_header(&mut self) -> io::Result<()> {
        if !self.header_written {
            self.inner
                .write_all(format!("-----BEGIN PGP {}-----\n\n", self.kind.label()).as_bytes())?;
            self.header_written = true;
        }
        Ok(())
    }

    fn emit_full_lines(&mut self) -> io::Result<()> {
        while self.raw_buf.len() >= RAW_PER_LINE {
            let line: Vec<u8> = self.raw_buf.drain(..RAW_PER_LINE).collect();
            let encoded = BASE64.encode(&line);
            self.inner.write_all(encoded.as_bytes())?;
            self.inner.write_all(b"\n")?;
        }
        Ok(())
    }
}

impl Write for ArmorFilter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.ensure_header()?;
        self.crc.update(buf);
        self.raw_buf.extend_from_slice(buf);
        self.emit_full_lines()?;
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Stackable for ArmorFilter {
    fn into_inner(mut self: Box<Self>) -> io::Result<Option<Box<dyn Stackable>>> {
        self.ensure_header()?;
        if !self.raw_buf.is_empty() {
            let encoded = BASE64.encode(&self.raw_buf);
            self.inner.write_all(encoded.as_bytes())?;
            self.inner.write_all(b"\n")?;
        }
        let crc = self.crc.finalize();
        self.inner.write_all(b"=")?;
        self.inner.write_all(BASE64.encode(crc).as_bytes())?;
        self.inner.write_all(b"\n")?;
        self.inner
            .write_all(format!("-----END PGP {}-----\n", self.kind.label()).as_bytes())?;
        Ok(Some(self.inner))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::iobuf::IOBuf;

    #[test]
    fn text_filter_canonicalizes_all_line_endings() {
        for input in [&b"a\nb\n"[..], &b"a\r\nb\r\n"[..], &b"a   \nb\t\n"[..]] {
            let mut out = Vec::new();
            {
                let mut buf = IOBuf::wrap(&mut out);
                buf.push_filter(TextFilter::new).unwrap();
                buf.write_all(input).unwrap();
                buf.close().unwrap();
            }
            assert_eq!(out, b"a\r\nb\r\n");
        }
    }

    #[test]
    fn text_filter_is_idempotent() {
        let once = canon(b"-hello\r\nworld\r\n");
        let twice = canon(&once);
        assert_eq!(once, twice);
    }

    fn canon(input: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = IOBuf::wrap(&mut out);
        buf.push_filter(TextFilter::new).unwrap();
        buf.write_all(input).unwrap();
        buf.close().unwrap();
        out
    }

    #[test]
    fn armor_round_trips_through_base64() {
        let mut out = Vec::new();
        {
            let mut buf = IOBuf::wrap(&mut out);
            buf.push_filter(|w| ArmorFilter::new(w, ArmorKind::Message)).unwrap();
            buf.write_all(b"Hello world.").unwrap();
            buf.close().unwrap();
        }
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("-----BEGIN PGP MESSAGE-----\n\n"));
        assert!(text.trim_end().ends_with("-----END PGP MESSAGE-----"));

        let mut lines = text.lines();
        let _begin = lines.next().unwrap();
        let _blank = lines.next().unwrap();
        let body_line = lines.next().unwrap();
        let decoded = BASE64.decode(body_line).unwrap();
        assert_eq!(decoded, b"Hello world.");
    }

    #[test]
    fn compress_filter_round_trips() {
        for algo in [CompressionAlgorithm::Zlib, CompressionAlgorithm::Zip] {
            let mut out = Vec::new();
            {
                let mut buf = IOBuf::wrap(&mut out);
                buf.push_filter(|w| CompressFilter::new(w, algo)).unwrap();
                buf.write_all(b"some data worth compressing, repeated, repeated, repeated")
                    .unwrap();
                buf.close().unwrap();
            }
            assert!(!out.is_empty());
        }
    }
}

//! Serializes typed OpenPGP packets onto an [`IOBuf`]'s filter stack.

use std::io::{self, Write};

use crate::error::Result;
use crate::iobuf::Stackable;
use crate::types::{DataFormat, Tag};

use super::header::*;

/// Buffers writes into fixed-size chunks and frames them using OpenPGP
/// partial-body-length encoding, finishing with a normal full-length
/// chunk for whatever remains. This is how a literal-data packet whose
/// length isn't known up front (text-mode re-canonicalization changes
/// it) gets streamed in one pass.
pub struct PartialBodyFilter {
    inner: Box<dyn Stackable>,
    buffer: Vec<u8>,
    chunk_power: u8,
}

impl PartialBodyFilter {
    /// `chunk_power` of 16 buffers 64 KiB chunks, matching the
    /// teacher's streaming serializer.
    pub fn new(inner: Box<dyn Stackable>, chunk_power: u8) -> Box<dyn Stackable> {
        Box::new(PartialBodyFilter {
            inner,
            buffer: Vec::new(),
            chunk_power,
        })
    }

    fn chunk_size(&self) -> usize {
        1usize << self.chunk_power
    }
}

impl Write for PartialBodyFilter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        let chunk_size = self.chunk_size();
        while self.buffer.len() >= chunk_size {
            let chunk: Vec<u8> = self.buffer.drain(..chunk_size).collect();
            write_partial_length_octet(&mut self.inner, self.chunk_power)?;
            self.inner.write_all(&chunk)?;
        }
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Stackable for PartialBodyFilter {
    fn into_inner(mut self: Box<Self>) -> io::Result<Option<Box<dyn Stackable>>> {
        write_new_format_length(&mut self.inner, self.buffer.len() as u32)?;
        self.inner.write_all(&self.buffer)?;
        Ok(Some(self.inner))
    }
}

/// Writes a `Plaintext` packet's header directly (no body framing
/// filter); used when the body length is known up front.
pub fn write_literal_header_known_length<W: Write>(
    w: &mut W,
    format: DataFormat,
    name: &[u8],
    timestamp: u32,
    body_len: u32,
) -> Result<()> {
    debug_assert!(name.len() <= 255);
    let inner_len = 1 + 1 + name.len() + 4 + body_len as usize;
    write_new_format_header(w, Tag::Literal, inner_len as u32)?;
    write_literal_metadata(w, format, name, timestamp)?;
    Ok(())
}

/// Writes the literal packet's tag and pushes a [`PartialBodyFilter`]
/// for streaming a body whose length is unknown up front, using
/// partial-length framing. Returns the new top of the stack; the
/// caller must still write the metadata header (`format`/`name`/
/// `timestamp`) through it before the body bytes.
pub fn begin_literal_unknown_length(
    mut top: Box<dyn Stackable>,
    format: DataFormat,
    name: &[u8],
    timestamp: u32,
) -> Result<Box<dyn Stackable>> {
    write_new_format_tag(&mut top, Tag::Literal)?;
    let mut top = PartialBodyFilter::new(top, 16);
    write_literal_metadata(&mut top, format, name, timestamp)?;
    Ok(top)
}

fn write_literal_metadata<W: Write>(
    w: &mut W,
    format: DataFormat,
    name: &[u8],
    timestamp: u32,
) -> Result<()> {
    w.write_all(&[format.as_u8(), name.len() as u8])?;
    w.write_all(name)?;
    w.write_all(&timestamp.to_be_bytes())?;
    Ok(())
}

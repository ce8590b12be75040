//! `IOBuf`: a push-down chain of filters terminated by a raw sink.
//!
//! Rather than stitching filter contexts together with raw pointers and
//! mutating them in place, the chain is modeled as an ordered sequence
//! of boxed filter objects, each a [`Stackable`], generalizing
//! `sequoia_openpgp::serialize::stream::writer::Stackable` from "a fixed
//! handful of writer kinds" to "any filter the sign/export drivers need".
//!
//! A filter is pushed onto the *outer* end: `push_filter` wraps the
//! current top of the stack, so bytes written to the `IOBuf` pass
//! through filters outermost-first on the way out to the raw sink.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub mod filters;

/// A single link in the filter chain.
///
/// `into_inner` unwinds this filter, flushing any buffered state (e.g.
/// an armor CRC trailer, a compressor's final block) and returning
/// what was beneath it, so callers can keep popping filters off one at
/// a time.
pub trait Stackable: Write {
    fn into_inner(self: Box<Self>) -> io::Result<Option<Box<dyn Stackable>>>;
}

/// Wraps a plain `Write`r as the innermost link of the chain.
struct Sink<W: Write>(W);

impl<W: Write> Write for Sink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl<W: Write + 'static> Stackable for Sink<W> {
    fn into_inner(self: Box<Self>) -> io::Result<Option<Box<dyn Stackable>>> {
        Ok(None)
    }
}

/// A filter stack over an underlying sink, plus enough bookkeeping to
/// implement `close`/`cancel` semantics for on-disk output: a sign
/// session's output is cancelled on failure and closed on success.
pub struct IOBuf {
    stack: Option<Box<dyn Stackable>>,
    /// Set when this `IOBuf` owns a file on disk, so `cancel` can unlink
    /// it and `close` knows there is nothing special to do beyond
    /// flushing.
    path: Option<PathBuf>,
}

impl IOBuf {
    /// Wraps an arbitrary writer with no filters attached yet.
    pub fn wrap<W: Write + 'static>(w: W) -> Self {
        IOBuf {
            stack: Some(Box::new(Sink(w))),
            path: None,
        }
    }

    /// Creates (truncating) the file at `path` and wraps it.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let f = File::create(path)
            .map_err(|e| Error::CreateFile(path.display().to_string(), e))?;
        Ok(IOBuf {
            stack: Some(Box::new(Sink(f))),
            path: Some(path.to_path_buf()),
        })
    }

    /// Like `wrap`, but associates `path` with this `IOBuf` so `cancel`
    /// still unlinks it. Used when the underlying writer isn't a plain
    /// `File` (e.g. a fault-injecting wrapper in tests) but still
    /// corresponds to a real on-disk artifact.
    pub fn wrap_with_path<W: Write + 'static, P: AsRef<Path>>(w: W, path: P) -> Self {
        IOBuf {
            stack: Some(Box::new(Sink(w))),
            path: Some(path.as_ref().to_path_buf()),
        }
    }

    /// Pushes a new filter onto the outer end of the stack. The
    /// supplied closure receives the current top of the stack and
    /// returns the new top.
    pub fn push_filter<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(Box<dyn Stackable>) -> Box<dyn Stackable>,
    {
        let top = self
            .stack
            .take()
            .ok_or_else(|| Error::Bug("IOBuf already finalized".into()))?;
        self.stack = Some(f(top));
        Ok(())
    }

    /// Like `push_filter`, but for filters whose construction can fail
    /// (writing a packet header up front, say).
    pub fn try_push_filter<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(Box<dyn Stackable>) -> Result<Box<dyn Stackable>>,
    {
        let top = self
            .stack
            .take()
            .ok_or_else(|| Error::Bug("IOBuf already finalized".into()))?;
        self.stack = Some(f(top)?);
        Ok(())
    }

    /// Unwinds exactly the outermost filter, flushing it, and leaves
    /// whatever was beneath it as the new top. Used when a packet's
    /// body-framing filters (text/digest/length) must be finished
    /// without disturbing filters further down the stack (compression,
    /// armor) that still have more packets to receive.
    pub fn pop_filter(&mut self) -> Result<()> {
        let top = self
            .stack
            .take()
            .ok_or_else(|| Error::Bug("IOBuf already finalized".into()))?;
        let inner = top.into_inner().map_err(Error::WriteFile)?;
        self.stack = Some(
            inner.ok_or_else(|| Error::Bug("popped past the underlying sink".into()))?,
        );
        Ok(())
    }

    /// Writes a single byte.
    pub fn put(&mut self, byte: u8) -> Result<()> {
        self.write_all(&[byte])
    }

    /// Writes a UTF-8 string verbatim (no implicit newline).
    pub fn writestr(&mut self, s: &str) -> Result<()> {
        self.write_all(s.as_bytes())
    }

    /// Flushes and unwinds every filter, then (for on-disk output)
    /// leaves the file in place. This is the success path.
    pub fn close(mut self) -> Result<()> {
        self.unwind()?;
        Ok(())
    }

    /// Unwinds every filter and, if this `IOBuf` owns a file on disk,
    /// removes it. This is the failure path: no partial output survives.
    pub fn cancel(mut self) -> Result<()> {
        // Best-effort: a filter erroring out on unwind must not prevent
        // us from still unlinking the partial file.
        let _ = self.unwind();
        if let Some(path) = self.path.take() {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::WriteFile(e)),
            }
        }
        Ok(())
    }

    /// Closes on success, cancels on failure -- the single-exit-path
    /// pattern every driver follows.
    pub fn finish(self, result: Result<()>) -> Result<()> {
        match result {
            Ok(()) => self.close(),
            Err(e) => {
                self.cancel()?;
                Err(e)
            }
        }
    }

    fn unwind(&mut self) -> Result<()> {
        let mut top = self.stack.take();
        while let Some(s) = top {
            top = s.into_inner().map_err(Error::WriteFile)?;
        }
        Ok(())
    }
}

fn finalized_error() -> io::Error {
    io::Error::new(io::ErrorKind::Other, Error::Bug("IOBuf already finalized".into()))
}

impl Write for IOBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stack.as_mut().ok_or_else(finalized_error)?.write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.stack.as_mut().ok_or_else(finalized_error)?.flush()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn wrap_and_write() {
        let mut out = Vec::new();
        {
            let mut buf = IOBuf::wrap(&mut out);
            buf.writestr("hello").unwrap();
            buf.put(b'!').unwrap();
            buf.close().unwrap();
        }
        assert_eq!(out, b"hello!");
    }

    #[test]
    fn pop_filter_finishes_only_the_top_layer() {
        use filters::{ArmorFilter, ArmorKind};

        let mut out = Vec::new();
        {
            let mut buf = IOBuf::wrap(&mut out);
            buf.push_filter(|w| ArmorFilter::new(w, ArmorKind::Message)).unwrap();
            buf.push_filter(filters::TextFilter::new).unwrap();
            buf.write_all(b"line one\n").unwrap();
            // Finish the text filter alone; the armor filter underneath
            // must still be open to receive more writes.
            buf.pop_filter().unwrap();
            buf.write_all(b"more\n").unwrap();
            buf.close().unwrap();
        }
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("-----BEGIN PGP MESSAGE-----\n\n"));
        assert!(text.trim_end().ends_with("-----END PGP MESSAGE-----"));
    }

    #[test]
    fn write_after_close_errors_instead_of_panicking() {
        let mut out = Vec::new();
        let mut buf = IOBuf::wrap(&mut out);
        buf.writestr("before").unwrap();
        // `close` takes `self` by value, so reach the finalized state
        // through `unwind` directly to exercise the post-finalize path
        // without consuming `buf`.
        buf.unwind().unwrap();
        assert!(buf.write(b"after").is_err());
        assert!(buf.push_filter(filters::TextFilter::new).is_err());
    }

    #[test]
    fn cancel_removes_file() {
        let dir = std::env::temp_dir()
            .join(format!("iobuf-cancel-test-{}", std::process::id()));
        let _ = fs::create_dir_all(&dir);
        let path = dir.join("partial.out");

        let buf = IOBuf::create(&path).unwrap();
        buf.cancel().unwrap();
        assert!(!path.exists());
        let _ = fs::remove_dir_all(&dir);
    }
}

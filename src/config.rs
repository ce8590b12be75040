//! Session-wide, read-only configuration.
//!
//! Replaces a mutable global options struct: every driver takes an
//! `&Options` instead of reaching into ambient state.

use crate::types::HashAlgorithm;

/// Options consumed by the sign, clearsign and export drivers.
///
/// Cheap to clone; intended to be constructed once per invocation and
/// passed down by reference.
#[derive(Clone, Debug)]
pub struct Options {
    /// Wrap final output in ASCII armor. Ignored for the clearsign body
    /// and whenever an explicit `outfile` is given.
    pub armor: bool,

    /// Canonicalize input as text (CRLF line endings, trailing
    /// whitespace stripped) and sign with `sig_class = Text`.
    pub textmode: bool,

    /// Enable compression, unless an explicit outfile was given.
    pub compress: bool,

    /// Export only: compress inside armor.
    pub compress_keys: bool,

    /// Force old-style (RFC 1991) packet framing and v3 signatures.
    pub rfc1991: bool,

    /// Override the default digest algorithm selection.
    pub def_digest_algo: Option<HashAlgorithm>,

    /// Emit progress lines via the `log` facade.
    pub verbose: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            armor: false,
            textmode: false,
            compress: false,
            compress_keys: false,
            rfc1991: false,
            def_digest_algo: None,
            verbose: false,
        }
    }
}

impl Options {
    /// An `Options` record with every switch at its OpenPGP-conformant
    /// default.
    pub fn new() -> Self {
        Self::default()
    }

    /// The `log` level drivers should treat as enabled, derived from
    /// `verbose` rather than stored separately so the two can never
    /// disagree.
    pub fn log_level(&self) -> log::Level {
        if self.verbose {
            log::Level::Info
        } else {
            log::Level::Warn
        }
    }
}

//! Error kinds used throughout the signing and export core.

/// The crate's result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds, mirroring the boundary errors a GnuPG-style sign/export
/// driver can surface.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Failed to open an input file.
    #[error("failed to open `{0}`: {1}")]
    OpenFile(String, #[source] std::io::Error),

    /// Failed to create an output file.
    #[error("failed to create `{0}`: {1}")]
    CreateFile(String, #[source] std::io::Error),

    /// A write to the output stream failed.
    #[error("write error: {0}")]
    WriteFile(#[source] std::io::Error),

    /// A read from an input stream failed.
    #[error("read error: {0}")]
    ReadFile(#[source] std::io::Error),

    /// A key selector did not resolve to any key.
    #[error("{0}: user not found")]
    UserNotFound(String),

    /// `check_secret_key` rejected the supplied passphrase.
    #[error("bad passphrase for key {0:016X}")]
    BadPassphrase(u64),

    /// The public-key sign or digest primitive failed.
    #[error("cryptographic operation failed: {0}")]
    CryptoFailure(String),

    /// A packet was assembled incorrectly; this indicates a bug in the
    /// caller, not bad input.
    #[error("malformed packet: {0}")]
    PacketBuild(String),

    /// An invariant was violated.
    #[error("internal error: {0}")]
    Bug(String),

    /// Any other I/O error not covered by a more specific variant above.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

//! Streaming OpenPGP signing and key-export core.
//!
//! This crate implements the three tightly coupled concerns of an
//! OpenPGP toolchain's signing subsystem: a streaming filter pipeline
//! ([`iobuf`]) that composes digesting, text canonicalization,
//! compression and ASCII armor over a single pass; packet and
//! signature-hash construction ([`packet`], [`signature`]) that
//! assembles the exact byte sequence a conformant verifier expects; and
//! the multi-key orchestrators ([`sign`], [`clearsign`], [`export`])
//! that drive those pieces into embedded, detached, clearsigned and
//! key-export packet streams.
//!
//! Cryptographic primitives -- the public-key sign operation itself and
//! its PKCS#1/DSA encoding -- are out of scope and modeled as the
//! [`signature::PubkeyBackend`] trait; keyring storage and lookup are
//! likewise external, modeled as [`keys::SecretKeyStore`] and
//! [`export::KeyringSource`].

pub mod clearsign;
pub mod config;
pub mod digest;
pub mod error;
pub mod export;
pub mod iobuf;
pub mod keys;
pub mod packet;
pub mod sign;
pub mod signature;
pub mod types;

pub use error::{Error, Result};

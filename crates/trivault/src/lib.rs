//! Machine-bound encrypted key-value storage with triple-replica fault
//! tolerance.
//!
//! `trivault` persists small typed values (strings, 64-bit integers, 32/64-bit
//! floats, booleans) under caller-chosen keys.  Every record is wrapped in a
//! salted, integrity-checked envelope, encrypted with a key derived from the
//! local user and machine identity, and written to three independent
//! directories.  Reads decrypt all surviving replicas and vote, so corruption
//! or loss of any single replica is recovered transparently and reported as
//! *drift* rather than failure.
//!
//! # Modules
//!
//! - [`store`] — the thread-safe [`SecureStore`] facade.
//! - [`envelope`] — the per-record cryptographic envelope.
//! - [`crypto`] — PBKDF2 key derivation, AES-256-CBC, SHA-512 digests.
//! - [`replica`] — triple-replica file I/O and decode-then-agree voting.
//! - [`namespace`] — module (directory) management and enumeration.
//! - [`platform`] — host capability discovery, with a static variant for
//!   tests.
//! - [`value`] — the typed value model and its wire tags.
//! - [`error`] — unified error types.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Mutex;
//! use trivault::{HostPlatform, SecureStore};
//!
//! # fn example() -> trivault::Result<()> {
//! let mutex = Mutex::new(());
//! let platform = HostPlatform::new();
//! let store = SecureStore::open(&platform, &mutex)?;
//!
//! store.create_module("", "net")?;
//! store.store_to_module("net", "port", 8080_i64)?;
//!
//! let (port, consistency) = store.retrieve_i64_from_module("net", "port")?;
//! assert_eq!(port, 8080);
//!
//! // A drifted read means a replica was lost or tampered with; re-storing
//! // the value re-synchronizes the triple.
//! if consistency == trivault::Consistency::Drifted {
//!     store.store_to_module("net", "port", port)?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Security Notes
//!
//! - Confidentiality is *machine binding*, not password protection: the key
//!   derives from the local user name and machine id, so records decrypt
//!   only on the host that wrote them.  Anyone with the same local account
//!   can derive the same key.
//! - The envelope's SHA-512 integrity field is unkeyed.  It reliably
//!   separates "wrong machine" from "valid record" and detects corruption,
//!   but does not authenticate against an attacker who can write well-formed
//!   envelopes.
//! - PBKDF2 runs 1000 iterations over an empty salt.  Both parameters are
//!   fixed by the on-disk format; see the notes in [`crypto`].

pub mod crypto;
pub mod envelope;
pub mod error;
pub mod namespace;
pub mod platform;
pub mod replica;
pub mod store;
pub mod value;

// Re-export the most commonly used types at the crate root for convenience.
pub use error::{Result, StoreError};
pub use namespace::{KeyEntry, ModulePath};
pub use platform::{HostPlatform, Platform, StaticPlatform};
pub use replica::{Consistency, LoadStatus};
pub use store::SecureStore;
pub use value::{TypeTag, Value};

//! Handler framework
//!
//! This module provides the [`HashHandler`] trait and the reusable pieces a
//! scheme is assembled from.
//!
//! ## Key Components
//!
//! - [`HashHandler`] - Main trait every password hash scheme implements
//! - [`SaltSpec`], [`RoundsSpec`], [`IdentSpec`] - Optional capabilities
//! - [`Backends`] - Interchangeable digest implementations
//! - [`PrefixWrapper`] - Reuses a scheme under a different prefix
//!
//! ## Example
//!
//! ```rust
//! use passkit::handlers::Settings;
//! use passkit::registry::HandlerRegistry;
//!
//! let registry = HandlerRegistry::with_builtins();
//! let handler = registry.resolve("pbkdf2_sha256").unwrap();
//!
//! let settings = Settings::builder().rounds(1000).build();
//! let hash = handler.hash(b"password", &settings).unwrap();
//! assert!(hash.starts_with("$pbkdf2-sha256$1000$"));
//! assert!(handler.verify(b"password", &hash).unwrap());
//! ```

mod backends;
mod idents;
mod rounds;
mod salt;
mod traits;
pub(crate) mod types;
mod wrapper;

pub use backends::{Backend, BackendFn, Backends};
pub use idents::IdentSpec;
pub use rounds::{RoundsCost, RoundsSpec};
pub use salt::SaltSpec;
pub use traits::{consteq, hash_from_bytes, HandlerError, HashHandler, Result};
pub use types::{ChecksumSpec, HashRecord, Settings};
pub use wrapper::{IdentOverride, PrefixWrapper};

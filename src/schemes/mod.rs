//! Builtin password hash schemes
//!
//! Each scheme module exposes one factory per scheme with the
//! [`HandlerFactory`](crate::registry::HandlerFactory) signature. The
//! registry's builtin module table points at these factories, so schemes
//! are only constructed when first resolved.

pub mod digests;
pub mod misc;
pub mod pbkdf2;
pub mod phpass;
pub mod wrappers;

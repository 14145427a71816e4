//! Deterministic render payload for a finished set of scenes.
//!
//! Everything in here is pure: the same scenes and options always produce
//! the same payload, down to the serialized bytes.

pub mod builder;
pub mod captions;
pub mod model;
pub mod treatments;

pub use builder::build;

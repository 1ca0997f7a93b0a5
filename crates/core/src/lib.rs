//! Domain logic for the Proofdeck creative-approval tool.
//!
//! Everything in this crate is pure and synchronous: callers load and save
//! the owning records, this crate only transforms values.

pub mod comment;
pub mod creative;
pub mod error;
pub mod pin;
pub mod project;
pub mod revision;
pub mod types;
pub mod word_diff;

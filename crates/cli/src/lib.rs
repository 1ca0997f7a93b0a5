//! Command-line front end for the proofdeck review core.
//!
//! Reads and writes the flat JSON project store and renders diffs,
//! timelines and pin placements for the terminal.

pub mod commands;
pub mod config;
pub mod store;

//! Core proceedings assembly for procbook.
//!
//! This crate ties together contribution discovery, rendering through the
//! external conversion tool, and PDF merging into one end-to-end workflow
//! ([`pipeline::assemble_proceedings`]).

pub mod discovery;
pub mod merge;
pub mod pipeline;
pub mod render;

#[cfg(test)]
pub(crate) mod testing;

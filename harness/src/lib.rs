//! Stage runtime built on top of `forge-kernel`.
//!
//! This crate owns everything that touches stage execution: the
//! per-stage transaction, the stage contract, capability/sandbox
//! declarations, the orchestrator that drives stages through their state
//! machine, the in-memory cache, and the signed emitter. Proof logic
//! (canonicalization, fingerprinting, the fact store, diagnostics) stays
//! in `forge-kernel`; this crate only ever calls into it.
#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod cache;
pub mod capability;
pub mod emitter;
pub mod orchestrator;
pub mod stage;
pub mod transaction;

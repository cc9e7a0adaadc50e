//! Deterministic core of the code-generation pipeline.
//!
//! Module dependency direction is one-way and acyclic:
//!
//! ```text
//! diagnostics <- facts <- fingerprint <- intent
//! ```
//!
//! Nothing in this crate performs I/O, spawns threads, or reads wall-clock
//! time. Everything here is a pure function of its inputs, or a
//! `Mutex`-guarded in-memory structure (the fact store) whose outputs are a
//! pure function of the sequence of commits applied to it.
//!
//! Entry points a caller actually needs:
//!
//! - [`intent::canonicalize`] turns a raw JSON tree into a canonical byte
//!   string and a structured [`intent::IntentModel`].
//! - [`fingerprint::compute`] turns canonical bytes into a [`fingerprint::Fingerprint`].
//! - [`facts::FactStore`] accumulates facts across stages with atomic,
//!   conflict-checked commits.
#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod diagnostics;
pub mod facts;
pub mod fingerprint;
pub mod intent;

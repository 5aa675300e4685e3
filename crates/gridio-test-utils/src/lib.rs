//! Test utilities for gridio development.
//!
//! Provides the sample mesh fixture and dataset writers ([`fixtures`]), an
//! [`InstrumentedLibrary`] that records native calls and injects faults,
//! and a [`ScriptedSniffer`] for driving convention detection.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;
mod instrumented;
mod sniffer;

pub use instrumented::{Fault, InstrumentedLibrary, LibraryProbe};
pub use sniffer::ScriptedSniffer;

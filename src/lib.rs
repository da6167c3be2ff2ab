//! Spectrum: command line access to the feed store
//!
//! The data access itself lives in `spectrum-databases`; this crate wires it
//! to a CLI.

pub mod cli;

pub use spectrum_databases as databases;

//! Core domain types for the batch script executor.
//!
//! This module contains pure domain types with no I/O:
//! - Script definitions and per-type column layouts
//! - Parsed rows
//! - Per-row results, run status and progress

pub mod result;
pub mod row;
pub mod script;

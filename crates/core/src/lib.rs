//! Core accounting logic for Tally.
//!
//! This crate contains pure business logic with ZERO storage dependencies.
//! All domain types, validation rules, and calculations live here; the
//! `tally-db` crate wraps them in transactional units.
//!
//! # Modules
//!
//! - `accounts` - Chart of accounts tree, normal balances, rollups, IFRS tags
//! - `ledger` - Double-entry posting validation, journal, reversals
//! - `allocation` - Percentage splits with a single rounding policy
//! - `dimension` - Analysis dimensions, hierarchy, assignments, breakdowns
//! - `reconciliation` - Statement matching, adjustments, completion
//! - `cogs` - Production-to-sale cost attribution and margin reporting
//! - `cancel` - Abort signals for long-running reads

pub mod accounts;
pub mod allocation;
pub mod cancel;
pub mod cogs;
pub mod dimension;
pub mod ledger;
pub mod reconciliation;

#[cfg(test)]
mod allocation_props;

pub use cancel::AbortSignal;

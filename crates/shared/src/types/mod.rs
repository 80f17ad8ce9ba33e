//! Common types used across the engine.

pub mod batch;
pub mod id;
pub mod money;
pub mod period;


pub use batch::{BatchFailure, BatchReport};
pub use id::*;
pub use money::{Currency, Money, RoundingPolicy};
pub use period::DateRange;

//! Code browsing: selection, filtering, eligibility, and action outcomes.

pub mod actions;
pub mod eligibility;
pub mod filter;
pub mod selection;

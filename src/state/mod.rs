//! State module for tracking per-domain and per-fetch state during the crawl.
//!
//! # Components
//!
//! - `FetchErrorKind`: classifies a failed fetch attempt (transient vs. terminal).
//! - `DomainGovernor`: per-domain politeness, failure penalties, page caps and
//!   the robots.txt cache.

mod domain_state;
mod page_state;

// Re-export main types
pub use domain_state::DomainGovernor;
pub use page_state::FetchErrorKind;

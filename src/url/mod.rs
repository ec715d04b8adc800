//! URL handling module for Sumi-Ripple
//!
//! This module provides URL normalization, domain extraction, and wildcard
//! domain matching.

mod domain;
mod matcher;
mod normalize;

// Re-export main functions
pub use domain::extract_domain;
pub use matcher::matches_wildcard;
pub use normalize::normalize_url;

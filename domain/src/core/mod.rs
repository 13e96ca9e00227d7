//! Core domain concepts shared across all subdomains.
//!
//! - [`error::DomainError`]: protocol errors and empty-result conditions

pub mod error;

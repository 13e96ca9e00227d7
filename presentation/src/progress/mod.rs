//! Epoch progress reporting

pub mod reporter;

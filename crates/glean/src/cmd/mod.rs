//! Command implementations for the glean CLI

pub mod pull;

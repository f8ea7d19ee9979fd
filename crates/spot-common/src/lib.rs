//! Common utilities for spot
//!
//! This crate provides the error taxonomy shared by the spot data mapper
//! and its adapters.

pub mod error;

pub use error::{Result, SpotError};

//! Infrastructure layer.
//!
//! Technical concerns that support the sync core without containing its
//! logic: configuration, logging setup and runtime wiring.
//!
//! # Submodules
//!
//! - [`bootstrap`] - Composition root for runtime wiring
//! - [`config`] - Configuration loading and validation

pub mod bootstrap;
pub mod config;

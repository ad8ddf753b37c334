//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`burst`] - Simulate a pan burst and report which tiles won
//! - [`level`] - Render every tile of a zoom level
//! - [`render`] - Render a single tile

pub mod burst;
pub mod common;
pub mod level;
pub mod render;

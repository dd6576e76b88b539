//! Grid Traffic Library
//!
//! A tile-grid traffic simulation engine that runs headless.

pub mod simulation;

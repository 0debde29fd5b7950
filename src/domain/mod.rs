//! Domain types for the preflight validation engine

pub mod model;

pub use model::*;

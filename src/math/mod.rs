//! Mathematical utilities

pub mod bounds;

pub use bounds::Bounds;

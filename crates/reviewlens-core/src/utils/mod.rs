//! Small shared helpers.

pub mod lines;

pub use lines::LineSplitter;

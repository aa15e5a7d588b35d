//! Command-line interface of the `freezemon` demo binary

pub mod args;

pub use args::Args;

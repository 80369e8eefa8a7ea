//! Command-line interface of the headless binary

pub mod args;

pub use args::Args;

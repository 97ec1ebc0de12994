//! Feature slices of the console engine.

pub mod codes;

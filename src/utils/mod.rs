//! Small shared helpers.

pub mod cost;

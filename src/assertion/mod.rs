//! Declarative assertions
//!
//! A field path picks a value out of a canonical response and an operator
//! checks it, so suites validate arbitrary response shapes without per-case
//! code.

pub mod ops;
pub mod path;

pub use ops::{evaluate, values_equal, Assertion, Op, Verdict};
pub use path::{extract_field, FieldPath};

//!
//! quarry-std-core - Core Runtime Types
//!
//! This crate provides the fundamental types shared across all quarry standard library crates:
//!
//! - `Value` for host-language values (scalars, temporal, lists, keyed maps)
//! - `Row` for one materialized result row
//! - `Scope` for the variable pipeline that placeholders resolve against
//! - `ExecutionContext` carrying the explicit environment and script identity
//! - `QuarryError` and `AssertionFailure` for error reporting
//!

pub mod value;
pub mod scope;
pub mod exception;

pub use value::*;
pub use scope::*;
pub use exception::*;

//! Cirrus Value
//!
//! Deferred values stand in for resource attributes that are only known once
//! the producing resource has been realized (generated bucket names, domain
//! names, ARNs).
//!
//! - [`Deferred`] is a lazily evaluated expression over one or more
//!   [`OutputRef`]s, built with `output`, `map` and `combine`.
//! - [`InputValue`] is a resource input: a literal, a deferred value, or a
//!   list/record nesting either.
//! - [`RealizedOutputs`] holds the outputs of every realized resource in an
//!   apply run. Each resource's entry is written exactly once.
//!
//! Nothing here performs I/O. Resolution reads from a `RealizedOutputs`
//! snapshot and fails with [`ValueError::UnresolvedReference`] when a producer
//! has not been realized yet.

mod deferred;
mod error;
mod input;
mod output;

pub use deferred::{Deferred, Resolution};
pub use error::ValueError;
pub use input::{InputValue, UNKNOWN_PLACEHOLDER};
pub use output::{OutputMap, OutputRef, RealizedOutputs};

//! Cirrus Stack
//!
//! This crate provides the validated resource graph for Cirrus. A stack is
//! built once, from declarations in any order, and checked before anything
//! is realized.
//!
//! Key differences from `cirrus-config`:
//! - Inputs are typed [`InputValue`](cirrus_value::InputValue)s, with
//!   references to other resources' outputs held as deferred values
//! - Dependency edges are derived (implicit from references, explicit from
//!   `depends_on`) and proven acyclic
//! - Every reference names an output the producer's kind actually produces

mod builder;
mod error;
mod graph;
mod resource;
mod stack;
pub mod website;

pub use builder::{ResourceDecl, StackBuilder};
pub use error::StackError;
pub use graph::Graph;
pub use resource::{Resource, ResourceHandle};
pub use stack::Stack;

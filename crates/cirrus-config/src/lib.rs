//! Cirrus Config
//!
//! This crate contains the serializable stack configuration types for Cirrus.
//! These types represent stack definitions before they are lowered and
//! validated into a resource graph.
//!
//! Configuration is loaded from JSON files (via CLI with `cirrus up stack.json`).
//!
//! The resolver takes these configuration types, turns template strings into
//! deferred values, and validates the resulting graph before anything is
//! realized.

mod input;
mod kind;
mod resource;
mod stack;

pub use input::InputDef;
pub use kind::ResourceKind;
pub use resource::ResourceDef;
pub use stack::StackDef;

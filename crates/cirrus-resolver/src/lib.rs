//! Cirrus Resolver
//!
//! Lowers JSON stack definitions (`cirrus-config`) into validated stacks
//! (`cirrus-stack`). Template strings become deferred values and the graph is
//! checked before it is returned.

mod error;
mod resolver;
mod template;

pub use error::ResolveError;
pub use resolver::{Resolver, StandardResolver};

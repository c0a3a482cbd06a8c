//! Combinators composing tasks over the scheduler primitives.

pub mod chain;
pub mod join;
pub mod repeat;
pub mod sequence;
pub mod wait;

//! Construction Phase
//!
//! Graphs are declared with [`GraphBuilder`] and validated exactly once by
//! [`GraphValidator`]. Validation is the only place a configuration error can
//! arise; the scheduler only ever sees a [`crate::validated_graph::ValidatedGraph`].

mod builder;
mod validator;

pub use builder::GraphBuilder;
pub use validator::GraphValidator;

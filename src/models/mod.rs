//! Built-in forward models.
//!
//! Production models (dual porosity, composite, fractured horizontal wells
//! and so on) are provided by the host application through
//! [`ForwardModel`](crate::model::ForwardModel). The line-source solution
//! here is the simplest physically meaningful one and serves as a reference
//! for tests, benchmarks and demos.

mod line_source;

pub use line_source::{exp_integral_e1, LineSourceModel};

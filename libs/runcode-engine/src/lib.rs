//! Grading core for the run-code service.
//!
//! A submission flows through the [`dispatcher`] (pick a backend by language),
//! the [`normalizer`] (decode each test input), the [`resolver`] (find the entry
//! point), an execution backend under [`engine`], and the [`evaluator`]
//! (compare and render). [`executor::TestRunner`] drives the whole run.

pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod evaluator;
pub mod executor;
pub mod normalizer;
pub mod resolver;

pub use executor::{SystemFault, TestRunner};

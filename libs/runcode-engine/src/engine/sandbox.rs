// In-process execution seam
use runcode_common::types::{TestCase, TestResult};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::prepare_case;
use crate::evaluator::{self, ExecutionOutcome};

/// Failures that stop a sandboxed run before any test case executes
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SandboxError {
    /// The submitted source did not evaluate
    #[error("{0}")]
    Evaluation(String),
    /// No entry point could be found
    #[error("{0}")]
    Resolution(String),
    /// The engine itself could not be prepared
    #[error("{0}")]
    Setup(String),
}

/// An execution environment that loads a submission once and then calls its
/// entry point repeatedly. State left behind by one call is visible to the
/// next; every submission gets a fresh sandbox.
pub trait Sandbox {
    type EntryPoint;

    /// Evaluate `source` and locate the function to grade
    fn resolve_entry_point(&mut self, source: &str) -> Result<Self::EntryPoint, SandboxError>;

    /// Call the entry point once. Faults are reported in the outcome, never raised.
    fn invoke(&mut self, entry_point: &Self::EntryPoint, args: &[Value]) -> ExecutionOutcome;
}

/// Grade every test case through `sandbox`, in order
pub fn run_sandboxed<S: Sandbox>(
    sandbox: &mut S,
    source: &str,
    test_cases: &[TestCase],
) -> Vec<TestResult> {
    let entry_point = match sandbox.resolve_entry_point(source) {
        Ok(entry_point) => entry_point,
        Err(SandboxError::Evaluation(message)) => {
            return vec![evaluator::code_execution_failed(message)];
        }
        Err(SandboxError::Resolution(message)) => {
            return vec![evaluator::function_not_found(message)];
        }
        Err(SandboxError::Setup(message)) => {
            return vec![evaluator::system_error(message)];
        }
    };

    test_cases
        .iter()
        .enumerate()
        .map(|(index, test_case)| {
            let prepared = match prepare_case(test_case) {
                Ok(prepared) => prepared,
                Err(fault) => {
                    debug!(test_case = index + 1, error = %fault.message, "Test case could not be decoded");
                    return evaluator::fault_result(index, test_case, fault);
                }
            };

            let outcome = sandbox.invoke(&entry_point, &prepared.args);
            evaluator::evaluate_case(index, test_case, &prepared.expected, outcome)
        })
        .collect()
}

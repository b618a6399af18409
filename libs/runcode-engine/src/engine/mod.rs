/// Execution Backends
///
/// **Critical Architectural Boundary:**
/// - A backend knows HOW to run code (embedded engine or spawned interpreter)
/// - A backend does NOT decide whether a result is correct
/// - A backend hands `ExecutionOutcome`s to the evaluator
///
/// `javascript` runs submissions inside an embedded engine through the
/// `Sandbox` seam; `interpreter` writes scripts to a temporary directory and
/// spawns one process per test case.

pub mod interpreter;
pub mod javascript;
pub mod sandbox;

use runcode_common::types::TestCase;
use serde_json::Value;

use crate::evaluator::{decode_expected, Fault, FaultKind};
use crate::normalizer::normalize;

/// A test case decoded into call arguments and a comparable expected value
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedCase {
    pub args: Vec<Value>,
    pub expected: Value,
}

/// Decode input and expected output; failures are scoped to this one test case
pub fn prepare_case(test_case: &TestCase) -> Result<PreparedCase, Fault> {
    let args = normalize(&test_case.input).map_err(|e| {
        Fault::new(
            FaultKind::InvalidInput,
            format!("Failed to parse test input: {}", e),
        )
    })?;
    let expected = decode_expected(&test_case.expected_output)?;

    Ok(PreparedCase { args, expected })
}

/// Test Evaluator - Language-Agnostic Comparison and Result Rendering
///
/// **Core Responsibility:**
/// Turn an execution outcome into a `TestResult` row.
///
/// **Critical Properties:**
/// - Knows nothing about JavaScript engines or interpreter processes
/// - Receives already-decoded JSON values, never raw program output
/// - Pure functions: (outcome, expected) → row
///
/// **Comparison Rules (Applied to All Languages):**
/// - Values are canonicalized first: integral floats become integers (`10.0` == `10`)
/// - Two arrays pass when their lengths match and either the original order
///   or the ascending-sorted order is element-wise equal
/// - Anything else passes iff the canonical serializations are equal
///   (object key order is irrelevant)
///
/// Every synthetic row (missing function, unsupported language, setup and
/// system failures) is built here as well so the wording stays in one place.

use runcode_common::types::{TestCase, TestResult};
use serde_json::Value;
use std::cmp::Ordering;

/// Largest integer an IEEE double represents exactly (2^53 - 1)
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Why a test case produced no comparable value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Entry point threw or the driver reported an error
    Threw,
    /// Input or expected output could not be decoded
    InvalidInput,
    /// Process exited without writing a report
    NoOutput,
    /// Process wrote something that is not a driver report
    MalformedOutput,
    TimedOut,
    /// Interpreter binary could not be started
    Unavailable,
    /// Temporary files could not be written
    Setup,
}

impl FaultKind {
    /// Text shown in the `actual` column
    pub fn sentinel(self) -> &'static str {
        match self {
            FaultKind::Threw => "Runtime Error",
            FaultKind::InvalidInput | FaultKind::MalformedOutput => "Parse Error",
            FaultKind::NoOutput => "No Output",
            FaultKind::TimedOut => "Time Limit Exceeded",
            FaultKind::Unavailable => "Execution Error",
            FaultKind::Setup => "Setup Error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn threw(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Threw, message)
    }
}

/// Raw result of invoking the entry point once.
/// Produced by a backend, consumed by the evaluator.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Value(Value),
    /// The JavaScript entry point returned `undefined`
    Undefined,
    RuntimeFault(Fault),
}

/// JSON number for `number`, as an integer when it is integral and exactly representable
pub fn canonical_number(number: f64) -> Value {
    if number.fract() == 0.0 && number.abs() <= MAX_SAFE_INTEGER {
        Value::from(number as i64)
    } else {
        serde_json::Number::from_f64(number)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Recursively rewrite integral floats as integers
pub fn canonicalize(value: Value) -> Value {
    match value {
        Value::Number(number) if number.is_f64() => match number.as_f64() {
            Some(float) => canonical_number(float),
            None => Value::Number(number),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect(),
        ),
        other => other,
    }
}

/// Compact JSON text of a value
pub fn render(value: &Value) -> String {
    value.to_string()
}

/// Decode a test case's expected output
pub fn decode_expected(raw: &str) -> Result<Value, Fault> {
    serde_json::from_str::<Value>(raw.trim())
        .map(canonicalize)
        .map_err(|e| {
            Fault::new(
                FaultKind::InvalidInput,
                format!("Failed to parse expected output `{}`: {}", raw.trim(), e),
            )
        })
}

/// Decide whether `actual` satisfies `expected`. Both must already be canonical.
pub fn values_match(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Array(actual_items), Value::Array(expected_items)) => {
            if actual_items.len() != expected_items.len() {
                return false;
            }
            if render(actual) == render(expected) {
                return true;
            }
            render_sorted(actual_items) == render_sorted(expected_items)
        }
        _ => render(actual) == render(expected),
    }
}

fn render_sorted(items: &[Value]) -> String {
    let mut sorted = items.to_vec();
    sorted.sort_by(compare_values);
    render(&Value::Array(sorted))
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order used for the order-insensitive list comparison
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => {
            render(a).cmp(&render(b))
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Build the row for test case `index` from its outcome
pub fn evaluate_case(
    index: usize,
    test_case: &TestCase,
    expected: &Value,
    outcome: ExecutionOutcome,
) -> TestResult {
    match outcome {
        ExecutionOutcome::Value(actual) => {
            let actual = canonicalize(actual);
            TestResult {
                name: test_case.display_name(index),
                passed: values_match(&actual, expected),
                expected: render(expected),
                actual: render(&actual),
                error: None,
            }
        }
        ExecutionOutcome::Undefined => TestResult {
            name: test_case.display_name(index),
            passed: false,
            expected: render(expected),
            actual: "undefined".to_string(),
            error: None,
        },
        ExecutionOutcome::RuntimeFault(fault) => fault_result(index, test_case, fault),
    }
}

/// Failed row for a test case that produced no comparable value
pub fn fault_result(index: usize, test_case: &TestCase, fault: Fault) -> TestResult {
    TestResult::failure(
        test_case.display_name(index),
        test_case.expected_output.clone(),
        fault.kind.sentinel(),
        fault.message,
    )
}

/// Single row emitted when no entry point could be resolved
pub fn function_not_found(message: impl Into<String>) -> TestResult {
    TestResult::failure(
        "Function Detection",
        "A valid function",
        "No function found",
        message,
    )
}

/// Single row emitted when the submitted source does not evaluate
pub fn code_execution_failed(message: impl Into<String>) -> TestResult {
    TestResult::failure(
        "Code Execution",
        "Valid code execution",
        "Execution failed",
        message,
    )
}

/// Single row emitted when the interpreter workspace cannot be prepared
pub fn setup_failed(display_name: &str, message: impl Into<String>) -> TestResult {
    TestResult::failure(
        format!("{} Setup", display_name),
        "Successful setup",
        "Setup Error",
        message,
    )
}

/// Single row for a language that is configured but has no backend
pub fn not_implemented(display_name: &str) -> TestResult {
    TestResult::failure(
        format!("{} Execution", display_name),
        format!("{} support", display_name),
        "Not Implemented",
        format!(
            "{} execution is not yet implemented. Please use JavaScript or Python for now.",
            display_name
        ),
    )
}

/// Single row for an unexpected fault in the orchestrator
pub fn system_error(message: impl Into<String>) -> TestResult {
    TestResult::failure(
        "System Error",
        "Successful execution",
        "System Error",
        message,
    )
}

/// Single row for a request that is missing required fields
pub fn invalid_request(message: impl Into<String>) -> TestResult {
    TestResult::failure(
        "Invalid Request",
        "Code and test cases",
        "Missing fields",
        message,
    )
}

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One grading unit: source code, declared language and ordered test cases.
///
/// Created per request and owned by a single grading run; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: Uuid,
    pub language: String,
    pub source_code: String,
    pub test_cases: Vec<TestCase>,
    /// Per-challenge entry point names, replacing the language defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_names: Option<Vec<String>>,
}

impl Submission {
    pub fn new(
        language: impl Into<String>,
        source_code: impl Into<String>,
        test_cases: Vec<TestCase>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            language: language.into(),
            source_code: source_code.into(),
            test_cases,
            candidate_names: None,
        }
    }

    pub fn with_candidate_names(mut self, names: Vec<String>) -> Self {
        self.candidate_names = Some(names);
        self
    }
}

/// A single (input, expected output) pair. Identity is its position in the submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TestCase {
    pub fn new(input: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected_output: expected_output.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Row name shown to the user: the description, or `Test Case N` (1-based)
    pub fn display_name(&self, index: usize) -> String {
        match self.description.as_deref().map(str::trim) {
            Some(description) if !description.is_empty() => description.to_string(),
            _ => format!("Test Case {}", index + 1),
        }
    }
}

/// Outcome of one test case, or a synthetic row describing why grading stopped early.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub expected: String,
    pub actual: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestResult {
    pub fn failure(
        name: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            passed: false,
            expected: expected.into(),
            actual: actual.into(),
            error: Some(error.into()),
        }
    }
}

/// Grading request body as posted by the interview editor and the assessment flow.
///
/// Every field is optional on the wire so that a missing field can be reported
/// as a failed row instead of a deserialization error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCodeRequest {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub test_cases: Option<Vec<TestCase>>,
    #[serde(default)]
    pub candidate_names: Option<Vec<String>>,
}

impl RunCodeRequest {
    /// Build a submission, or `None` when the code or the test cases are missing
    pub fn into_submission(self) -> Option<Submission> {
        let code = self.code.filter(|code| !code.is_empty())?;
        let test_cases = self.test_cases?;
        let submission = Submission::new(self.language.unwrap_or_default(), code, test_cases);

        Some(match self.candidate_names {
            Some(names) if !names.is_empty() => submission.with_candidate_names(names),
            _ => submission,
        })
    }
}

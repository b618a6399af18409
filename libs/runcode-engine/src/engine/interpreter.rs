/// Interpreter Backend - One Process per Test Case
///
/// **Execution Rules:**
/// 1. Resolve statically first; a source with no usable function spawns nothing
/// 2. Create one temporary directory per submission and write the source once
/// 3. Write a driver script per test case carrying its decoded arguments as data
/// 4. Spawn every interpreter concurrently, each under its own wall-clock timeout
/// 5. Read exactly one JSON report line from stdout
/// 6. Reassemble results in test-case order, then remove the directory once
///
/// The driver re-resolves the entry point inside the interpreter from the same
/// candidate list. The comparison in `evaluator` is authoritative; the driver's
/// own verdict only feeds a drift warning.

use futures_util::future::join_all;
use runcode_common::types::{Submission, TestCase, TestResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use super::{prepare_case, PreparedCase};
use crate::config::{DriverKind, InterpreterConfig, LanguageConfig};
use crate::evaluator::{self, ExecutionOutcome, Fault, FaultKind};
use crate::resolver::{DeclarationSyntax, Resolver, MISSING_FUNCTION_MESSAGE};

const PYTHON_DRIVER: &str = include_str!("driver.py");
const PAYLOAD_PLACEHOLDER: &str = "__RUNCODE_PAYLOAD__";

/// Data handed to the driver script
#[derive(Debug, Serialize)]
struct DriverPayload<'a> {
    solution: &'a str,
    args: &'a [Value],
    expected: &'a Value,
    candidates: &'a [String],
    fallback: Option<&'a str>,
}

/// The single line a driver writes to stdout
#[derive(Debug, Deserialize)]
struct DriverReport {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    passed: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

pub struct InterpreterBackend {
    display_name: String,
    config: InterpreterConfig,
}

impl InterpreterBackend {
    pub fn new(language: &LanguageConfig, config: &InterpreterConfig) -> Self {
        Self {
            display_name: language.display_name(),
            config: config.clone(),
        }
    }

    fn syntax(&self) -> DeclarationSyntax {
        match self.config.driver {
            DriverKind::Python => DeclarationSyntax::Python,
        }
    }

    /// Grade every test case of `submission` in its own interpreter process
    #[instrument(skip_all, fields(submission_id = %submission.id, language = %self.display_name))]
    pub async fn run(&self, submission: &Submission, resolver: &Resolver) -> Vec<TestResult> {
        let source = submission.source_code.as_str();
        let syntax = self.syntax();

        if resolver.resolve_static(source, syntax).is_none() {
            debug!("No entry point declared, skipping execution");
            return vec![evaluator::function_not_found(MISSING_FUNCTION_MESSAGE)];
        }

        let workspace = match Workspace::create(&self.config, source).await {
            Ok(workspace) => workspace,
            Err(e) => {
                warn!(error = %e, "Failed to prepare interpreter workspace");
                return vec![evaluator::setup_failed(&self.display_name, e.to_string())];
            }
        };

        let fallback = resolver.fallback_name(source, syntax);
        let runs = submission
            .test_cases
            .iter()
            .enumerate()
            .map(|(index, test_case)| {
                self.run_case(&workspace, resolver.candidates(), fallback.as_deref(), index, test_case)
            });
        let results = join_all(runs).await;

        workspace.close();
        results
    }

    async fn run_case(
        &self,
        workspace: &Workspace,
        candidates: &[String],
        fallback: Option<&str>,
        index: usize,
        test_case: &TestCase,
    ) -> TestResult {
        let prepared = match prepare_case(test_case) {
            Ok(prepared) => prepared,
            Err(fault) => return evaluator::fault_result(index, test_case, fault),
        };

        let script = match workspace
            .write_driver(self.config.driver, index, &prepared, candidates, fallback)
            .await
        {
            Ok(script) => script,
            Err(fault) => return evaluator::fault_result(index, test_case, fault),
        };

        let started = Instant::now();
        let (outcome, driver_verdict) = self.execute_script(workspace.path(), &script).await;
        debug!(
            test_case = index + 1,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Interpreter finished"
        );

        let result = evaluator::evaluate_case(index, test_case, &prepared.expected, outcome);
        if let Some(verdict) = driver_verdict {
            if verdict != result.passed {
                warn!(
                    test_case = index + 1,
                    driver_passed = verdict,
                    passed = result.passed,
                    "Driver verdict disagrees with comparator"
                );
            }
        }
        result
    }

    async fn execute_script(&self, dir: &Path, script: &Path) -> (ExecutionOutcome, Option<bool>) {
        let mut command = Command::new(&self.config.command);
        command
            .args(&self.config.args)
            .arg(script)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return fault(FaultKind::Unavailable, format!("{} not available: {}", self.display_name, e));
            }
        };

        let limit = Duration::from_millis(self.config.timeout_ms);
        match timeout(limit, child.wait_with_output()).await {
            Ok(Ok(output)) => interpret_output(
                &self.display_name,
                &String::from_utf8_lossy(&output.stdout),
                &String::from_utf8_lossy(&output.stderr),
                output.status.code(),
            ),
            Ok(Err(e)) => fault(
                FaultKind::NoOutput,
                format!("Failed to collect {} output: {}", self.display_name, e),
            ),
            // Dropping the wait future kills the child
            Err(_) => fault(
                FaultKind::TimedOut,
                format!("Execution timed out after {} ms", self.config.timeout_ms),
            ),
        }
    }
}

fn fault(kind: FaultKind, message: String) -> (ExecutionOutcome, Option<bool>) {
    (ExecutionOutcome::RuntimeFault(Fault::new(kind, message)), None)
}

/// Map a finished process to an outcome plus the driver's own verdict, if it gave one
pub fn interpret_output(
    display_name: &str,
    stdout: &str,
    stderr: &str,
    exit_code: Option<i32>,
) -> (ExecutionOutcome, Option<bool>) {
    let stdout = stdout.trim();
    if stdout.is_empty() {
        let message = match (stderr.trim(), exit_code) {
            (stderr, _) if !stderr.is_empty() => stderr.to_string(),
            (_, Some(code)) => format!("{} execution failed with exit code {}", display_name, code),
            (_, None) => format!("{} execution was terminated by a signal", display_name),
        };
        return fault(FaultKind::NoOutput, message);
    }

    let line = stdout.lines().last().unwrap_or(stdout).trim();
    match serde_json::from_str::<DriverReport>(line) {
        Ok(DriverReport { error: Some(error), .. }) => {
            (ExecutionOutcome::RuntimeFault(Fault::threw(error)), None)
        }
        Ok(report) => (ExecutionOutcome::Value(report.result), report.passed),
        Err(_) => fault(
            FaultKind::MalformedOutput,
            format!("Failed to parse {} output: {}", display_name, stdout),
        ),
    }
}

/// Temporary directory holding one submission's source and driver scripts
struct Workspace {
    dir: TempDir,
    solution_file: String,
    extension: String,
}

impl Workspace {
    async fn create(config: &InterpreterConfig, source: &str) -> std::io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("runcode-").tempdir()?;
        let solution_file = format!("solution{}", config.file_extension);
        tokio::fs::write(dir.path().join(&solution_file), source).await?;

        Ok(Self {
            dir,
            solution_file,
            extension: config.file_extension.clone(),
        })
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    async fn write_driver(
        &self,
        driver: DriverKind,
        index: usize,
        prepared: &PreparedCase,
        candidates: &[String],
        fallback: Option<&str>,
    ) -> Result<PathBuf, Fault> {
        let payload = DriverPayload {
            solution: &self.solution_file,
            args: &prepared.args,
            expected: &prepared.expected,
            candidates,
            fallback,
        };
        let script = render_driver(driver, &payload)
            .map_err(|e| Fault::new(FaultKind::Setup, format!("Failed to encode test case: {}", e)))?;

        let path = self.path().join(format!("test_{}{}", index, self.extension));
        tokio::fs::write(&path, script)
            .await
            .map_err(|e| Fault::new(FaultKind::Setup, format!("Failed to write test script: {}", e)))?;
        Ok(path)
    }

    /// Remove the directory; failures are logged and otherwise ignored
    fn close(self) {
        let path = self.dir.path().display().to_string();
        if let Err(e) = self.dir.close() {
            warn!(path = %path, error = %e, "Failed to remove interpreter workspace");
        }
    }
}

/// Driver source with the payload embedded as a string literal
fn render_driver(driver: DriverKind, payload: &DriverPayload<'_>) -> serde_json::Result<String> {
    let json = serde_json::to_string(payload)?;
    let literal = serde_json::to_string(&json)?;

    Ok(match driver {
        DriverKind::Python => PYTHON_DRIVER.replace(PAYLOAD_PLACEHOLDER, &literal),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendConfig, LanguageConfigManager};
    use serde_json::json;

    fn python_backend() -> (InterpreterBackend, Resolver) {
        let manager = LanguageConfigManager::builtin().unwrap();
        let language = manager.get_config("python").unwrap();
        let interpreter = match &language.backend {
            BackendConfig::Interpreter(interpreter) => interpreter.clone(),
            other => panic!("unexpected backend: {:?}", other),
        };
        (
            InterpreterBackend::new(language, &interpreter),
            Resolver::new(&language.entry_point),
        )
    }

    /// Stand-in interpreter: `sh -c script runcode <driver path>`, run in the workspace
    #[cfg(unix)]
    fn shell_backend(script: &str) -> (InterpreterBackend, Resolver) {
        let (mut backend, resolver) = python_backend();
        backend.config.command = "sh".to_string();
        backend.config.args = vec!["-c".to_string(), script.to_string(), "runcode".to_string()];
        (backend, resolver)
    }

    /// Shell prelude that sets `n` to the test case index taken from `test_{n}.py`
    #[cfg(unix)]
    const CASE_INDEX: &str = "n=${1##*/test_}; n=${n%.*}; ";

    #[cfg(unix)]
    fn indexed_cases(count: usize) -> Vec<TestCase> {
        (0..count)
            .map(|i| TestCase::new(i.to_string(), i.to_string()))
            .collect()
    }

    #[test]
    fn test_interpret_value_report() {
        let stdout = r#"{"result":[0,1],"expected":[0,1],"passed":true,"actual":"[0,1]","expectedJson":"[0,1]"}"#;
        let (outcome, verdict) = interpret_output("Python", stdout, "", Some(0));
        assert_eq!(outcome, ExecutionOutcome::Value(json!([0, 1])));
        assert_eq!(verdict, Some(true));
    }

    #[test]
    fn test_interpret_error_report() {
        let (outcome, verdict) =
            interpret_output("Python", "{\"error\":\"ZeroDivisionError: division by zero\"}\n", "", Some(0));
        match outcome {
            ExecutionOutcome::RuntimeFault(fault) => {
                assert_eq!(fault.kind, FaultKind::Threw);
                assert!(fault.message.contains("ZeroDivisionError"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(verdict.is_none());
    }

    #[test]
    fn test_interpret_null_result() {
        let (outcome, _) = interpret_output("Python", r#"{"result":null,"passed":false}"#, "", Some(0));
        assert_eq!(outcome, ExecutionOutcome::Value(Value::Null));
    }

    #[test]
    fn test_interpret_empty_stdout_uses_stderr() {
        let (outcome, _) = interpret_output("Python", "  \n", "Traceback: boom\n", Some(1));
        assert_eq!(
            outcome,
            ExecutionOutcome::RuntimeFault(Fault::new(FaultKind::NoOutput, "Traceback: boom"))
        );

        let (outcome, _) = interpret_output("Python", "", "", Some(2));
        assert_eq!(
            outcome,
            ExecutionOutcome::RuntimeFault(Fault::new(
                FaultKind::NoOutput,
                "Python execution failed with exit code 2"
            ))
        );
    }

    #[test]
    fn test_interpret_garbage_output() {
        let (outcome, _) = interpret_output("Python", "hello there", "", Some(0));
        match outcome {
            ExecutionOutcome::RuntimeFault(fault) => {
                assert_eq!(fault.kind, FaultKind::MalformedOutput);
                assert_eq!(fault.message, "Failed to parse Python output: hello there");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_render_driver_embeds_payload_as_literal() {
        let args = vec![json!("'''\"); import os #")];
        let expected = json!(1);
        let candidates = vec!["solution".to_string()];
        let payload = DriverPayload {
            solution: "solution.py",
            args: &args,
            expected: &expected,
            candidates: &candidates,
            fallback: None,
        };

        let script = render_driver(DriverKind::Python, &payload).unwrap();
        assert!(!script.contains(PAYLOAD_PLACEHOLDER));

        let line = script
            .lines()
            .find(|line| line.starts_with("PAYLOAD = json.loads("))
            .unwrap();
        let literal = line
            .trim_start_matches("PAYLOAD = json.loads(")
            .trim_end_matches(')');
        let decoded: String = serde_json::from_str(literal).unwrap();
        let decoded: Value = serde_json::from_str(&decoded).unwrap();
        assert_eq!(decoded["args"], json!(["'''\"); import os #"]));
        assert_eq!(decoded["fallback"], Value::Null);
    }

    #[tokio::test]
    async fn test_no_function_spawns_nothing() {
        let (backend, resolver) = python_backend();
        let submission = Submission::new("python", "x = 5", vec![TestCase::new("1", "1")]);

        let results = backend.run(&submission, &resolver).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Function Detection");
    }

    #[tokio::test]
    async fn test_assigned_entry_point_reaches_the_interpreter() {
        let (mut backend, resolver) = python_backend();
        backend.config.command = "runcode-no-such-interpreter".to_string();
        let submission = Submission::new(
            "python",
            "solution = lambda n: n * 2\n",
            vec![TestCase::new("5", "10"), TestCase::new("3", "6")],
        );

        let results = backend.run(&submission, &resolver).await;
        assert_eq!(results.len(), 2);
        for result in &results {
            assert_eq!(result.actual, "Execution Error");
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_results_keep_case_order_and_workspace_is_removed() {
        // Later cases finish first
        let script = format!(
            "{}sleep 0.$((3 - n)); printf '{{\"result\":[%s,\"%s\"]}}\\n' \"$n\" \"$(pwd -P)\"",
            CASE_INDEX
        );
        let (backend, resolver) = shell_backend(&script);
        let submission = Submission::new("python", "def solution(n):\n    return n\n", indexed_cases(3));

        let results = backend.run(&submission, &resolver).await;
        assert_eq!(results.len(), 3);

        let mut dirs = Vec::new();
        for (index, result) in results.iter().enumerate() {
            assert_eq!(result.name, format!("Test Case {}", index + 1));
            let actual: Value = serde_json::from_str(&result.actual).unwrap();
            assert_eq!(actual[0], json!(index), "{:?}", results);
            dirs.push(actual[1].as_str().unwrap().to_string());
        }

        assert!(dirs.iter().all(|dir| dir == &dirs[0]));
        assert!(dirs[0].contains("runcode-"));
        assert!(!Path::new(&dirs[0]).exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_workspace_is_removed_after_failures() {
        let script = format!(
            "{}case \"$n\" in 0) printf '{{\"result\":\"%s\"}}\\n' \"$(pwd -P)\" ;; 1) exec sleep 5 ;; *) echo boom >&2; exit 1 ;; esac",
            CASE_INDEX
        );
        let (mut backend, resolver) = shell_backend(&script);
        backend.config.timeout_ms = 500;
        let submission = Submission::new("python", "def solution(n):\n    return n\n", indexed_cases(3));

        let results = backend.run(&submission, &resolver).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[1].actual, "Time Limit Exceeded");
        assert_eq!(results[2].actual, "No Output");
        assert_eq!(results[2].error.as_deref(), Some("boom"));

        let dir: String = serde_json::from_str(&results[0].actual).unwrap();
        assert!(dir.contains("runcode-"));
        assert!(!Path::new(&dir).exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_repeated_runs_give_identical_results() {
        let script = format!("{}printf '{{\"result\":%s}}\\n' \"$((n * 2))\"", CASE_INDEX);
        let (backend, resolver) = shell_backend(&script);
        let submission = Submission::new("python", "def solution(n):\n    return n\n", indexed_cases(4));

        let first = backend.run(&submission, &resolver).await;
        let second = backend.run(&submission, &resolver).await;
        assert_eq!(first, second);
        assert!(first[0].passed);
        assert!(!first[1].passed);
        assert_eq!(first[3].actual, "6");
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_reported_per_case() {
        let (mut backend, resolver) = python_backend();
        backend.config.command = "runcode-no-such-interpreter".to_string();
        let submission = Submission::new(
            "python",
            "def solution(n):\n    return n\n",
            vec![TestCase::new("1", "1"), TestCase::new("2", "2")],
        );

        let results = backend.run(&submission, &resolver).await;
        assert_eq!(results.len(), 2);
        for result in &results {
            assert_eq!(result.actual, "Execution Error");
            assert!(result.error.as_deref().unwrap_or("").starts_with("Python not available"));
        }
    }

    #[tokio::test]
    async fn test_undecodable_input_skips_spawn() {
        let (mut backend, resolver) = python_backend();
        backend.config.command = "runcode-no-such-interpreter".to_string();
        let submission = Submission::new(
            "python",
            "def solution(n):\n    return n\n",
            vec![TestCase::new("[1,2", "1")],
        );

        let results = backend.run(&submission, &resolver).await;
        assert_eq!(results[0].actual, "Parse Error");
    }

    #[tokio::test]
    #[ignore] // Requires python3 on PATH
    async fn test_python_two_sum() {
        let (backend, resolver) = python_backend();
        let source = r#"
def two_sum(nums, target):
    seen = {}
    for i, n in enumerate(nums):
        if target - n in seen:
            return [i, seen[target - n]]
        seen[n] = i
    return []
"#;
        let submission = Submission::new(
            "python",
            source,
            vec![
                TestCase::new("[2,7,11,15] target: 9", "[0,1]"),
                TestCase::new("[3,2,4] target: 6", "[1,2]"),
            ],
        );

        let results = backend.run(&submission, &resolver).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.passed), "{:?}", results);
    }

    #[tokio::test]
    #[ignore] // Requires python3 on PATH
    async fn test_python_prints_and_faults() {
        let (backend, resolver) = python_backend();
        let source = "def solution(n):\n    print('debugging', n)\n    return 10 // n\n";
        let submission = Submission::new(
            "python",
            source,
            vec![TestCase::new("5", "2"), TestCase::new("0", "0"), TestCase::new("2.0", "5")],
        );

        let results = backend.run(&submission, &resolver).await;
        assert_eq!(results.len(), 3);
        assert!(results[0].passed);
        assert_eq!(results[1].actual, "Runtime Error");
        assert!(results[1].error.as_deref().unwrap_or("").contains("ZeroDivisionError"));
        assert!(results[2].passed);
    }

    #[tokio::test]
    #[ignore] // Requires python3 on PATH
    async fn test_python_lambda_entry_point() {
        let (backend, resolver) = python_backend();
        let submission = Submission::new(
            "python",
            "solution = lambda n: n * 2\n",
            vec![TestCase::new("5", "10"), TestCase::new("3", "6")],
        );

        let results = backend.run(&submission, &resolver).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.passed), "{:?}", results);
    }

    #[tokio::test]
    #[ignore] // Requires python3 on PATH
    async fn test_python_timeout() {
        let (mut backend, resolver) = python_backend();
        backend.config.timeout_ms = 500;
        let source = "def solution(n):\n    while True:\n        pass\n";
        let submission = Submission::new("python", source, vec![TestCase::new("1", "1")]);

        let results = backend.run(&submission, &resolver).await;
        assert_eq!(results[0].actual, "Time Limit Exceeded");
        assert_eq!(
            results[0].error.as_deref(),
            Some("Execution timed out after 500 ms")
        );
    }
}

/// Test Runner - High-Level Orchestration
///
/// **Responsibility:**
/// Drive one submission from dispatch to an ordered list of results.
///
/// **Architecture:**
/// 1. Pick the language and resolver (dispatcher.rs)
/// 2. Hand the submission to its backend (engine/)
/// 3. Return per-case rows built by the evaluator (evaluator.rs)
///
/// This module is the glue layer - it knows nothing about:
/// - How code executes (engine's job)
/// - How results are compared (evaluator's job)

use runcode_common::types::{Submission, TestResult};
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, instrument, Span};

use crate::config::{BackendConfig, LanguageConfigManager};
use crate::dispatcher::{Dispatch, LanguageDispatcher};
use crate::engine::{interpreter::InterpreterBackend, javascript};
use crate::evaluator;

/// Safety limit to keep pathological sources away from the backends
pub const MAX_SOURCE_CODE_BYTES: usize = 1024 * 1024; // 1MB

/// Faults in the runner itself, as opposed to faults in the submitted code
#[derive(Debug, Error)]
pub enum SystemFault {
    #[error("Grading task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone)]
pub struct TestRunner {
    dispatcher: LanguageDispatcher,
}

impl TestRunner {
    pub fn new(manager: LanguageConfigManager) -> Self {
        Self {
            dispatcher: LanguageDispatcher::new(manager),
        }
    }

    pub fn dispatcher(&self) -> &LanguageDispatcher {
        &self.dispatcher
    }

    /// Grade a submission. Runner faults become a single `System Error` row.
    pub async fn grade(&self, submission: &Submission) -> Vec<TestResult> {
        match self.try_grade(submission).await {
            Ok(results) => results,
            Err(fault) => {
                error!(submission_id = %submission.id, error = %fault, "Grading failed");
                vec![evaluator::system_error(fault.to_string())]
            }
        }
    }

    /// Grade a submission, surfacing runner faults to the caller
    pub async fn try_grade(&self, submission: &Submission) -> Result<Vec<TestResult>, SystemFault> {
        let dispatch = self.dispatcher.dispatch(&submission.language);
        self.try_grade_dispatched(submission, dispatch).await
    }

    /// Grade with a dispatch the caller already made for `submission.language`
    #[instrument(skip_all, fields(submission_id = %submission.id))]
    pub async fn try_grade_dispatched(
        &self,
        submission: &Submission,
        dispatch: Dispatch<'_>,
    ) -> Result<Vec<TestResult>, SystemFault> {
        let started = Instant::now();
        let Dispatch { language, resolver } = dispatch;
        let resolver = match &submission.candidate_names {
            Some(names) => resolver.with_candidates(names),
            None => resolver,
        };

        info!(
            language = %language.name,
            backend = language.backend.kind(),
            test_cases = submission.test_cases.len(),
            "Grading submission"
        );

        if submission.source_code.len() > MAX_SOURCE_CODE_BYTES {
            return Ok(vec![evaluator::code_execution_failed(format!(
                "Source code exceeds maximum size of {} bytes",
                MAX_SOURCE_CODE_BYTES
            ))]);
        }

        let results = match &language.backend {
            BackendConfig::InProcess(sandbox) => {
                // The engine context is not Send; keep it on one blocking thread
                let sandbox = sandbox.clone();
                let source = submission.source_code.clone();
                let test_cases = submission.test_cases.clone();
                let span = Span::current();
                tokio::task::spawn_blocking(move || {
                    span.in_scope(|| javascript::grade(&sandbox, resolver, &source, &test_cases))
                })
                .await?
            }
            BackendConfig::Interpreter(interpreter) => {
                InterpreterBackend::new(language, interpreter)
                    .run(submission, &resolver)
                    .await
            }
            BackendConfig::Unsupported => vec![evaluator::not_implemented(&language.display_name())],
        };

        info!(
            passed = results.iter().filter(|r| r.passed).count(),
            total = results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Grading finished"
        );

        Ok(results)
    }
}

// CLI commands for grading and language configuration
use anyhow::{Context, Result};
use runcode_common::types::{Submission, TestCase, TestResult};
use runcode_engine::config::LanguageConfigManager;
use runcode_engine::TestRunner;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Accepted shapes for a test-case file
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TestFile {
    Cases(Vec<TestCase>),
    Wrapped {
        #[serde(rename = "testCases")]
        test_cases: Vec<TestCase>,
    },
}

impl TestFile {
    fn into_cases(self) -> Vec<TestCase> {
        match self {
            TestFile::Cases(cases) | TestFile::Wrapped { test_cases: cases } => cases,
        }
    }
}

fn load_test_cases(path: &Path) -> Result<Vec<TestCase>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file: TestFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse test cases in {}", path.display()))?;
    Ok(file.into_cases())
}

/// Language for `code`: the explicit one, else the configured language whose
/// name or alias matches the file extension, else empty (the default language)
fn infer_language(manager: &LanguageConfigManager, code: &Path, explicit: Option<&str>) -> String {
    if let Some(language) = explicit {
        return language.to_string();
    }
    code.extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| manager.lookup(ext))
        .map(|language| language.name.clone())
        .unwrap_or_default()
}

/// Grade a local submission. Returns whether every row passed.
pub async fn grade(
    config_path: &Path,
    code: &Path,
    tests: &Path,
    language: Option<&str>,
    candidates: Vec<String>,
    json: bool,
) -> Result<bool> {
    let manager = LanguageConfigManager::load_or_builtin(config_path)?;
    let source = fs::read_to_string(code)
        .with_context(|| format!("Failed to read {}", code.display()))?;
    let test_cases = load_test_cases(tests)?;

    let language = infer_language(&manager, code, language);
    let mut submission = Submission::new(language, source, test_cases);
    if !candidates.is_empty() {
        submission = submission.with_candidate_names(candidates);
    }

    let runner = TestRunner::new(manager);
    let dispatch = runner.dispatcher().dispatch(&submission.language);
    let language_name = dispatch.language.display_name();
    let results = runner.try_grade_dispatched(&submission, dispatch).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        println!("🧪 Grading {} ({})\n", code.display(), language_name);
        print_results(&results);
    }

    Ok(!results.is_empty() && results.iter().all(|r| r.passed))
}

fn print_results(results: &[TestResult]) {
    for result in results {
        let mark = if result.passed { "✓" } else { "✗" };
        println!("{} {}", mark, result.name);
        if !result.passed {
            println!("    expected: {}", result.expected);
            println!("    actual:   {}", result.actual);
            if let Some(error) = &result.error {
                println!("    error:    {}", error);
            }
        }
    }

    let passed = results.iter().filter(|r| r.passed).count();
    println!("\n{}/{} passed", passed, results.len());
}

/// List configured languages
pub fn list_languages(config_path: &Path) -> Result<()> {
    let manager = LanguageConfigManager::load_or_builtin(config_path)?;
    let default = manager.default_config().name.clone();

    println!("📋 Configured Languages:\n");
    println!("{:<12} {:<12} {:<24} {:<12}", "NAME", "DISPLAY", "ALIASES", "BACKEND");
    println!("{}", "─".repeat(62));

    for language in manager.languages() {
        let marker = if language.name == default { " (default)" } else { "" };
        println!(
            "{:<12} {:<12} {:<24} {:<12}{}",
            language.name,
            language.display_name(),
            language.aliases.join(", "),
            language.backend.kind(),
            marker
        );
    }

    println!("\n✅ Total: {} language(s)", manager.languages().len());
    Ok(())
}

/// Load and validate a languages file
pub fn check_config(config_path: &Path) -> Result<()> {
    let manager = LanguageConfigManager::load(config_path)?;
    println!(
        "✅ {} is valid: {} language(s), default '{}'",
        config_path.display(),
        manager.languages().len(),
        manager.default_config().name
    );
    Ok(())
}

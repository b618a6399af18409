/// Entry Point Resolver
///
/// Picks the function a submission should be graded through:
/// 1. the first configured candidate name the code declares, in order
/// 2. otherwise, depending on the fallback strategy, the first
///    function declaration found by a regex scan of the source
///
/// The JavaScript sandbox asks the live engine whether a candidate is bound;
/// the interpreter backend only has the source text and uses `resolve_static`.
/// A candidate counts as present when it is declared as a function or bound by
/// assignment or import, since the driver accepts any callable binding.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;

use crate::config::{EntryPointConfig, FallbackStrategy};

pub const MISSING_FUNCTION_MESSAGE: &str =
    "No function detected in the code. Make sure to define a function like twoSum, solution, etc.";

lazy_static! {
    static ref JS_FUNCTION: Regex =
        Regex::new(r"function\s+([A-Za-z_$][\w$]*)\s*\(").expect("valid JavaScript declaration pattern");
    static ref PY_FUNCTION: Regex =
        Regex::new(r"(?m)^[ \t]*(?:async\s+)?def\s+([A-Za-z_]\w*)\s*\(").expect("valid Python declaration pattern");
    static ref JS_BINDING: Regex =
        Regex::new(r"\b(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=").expect("valid JavaScript binding pattern");
    static ref PY_ASSIGNMENT: Regex =
        Regex::new(r"(?m)^[ \t]*([A-Za-z_]\w*)[ \t]*(?::[^=\n]*)?=(?:[^=]|$)").expect("valid Python assignment pattern");
    static ref PY_IMPORT: Regex =
        Regex::new(r"(?m)^[ \t]*(?:from[ \t]+\S+[ \t]+)?import[ \t]+([^\n#;]+)").expect("valid Python import pattern");
    static ref IDENTIFIER: Regex =
        Regex::new(r"^[A-Za-z_$][\w$]*$").expect("valid identifier pattern");
}

/// How function declarations look in a language's source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationSyntax {
    JavaScript,
    Python,
}

impl DeclarationSyntax {
    fn pattern(self) -> &'static Regex {
        match self {
            DeclarationSyntax::JavaScript => &JS_FUNCTION,
            DeclarationSyntax::Python => &PY_FUNCTION,
        }
    }

    /// Whether `source` binds `name` without a function declaration
    fn binds(self, source: &str, name: &str) -> bool {
        match self {
            DeclarationSyntax::JavaScript => captures_name(&JS_BINDING, source, name),
            DeclarationSyntax::Python => {
                captures_name(&PY_ASSIGNMENT, source, name) || imports(source, name)
            }
        }
    }
}

fn captures_name(pattern: &Regex, source: &str, name: &str) -> bool {
    pattern
        .captures_iter(source)
        .any(|captures| &captures[1] == name)
}

/// `import a.b`, `import a as name`, `from m import f as name` and `from m import name`
fn imports(source: &str, name: &str) -> bool {
    PY_IMPORT.captures_iter(source).any(|captures| {
        captures[1]
            .trim()
            .trim_matches(|c| c == '(' || c == ')')
            .split(',')
            .filter_map(|item| {
                let mut words = item.split_whitespace();
                let target = words.next()?;
                match (words.next(), words.next()) {
                    (Some("as"), Some(alias)) => Some(alias),
                    _ => target.split('.').next(),
                }
            })
            .any(|bound| bound == name)
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolver {
    candidates: Vec<String>,
    fallback: FallbackStrategy,
}

impl Resolver {
    pub fn new(config: &EntryPointConfig) -> Self {
        Self {
            candidates: config.candidate_names.clone(),
            fallback: config.fallback,
        }
    }

    /// Replace the candidate list for one submission. Names that are not
    /// identifiers are dropped; an empty result keeps the configured list.
    pub fn with_candidates(mut self, names: &[String]) -> Self {
        let valid: Vec<String> = names
            .iter()
            .filter(|name| {
                let ok = is_identifier(name);
                if !ok {
                    warn!(candidate = %name, "Ignoring candidate name that is not an identifier");
                }
                ok
            })
            .cloned()
            .collect();

        if !valid.is_empty() {
            self.candidates = valid;
        }
        self
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn fallback(&self) -> FallbackStrategy {
        self.fallback
    }

    /// Name produced by the fallback strategy, if any
    pub fn fallback_name(&self, source: &str, syntax: DeclarationSyntax) -> Option<String> {
        match self.fallback {
            FallbackStrategy::FirstDeclaredFunction => first_declared_function(source, syntax),
            FallbackStrategy::None => None,
        }
    }

    /// Resolve from the source text alone
    pub fn resolve_static(&self, source: &str, syntax: DeclarationSyntax) -> Option<String> {
        self.candidates
            .iter()
            .find(|name| declares(source, name, syntax))
            .cloned()
            .or_else(|| self.fallback_name(source, syntax))
    }
}

/// Whether `source` declares or binds a top-level name `name`
pub fn declares(source: &str, name: &str, syntax: DeclarationSyntax) -> bool {
    captures_name(syntax.pattern(), source, name) || syntax.binds(source, name)
}

/// Name of the first function declaration in `source`
pub fn first_declared_function(source: &str, syntax: DeclarationSyntax) -> Option<String> {
    syntax
        .pattern()
        .captures(source)
        .map(|captures| captures[1].to_string())
}

/// Plain identifier check shared by config validation and request overrides
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

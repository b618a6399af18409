/// Input Normalizer - Test Input Decoding
///
/// Test authors write informal, JSON-looking inputs such as
/// `[2,7,11,15] target: 9`, `[1,2],[3,4]`, `"racecar"` or `42`.
/// This module turns one such string into the ordered argument list passed to
/// the entry point. It is a best-effort decoder, not a grammar: the rules below
/// are tried in a fixed order and the first one whose guard matches decides.
///
/// 1. `TargetPair`     - contains `target:` → `(array, integer)`
/// 2. `MultipleArrays` - starts with `[` and contains `],` → one argument per bracket group
/// 3. `SingleArray`    - starts with `[` → one array argument
/// 4. `QuotedString`   - starts with `"` → one string argument
/// 5. `Scalar`         - a finite number if it parses as one, otherwise the raw text
///
/// Nothing here checks the argument count against the entry point's arity;
/// a mismatch surfaces later as a runtime fault.

use serde_json::Value;
use thiserror::Error;

use crate::evaluator::canonical_number;

const TARGET_MARKER: &str = "target:";
const ARRAY_SEPARATOR: &str = "],";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRule {
    TargetPair,
    MultipleArrays,
    SingleArray,
    QuotedString,
    Scalar,
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("invalid JSON `{segment}`: {source}")]
    InvalidJson {
        segment: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("target `{0}` is not an integer")]
    InvalidTarget(String),
}

/// Pick the rule that applies to `input`
pub fn classify(input: &str) -> InputRule {
    let input = input.trim();

    if input.contains(TARGET_MARKER) {
        InputRule::TargetPair
    } else if input.starts_with('[') && input.contains(ARRAY_SEPARATOR) {
        InputRule::MultipleArrays
    } else if input.starts_with('[') {
        InputRule::SingleArray
    } else if input.starts_with('"') {
        InputRule::QuotedString
    } else {
        InputRule::Scalar
    }
}

/// Decode `input` into call arguments (always at least one)
pub fn normalize(input: &str) -> Result<Vec<Value>, NormalizeError> {
    let input = input.trim();

    match classify(input) {
        InputRule::TargetPair => target_pair(input),
        InputRule::MultipleArrays => multiple_arrays(input),
        InputRule::SingleArray | InputRule::QuotedString => Ok(vec![parse_json(input)?]),
        InputRule::Scalar => Ok(vec![scalar(input)]),
    }
}

fn target_pair(input: &str) -> Result<Vec<Value>, NormalizeError> {
    let (nums, target) = input
        .split_once(TARGET_MARKER)
        .unwrap_or((input, ""));

    let nums = parse_json(nums.trim())?;
    let target = leading_integer(target)
        .ok_or_else(|| NormalizeError::InvalidTarget(target.trim().to_string()))?;

    Ok(vec![nums, Value::from(target)])
}

fn multiple_arrays(input: &str) -> Result<Vec<Value>, NormalizeError> {
    let segments: Vec<&str> = input.split(ARRAY_SEPARATOR).collect();
    let last = segments.len() - 1;

    segments
        .iter()
        .enumerate()
        .map(|(index, segment)| {
            if index < last {
                parse_json(&format!("{}]", segment))
            } else {
                parse_json(segment)
            }
        })
        .collect()
}

/// The whole text must parse as a number. A numeric prefix such as `"12abc"`
/// stays a string, unlike a `parseFloat`-style reader that would yield 12.
fn scalar(input: &str) -> Value {
    match input.parse::<f64>() {
        Ok(number) if number.is_finite() => canonical_number(number),
        _ => Value::String(input.to_string()),
    }
}

fn parse_json(segment: &str) -> Result<Value, NormalizeError> {
    serde_json::from_str(segment).map_err(|source| NormalizeError::InvalidJson {
        segment: segment.trim().to_string(),
        source,
    })
}

/// Integer prefix of `text` after optional whitespace and sign (`" 9 "`, `"9abc"` → 9)
fn leading_integer(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let magnitude: i64 = digits[..end].parse().ok()?;

    Some(if negative { -magnitude } else { magnitude })
}

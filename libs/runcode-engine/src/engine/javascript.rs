/// Embedded JavaScript Sandbox
///
/// Runs a submission inside a fresh engine context:
/// - `console.*` and `print` are rebound to `tracing` (target `user_code`)
/// - every removable standard global outside the configured allowlist is deleted
/// - loop iterations and call depth are bounded by runtime limits
/// - return values are decoded through the intrinsic `JSON.stringify`,
///   captured before user code can replace it
///
/// The context is not `Send`; callers run `grade` on a blocking thread.
///
/// There is no wall-clock bound. The loop limit counts iterations per loop, so
/// nested loops under the limit can still hold the blocking thread for a long
/// time.

use boa_engine::object::ObjectInitializer;
use boa_engine::property::Attribute;
use boa_engine::{js_string, Context, JsError, JsObject, JsResult, JsString, JsValue, NativeFunction, Source};
use runcode_common::types::{TestCase, TestResult};
use serde_json::Value;
use tracing::{debug, instrument};

use super::sandbox::{run_sandboxed, Sandbox, SandboxError};
use crate::config::SandboxConfig;
use crate::evaluator::{self, ExecutionOutcome, Fault, FaultKind};
use crate::resolver::{DeclarationSyntax, Resolver, MISSING_FUNCTION_MESSAGE};

/// Standard globals that may be deleted from a fresh context
const REMOVABLE_GLOBALS: &[&str] = &[
    "eval",
    "Function",
    "globalThis",
    "Reflect",
    "Proxy",
    "Promise",
    "WeakRef",
    "WeakMap",
    "WeakSet",
    "FinalizationRegistry",
    "Atomics",
    "SharedArrayBuffer",
    "ArrayBuffer",
    "DataView",
    "Date",
    "RegExp",
    "BigInt",
    "Intl",
    "Temporal",
    "escape",
    "unescape",
    "encodeURI",
    "encodeURIComponent",
    "decodeURI",
    "decodeURIComponent",
    "Int8Array",
    "Uint8Array",
    "Uint8ClampedArray",
    "Int16Array",
    "Uint16Array",
    "Int32Array",
    "Uint32Array",
    "Float32Array",
    "Float64Array",
    "BigInt64Array",
    "BigUint64Array",
    "AggregateError",
    "EvalError",
    "ReferenceError",
    "SyntaxError",
    "URIError",
    "Error",
    "TypeError",
    "RangeError",
    "Math",
    "JSON",
    "Array",
    "Object",
    "String",
    "Number",
    "Boolean",
    "parseInt",
    "parseFloat",
    "isNaN",
    "isFinite",
    "Map",
    "Set",
    "Symbol",
];

const CONSOLE_METHODS: &[&str] = &["log", "info", "warn", "error", "debug"];

pub struct JsSandbox {
    context: Context,
    stringify: JsObject,
    resolver: Resolver,
}

impl JsSandbox {
    pub fn new(config: &SandboxConfig, resolver: Resolver) -> Result<Self, SandboxError> {
        let mut context = Context::default();
        context
            .runtime_limits_mut()
            .set_loop_iteration_limit(config.loop_iteration_limit);
        context
            .runtime_limits_mut()
            .set_recursion_limit(config.recursion_limit);

        let stringify = capture_stringify(&mut context)
            .map_err(|e| SandboxError::Setup(format!("JSON.stringify unavailable: {}", e)))?;
        install_console(&mut context)
            .map_err(|e| SandboxError::Setup(format!("Failed to install console: {}", e)))?;
        prune_globals(&mut context, &config.allowed_globals);

        Ok(Self {
            context,
            stringify,
            resolver,
        })
    }

    /// The value bound to `name` if it is a function, `None` if unbound or not callable
    fn lookup_function(&mut self, name: &str) -> Option<JsObject> {
        let probe = format!("typeof {0} === 'function' ? {0} : undefined", name);
        match self.context.eval(Source::from_bytes(probe.as_str())) {
            Ok(value) => value.as_callable().cloned(),
            Err(err) => {
                // Uninitialized `let`/`const` bindings throw on access
                debug!(candidate = name, error = %err, "Candidate probe failed");
                None
            }
        }
    }

    fn decode(&mut self, value: JsValue) -> ExecutionOutcome {
        if value.is_undefined() {
            return ExecutionOutcome::Undefined;
        }

        let text = match self
            .stringify
            .call(&JsValue::undefined(), &[value], &mut self.context)
        {
            Ok(text) => text,
            Err(err) => {
                let message = error_message(&err, &mut self.context);
                return ExecutionOutcome::RuntimeFault(Fault::threw(format!(
                    "Return value is not JSON-serializable: {}",
                    message
                )));
            }
        };

        // Functions and symbols stringify to undefined
        let Some(text) = text.as_string() else {
            return ExecutionOutcome::Undefined;
        };

        match serde_json::from_str::<Value>(&text.to_std_string_escaped()) {
            Ok(value) => ExecutionOutcome::Value(value),
            Err(e) => ExecutionOutcome::RuntimeFault(Fault::new(
                FaultKind::MalformedOutput,
                format!("Failed to decode return value: {}", e),
            )),
        }
    }
}

impl Sandbox for JsSandbox {
    type EntryPoint = JsObject;

    fn resolve_entry_point(&mut self, source: &str) -> Result<JsObject, SandboxError> {
        if let Err(err) = self.context.eval(Source::from_bytes(source)) {
            return Err(SandboxError::Evaluation(error_message(&err, &mut self.context)));
        }

        let candidates = self.resolver.candidates().to_vec();
        for name in &candidates {
            if let Some(function) = self.lookup_function(name) {
                debug!(entry_point = %name, "Resolved candidate function");
                return Ok(function);
            }
        }

        if let Some(name) = self.resolver.fallback_name(source, DeclarationSyntax::JavaScript) {
            if let Some(function) = self.lookup_function(&name) {
                debug!(entry_point = %name, "Resolved first declared function");
                return Ok(function);
            }
        }

        Err(SandboxError::Resolution(MISSING_FUNCTION_MESSAGE.to_string()))
    }

    fn invoke(&mut self, entry_point: &JsObject, args: &[Value]) -> ExecutionOutcome {
        let mut js_args = Vec::with_capacity(args.len());
        for arg in args {
            match JsValue::from_json(arg, &mut self.context) {
                Ok(value) => js_args.push(value),
                Err(err) => {
                    return ExecutionOutcome::RuntimeFault(Fault::new(
                        FaultKind::InvalidInput,
                        format!("Failed to convert argument: {}", err),
                    ));
                }
            }
        }

        match entry_point.call(&JsValue::undefined(), &js_args, &mut self.context) {
            Ok(value) => self.decode(value),
            Err(err) => ExecutionOutcome::RuntimeFault(Fault::threw(error_message(
                &err,
                &mut self.context,
            ))),
        }
    }
}

/// Grade `test_cases` against `source` in a fresh sandbox
#[instrument(skip_all, fields(test_cases = test_cases.len()))]
pub fn grade(
    config: &SandboxConfig,
    resolver: Resolver,
    source: &str,
    test_cases: &[TestCase],
) -> Vec<TestResult> {
    match JsSandbox::new(config, resolver) {
        Ok(mut sandbox) => run_sandboxed(&mut sandbox, source, test_cases),
        Err(err) => vec![evaluator::system_error(err.to_string())],
    }
}

fn capture_stringify(context: &mut Context) -> JsResult<JsObject> {
    let json = context
        .global_object()
        .get(js_string!("JSON"), context)?;
    let stringify = match json.as_object() {
        Some(json) => json.get(js_string!("stringify"), context)?,
        None => JsValue::undefined(),
    };

    stringify.as_callable().cloned().ok_or_else(|| {
        boa_engine::JsNativeError::typ()
            .with_message("JSON.stringify is not callable")
            .into()
    })
}

fn install_console(context: &mut Context) -> JsResult<()> {
    let console = {
        let mut initializer = ObjectInitializer::new(context);
        for method in CONSOLE_METHODS {
            initializer.function(
                NativeFunction::from_fn_ptr(user_output),
                JsString::from(*method),
                0,
            );
        }
        initializer.build()
    };

    context.register_global_property(js_string!("console"), console, Attribute::all())?;
    context.register_global_builtin_callable(
        js_string!("print"),
        0,
        NativeFunction::from_fn_ptr(user_output),
    )?;
    Ok(())
}

fn prune_globals(context: &mut Context, allowed: &[String]) {
    let global = context.global_object();
    for name in REMOVABLE_GLOBALS {
        if allowed.iter().any(|a| a == name) {
            continue;
        }
        if let Err(err) = global.delete_property_or_throw(JsString::from(*name), context) {
            debug!(global = *name, error = %err, "Global could not be removed");
        }
    }
}

/// `console.*` / `print` replacement
fn user_output(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let mut parts = Vec::with_capacity(args.len());
    for arg in args {
        parts.push(arg.to_string(context)?.to_std_string_escaped());
    }
    debug!(target: "user_code", "{}", parts.join(" "));
    Ok(JsValue::undefined())
}

/// Readable text for an engine error, e.g. `TypeError: x is not a function`
fn error_message(error: &JsError, context: &mut Context) -> String {
    match error.try_native(context) {
        Ok(native) => native.to_string(),
        Err(_) => error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendConfig, EntryPointConfig, FallbackStrategy, LanguageConfigManager};

    fn javascript() -> (SandboxConfig, Resolver) {
        let manager = LanguageConfigManager::builtin().unwrap();
        let language = manager.get_config("javascript").unwrap();
        let sandbox = match &language.backend {
            BackendConfig::InProcess(sandbox) => sandbox.clone(),
            other => panic!("unexpected backend: {:?}", other),
        };
        (sandbox, Resolver::new(&language.entry_point))
    }

    fn run(source: &str, cases: &[TestCase]) -> Vec<TestResult> {
        let (config, resolver) = javascript();
        grade(&config, resolver, source, cases)
    }

    #[test]
    fn test_doubles_input() {
        let results = run(
            "function solution(n) { return n * 2; }",
            &[TestCase::new("5", "10")],
        );

        assert_eq!(results.len(), 1);
        assert!(results[0].passed);
        assert_eq!(results[0].actual, "10");
        assert_eq!(results[0].expected, "10");
    }

    #[test]
    fn test_two_sum_in_any_order() {
        let source = r#"
            function twoSum(nums, target) {
                const seen = new Map();
                for (let i = 0; i < nums.length; i++) {
                    const need = target - nums[i];
                    if (seen.has(need)) return [i, seen.get(need)];
                    seen.set(nums[i], i);
                }
                return [];
            }
        "#;
        let results = run(source, &[TestCase::new("[2,7,11,15] target: 9", "[0,1]")]);

        assert!(results[0].passed);
        assert_eq!(results[0].actual, "[1,0]");
    }

    #[test]
    fn test_reverse_string() {
        let source = r#"function reverseString(s) { return s.split("").reverse().join(""); }"#;
        let results = run(source, &[TestCase::new("\"hello\"", "\"olleh\"")]);
        assert!(results[0].passed);
        assert_eq!(results[0].actual, "\"olleh\"");
    }

    #[test]
    fn test_fractional_result() {
        let results = run(
            "function solution(n) { return n / 2; }",
            &[TestCase::new("5", "2.5"), TestCase::new("4", "2")],
        );
        assert!(results[0].passed);
        assert!(results[1].passed);
        assert_eq!(results[1].actual, "2");
    }

    #[test]
    fn test_no_function_yields_single_row() {
        let results = run(
            "const x = 5;",
            &[TestCase::new("1", "1"), TestCase::new("2", "2")],
        );

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Function Detection");
        assert_eq!(results[0].actual, "No function found");
        assert!(!results[0].passed);
    }

    #[test]
    fn test_syntax_error_yields_single_row() {
        let results = run("function solution(n) { return n * ; }", &[TestCase::new("1", "1")]);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Code Execution");
        assert!(results[0].error.as_deref().unwrap_or("").contains("SyntaxError"));
    }

    #[test]
    fn test_throw_affects_only_its_case() {
        let source = r#"
            function solution(n) {
                if (n === 2) throw new Error("bad input");
                return n;
            }
        "#;
        let results = run(
            source,
            &[
                TestCase::new("1", "1"),
                TestCase::new("2", "2"),
                TestCase::new("3", "3"),
            ],
        );

        assert_eq!(results.len(), 3);
        assert!(results[0].passed);
        assert_eq!(results[1].actual, "Runtime Error");
        assert!(results[1].error.as_deref().unwrap_or("").contains("bad input"));
        assert!(results[2].passed);
    }

    #[test]
    fn test_undefined_return_fails() {
        let results = run("function solution(n) { }", &[TestCase::new("1", "null")]);
        assert!(!results[0].passed);
        assert_eq!(results[0].actual, "undefined");
    }

    #[test]
    fn test_falls_back_to_first_declared_function() {
        let results = run(
            "function maxOf(nums) { return Math.max(...nums); }",
            &[TestCase::new("[3,9,2]", "9")],
        );
        assert!(results[0].passed);
    }

    #[test]
    fn test_arrow_function_candidate() {
        let results = run("const solution = (n) => n + 1;", &[TestCase::new("1", "2")]);
        assert!(results[0].passed);
    }

    #[test]
    fn test_candidate_override() {
        let (config, resolver) = javascript();
        let resolver = resolver.with_candidates(&["maxProfit".to_string()]);
        let source = r#"
            function helper(p) { return 0; }
            function maxProfit(prices) { return Math.max(...prices) - Math.min(...prices); }
        "#;

        let results = grade(&config, resolver, source, &[TestCase::new("[7,1,5,3,6,4]", "6")]);
        assert!(results[0].passed);
    }

    #[test]
    fn test_disallowed_globals_are_removed() {
        let source = r#"
            function solution(name) { return typeof globalThis[name]; }
        "#;
        let results = run(source, &[TestCase::new("\"eval\"", "\"undefined\"")]);
        assert_eq!(results[0].actual, "Runtime Error");

        let source = r#"
            function solution(n) { return [typeof eval, typeof Function, typeof Math, typeof JSON]; }
        "#;
        let results = run(
            source,
            &[TestCase::new("0", r#"["undefined","undefined","object","object"]"#)],
        );
        assert_eq!(results[0].actual, r#"["undefined","undefined","object","object"]"#);
    }

    #[test]
    fn test_console_output_is_swallowed() {
        let source = r#"
            function solution(n) { console.log("n is", n); print(n); return n; }
        "#;
        let results = run(source, &[TestCase::new("7", "7")]);
        assert!(results[0].passed);
    }

    #[test]
    fn test_overwritten_json_does_not_affect_decoding() {
        let source = r#"
            JSON.stringify = function () { return "42"; };
            function solution(n) { return n; }
        "#;
        let results = run(source, &[TestCase::new("7", "7")]);
        assert!(results[0].passed);
    }

    #[test]
    fn test_infinite_loop_hits_limit() {
        let config = SandboxConfig {
            loop_iteration_limit: 1_000,
            recursion_limit: 64,
            allowed_globals: vec![],
        };
        let resolver = Resolver::new(&EntryPointConfig {
            candidate_names: vec!["solution".to_string()],
            fallback: FallbackStrategy::None,
        });
        let source = "function solution(n) { while (true) {} }";

        let results = grade(&config, resolver, source, &[TestCase::new("1", "1")]);
        assert_eq!(results[0].actual, "Runtime Error");
    }

    #[test]
    fn test_runaway_recursion_hits_limit() {
        let config = SandboxConfig {
            loop_iteration_limit: 1_000,
            recursion_limit: 64,
            allowed_globals: vec![],
        };
        let resolver = Resolver::new(&EntryPointConfig {
            candidate_names: vec!["solution".to_string()],
            fallback: FallbackStrategy::None,
        });
        let source = "function solution(n) { return solution(n + 1); }";

        let results = grade(
            &config,
            resolver,
            source,
            &[TestCase::new("1", "1"), TestCase::new("2", "2")],
        );
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].actual, "Runtime Error");
        assert_eq!(results[1].actual, "Runtime Error");
    }
}

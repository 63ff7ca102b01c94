//! File-level commands: run, check, fmt, emit, init.
//!
//! Each command returns its output instead of printing so the binary and the
//! integration tests share one code path.

use crate::config::{DslxConfig, CONFIG_FILE};
use crate::CliError;
use dslx_bytecode::{parse_program, render, render_program, Program};
use dslx_core::{ErrorKind, Value};
use dslx_vm::{VmError, VmOptions, VM};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

pub fn read_source(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|e| CliError::io(path, e))
}

/// Reads, parses and jump-resolves a program file.
pub fn load_program(path: &Path) -> Result<Program, CliError> {
    let source = read_source(path)?;
    let program = parse_program(&source).map_err(|source| CliError::Load {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), functions = program.len(), "loaded program");
    Ok(program)
}

/// Parses `--arg` literals in order.
pub fn parse_args(args: &[String]) -> Result<Vec<Value>, CliError> {
    args.iter()
        .map(|text| {
            text.parse::<Value>()
                .map_err(|e| CliError::InvalidArgument(e.to_string()))
        })
        .collect()
}

/// Runs `entry` of `program` on a fresh VM.
pub fn run_entry(
    program: Arc<Program>,
    entry: &str,
    args: Vec<Value>,
    options: VmOptions,
) -> Result<Value, VmError> {
    let mut vm = VM::with_options(options);
    vm.load(program);
    let result = vm.execute(entry, args);
    debug!(entry, instructions = vm.instruction_count(), ok = result.is_ok(), "run finished");
    result
}

#[derive(Debug, Serialize)]
struct JsonError {
    kind: ErrorKind,
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum JsonOutcome {
    Value(String),
    Error(JsonError),
}

/// Renders a run result for the terminal, or as a single JSON object.
pub fn render_outcome(result: &Result<Value, VmError>, json: bool) -> Result<String, CliError> {
    if json {
        let outcome = match result {
            Ok(value) => JsonOutcome::Value(value.to_string()),
            Err(e) => JsonOutcome::Error(JsonError {
                kind: e.kind(),
                message: e.message(),
            }),
        };
        return Ok(serde_json::to_string(&outcome)?);
    }
    Ok(match result {
        Ok(value) => value.to_string(),
        Err(e) => e.to_string(),
    })
}

/// `dslx run`: the rendered output and whether the run succeeded.
pub fn cmd_run(
    file: &Path,
    entry: &str,
    args: &[String],
    options: VmOptions,
    json: bool,
) -> Result<(String, bool), CliError> {
    let program = Arc::new(load_program(file)?);
    let args = parse_args(args)?;
    let result = run_entry(program, entry, args, options);
    let ok = result.is_ok();
    Ok((render_outcome(&result, json)?, ok))
}

/// `dslx check`: a one-line summary of a well-formed file.
pub fn cmd_check(file: &Path) -> Result<String, CliError> {
    let program = load_program(file)?;
    let instructions: usize = program.functions.iter().map(|f| f.code.len()).sum();
    Ok(format!(
        "{} function{}, {} instruction{}",
        program.len(),
        if program.len() == 1 { "" } else { "s" },
        instructions,
        if instructions == 1 { "" } else { "s" }
    ))
}

fn has_headers(source: &str) -> bool {
    source.lines().any(|l| l.trim_start().starts_with("fn "))
}

/// Canonical text for `source`. Headerless listings stay headerless.
pub fn format_source(source: &str) -> Result<String, dslx_bytecode::LoadError> {
    let program = parse_program(source)?;
    if has_headers(source) {
        return Ok(render_program(&program));
    }
    let mut out = program
        .functions
        .first()
        .map(|f| render(f.code.bytecodes()))
        .unwrap_or_default();
    if !out.is_empty() {
        out.push('\n');
    }
    Ok(out)
}

/// `dslx fmt`: rewrites `file` in canonical form, or with `check` only
/// reports. Returns whether the file was (or would be) changed.
pub fn cmd_fmt(file: &Path, check: bool) -> Result<bool, CliError> {
    let source = read_source(file)?;
    let formatted = format_source(&source).map_err(|source| CliError::Load {
        path: file.to_path_buf(),
        source,
    })?;
    let changed = formatted != source;
    if changed && !check {
        std::fs::write(file, &formatted).map_err(|e| CliError::io(file, e))?;
    }
    Ok(changed)
}

/// `dslx emit`: the program as pretty JSON, written to `output` when given.
pub fn cmd_emit(file: &Path, output: Option<&Path>) -> Result<String, CliError> {
    let program = load_program(file)?;
    let json = serde_json::to_string_pretty(&program)?;
    if let Some(out) = output {
        std::fs::write(out, &json).map_err(|e| CliError::io(out, e))?;
    }
    Ok(json)
}

/// `dslx init`: writes the default `dslx.toml` into `dir`, never overwriting.
pub fn cmd_init(dir: &Path) -> Result<PathBuf, CliError> {
    let path = dir.join(CONFIG_FILE);
    if path.exists() {
        return Err(CliError::Config(format!(
            "{} already exists, not overwriting",
            path.display()
        )));
    }
    std::fs::write(&path, DslxConfig::default_template()).map_err(|e| CliError::io(&path, e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_parse_as_literals() {
        let args = parse_args(&["u8:3".to_string(), "(u1:1, [s4:-1])".to_string()]).unwrap();
        assert_eq!(args[0], Value::make_ubits(8, 3));
        assert_eq!(args[1].to_string(), "(u1:1, [s4:-1])");
        let err = parse_args(&["u8".to_string()]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn json_outcomes() {
        let ok: Result<Value, VmError> = Ok(Value::make_u32(5));
        assert_eq!(render_outcome(&ok, true).unwrap(), r#"{"value":"u32:5"}"#);

        let err: Result<Value, VmError> = Err(VmError::AssertionFailure("boom".into()));
        let rendered: serde_json::Value =
            serde_json::from_str(&render_outcome(&err, true).unwrap()).unwrap();
        assert_eq!(rendered["error"]["kind"], "AssertionFailure");
        assert_eq!(rendered["error"]["message"], "assertion failure: boom");
    }

    #[test]
    fn format_keeps_headerless_listings_headerless() {
        let text = "0 literal u8:1\n\n# comment\n1   literal  u8:2\n2 add";
        assert_eq!(
            format_source(text).unwrap(),
            "000 literal u8:1\n001 literal u8:2\n002 add\n"
        );
    }

    #[test]
    fn format_is_idempotent_on_programs() {
        let text = "fn f(1) slots=1\n000 load 0\nfn main(0) slots=0\n000 literal u8:1\n001 call fn:0\n";
        assert_eq!(format_source(text).unwrap(), text);
    }
}

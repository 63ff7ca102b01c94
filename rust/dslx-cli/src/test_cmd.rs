//! DSLX test runner: discovers `test_*` functions in `.bc` files and runs
//! each one on its own VM across a pool of worker threads.

use crate::colors::{bold, gray, green, red, status_label};
use crate::commands::load_program;
use crate::CliError;
use crossbeam_channel as cb;
use dslx_bytecode::Program;
use dslx_vm::{VmOptions, VM};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

pub const SOURCE_EXTENSION: &str = "bc";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    pub file: String,
    pub test_name: String,
    pub passed: bool,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestRunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

impl TestRunSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestOptions {
    /// Only run tests whose name contains this string.
    pub filter: Option<String>,
    /// Worker threads; `None` uses one per CPU.
    pub jobs: Option<usize>,
    pub vm: VmOptions,
}

/// Results in discovery order (file, then function index).
#[derive(Debug, Clone)]
pub struct TestReport {
    pub results: Vec<TestResult>,
    pub elapsed: Duration,
}

impl TestReport {
    pub fn summary(&self) -> TestRunSummary {
        let passed = self.results.iter().filter(|r| r.passed).count();
        TestRunSummary {
            total: self.results.len(),
            passed,
            failed: self.results.len() - passed,
        }
    }

    pub fn print(&self) {
        let summary = self.summary();
        println!(
            "{} {} test{}",
            status_label("Running"),
            summary.total,
            if summary.total == 1 { "" } else { "s" }
        );
        for result in &self.results {
            let status = if result.passed {
                green("✓ ok")
            } else {
                red("✗ FAILED")
            };
            println!(
                "  {} {}::{} ... {}",
                gray("test"),
                gray(&result.file),
                bold(&result.test_name),
                status
            );
        }

        if summary.failed > 0 {
            println!("\n{}", bold("--- FAILURES ---"));
            for result in self.results.iter().filter(|r| !r.passed) {
                println!("  {} {}:", gray("test"), bold(&result.test_name));
                if let Some(msg) = &result.error_message {
                    for line in msg.lines() {
                        println!("    {}", line);
                    }
                }
                println!();
            }
        }

        let mark = if summary.is_success() { green("✓") } else { red("✗") };
        println!(
            "{} Finished in {:.2}s: {} passed, {} failed",
            mark,
            self.elapsed.as_secs_f64(),
            summary.passed,
            summary.failed
        );
    }
}

struct Job {
    /// Position in the final report.
    slot: usize,
    program: Arc<Program>,
    index: usize,
}

pub fn run_tests(path: &Path, options: &TestOptions) -> Result<TestReport, CliError> {
    let start = Instant::now();
    let mut files = Vec::new();
    collect_test_files(path, &mut files);
    files.sort();
    if files.is_empty() {
        return Err(CliError::NoSources(path.to_path_buf()));
    }

    let mut results: Vec<Option<TestResult>> = Vec::new();
    let mut jobs = Vec::new();
    for file in &files {
        let filename = file.display().to_string();
        let program = match load_program(file) {
            Ok(program) => Arc::new(program),
            Err(e) => {
                results.push(Some(TestResult {
                    file: filename,
                    test_name: "<load>".to_string(),
                    passed: false,
                    error_message: Some(e.to_string()),
                }));
                continue;
            }
        };
        for (index, function) in program.test_functions() {
            if let Some(filter) = &options.filter {
                if !function.name.contains(filter.as_str()) {
                    continue;
                }
            }
            jobs.push(Job {
                slot: results.len(),
                program: Arc::clone(&program),
                index,
            });
            results.push(Some(TestResult {
                file: filename.clone(),
                test_name: function.name.clone(),
                passed: false,
                error_message: None,
            }));
        }
    }

    let workers = options
        .jobs
        .unwrap_or_else(num_cpus::get)
        .clamp(1, jobs.len().max(1));
    debug!(files = files.len(), tests = jobs.len(), workers, "running tests");

    let (job_tx, job_rx) = cb::unbounded::<Job>();
    let (done_tx, done_rx) = cb::unbounded::<(usize, Result<(), String>)>();
    for job in jobs {
        // Receivers outlive this loop, so the send cannot fail.
        let _ = job_tx.send(job);
    }
    drop(job_tx);

    let vm_options = options.vm;
    std::thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            scope.spawn(move || {
                for job in job_rx.iter() {
                    let mut vm = VM::with_options(vm_options);
                    vm.load(job.program);
                    let outcome = vm
                        .execute_index(job.index, Vec::new())
                        .map(|_| ())
                        .map_err(|e| e.to_string());
                    let _ = done_tx.send((job.slot, outcome));
                }
            });
        }
    });
    drop(done_tx);

    for (slot, outcome) in done_rx.iter() {
        if let Some(Some(result)) = results.get_mut(slot) {
            match outcome {
                Ok(()) => result.passed = true,
                Err(message) => result.error_message = Some(message),
            }
        }
    }

    Ok(TestReport {
        results: results.into_iter().flatten().collect(),
        elapsed: start.elapsed(),
    })
}

/// `dslx test`: runs and prints. Returns the summary for the exit code.
pub fn cmd_test(path: &Path, options: &TestOptions) -> Result<TestRunSummary, CliError> {
    let report = run_tests(path, options)?;
    report.print();
    Ok(report.summary())
}

fn collect_test_files(path: &Path, files: &mut Vec<PathBuf>) {
    if path.is_file() {
        if is_bytecode_source(path) {
            files.push(path.to_path_buf());
        }
    } else if path.is_dir() {
        if let Ok(entries) = fs::read_dir(path) {
            for entry in entries.flatten() {
                collect_test_files(&entry.path(), files);
            }
        }
    }
}

fn is_bytecode_source(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some(SOURCE_EXTENSION)
}

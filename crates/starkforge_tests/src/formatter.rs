//! Human-readable rendering of test results.

use std::{
    fmt::Display,
    path::{Path, PathBuf},
    time::Duration,
};

use itertools::Itertools;
use starkforge_cheatcodes::ExecutionResources;
use yansi::{Condition, Paint, Painted};

use crate::{
    collector::relative_test_path,
    result::{
        BrokenTestSuiteResult, CapturedOutput, ExceptionMetadata, FailedTestCase,
        PassedTestCase, TestResult, UnexpectedBrokenTestSuiteResult,
    },
};

/// Printed between the traceback and the message of an unexpected exception.
pub const UNEXPECTED_ERROR_MESSAGE: &str =
    "Unexpected starkforge error. This is probably a bug in starkforge, please report it.";

/// Settings shared by everything that renders results.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormatContext {
    pub colorize: bool,
    /// Result paths are shown relative to this directory.
    pub project_root: PathBuf,
}

impl FormatContext {
    pub fn new(colorize: bool, project_root: impl Into<PathBuf>) -> Self {
        Self {
            colorize,
            project_root: project_root.into(),
        }
    }

    fn condition(&self) -> Condition {
        if self.colorize {
            Condition::ALWAYS
        } else {
            Condition::NEVER
        }
    }

    pub(crate) fn paint<T: Display>(&self, value: Painted<T>) -> Painted<T> {
        value.whenever(self.condition())
    }

    pub(crate) fn bold<T: Display>(&self, value: T) -> Painted<T> {
        self.paint(Painted::new(value).bold())
    }

    pub(crate) fn gray<T: Display>(&self, value: T) -> Painted<T> {
        self.paint(Painted::new(value).bright_black())
    }

    pub(crate) fn display_path(&self, path: &Path) -> String {
        relative_test_path(path, &self.project_root)
            .display()
            .to_string()
    }
}

/// Renders `result` as printed after it arrives.
pub fn format_test_result(ctx: &FormatContext, result: &TestResult) -> String {
    match result {
        TestResult::Passed(case) => format_passed(ctx, case, None),
        TestResult::PassedFuzz(fuzz) => format_passed(ctx, &fuzz.case, Some(fuzz.fuzz_runs)),
        TestResult::Failed(case) => format_failed(ctx, case, None),
        TestResult::FailedFuzz(fuzz) => format_failed(ctx, &fuzz.case, Some(fuzz.fuzz_runs)),
        TestResult::Broken(broken) => format_broken(ctx, broken),
        TestResult::UnexpectedBroken(unexpected) => format_unexpected(ctx, unexpected),
    }
}

fn format_passed(ctx: &FormatContext, case: &PassedTestCase, fuzz_runs: Option<u32>) -> String {
    let mut info = vec![format_execution_time(ctx, case.execution_time)];
    if let Some(fuzz_runs) = fuzz_runs {
        info.push(format!("fuzz_runs={}", ctx.bold(fuzz_runs)));
    }
    if let Some(resources) = &case.execution_resources {
        if resources.n_steps > 0 {
            info.push(format!("steps={}", ctx.bold(resources.n_steps)));
        }
        if resources.n_memory_holes > 0 {
            info.push(format!("memory_holes={}", ctx.bold(resources.n_memory_holes)));
        }
    }

    let first_line = format!(
        "[{}] {} {} {}",
        ctx.paint("PASS".green()),
        ctx.gray(ctx.display_path(&case.file_path)),
        case.test_case_name,
        ctx.gray(format!("({})", info.join(", ")))
    );

    let builtins = case
        .execution_resources
        .as_ref()
        .map(|resources| format_builtins(ctx, resources))
        .unwrap_or_default();
    let stdout = format_captured_output(ctx, &case.captured_output);
    if builtins.is_empty() && stdout.is_empty() {
        return first_line;
    }

    let second_line = std::iter::once("      ".to_string())
        .chain(builtins)
        .join(" ");
    let mut lines = vec![first_line, second_line];
    if !stdout.is_empty() {
        lines.push(stdout);
    }
    lines.join("\n")
}

fn format_builtins(ctx: &FormatContext, resources: &ExecutionResources) -> Vec<String> {
    resources
        .builtin_instance_counter
        .iter()
        .filter(|(_, count)| **count > 0)
        .map(|(name, count)| ctx.gray(format!("{name}={}", ctx.bold(count))).to_string())
        .collect()
}

fn format_failed(ctx: &FormatContext, case: &FailedTestCase, fuzz_runs: Option<u32>) -> String {
    let mut info = vec![format_execution_time(ctx, case.execution_time)];
    if let Some(fuzz_runs) = fuzz_runs {
        info.push(format!("fuzz_runs={}", ctx.bold(fuzz_runs)));
    }
    for (key, value) in &case.exception.execution_info {
        info.push(format!("{key}={}", ctx.bold(value)));
    }

    let mut out = format!(
        "[{}] {} {} {}",
        ctx.paint("FAIL".red()),
        ctx.gray(ctx.display_path(&case.file_path)),
        case.test_case_name,
        ctx.gray(format!("({})", info.join(", ")))
    );
    out.push('\n');
    out.push_str(&case.exception.message);
    out.push('\n');
    for metadata in &case.exception.metadata {
        out.push_str(&format_metadata(metadata));
        out.push('\n');
    }
    out.push_str(&format_captured_output(ctx, &case.captured_output));
    out
}

fn format_broken(ctx: &FormatContext, broken: &BrokenTestSuiteResult) -> String {
    format!(
        "[{}] {}\n{}",
        ctx.paint("BROKEN".red()),
        ctx.gray(ctx.display_path(&broken.file_path)),
        broken.exception
    )
}

fn format_unexpected(ctx: &FormatContext, unexpected: &UnexpectedBrokenTestSuiteResult) -> String {
    let mut lines = vec![format!(
        "[{}] {}",
        ctx.paint("UNEXPECTED_EXCEPTION".red()),
        ctx.gray(ctx.display_path(&unexpected.broken.file_path))
    )];
    if let Some(traceback) = &unexpected.traceback {
        lines.push(traceback.clone());
    }
    lines.push(UNEXPECTED_ERROR_MESSAGE.to_string());
    lines.push(unexpected.broken.exception.to_string());
    lines.join("\n")
}

pub(crate) fn format_execution_time(ctx: &FormatContext, execution_time: Duration) -> String {
    format!(
        "time={}s",
        ctx.bold(format!("{:.2}", execution_time.as_secs_f64()))
    )
}

fn format_metadata(metadata: &ExceptionMetadata) -> String {
    format!("[{}]:\n{}", metadata.name, metadata.content)
}

fn format_captured_output(ctx: &FormatContext, captured_output: &CapturedOutput) -> String {
    if captured_output.values().all(String::is_empty) {
        return String::new();
    }

    let mut out = format!("\n[{}]:\n", ctx.paint("captured stdout".cyan()));
    for (name, value) in captured_output {
        if !value.is_empty() {
            out.push_str(&format!("[{name}]:\n{}\n", ctx.gray(value)));
        }
    }
    out
}

//! Results of test cases and test suites.

use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use itertools::Itertools;
use starkforge_cheatcodes::{CheatcodeError, ExecutionResources, RevertError};
use starkforge_common::{CompileError, Felt};

/// Output printed by contract code, keyed by execution phase.
pub type CapturedOutput = BTreeMap<String, String>;

/// A named block of extra information attached to an exception.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExceptionMetadata {
    pub name: String,
    pub content: String,
}

impl ExceptionMetadata {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Lists fuzz inputs as `name = value` lines.
    pub fn counterexample(inputs: &[(String, Felt)]) -> Self {
        Self::new(
            "falsifying example",
            inputs
                .iter()
                .map(|(name, value)| format!("{name} = {value}"))
                .join("\n"),
        )
    }
}

/// What caused a case to fail or a suite to break.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExceptionKind {
    /// Contract code reverted.
    Revert { error_type: String },
    /// A cheatcode was used incorrectly or an expectation was not met.
    Cheatcode { cheatcode: Option<String> },
    /// The test contract could not be compiled.
    Compilation,
    /// The suite or case cannot run as written.
    Usage,
    Unexpected,
}

/// An exception as reported to the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportedException {
    pub kind: ExceptionKind,
    pub message: String,
    /// `key=value` pairs appended to the result line.
    pub execution_info: Vec<(String, String)>,
    pub metadata: Vec<ExceptionMetadata>,
}

impl ReportedException {
    pub fn new(kind: ExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            execution_info: Vec::new(),
            metadata: Vec::new(),
        }
    }

    pub fn revert(revert: &RevertError) -> Self {
        let mut message = format!("[type] {}", revert.code);
        if !revert.messages.is_empty() {
            message.push_str("\n[details]\n");
            message.push_str(&revert.messages.join("\n"));
        }
        Self::new(
            ExceptionKind::Revert {
                error_type: revert.code.clone(),
            },
            message,
        )
    }

    pub fn cheatcode(error: &CheatcodeError) -> Self {
        Self::new(
            ExceptionKind::Cheatcode {
                cheatcode: error.cheatcode().map(str::to_string),
            },
            error.to_string(),
        )
    }

    pub fn compilation(error: &CompileError) -> Self {
        Self::new(ExceptionKind::Compilation, error.to_string())
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::Usage, message)
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::Unexpected, message)
    }

    #[must_use]
    pub fn with_execution_info(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.execution_info.push((key.into(), value.to_string()));
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: ExceptionMetadata) -> Self {
        self.metadata.push(metadata);
        self
    }
}

impl fmt::Display for ReportedException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PassedTestCase {
    pub file_path: PathBuf,
    pub test_case_name: String,
    pub execution_time: Duration,
    pub execution_resources: Option<ExecutionResources>,
    pub captured_output: CapturedOutput,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedTestCase {
    pub file_path: PathBuf,
    pub test_case_name: String,
    pub execution_time: Duration,
    pub exception: ReportedException,
    pub captured_output: CapturedOutput,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PassedFuzzTestCase {
    pub case: PassedTestCase,
    /// Number of examples that ran, rejected ones excluded.
    pub fuzz_runs: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedFuzzTestCase {
    pub case: FailedTestCase,
    pub fuzz_runs: u32,
    /// Minimized inputs the case failed with, by parameter name.
    pub counterexample: Vec<(String, Felt)>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokenTestSuiteResult {
    pub file_path: PathBuf,
    /// Cases that did not run because the suite broke.
    pub test_case_names: Vec<String>,
    pub exception: ReportedException,
    pub captured_output: CapturedOutput,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnexpectedBrokenTestSuiteResult {
    pub broken: BrokenTestSuiteResult,
    pub traceback: Option<String>,
}

/// Result of a test case, or of a whole suite that could not run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TestResult {
    Passed(PassedTestCase),
    Failed(FailedTestCase),
    PassedFuzz(PassedFuzzTestCase),
    FailedFuzz(FailedFuzzTestCase),
    Broken(BrokenTestSuiteResult),
    UnexpectedBroken(UnexpectedBrokenTestSuiteResult),
}

impl TestResult {
    pub fn file_path(&self) -> &Path {
        match self {
            TestResult::Passed(case) => &case.file_path,
            TestResult::PassedFuzz(fuzz) => &fuzz.case.file_path,
            TestResult::Failed(case) => &case.file_path,
            TestResult::FailedFuzz(fuzz) => &fuzz.case.file_path,
            TestResult::Broken(broken) => &broken.file_path,
            TestResult::UnexpectedBroken(unexpected) => &unexpected.broken.file_path,
        }
    }

    /// Name of the test case, `None` for suite results.
    pub fn test_case_name(&self) -> Option<&str> {
        match self {
            TestResult::Passed(case) => Some(&case.test_case_name),
            TestResult::PassedFuzz(fuzz) => Some(&fuzz.case.test_case_name),
            TestResult::Failed(case) => Some(&case.test_case_name),
            TestResult::FailedFuzz(fuzz) => Some(&fuzz.case.test_case_name),
            TestResult::Broken(_) | TestResult::UnexpectedBroken(_) => None,
        }
    }

    pub fn execution_time(&self) -> Option<Duration> {
        match self {
            TestResult::Passed(case) => Some(case.execution_time),
            TestResult::PassedFuzz(fuzz) => Some(fuzz.case.execution_time),
            TestResult::Failed(case) => Some(case.execution_time),
            TestResult::FailedFuzz(fuzz) => Some(fuzz.case.execution_time),
            TestResult::Broken(_) | TestResult::UnexpectedBroken(_) => None,
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, TestResult::Passed(_) | TestResult::PassedFuzz(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TestResult::Failed(_) | TestResult::FailedFuzz(_))
    }

    pub fn is_broken(&self) -> bool {
        matches!(self, TestResult::Broken(_) | TestResult::UnexpectedBroken(_))
    }

    /// Number of collected results this result stands for.
    ///
    /// A suite that broke while running reports once for all of its cases.
    pub fn weight(&self) -> usize {
        match self {
            TestResult::Broken(broken)
            | TestResult::UnexpectedBroken(UnexpectedBrokenTestSuiteResult { broken, .. }) => {
                broken.test_case_names.len().max(1)
            }
            _ => 1,
        }
    }
}

//! # starkforge-tests
//!
//! Discovers test suites, runs every test case against a forked execution
//! state on a pool of workers and aggregates the results.

#[macro_use]
extern crate tracing;

pub mod collector;
pub use collector::{BrokenTestSuite, CollectionResult, TestCase, TestCollector, TestSuite};

mod config;
pub use config::TestRunnerConfig;

mod environment;
pub use environment::{EnvironmentStatus, ExecutionEnvironment, InvokeOutcome};

mod error;
pub use error::TestRunnerError;

pub mod formatter;
pub use formatter::{FormatContext, format_test_result};

pub mod fuzz;
pub use fuzz::{FuzzConfig, TestingSeed};

pub mod multi_runner;
pub use multi_runner::{TestRunResult, TestRunner};

pub mod result;
pub use result::{ExceptionMetadata, ReportedException, TestResult};

mod runner;
pub use runner::SuiteRunner;

mod shared_state;
pub use shared_state::{SharedRunState, SharedStateError};

mod summary;
pub use summary::TestingSummary;

pub mod target;
pub use target::{CaseFilter, TargetExpr, TestTarget, is_test_suite};

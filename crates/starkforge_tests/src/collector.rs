//! Test suite discovery.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use rayon::iter::{IntoParallelIterator, ParallelIterator};
use starkforge_common::{CompileError, Compiler};

use crate::{
    TestRunnerError,
    target::{self, TargetExpr, TestTarget},
};

/// Suite-level setup function, run once before any case of the suite.
pub const SUITE_SETUP_NAME: &str = "__setup__";

pub const TEST_FN_PREFIX: &str = "test_";

pub const CASE_SETUP_PREFIX: &str = "setup_";

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TestCase {
    pub test_path: PathBuf,
    pub test_fn_name: String,
    /// `setup_<suffix>`, where `test_<suffix>` is the test function.
    pub setup_fn_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestSuite {
    pub test_path: PathBuf,
    pub test_cases: Vec<TestCase>,
    pub setup_fn_name: Option<String>,
}

impl TestSuite {
    pub fn test_case_names(&self) -> Vec<String> {
        self.test_cases
            .iter()
            .map(|case| case.test_fn_name.clone())
            .collect()
    }
}

/// A suite whose functions could not be enumerated.
#[derive(Debug)]
pub struct BrokenTestSuite {
    pub test_path: PathBuf,
    pub error: CompileError,
}

#[derive(Debug, Default)]
pub struct CollectionResult {
    pub test_suites: Vec<TestSuite>,
    pub broken_test_suites: Vec<BrokenTestSuite>,
    /// Number of cases across `test_suites`.
    pub test_cases_count: usize,
}

impl CollectionResult {
    /// Number of results a run of this collection reports: one per case and
    /// one per broken suite.
    pub fn expected_results_count(&self) -> usize {
        self.test_cases_count + self.broken_test_suites.len()
    }
}

/// Finds test suites and their cases.
#[derive(Clone)]
pub struct TestCollector {
    compiler: Arc<dyn Compiler>,
    project_root: PathBuf,
}

impl TestCollector {
    pub fn new(compiler: Arc<dyn Compiler>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            compiler,
            project_root: project_root.into(),
        }
    }

    /// Collects the suites named by `targets`, minus `ignored_targets`.
    ///
    /// Function names of every suite file are enumerated in parallel. A file
    /// that fails to enumerate becomes a broken suite, suites whose filters
    /// match no test function are dropped.
    pub fn collect(
        &self,
        targets: &[TargetExpr],
        ignored_targets: &[TargetExpr],
        default_test_suite_glob: Option<&str>,
    ) -> Result<CollectionResult, TestRunnerError> {
        let targets = target::resolve(
            targets,
            ignored_targets,
            default_test_suite_glob,
            &self.project_root,
        )?;
        debug!(count = targets.len(), "resolved test suite files");

        let collected: Vec<_> = targets
            .into_par_iter()
            .map(|target| self.collect_suite(target))
            .collect();

        let mut result = CollectionResult::default();
        for suite in collected {
            match suite {
                Ok(Some(suite)) => {
                    result.test_cases_count += suite.test_cases.len();
                    result.test_suites.push(suite);
                }
                Ok(None) => {}
                Err(broken) => result.broken_test_suites.push(broken),
            }
        }
        Ok(result)
    }

    fn collect_suite(&self, target: TestTarget) -> Result<Option<TestSuite>, BrokenTestSuite> {
        match self.compiler.function_names(&target.path) {
            Ok(function_names) => Ok(build_test_suite(&target, &function_names)),
            Err(error) => {
                debug!(path = %target.path.display(), %error, "failed to collect test suite");
                Err(BrokenTestSuite {
                    test_path: target.path,
                    error,
                })
            }
        }
    }
}

/// Builds the suite of `target` from the function names of its file.
fn build_test_suite(target: &TestTarget, function_names: &[String]) -> Option<TestSuite> {
    let test_cases: Vec<_> = function_names
        .iter()
        .filter(|name| name.starts_with(TEST_FN_PREFIX) && target.includes(name))
        .map(|name| TestCase {
            test_path: target.path.clone(),
            test_fn_name: name.clone(),
            setup_fn_name: find_case_setup(name, function_names),
        })
        .collect();

    if test_cases.is_empty() {
        return None;
    }

    let setup_fn_name = function_names
        .iter()
        .find(|name| *name == SUITE_SETUP_NAME)
        .cloned();

    Some(TestSuite {
        test_path: target.path.clone(),
        test_cases,
        setup_fn_name,
    })
}

fn find_case_setup(test_fn_name: &str, function_names: &[String]) -> Option<String> {
    let suffix = test_fn_name.strip_prefix(TEST_FN_PREFIX)?;
    function_names
        .iter()
        .find(|name| name.strip_prefix(CASE_SETUP_PREFIX) == Some(suffix))
        .cloned()
}

/// Display path of a suite, relative to `project_root` when possible.
pub fn relative_test_path<'a>(test_path: &'a Path, project_root: &Path) -> &'a Path {
    test_path.strip_prefix(project_root).unwrap_or(test_path)
}

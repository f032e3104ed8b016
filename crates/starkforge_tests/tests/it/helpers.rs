//! Shared fixtures for the integration tests.

use std::path::Path;

use starkforge_test_utils::{ProjectFixture, ScriptedContract, init_tracing_for_tests};
use starkforge_tests::{
    CollectionResult, TargetExpr, TestCollector, TestResult, TestRunResult, TestRunner,
    TestRunnerConfig, TestSuite,
};

/// A project with three suites of two cases each and a couple of files that
/// are not test suites:
///
/// ```text
/// bar/bar_test.cairo
/// foo/test_foo.cairo
/// foo/foo.cairo
/// baz/foo/test_foo.cairo
/// baz/foo/foo.cairo
/// ```
pub fn collector_fixture() -> ProjectFixture {
    init_tracing_for_tests();

    let fixture = ProjectFixture::new();
    for path in [
        "bar/bar_test.cairo",
        "foo/test_foo.cairo",
        "foo/foo.cairo",
        "baz/foo/test_foo.cairo",
        "baz/foo/foo.cairo",
    ] {
        fixture.add_contract(
            path,
            ScriptedContract::new().with_noops(&["test_case_a", "test_case_b", "run"]),
        );
    }
    fixture
}

pub fn collector(fixture: &ProjectFixture) -> TestCollector {
    TestCollector::new(fixture.project().compiler(), fixture.root())
}

/// Collects `targets`, all of them relative to the project root.
pub fn collect(fixture: &ProjectFixture, targets: &[&str]) -> CollectionResult {
    let targets: Vec<_> = targets.iter().map(|target| TargetExpr::parse(target)).collect();
    collector(fixture)
        .collect(&targets, &[], None)
        .expect("collection succeeds")
}

/// File names of `suites`, sorted.
pub fn suite_file_names(suites: &[TestSuite]) -> Vec<String> {
    let mut names: Vec<_> = suites
        .iter()
        .map(|suite| file_name(&suite.test_path))
        .collect();
    names.sort();
    names
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .expect("suite paths name files")
        .to_string_lossy()
        .into_owned()
}

/// A configuration for `fixture` running on two workers.
pub fn config(fixture: &ProjectFixture) -> TestRunnerConfig {
    TestRunnerConfig {
        project_root: fixture.root(),
        workers: 2,
        ..TestRunnerConfig::default()
    }
}

pub async fn runner(fixture: &ProjectFixture, config: TestRunnerConfig) -> TestRunner {
    init_tracing_for_tests();

    let project = fixture.project();
    TestRunner::new(config, project.vm(), project.compiler())
        .await
        .expect("project root exists")
}

/// Collects every suite of the project and runs it.
pub async fn run_all(fixture: &ProjectFixture, config: TestRunnerConfig) -> TestRunResult {
    let runner = runner(fixture, config).await;
    let collection = runner
        .collect(&[TargetExpr::parse(".")], &[], None)
        .expect("collection succeeds");
    runner.run(collection).await.expect("run completes")
}

/// The result of the case named `name`.
pub fn case_result<'a>(result: &'a TestRunResult, name: &str) -> &'a TestResult {
    result
        .summary
        .results()
        .iter()
        .find(|result| result.test_case_name() == Some(name))
        .unwrap_or_else(|| panic!("no result for `{name}`"))
}

/// The broken result of the suite in `file_name`.
pub fn suite_result<'a>(result: &'a TestRunResult, file_name: &str) -> &'a TestResult {
    result
        .summary
        .results()
        .iter()
        .find(|result| result.is_broken() && self::file_name(result.file_path()) == file_name)
        .unwrap_or_else(|| panic!("no broken result for `{file_name}`"))
}

/// A project containing a single suite `tests/test_main.cairo`.
pub fn single_suite(contract: ScriptedContract) -> ProjectFixture {
    let fixture = ProjectFixture::new();
    fixture.add_contract("tests/test_main.cairo", contract);
    fixture
}

//! End-to-end runs of plain test cases.

use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use starkforge_cheatcodes::{CheatArgs, CoveredLocation, SyscallHandler, VmError};
use starkforge_common::Felt;
use starkforge_test_utils::{ProjectFixture, ScriptedContract, fail};
use starkforge_tests::{
    FormatContext, SharedStateError, TargetExpr, TestResult, TestRunnerConfig, TestRunnerError,
    format_test_result, result::ExceptionKind,
};

use crate::helpers::{case_result, config, run_all, runner, single_suite, suite_result};

fn expect_stored(
    sys: &mut dyn SyscallHandler,
    key: u64,
    expected: u64,
) -> Result<Vec<Felt>, VmError> {
    let value = sys.storage_read(Felt::from(key))?;
    if value != Felt::from(expected) {
        return Err(fail(format!("expected {expected} at {key}, found {value}")));
    }
    Ok(Vec::new())
}

#[tokio::test(flavor = "multi_thread")]
async fn reports_passed_and_failed_cases() {
    let fixture = single_suite(
        ScriptedContract::new()
            .function("test_passes", |_, _| Ok(Vec::new()))
            .function("test_fails", |_, _| Err(fail("assertion failed")))
            .function("helper", |_, _| Ok(Vec::new())),
    );

    let result = run_all(&fixture, config(&fixture)).await;
    let summary = &result.summary;

    assert_eq!(summary.passed(), 1);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.broken(), 0);
    assert!(matches!(
        summary.assert_all_passed(),
        Err(TestRunnerError::NotAllPassed)
    ));

    let TestResult::Passed(passed) = case_result(&result, "test_passes") else {
        panic!("`test_passes` should pass");
    };
    assert_eq!(passed.execution_resources.as_ref().unwrap().n_steps, 10);

    let TestResult::Failed(failed) = case_result(&result, "test_fails") else {
        panic!("`test_fails` should fail");
    };
    assert_eq!(
        failed.exception.kind,
        ExceptionKind::Revert {
            error_type: "TRANSACTION_FAILED".to_string()
        }
    );
    assert!(failed.exception.message.contains("assertion failed"));

    let ctx = FormatContext::new(false, fixture.root());
    assert!(
        format_test_result(&ctx, case_result(&result, "test_passes"))
            .starts_with("[PASS] tests/test_main.cairo test_passes (time=")
    );
    assert_eq!(
        summary.render(&ctx, 0),
        "Test suites: 1 failed, 1 total\nTests:       1 failed, 1 passed, 2 total"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn broken_suites_are_reported_first() {
    let fixture = ProjectFixture::new();
    fixture.add_broken("test_broken.cairo", "unexpected token");
    fixture.add_contract(
        "test_ok.cairo",
        ScriptedContract::new().with_noops(&["test_ok"]),
    );

    let runner = runner(&fixture, config(&fixture)).await;
    let collection = runner
        .collect(&[TargetExpr::parse(".")], &[], None)
        .unwrap();
    let mut arrived = Vec::new();
    let result = runner
        .run_with(collection, |result| arrived.push(result.clone()))
        .await
        .unwrap();

    assert_eq!(arrived.len(), 2);
    assert!(arrived[0].is_broken());
    assert!(arrived[0].file_path().ends_with("test_broken.cairo"));
    assert!(arrived[1].is_passed());
    assert_eq!(
        result.summary.render(&FormatContext::new(false, fixture.root()), 0),
        "Test suites: 1 broken, 1 passed, 2 total\nTests:       1 passed, 1 total"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn cases_start_from_the_suite_setup_state() {
    let fixture = single_suite(
        ScriptedContract::new()
            .function("__setup__", |sys, _| {
                sys.storage_write(Felt::from(1), Felt::from(42))?;
                Ok(Vec::new())
            })
            .function("test_overwrites", |sys, _| {
                expect_stored(sys, 1, 42)?;
                sys.storage_write(Felt::from(1), Felt::from(7))?;
                expect_stored(sys, 1, 7)
            })
            .function("test_sees_setup", |sys, _| expect_stored(sys, 1, 42))
            .function("test_sees_setup_again", |sys, _| expect_stored(sys, 1, 42)),
    );

    let result = run_all(&fixture, config(&fixture)).await;

    assert_eq!(result.summary.passed(), 3);
    result.summary.assert_all_passed().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_suite_setup_breaks_the_suite() {
    let fixture = single_suite(
        ScriptedContract::new()
            .function("__setup__", |_, _| Err(fail("setup failed")))
            .with_noops(&["test_a", "test_b"]),
    );

    let result = run_all(&fixture, config(&fixture)).await;

    assert_eq!(result.summary.results().len(), 1);
    let TestResult::Broken(broken) = suite_result(&result, "test_main.cairo") else {
        panic!("the suite should be broken");
    };
    assert_eq!(broken.test_case_names, ["test_a", "test_b"]);
    assert!(broken.exception.message.contains("setup failed"));
    assert_eq!(
        result.summary.render(&FormatContext::new(false, fixture.root()), 0),
        "Test suites: 1 broken, 1 total\nTests:       2 skipped, 2 total"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn case_setup_runs_before_its_case_only() {
    let fixture = single_suite(
        ScriptedContract::new()
            .function("setup_configured", |sys, _| {
                sys.storage_write(Felt::from(2), Felt::from(5))?;
                Ok(Vec::new())
            })
            .function("test_configured", |sys, _| expect_stored(sys, 2, 5))
            .function("test_plain", |sys, _| expect_stored(sys, 2, 0))
            .function("setup_broken_setup", |_, _| Err(fail("case setup failed")))
            .function("test_broken_setup", |_, _| Ok(Vec::new())),
    );

    let result = run_all(&fixture, config(&fixture)).await;

    assert!(case_result(&result, "test_configured").is_passed());
    assert!(case_result(&result, "test_plain").is_passed());
    let TestResult::Failed(failed) = case_result(&result, "test_broken_setup") else {
        panic!("a failing case setup fails its case");
    };
    assert!(failed.exception.message.contains("case setup failed"));
    assert_eq!(result.summary.broken(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn output_is_captured_per_phase() {
    let fixture = single_suite(
        ScriptedContract::new()
            .function("__setup__", |sys, _| {
                sys.print("from setup");
                Ok(Vec::new())
            })
            .function("setup_main", |sys, _| {
                sys.print("from case setup");
                Ok(Vec::new())
            })
            .function("test_main", |sys, _| {
                sys.print("from test");
                Ok(Vec::new())
            })
            .function("test_failing", |sys, _| {
                sys.print("before failing");
                Err(fail("failed"))
            }),
    );

    let result = run_all(&fixture, config(&fixture)).await;

    let TestResult::Passed(passed) = case_result(&result, "test_main") else {
        panic!("`test_main` should pass");
    };
    assert_eq!(
        passed.captured_output,
        BTreeMap::from([
            ("setup".to_string(), "from setup\n".to_string()),
            ("setup case".to_string(), "from case setup\n".to_string()),
            ("test".to_string(), "from test\n".to_string()),
        ])
    );

    let failing = case_result(&result, "test_failing");
    let TestResult::Failed(failed) = failing else {
        panic!("`test_failing` should fail");
    };
    assert_eq!(failed.captured_output["test"], "before failing\n");
    let rendered = format_test_result(&FormatContext::new(false, fixture.root()), failing);
    assert!(rendered.ends_with(
        "\n[captured stdout]:\n[setup]:\nfrom setup\n\n[test]:\nbefore failing\n\n"
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn cheatcode_misuse_fails_the_case() {
    let fixture = single_suite(ScriptedContract::new().function("test_roll", |sys, _| {
        sys.cheatcode("roll", CheatArgs::new())?;
        Ok(Vec::new())
    }));

    let result = run_all(&fixture, config(&fixture)).await;

    let TestResult::Failed(failed) = case_result(&result, "test_roll") else {
        panic!("misusing a cheatcode fails the case");
    };
    assert_eq!(
        failed.exception.kind,
        ExceptionKind::Cheatcode {
            cheatcode: Some("roll".to_string())
        }
    );
    assert!(
        failed
            .exception
            .message
            .starts_with("Incorrect usage of `roll` cheatcode")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn vm_errors_are_unexpected() {
    let fixture = single_suite(
        ScriptedContract::new()
            .function("test_crash", |_, _| {
                Err(VmError::Unexpected(eyre::eyre!("segment overflow")))
            })
            .with_noops(&["test_fine"]),
    );

    let result = run_all(&fixture, config(&fixture)).await;

    let unexpected = result
        .summary
        .results()
        .iter()
        .find_map(|result| match result {
            TestResult::UnexpectedBroken(unexpected) => Some(unexpected),
            _ => None,
        })
        .expect("the crash is reported");
    assert_eq!(unexpected.broken.test_case_names, ["test_crash"]);
    assert!(unexpected.broken.exception.message.contains("segment overflow"));
    assert!(case_result(&result, "test_fine").is_passed());
    assert_eq!(result.summary.broken(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn collects_covered_locations() {
    let fixture = single_suite(ScriptedContract::new().with_noops(&["test_a", "test_b"]));
    let test_path = fixture.root().join("tests/test_main.cairo");

    let result = run_all(
        &fixture,
        starkforge_tests::TestRunnerConfig {
            coverage: true,
            ..config(&fixture)
        },
    )
    .await;

    assert_eq!(
        result.covered_locations,
        [
            CoveredLocation {
                path: test_path.clone(),
                line: 1,
            },
            CoveredLocation {
                path: test_path,
                line: 2,
            },
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn coverage_is_off_by_default() {
    let fixture = single_suite(ScriptedContract::new().with_noops(&["test_a"]));

    let result = run_all(&fixture, config(&fixture)).await;

    assert!(result.covered_locations.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn lists_slowest_cases() {
    let fixture = single_suite(ScriptedContract::new().with_noops(&["test_a", "test_b"]));

    let result = run_all(&fixture, config(&fixture)).await;
    let rendered = result
        .summary
        .render(&FormatContext::new(false, fixture.root()), 1);
    let lines: Vec<_> = rendered.lines().collect();

    assert_eq!(lines[0], "Slowest test cases:");
    assert!(lines[1].trim_start().starts_with("1."));
    assert!(lines[1].contains("tests/test_main.cairo"));
    assert_eq!(lines[2], "");
    assert_eq!(lines[3], "Test suites: 1 passed, 1 total");
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_results_abandon_the_run() {
    let later_suite_started = Arc::new(AtomicBool::new(false));
    let fixture = ProjectFixture::new();
    fixture.add_contract(
        "tests/test_a_slow.cairo",
        ScriptedContract::new().function("test_sleeps", |_, _| {
            std::thread::sleep(Duration::from_millis(300));
            Ok(Vec::new())
        }),
    );
    let started = Arc::clone(&later_suite_started);
    fixture.add_contract(
        "tests/test_b_later.cairo",
        ScriptedContract::new().function("test_later", move |_, _| {
            started.store(true, Ordering::SeqCst);
            Ok(Vec::new())
        }),
    );

    let runner = runner(
        &fixture,
        TestRunnerConfig {
            workers: 1,
            result_timeout: Duration::from_millis(20),
            ..config(&fixture)
        },
    )
    .await;
    let collection = runner.collect(&[TargetExpr::parse(".")], &[], None).unwrap();
    assert_eq!(collection.test_suites.len(), 2);

    let error = runner.run(collection).await.unwrap_err();
    assert!(matches!(
        error,
        TestRunnerError::SharedState(SharedStateError::Timeout(timeout))
            if timeout == Duration::from_millis(20)
    ));

    // Outlast the slow case so the worker gets a chance to pick the next suite
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(!later_suite_started.load(Ordering::SeqCst));
}

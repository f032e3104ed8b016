//! End-to-end runs of fuzzed test cases.

use alloy_primitives::U256;
use starkforge_cheatcodes::{CheatArgs, StrategyDescriptor, SyscallHandler, VmError};
use starkforge_common::Felt;
use starkforge_test_utils::{ProjectFixture, ScriptedContract, fail};
use starkforge_tests::{
    FormatContext, FuzzConfig, TestResult, TestRunResult, TestRunnerConfig,
    result::ExceptionKind,
};

use crate::helpers::{case_result, config, run_all, single_suite, suite_result};

fn seeded(fixture: &ProjectFixture, runs: u32) -> TestRunnerConfig {
    TestRunnerConfig {
        fuzz: FuzzConfig {
            runs,
            seed: Some(U256::from(10)),
            ..FuzzConfig::default()
        },
        ..config(fixture)
    }
}

fn given(
    sys: &mut dyn SyscallHandler,
    parameter: &str,
    strategy: StrategyDescriptor,
) -> Result<Vec<Felt>, VmError> {
    sys.cheatcode("given", CheatArgs::new().kwarg(parameter, strategy))?;
    Ok(Vec::new())
}

fn counterexample(result: &TestRunResult, name: &str) -> Vec<(String, Felt)> {
    match case_result(result, name) {
        TestResult::FailedFuzz(failed) => failed.counterexample.clone(),
        other => panic!("`{name}` should fail while fuzzing, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn fuzzes_felt_parameters() {
    let fixture = single_suite(
        ScriptedContract::new()
            .function_with_inputs("test_fuzz_passes", &["a", "b"], |_, _| Ok(Vec::new()))
            .function_with_inputs("test_fuzz_fails", &["a"], |_, calldata| {
                if calldata[0] > Felt::from(1000) {
                    return Err(fail("a is too large"));
                }
                Ok(Vec::new())
            }),
    );

    let result = run_all(&fixture, seeded(&fixture, 5)).await;
    let summary = &result.summary;

    assert_eq!(summary.passed(), 1);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.broken(), 0);

    let TestResult::PassedFuzz(passed) = case_result(&result, "test_fuzz_passes") else {
        panic!("`test_fuzz_passes` should pass");
    };
    assert_eq!(passed.fuzz_runs, 5);

    let TestResult::FailedFuzz(failed) = case_result(&result, "test_fuzz_fails") else {
        panic!("`test_fuzz_fails` should fail");
    };
    let [(name, value)] = failed.counterexample.as_slice() else {
        panic!("one fuzzed parameter");
    };
    assert_eq!(name, "a");
    assert!(*value > Felt::from(1000));
    let metadata = &failed.case.exception.metadata;
    assert_eq!(metadata.len(), 1);
    assert_eq!(metadata[0].name, "falsifying example");
    assert_eq!(metadata[0].content, format!("a = {value}"));

    let rendered = summary.render(&FormatContext::new(false, fixture.root()), 0);
    assert_eq!(
        rendered,
        "Test suites: 1 failed, 1 total\n\
         Tests:       1 failed, 1 passed, 2 total\n\
         Seed:        10"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn same_seed_finds_the_same_counterexample() {
    let contract = ScriptedContract::new().function_with_inputs(
        "test_fuzz",
        &["a", "b"],
        |_, calldata| {
            if calldata[0] > calldata[1] {
                return Err(fail("a > b"));
            }
            Ok(Vec::new())
        },
    );
    let first_fixture = single_suite(contract.clone());
    let second_fixture = single_suite(contract);

    let first = run_all(&first_fixture, seeded(&first_fixture, 20)).await;
    let second = run_all(&second_fixture, seeded(&second_fixture, 20)).await;

    assert_eq!(
        counterexample(&first, "test_fuzz"),
        counterexample(&second, "test_fuzz")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn seed_is_reported_only_when_fuzzing() {
    let fixture = single_suite(ScriptedContract::new().with_noops(&["test_plain"]));

    let result = run_all(&fixture, seeded(&fixture, 5)).await;

    assert!(!result.summary.testing_seed().was_used());
    assert!(
        !result
            .summary
            .render(&FormatContext::new(false, fixture.root()), 0)
            .contains("Seed:")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn non_felt_parameters_break_the_case() {
    let fixture = single_suite(
        ScriptedContract::new()
            .with_struct("Point", 2)
            .function_with_typed_inputs("test_point", &[("p", "Point")], |_, _| Ok(Vec::new()))
            .with_noops(&["test_plain"]),
    );

    let result = run_all(&fixture, seeded(&fixture, 5)).await;

    let TestResult::Broken(broken) = suite_result(&result, "test_main.cairo") else {
        panic!("unsupported parameters break the case");
    };
    assert_eq!(broken.test_case_names, ["test_point"]);
    assert!(broken.exception.message.contains("`p`"));
    assert!(case_result(&result, "test_plain").is_passed());
    assert!(result.summary.assert_all_passed().is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_examples_are_not_counted() {
    let fixture = single_suite(ScriptedContract::new().function_with_inputs(
        "test_even",
        &["a"],
        |sys, calldata| {
            let even = calldata[0] % Felt::from(2) == Felt::ZERO;
            sys.cheatcode("assume", CheatArgs::new().arg(even))?;
            if !even {
                return Err(fail("assume let an odd value through"));
            }
            Ok(Vec::new())
        },
    ));

    let result = run_all(&fixture, seeded(&fixture, 10)).await;

    let TestResult::PassedFuzz(passed) = case_result(&result, "test_even") else {
        panic!("`test_even` should pass");
    };
    assert_eq!(passed.fuzz_runs, 10);
}

#[tokio::test(flavor = "multi_thread")]
async fn rejection_outside_fuzzing_fails_the_case() {
    let fixture = single_suite(ScriptedContract::new().function("test_reject", |sys, _| {
        sys.cheatcode("reject", CheatArgs::new())?;
        Ok(Vec::new())
    }));

    let result = run_all(&fixture, config(&fixture)).await;

    let TestResult::Failed(failed) = case_result(&result, "test_reject") else {
        panic!("`reject` only works while fuzzing");
    };
    assert_eq!(
        failed.exception.kind,
        ExceptionKind::Cheatcode {
            cheatcode: Some("reject".to_string())
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn given_strategies_bound_the_examples() {
    let fixture = single_suite(
        ScriptedContract::new()
            .function("setup_bounded", |sys, _| {
                given(sys, "a", StrategyDescriptor::integers(3, 10))
            })
            .function_with_inputs("test_bounded", &["a"], |_, calldata| {
                if calldata[0] < Felt::from(3) || calldata[0] > Felt::from(10) {
                    return Err(fail("out of range"));
                }
                Ok(Vec::new())
            })
            .function("setup_choice", |sys, _| {
                given(
                    sys,
                    "a",
                    StrategyDescriptor::one_of([Felt::from(7), Felt::from(11)]),
                )
            })
            .function_with_inputs("test_choice", &["a"], |_, calldata| {
                if calldata[0] != Felt::from(7) && calldata[0] != Felt::from(11) {
                    return Err(fail("not one of the choices"));
                }
                Ok(Vec::new())
            }),
    );

    let result = run_all(&fixture, seeded(&fixture, 10)).await;

    assert!(case_result(&result, "test_bounded").is_passed());
    assert!(case_result(&result, "test_choice").is_passed());
}

#[tokio::test(flavor = "multi_thread")]
async fn given_misuse_fails_the_case() {
    let fixture = single_suite(
        ScriptedContract::new()
            .function("setup_unknown", |sys, _| {
                given(sys, "b", StrategyDescriptor::Felts)
            })
            .function_with_inputs("test_unknown", &["a"], |_, _| Ok(Vec::new()))
            .function("setup_no_parameters", |sys, _| {
                given(sys, "a", StrategyDescriptor::Felts)
            })
            .function("test_no_parameters", |_, _| Ok(Vec::new()))
            .function("setup_empty_range", |sys, _| {
                given(sys, "a", StrategyDescriptor::integers(5, 1))
            })
            .function_with_inputs("test_empty_range", &["a"], |_, _| Ok(Vec::new()))
            .function_with_inputs("test_given_in_test", &["a"], |sys, _| {
                given(sys, "a", StrategyDescriptor::Felts)
            }),
    );

    let result = run_all(&fixture, seeded(&fixture, 5)).await;

    for name in ["test_unknown", "test_no_parameters", "test_empty_range"] {
        let TestResult::Failed(failed) = case_result(&result, name) else {
            panic!("`{name}` should fail");
        };
        assert_eq!(
            failed.exception.kind,
            ExceptionKind::Cheatcode {
                cheatcode: Some("given".to_string())
            },
            "{name}"
        );
    }

    let TestResult::FailedFuzz(failed) = case_result(&result, "test_given_in_test") else {
        panic!("`given` outside case setup fails every example");
    };
    assert!(failed.case.exception.message.contains("Can only be used in setup cases."));
}

#[tokio::test(flavor = "multi_thread")]
async fn vm_errors_while_fuzzing_are_unexpected() {
    let fixture = single_suite(ScriptedContract::new().function_with_inputs(
        "test_crash",
        &["a"],
        |_, _| Err(VmError::Unexpected(eyre::eyre!("segment overflow"))),
    ));

    let result = run_all(&fixture, seeded(&fixture, 5)).await;

    let [TestResult::UnexpectedBroken(unexpected)] = result.summary.results() else {
        panic!("the crash is reported once");
    };
    assert_eq!(unexpected.broken.test_case_names, ["test_crash"]);
    assert!(unexpected.broken.exception.message.contains("segment overflow"));
}

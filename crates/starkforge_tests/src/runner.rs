//! Runs the test cases of one suite.

use std::{
    cell::RefCell,
    sync::atomic::{AtomicBool, Ordering},
    time::Instant,
};

use rayon::prelude::*;
use starkforge_cheatcodes::{
    CheatcodeDependencies, CheatcodeError, CheatcodeRegistry, CoveredLocation, ExecutionPhase,
    ExecutionState, VmError,
};
use starkforge_common::TypedParameter;

use crate::{
    ExecutionEnvironment, InvokeOutcome, ReportedException, SharedRunState, SharedStateError,
    TestCase, TestResult, TestRunnerConfig, TestSuite, TestingSeed,
    environment::{TestContract, TestContractError, deploy_test_contract},
    fuzz::{self, ExampleRun, FuzzOutcome},
    result::{
        BrokenTestSuiteResult, CapturedOutput, FailedFuzzTestCase, FailedTestCase,
        PassedFuzzTestCase, PassedTestCase, UnexpectedBrokenTestSuiteResult,
    },
};

/// Runs a single test suite and posts its results to the shared run state.
pub struct SuiteRunner<'a> {
    suite: &'a TestSuite,
    registry: CheatcodeRegistry,
    config: &'a TestRunnerConfig,
    shared_state: &'a SharedRunState,
    testing_seed: &'a TestingSeed,
    /// Set when the run is abandoned; no case starts after that.
    cancelled: &'a AtomicBool,
    span: tracing::Span,
}

impl<'a> SuiteRunner<'a> {
    pub fn new(
        suite: &'a TestSuite,
        dependencies: CheatcodeDependencies,
        config: &'a TestRunnerConfig,
        shared_state: &'a SharedRunState,
        testing_seed: &'a TestingSeed,
        cancelled: &'a AtomicBool,
    ) -> Self {
        let span = debug_span!("suite", name = %suite.test_path.display());
        Self {
            suite,
            registry: CheatcodeRegistry::new(dependencies),
            config,
            shared_state,
            testing_seed,
            cancelled,
            span,
        }
    }

    /// Runs every case of the suite.
    ///
    /// Results are posted as they complete. A suite whose test contract or
    /// suite setup fails posts a single broken result standing for all of
    /// its cases.
    pub fn run(self) -> Result<(), SharedStateError> {
        let _guard = self.span.clone().entered();
        let start = Instant::now();

        let covered_locations = self.run_suite()?;
        // Exactly one report per started suite, even when it is empty
        if self.config.coverage {
            self.shared_state.put_covered_locations(covered_locations)?;
        }

        info!(
            duration = ?start.elapsed(),
            "done. {} test cases",
            self.suite.test_cases.len()
        );
        Ok(())
    }

    fn run_suite(&self) -> Result<Vec<CoveredLocation>, SharedStateError> {
        let mut base_state = ExecutionState::new(self.config.block_info);
        let test_contract =
            match deploy_test_contract(&self.registry, &mut base_state, &self.suite.test_path) {
                Ok(test_contract) => test_contract,
                Err(error) => {
                    debug!(%error, "failed to deploy test contract");
                    self.shared_state.put_result(self.contract_error_result(error))?;
                    return Ok(Vec::new());
                }
            };

        if let Some(setup_fn_name) = &self.suite.setup_fn_name {
            let mut env =
                ExecutionEnvironment::new(&self.registry, &base_state, test_contract.address);
            let outcome = env.invoke(setup_fn_name, Vec::new());
            let captured_output = env.state().captured_output().clone();
            match outcome {
                InvokeOutcome::Passed(_) => {
                    base_state = env.into_state();
                    base_state.commit();
                }
                InvokeOutcome::Failed(exception) => {
                    self.shared_state
                        .put_result(TestResult::Broken(self.broken(exception, captured_output)))?;
                    return Ok(Vec::new());
                }
                InvokeOutcome::Rejected => {
                    let exception = ReportedException::usage(format!(
                        "`{setup_fn_name}` rejected the suite setup"
                    ));
                    self.shared_state
                        .put_result(TestResult::Broken(self.broken(exception, captured_output)))?;
                    return Ok(Vec::new());
                }
                InvokeOutcome::Broken {
                    exception,
                    traceback,
                } => {
                    let broken = self.broken(exception, captured_output);
                    self.shared_state.put_result(TestResult::UnexpectedBroken(
                        UnexpectedBrokenTestSuiteResult { broken, traceback },
                    ))?;
                    return Ok(Vec::new());
                }
            }
        }

        let mut covered_locations = base_state.take_covered_locations();
        let case_locations = self
            .suite
            .test_cases
            .par_iter()
            .map(|case| {
                if self.cancelled.load(Ordering::Relaxed) {
                    return Ok(Vec::new());
                }

                let _span_guard;
                let current_span = tracing::Span::current();
                if current_span.is_none() || current_span.id() != self.span.id() {
                    _span_guard = self.span.enter();
                }
                let _guard = debug_span!(
                    "test",
                    kind = if case.setup_fn_name.is_some() { "with_setup" } else { "plain" },
                    name = %case.test_fn_name
                )
                .entered();

                let (result, locations) = self.run_case(&base_state, &test_contract, case);
                trace!(passed = result.is_passed(), "finished");
                self.shared_state.put_result(result)?;
                Ok(locations)
            })
            .collect::<Result<Vec<_>, SharedStateError>>()?;

        covered_locations.extend(case_locations.into_iter().flatten());
        Ok(covered_locations)
    }

    fn run_case(
        &self,
        base_state: &ExecutionState,
        test_contract: &TestContract,
        case: &TestCase,
    ) -> (TestResult, Vec<CoveredLocation>) {
        let start = Instant::now();
        let mut env = ExecutionEnvironment::new(&self.registry, base_state, test_contract.address);

        if let Some(setup_fn_name) = &case.setup_fn_name {
            env.state_mut().phase = ExecutionPhase::CaseSetup;
            let outcome = env.invoke(setup_fn_name, Vec::new());
            if !matches!(outcome, InvokeOutcome::Passed(_)) {
                let output = env.state().captured_output().clone();
                let locations = env.state_mut().take_covered_locations();
                return (self.unsuccessful(case, start, outcome, output), locations);
            }
        }
        env.state_mut().phase = ExecutionPhase::Test;

        let inputs = test_contract
            .class
            .abi
            .function(&case.test_fn_name)
            .map(|function| function.inputs.as_slice())
            .unwrap_or_default();
        if inputs.is_empty() {
            if !env.state().fuzz.strategies.is_empty() {
                let exception = given_misuse("The test case has no parameters to fuzz.");
                let output = env.state().captured_output().clone();
                return (self.failed(case, start, exception, output), Vec::new());
            }

            let outcome = env.invoke(&case.test_fn_name, Vec::new());
            let output = env.state().captured_output().clone();
            let locations = env.state_mut().take_covered_locations();
            let result = match outcome {
                InvokeOutcome::Passed(resources) => TestResult::Passed(PassedTestCase {
                    file_path: case.test_path.clone(),
                    test_case_name: case.test_fn_name.clone(),
                    execution_time: start.elapsed(),
                    execution_resources: Some(resources),
                    captured_output: output,
                }),
                outcome => self.unsuccessful(case, start, outcome, output),
            };
            return (result, locations);
        }

        self.fuzz_case(env.into_state(), test_contract, case, inputs, start)
    }

    fn fuzz_case(
        &self,
        mut state: ExecutionState,
        test_contract: &TestContract,
        case: &TestCase,
        inputs: &[TypedParameter],
        start: Instant,
    ) -> (TestResult, Vec<CoveredLocation>) {
        let output = state.captured_output().clone();
        let parameters = match fuzz::fuzz_parameters(inputs, &state.fuzz.strategies) {
            Ok(parameters) => parameters,
            Err(error) if error.is_cheatcode_misuse() => {
                let exception = given_misuse(error.to_string());
                return (self.failed(case, start, exception, output), Vec::new());
            }
            Err(error) => {
                let broken = BrokenTestSuiteResult {
                    file_path: case.test_path.clone(),
                    test_case_names: vec![case.test_fn_name.clone()],
                    exception: ReportedException::usage(error.to_string()),
                    captured_output: output,
                };
                return (TestResult::Broken(broken), Vec::new());
            }
        };

        self.testing_seed.mark_used();
        state.fuzz.is_fuzz_run = true;
        let mut locations = state.take_covered_locations();
        let example_locations = RefCell::new(Vec::new());
        let mut fuzzer = fuzz::fuzzer(&self.config.fuzz, self.testing_seed.value());
        let outcome = fuzz::fuzz_test_case(&mut fuzzer, &parameters, |inputs| {
            let mut env = ExecutionEnvironment::new(&self.registry, &state, test_contract.address);
            let outcome = env.invoke(&case.test_fn_name, inputs.to_vec());
            example_locations
                .borrow_mut()
                .extend(env.state_mut().take_covered_locations());
            ExampleRun {
                outcome,
                captured_output: env.state().captured_output().clone(),
            }
        });
        locations.extend(example_locations.into_inner());

        let result = match outcome {
            FuzzOutcome::Passed {
                runs,
                captured_output,
            } => TestResult::PassedFuzz(PassedFuzzTestCase {
                case: PassedTestCase {
                    file_path: case.test_path.clone(),
                    test_case_name: case.test_fn_name.clone(),
                    execution_time: start.elapsed(),
                    execution_resources: None,
                    captured_output,
                },
                fuzz_runs: runs,
            }),
            FuzzOutcome::Failed {
                runs,
                counterexample,
                exception,
                captured_output,
            } => TestResult::FailedFuzz(FailedFuzzTestCase {
                case: FailedTestCase {
                    file_path: case.test_path.clone(),
                    test_case_name: case.test_fn_name.clone(),
                    execution_time: start.elapsed(),
                    exception,
                    captured_output,
                },
                fuzz_runs: runs,
                counterexample,
            }),
            FuzzOutcome::Broken {
                exception,
                traceback,
                captured_output,
            } => self.unexpected_case(case, exception, traceback, captured_output),
        };
        (result, locations)
    }

    /// Result of a case whose setup or test did not pass.
    fn unsuccessful(
        &self,
        case: &TestCase,
        start: Instant,
        outcome: InvokeOutcome,
        captured_output: CapturedOutput,
    ) -> TestResult {
        match outcome {
            InvokeOutcome::Failed(exception) => self.failed(case, start, exception, captured_output),
            InvokeOutcome::Rejected => self.failed(
                case,
                start,
                ReportedException::usage("Examples can only be rejected in fuzz tests."),
                captured_output,
            ),
            InvokeOutcome::Broken {
                exception,
                traceback,
            } => self.unexpected_case(case, exception, traceback, captured_output),
            InvokeOutcome::Passed(_) => self.failed(
                case,
                start,
                ReportedException::unexpected("Passing outcome reported as unsuccessful"),
                captured_output,
            ),
        }
    }

    fn failed(
        &self,
        case: &TestCase,
        start: Instant,
        exception: ReportedException,
        captured_output: CapturedOutput,
    ) -> TestResult {
        TestResult::Failed(FailedTestCase {
            file_path: case.test_path.clone(),
            test_case_name: case.test_fn_name.clone(),
            execution_time: start.elapsed(),
            exception,
            captured_output,
        })
    }

    fn unexpected_case(
        &self,
        case: &TestCase,
        exception: ReportedException,
        traceback: Option<String>,
        captured_output: CapturedOutput,
    ) -> TestResult {
        TestResult::UnexpectedBroken(UnexpectedBrokenTestSuiteResult {
            broken: BrokenTestSuiteResult {
                file_path: case.test_path.clone(),
                test_case_names: vec![case.test_fn_name.clone()],
                exception,
                captured_output,
            },
            traceback,
        })
    }

    fn broken(
        &self,
        exception: ReportedException,
        captured_output: CapturedOutput,
    ) -> BrokenTestSuiteResult {
        BrokenTestSuiteResult {
            file_path: self.suite.test_path.clone(),
            test_case_names: self.suite.test_case_names(),
            exception,
            captured_output,
        }
    }

    fn contract_error_result(&self, error: TestContractError) -> TestResult {
        let exception = match error {
            TestContractError::Compile(error) => ReportedException::compilation(&error),
            TestContractError::Deploy(VmError::Revert(revert)) => ReportedException::revert(&revert),
            TestContractError::Deploy(VmError::Cheatcode(error)) => {
                ReportedException::cheatcode(&error)
            }
            TestContractError::Deploy(VmError::Rejected) => {
                ReportedException::usage("Test contract constructor rejected its deployment")
            }
            TestContractError::Deploy(VmError::Unexpected(report)) => {
                let broken =
                    self.broken(ReportedException::unexpected(report.to_string()), CapturedOutput::new());
                return TestResult::UnexpectedBroken(UnexpectedBrokenTestSuiteResult {
                    broken,
                    traceback: Some(format!("{report:?}")),
                });
            }
        };
        TestResult::Broken(self.broken(exception, CapturedOutput::new()))
    }
}

fn given_misuse(message: impl Into<String>) -> ReportedException {
    ReportedException::cheatcode(&CheatcodeError::custom(message).with_cheatcode("given"))
}

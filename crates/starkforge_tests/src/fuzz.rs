//! Fuzzing of test functions with felt parameters.

use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    sync::atomic::{AtomicBool, Ordering},
};

use alloy_primitives::{U256, map::HashMap};
use proptest::{
    prelude::{BoxedStrategy, Strategy, any},
    sample,
    test_runner::{Config, RngAlgorithm, TestCaseError, TestError, TestRng, TestRunner},
};
use starkforge_cheatcodes::StrategyDescriptor;
use starkforge_common::{Felt, TypedParameter, felt::FIELD_PRIME};

use crate::{ExceptionMetadata, InvokeOutcome, ReportedException, result::CapturedOutput};

/// Fuzz testing configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FuzzConfig {
    /// Maximum number of examples run per fuzzed test case.
    pub runs: u32,
    /// Seed of the example generator. Random when `None`.
    pub seed: Option<U256>,
    /// Number of rejected examples after which a test case fails.
    pub max_test_rejects: u32,
    /// Maximum number of steps taken to minimize a counterexample.
    pub max_shrink_iters: u32,
}

impl Default for FuzzConfig {
    fn default() -> Self {
        Self {
            runs: 100,
            seed: None,
            max_test_rejects: 65536,
            max_shrink_iters: 1024,
        }
    }
}

/// The seed shared by every fuzzed test case of a run.
#[derive(Debug)]
pub struct TestingSeed {
    value: U256,
    was_used: AtomicBool,
}

impl TestingSeed {
    pub fn new(seed: Option<U256>) -> Self {
        Self {
            value: seed.unwrap_or_else(|| U256::from(rand::random::<u64>())),
            was_used: AtomicBool::new(false),
        }
    }

    pub fn value(&self) -> U256 {
        self.value
    }

    pub fn mark_used(&self) {
        self.was_used.store(true, Ordering::Relaxed);
    }

    /// Whether any test case was fuzzed with this seed.
    pub fn was_used(&self) -> bool {
        self.was_used.load(Ordering::Relaxed)
    }
}

/// Reasons a test function cannot be fuzzed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FuzzSetupError {
    #[error("Fuzzed parameter `{name}` has type `{ty}`, only `felt` parameters can be fuzzed.")]
    UnsupportedParameterType { name: String, ty: String },
    #[error("Strategy was given for unknown parameter `{0}`.")]
    UnknownParameter(String),
    #[error("Invalid strategy for parameter `{name}`: {reason}")]
    InvalidStrategy { name: String, reason: String },
}

impl FuzzSetupError {
    /// Whether the error is a mistake of the test code rather than of the
    /// test function's signature.
    pub fn is_cheatcode_misuse(&self) -> bool {
        !matches!(self, FuzzSetupError::UnsupportedParameterType { .. })
    }
}

/// A fuzzed parameter and the strategy its values are drawn from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FuzzParameter {
    pub name: String,
    pub strategy: StrategyDescriptor,
}

/// Pairs each input of a test function with its strategy: the one selected
/// with `given`, or any felt.
pub fn fuzz_parameters(
    inputs: &[TypedParameter],
    strategies: &BTreeMap<String, StrategyDescriptor>,
) -> Result<Vec<FuzzParameter>, FuzzSetupError> {
    if let Some(unknown) = strategies
        .keys()
        .find(|name| !inputs.iter().any(|input| input.name == **name))
    {
        return Err(FuzzSetupError::UnknownParameter(unknown.clone()));
    }

    inputs
        .iter()
        .map(|input| {
            if !input.is_felt() {
                return Err(FuzzSetupError::UnsupportedParameterType {
                    name: input.name.clone(),
                    ty: input.ty.clone(),
                });
            }
            let strategy = strategies
                .get(&input.name)
                .cloned()
                .unwrap_or(StrategyDescriptor::Felts);
            validate_strategy(&input.name, &strategy)?;
            Ok(FuzzParameter {
                name: input.name.clone(),
                strategy,
            })
        })
        .collect()
}

fn validate_strategy(name: &str, strategy: &StrategyDescriptor) -> Result<(), FuzzSetupError> {
    let reason = match strategy {
        StrategyDescriptor::Integers { min, max } if min > max => {
            format!("empty range {min}..={max}")
        }
        StrategyDescriptor::OneOf(values) if values.is_empty() => {
            "no values to choose from".to_string()
        }
        _ => return Ok(()),
    };
    Err(FuzzSetupError::InvalidStrategy {
        name: name.to_string(),
        reason,
    })
}

/// Converts a strategy descriptor into a value generator.
pub fn felt_strategy(descriptor: &StrategyDescriptor) -> BoxedStrategy<Felt> {
    match descriptor {
        StrategyDescriptor::Felts => any::<[u8; 32]>()
            .prop_map(|bytes| U256::from_be_bytes(bytes) % FIELD_PRIME)
            .boxed(),
        StrategyDescriptor::Integers { min, max } => {
            (*min..=*max).prop_map(Felt::from).boxed()
        }
        StrategyDescriptor::OneOf(values) => sample::select(values.clone()).boxed(),
    }
}

/// Builds a deterministic fuzzer for `seed`.
pub fn fuzzer(config: &FuzzConfig, seed: U256) -> TestRunner {
    let config = Config {
        failure_persistence: None,
        cases: config.runs,
        max_global_rejects: config.max_test_rejects,
        max_shrink_iters: config.max_shrink_iters,
        ..Default::default()
    };
    trace!(%seed, "building deterministic fuzzer");
    let rng = TestRng::from_seed(RngAlgorithm::ChaCha, &seed.to_be_bytes::<32>());
    TestRunner::new_with_rng(config, rng)
}

/// Outcome of running one example.
#[derive(Clone, Debug)]
pub struct ExampleRun {
    pub outcome: InvokeOutcome,
    pub captured_output: CapturedOutput,
}

/// Outcome of fuzzing a test case.
#[derive(Clone, Debug)]
pub enum FuzzOutcome {
    Passed {
        runs: u32,
        captured_output: CapturedOutput,
    },
    /// Carries the minimal failing example.
    Failed {
        runs: u32,
        counterexample: Vec<(String, Felt)>,
        exception: ReportedException,
        captured_output: CapturedOutput,
    },
    Broken {
        exception: ReportedException,
        traceback: Option<String>,
        captured_output: CapturedOutput,
    },
}

/// Runs `run_example` on inputs drawn from `parameters` until it fails or
/// the configured number of examples passed.
///
/// Rejected examples are not counted as runs. A failure is minimized before
/// it is reported.
pub fn fuzz_test_case(
    fuzzer: &mut TestRunner,
    parameters: &[FuzzParameter],
    run_example: impl Fn(&[Felt]) -> ExampleRun,
) -> FuzzOutcome {
    let strategy: Vec<_> = parameters
        .iter()
        .map(|parameter| felt_strategy(&parameter.strategy))
        .collect();

    let runs = Cell::new(0u32);
    let shrinking = Cell::new(false);
    let last_output = RefCell::new(CapturedOutput::new());
    let failures = RefCell::new(HashMap::<Vec<Felt>, ExampleRun>::default());
    let broken = RefCell::new(None::<ExampleRun>);

    let result = fuzzer.run(&strategy, |inputs| {
        if broken.borrow().is_some() {
            return Ok(());
        }

        let example = run_example(&inputs);
        match &example.outcome {
            InvokeOutcome::Passed(_) => {
                if !shrinking.get() {
                    runs.set(runs.get() + 1);
                }
                *last_output.borrow_mut() = example.captured_output;
                Ok(())
            }
            InvokeOutcome::Rejected => Err(TestCaseError::reject("example rejected")),
            InvokeOutcome::Failed(exception) => {
                if !shrinking.replace(true) {
                    runs.set(runs.get() + 1);
                }
                let reason = TestCaseError::fail(exception.message.clone());
                failures.borrow_mut().insert(inputs, example);
                Err(reason)
            }
            InvokeOutcome::Broken { .. } => {
                *broken.borrow_mut() = Some(example);
                Err(TestCaseError::fail("example broke"))
            }
        }
    });

    if let Some(ExampleRun {
        outcome: InvokeOutcome::Broken {
            exception,
            traceback,
        },
        captured_output,
    }) = broken.into_inner()
    {
        return FuzzOutcome::Broken {
            exception,
            traceback,
            captured_output,
        };
    }

    let runs = runs.get();
    match result {
        Ok(()) => FuzzOutcome::Passed {
            runs,
            captured_output: last_output.into_inner(),
        },
        Err(TestError::Fail(_, inputs)) => {
            let counterexample: Vec<_> = parameters
                .iter()
                .map(|parameter| parameter.name.clone())
                .zip(inputs.iter().copied())
                .collect();
            let metadata = ExceptionMetadata::counterexample(&counterexample);
            match failures.into_inner().remove(&inputs) {
                Some(ExampleRun {
                    outcome: InvokeOutcome::Failed(exception),
                    captured_output,
                }) => FuzzOutcome::Failed {
                    runs,
                    counterexample,
                    exception: exception.with_metadata(metadata),
                    captured_output,
                },
                _ => FuzzOutcome::Broken {
                    exception: ReportedException::unexpected(
                        "Minimal failing example has no recorded failure",
                    ),
                    traceback: None,
                    captured_output: CapturedOutput::new(),
                },
            }
        }
        Err(TestError::Abort(reason)) => FuzzOutcome::Failed {
            runs,
            counterexample: Vec::new(),
            exception: ReportedException::usage(format!(
                "Fuzzing aborted after {runs} passing examples: {reason}"
            )),
            captured_output: last_output.into_inner(),
        },
    }
}

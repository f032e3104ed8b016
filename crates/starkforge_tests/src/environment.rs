//! Runs test contract functions against a private fork of a state and
//! classifies their outcome.

use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    path::Path,
    sync::Arc,
};

use starkforge_cheatcodes::{
    CallInfo, CheatcodeRegistry, EntryPointCall, ExecutionResources, ExecutionState, VmError,
    deploy_contract, execute_entry_point, verify_expectations,
};
use starkforge_common::{
    CompileError, ContractAddress, ContractClass, Felt, Selector, calculate_contract_address,
};

use crate::ReportedException;

/// Lifecycle of an [`ExecutionEnvironment`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvironmentStatus {
    Ready,
    Running,
    Passed,
    Failed,
    Broken,
}

impl fmt::Display for EnvironmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EnvironmentStatus::Ready => "ready",
            EnvironmentStatus::Running => "running",
            EnvironmentStatus::Passed => "passed",
            EnvironmentStatus::Failed => "failed",
            EnvironmentStatus::Broken => "broken",
        })
    }
}

/// Classified outcome of one invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvokeOutcome {
    Passed(ExecutionResources),
    /// Contract revert or cheatcode error.
    Failed(ReportedException),
    /// The fuzz example was discarded.
    Rejected,
    /// Anything else, including panics.
    Broken {
        exception: ReportedException,
        traceback: Option<String>,
    },
}

/// Executes functions of a deployed test contract.
///
/// Every environment owns a fork of the state it was created from, so
/// nothing it does is visible to sibling environments.
pub struct ExecutionEnvironment<'a> {
    registry: &'a CheatcodeRegistry,
    test_contract: ContractAddress,
    state: ExecutionState,
    status: EnvironmentStatus,
}

impl<'a> ExecutionEnvironment<'a> {
    pub fn new(
        registry: &'a CheatcodeRegistry,
        base_state: &ExecutionState,
        test_contract: ContractAddress,
    ) -> Self {
        Self {
            registry,
            test_contract,
            state: base_state.fork(),
            status: EnvironmentStatus::Ready,
        }
    }

    pub fn status(&self) -> EnvironmentStatus {
        self.status
    }

    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ExecutionState {
        &mut self.state
    }

    pub fn into_state(self) -> ExecutionState {
        self.state
    }

    /// Invokes `function_name` of the test contract with `calldata`.
    ///
    /// An environment may run several functions in a row, e.g. a setup and a
    /// test, but none after one of them failed or broke.
    pub fn invoke(&mut self, function_name: &str, calldata: Vec<Felt>) -> InvokeOutcome {
        if !matches!(
            self.status,
            EnvironmentStatus::Ready | EnvironmentStatus::Passed
        ) {
            return InvokeOutcome::Broken {
                exception: ReportedException::unexpected(format!(
                    "Cannot invoke `{function_name}` in a {} environment",
                    self.status
                )),
                traceback: None,
            };
        }

        trace!(function = function_name, "invoke");
        self.status = EnvironmentStatus::Running;
        self.state.begin_transaction();

        let call = EntryPointCall::external(
            self.test_contract,
            Selector::from_name(function_name),
            calldata,
            ContractAddress::ZERO,
        );
        let registry = self.registry;
        let state = &mut self.state;
        let outcome = panic::catch_unwind(AssertUnwindSafe(move || {
            let outcome = execute_entry_point(state, registry, call);
            verify_expectations(state, outcome)
        }));

        let outcome = match outcome {
            Ok(outcome) => classify(outcome),
            Err(payload) => InvokeOutcome::Broken {
                exception: ReportedException::unexpected(format!(
                    "`{function_name}` panicked: {}",
                    panic_message(payload.as_ref())
                )),
                traceback: None,
            },
        };

        self.status = match &outcome {
            InvokeOutcome::Passed(_) => EnvironmentStatus::Passed,
            InvokeOutcome::Failed(_) | InvokeOutcome::Rejected => EnvironmentStatus::Failed,
            InvokeOutcome::Broken { .. } => EnvironmentStatus::Broken,
        };
        outcome
    }
}

fn classify(outcome: Result<Option<CallInfo>, VmError>) -> InvokeOutcome {
    match outcome {
        Ok(Some(call_info)) => InvokeOutcome::Passed(call_info.total_resources()),
        // Reverted as expected.
        Ok(None) => InvokeOutcome::Passed(ExecutionResources::default()),
        Err(VmError::Revert(revert)) => InvokeOutcome::Failed(ReportedException::revert(&revert)),
        Err(VmError::Cheatcode(error)) => {
            InvokeOutcome::Failed(ReportedException::cheatcode(&error))
        }
        Err(VmError::Rejected) => InvokeOutcome::Rejected,
        Err(VmError::Unexpected(report)) => InvokeOutcome::Broken {
            exception: ReportedException::unexpected(report.to_string()),
            traceback: Some(format!("{report:?}")),
        },
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// A test contract deployed into a suite's base state.
#[derive(Clone, Debug)]
pub struct TestContract {
    pub address: ContractAddress,
    pub class: Arc<ContractClass>,
}

#[derive(Debug, thiserror::Error)]
pub enum TestContractError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Deploy(#[from] VmError),
}

/// Compiles, declares and deploys the test contract at `test_path`.
pub fn deploy_test_contract(
    registry: &CheatcodeRegistry,
    state: &mut ExecutionState,
    test_path: &Path,
) -> Result<TestContract, TestContractError> {
    let class = Arc::new(registry.compiler().compile_contract(test_path)?);
    let class_hash = registry.vm().declare(state, Arc::clone(&class))?;
    state.register_abi(class_hash, Arc::new(class.abi.clone()));

    let address = calculate_contract_address(Felt::ZERO, class_hash, &[], ContractAddress::ZERO);
    deploy_contract(state, registry, class_hash, address, &[], ContractAddress::ZERO)?;
    debug!(path = %test_path.display(), %address, "deployed test contract");

    Ok(TestContract { address, class })
}

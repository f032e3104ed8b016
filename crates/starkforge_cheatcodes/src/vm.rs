//! Interface to the contract-execution virtual machine.

use std::{collections::BTreeMap, fmt, path::PathBuf, sync::Arc};

use itertools::Itertools;
use starkforge_common::{ClassHash, ContractAddress, ContractClass, Felt, Selector};

use crate::{CheatcodeError, ExecutionState, StateError, SyscallHandler};

/// Executes contract code.
///
/// Every syscall the executed code performs goes through the
/// [`SyscallHandler`] passed to [`ContractVm::execute_entry_point`], which is
/// where cheats are applied.
pub trait ContractVm: Send + Sync {
    /// Computes the hash of `class`, failing if the VM cannot load it.
    fn class_hash(&self, class: &ContractClass) -> Result<ClassHash, VmError>;

    /// Applies a declare transaction for `class` to `state`.
    fn declare(
        &self,
        state: &mut ExecutionState,
        class: Arc<ContractClass>,
    ) -> Result<ClassHash, VmError> {
        let class_hash = self.class_hash(&class)?;
        state.declare_class(class_hash, class);
        Ok(class_hash)
    }

    /// Runs the entry point selected by `call` from `class`.
    fn execute_entry_point(
        &self,
        call: &EntryPointCall,
        class: &ContractClass,
        syscalls: &mut dyn SyscallHandler,
    ) -> Result<EntryPointOutput, VmError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallType {
    Call,
    Delegate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryPointType {
    External,
    Constructor,
    L1Handler,
}

/// A single entry point invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryPointCall {
    pub call_type: CallType,
    pub entry_point_type: EntryPointType,
    /// Class to run; resolved from `code_address` when absent.
    pub class_hash: Option<ClassHash>,
    /// Contract whose code runs; defaults to `storage_address`.
    pub code_address: Option<ContractAddress>,
    /// Contract whose storage the code operates on.
    pub storage_address: ContractAddress,
    pub caller_address: ContractAddress,
    pub entry_point_selector: Selector,
    pub calldata: Vec<Felt>,
}

impl EntryPointCall {
    pub fn external(
        contract_address: ContractAddress,
        entry_point_selector: Selector,
        calldata: Vec<Felt>,
        caller_address: ContractAddress,
    ) -> Self {
        Self {
            call_type: CallType::Call,
            entry_point_type: EntryPointType::External,
            class_hash: None,
            code_address: None,
            storage_address: contract_address,
            caller_address,
            entry_point_selector,
            calldata,
        }
    }

    pub fn constructor(
        contract_address: ContractAddress,
        calldata: Vec<Felt>,
        caller_address: ContractAddress,
    ) -> Self {
        Self {
            entry_point_type: EntryPointType::Constructor,
            ..Self::external(
                contract_address,
                Selector::constructor(),
                calldata,
                caller_address,
            )
        }
    }

    pub fn code_address(&self) -> ContractAddress {
        self.code_address.unwrap_or(self.storage_address)
    }
}

/// Resources consumed by an entry point.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionResources {
    pub n_steps: u64,
    pub n_memory_holes: u64,
    pub builtin_instance_counter: BTreeMap<String, u64>,
}

impl ExecutionResources {
    pub fn merge(&mut self, other: &ExecutionResources) {
        self.n_steps += other.n_steps;
        self.n_memory_holes += other.n_memory_holes;
        for (builtin, count) in &other.builtin_instance_counter {
            *self
                .builtin_instance_counter
                .entry(builtin.clone())
                .or_default() += count;
        }
    }
}

/// A source location executed by the VM.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CoveredLocation {
    pub path: PathBuf,
    pub line: usize,
}

/// What the VM returns for a successfully executed entry point.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntryPointOutput {
    pub retdata: Vec<Felt>,
    pub resources: ExecutionResources,
    pub covered_locations: Vec<CoveredLocation>,
}

/// An event tagged with its position within the transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderedEvent {
    pub order: u64,
    pub from_address: ContractAddress,
    pub keys: Vec<Felt>,
    pub data: Vec<Felt>,
}

/// Trace of an executed call and the calls it made.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallInfo {
    pub call: EntryPointCall,
    pub retdata: Vec<Felt>,
    pub resources: ExecutionResources,
    pub events: Vec<OrderedEvent>,
    pub internal_calls: Vec<CallInfo>,
}

impl CallInfo {
    /// Resources of this call and all of its internal calls.
    pub fn total_resources(&self) -> ExecutionResources {
        let mut total = self.resources.clone();
        for internal_call in &self.internal_calls {
            total.merge(&internal_call.total_resources());
        }
        total
    }

    /// Events emitted by the whole call tree, in emission order.
    pub fn ordered_events(&self) -> Vec<&OrderedEvent> {
        let mut events = Vec::new();
        self.collect_events(&mut events);
        events.sort_by_key(|event| event.order);
        events
    }

    fn collect_events<'a>(&'a self, events: &mut Vec<&'a OrderedEvent>) {
        events.extend(&self.events);
        for internal_call in &self.internal_calls {
            internal_call.collect_events(events);
        }
    }
}

/// A contract-level failure reported by the VM.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub struct RevertError {
    /// Error type, e.g. `TRANSACTION_FAILED`.
    pub code: String,
    /// Error messages attached by the failing code, innermost first.
    pub messages: Vec<String>,
}

impl RevertError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            messages: vec![message.into()],
        }
    }

    pub fn without_message(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            messages: Vec::new(),
        }
    }
}

impl fmt::Display for RevertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.messages.is_empty() {
            f.write_str(&self.code)
        } else {
            write!(f, "{}: {}", self.code, self.messages.iter().join("\n"))
        }
    }
}

/// Errors aborting an invocation.
#[derive(Debug, thiserror::Error)]
pub enum VmError {
    /// The executed code reverted.
    #[error(transparent)]
    Revert(#[from] RevertError),
    /// A cheatcode was misused or an expectation failed.
    #[error(transparent)]
    Cheatcode(#[from] CheatcodeError),
    /// The current fuzz example was discarded by `assume` or `reject`.
    #[error("fuzz example rejected")]
    Rejected,
    /// Anything else. Treated as a bug in the VM or the runner.
    #[error(transparent)]
    Unexpected(#[from] eyre::Report),
}

impl From<StateError> for VmError {
    fn from(error: StateError) -> Self {
        let code = match &error {
            StateError::ContractNotDeployed(_) => "UNINITIALIZED_CONTRACT",
            StateError::AddressUnavailable(_) => "CONTRACT_ADDRESS_UNAVAILABLE",
            StateError::UndeclaredClass(_) => "UNDECLARED_CLASS",
        };
        VmError::Revert(RevertError::new(code, error.to_string()))
    }
}

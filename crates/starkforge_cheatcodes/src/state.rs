//! The cheatable execution state.

use std::{collections::BTreeMap, sync::Arc};

use alloy_primitives::map::HashMap;
use starkforge_common::{Abi, ClassHash, ContractAddress, ContractClass, Felt, Selector};

use crate::{
    CoveredLocation, EntryPointCall, ExpectedEvent, ExpectedRevert, StrategyDescriptor,
    storage::ContractStorage,
};

/// Ambient block context, used when no override applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    pub block_number: u64,
    pub block_timestamp: u64,
}

impl Default for BlockInfo {
    fn default() -> Self {
        Self {
            block_number: 1,
            block_timestamp: 0,
        }
    }
}

/// The function kind currently executing. Captured output is grouped by it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExecutionPhase {
    #[default]
    SuiteSetup,
    CaseSetup,
    Test,
}

impl ExecutionPhase {
    pub fn output_name(self) -> &'static str {
        match self {
            ExecutionPhase::SuiteSetup => "setup",
            ExecutionPhase::CaseSetup => "setup case",
            ExecutionPhase::Test => "test",
        }
    }
}

/// Fuzzing controls set by cheatcodes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FuzzControls {
    /// Per-parameter strategies selected with `given`.
    pub strategies: BTreeMap<String, StrategyDescriptor>,
    /// Whether the current invocation runs a fuzz example.
    pub is_fuzz_run: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("contract {0} is not deployed")]
    ContractNotDeployed(ContractAddress),
    #[error("requested contract address {0} is unavailable for deployment")]
    AddressUnavailable(ContractAddress),
    #[error("class with hash {0} is not declared")]
    UndeclaredClass(ClassHash),
}

/// Mutable simulation context of one running test case.
///
/// A suite builds one base state; every case, and every fuzz example, runs
/// against its own [`fork`](Self::fork) of it.
#[derive(Clone, Debug, Default)]
pub struct ExecutionState {
    pub block_info: BlockInfo,
    pub phase: ExecutionPhase,
    pub fuzz: FuzzControls,

    pranked_contracts: HashMap<ContractAddress, ContractAddress>,
    block_numbers: HashMap<ContractAddress, u64>,
    block_timestamps: HashMap<ContractAddress, u64>,
    pub(crate) mocked_calls: HashMap<ContractAddress, HashMap<Selector, Vec<Felt>>>,

    declared_classes: HashMap<ClassHash, Arc<ContractClass>>,
    class_hash_to_abi: HashMap<ClassHash, Arc<Abi>>,
    contract_address_to_class_hash: HashMap<ContractAddress, ClassHash>,
    event_selector_to_name: HashMap<Selector, String>,
    event_name_to_abi: HashMap<String, Arc<Abi>>,
    contracts: HashMap<ContractAddress, ContractStorage>,

    n_emitted_events: u64,
    deploy_salt: u64,
    pub(crate) expected_revert: Option<ExpectedRevert>,
    pub(crate) expected_events: Vec<ExpectedEvent>,

    captured_output: BTreeMap<String, String>,
    covered_locations: Vec<CoveredLocation>,
}

impl ExecutionState {
    pub fn new(block_info: BlockInfo) -> Self {
        Self {
            block_info,
            ..Self::default()
        }
    }

    /// Returns an independent copy of this state.
    ///
    /// Classes, ABIs and committed storage are shared by reference. Every
    /// other map is copied, so mutations of the fork never reach this state.
    pub fn fork(&self) -> Self {
        self.clone()
    }

    /// Runs `op` against a fork and keeps its effects only if it succeeds.
    pub fn copy_and_apply<T, E>(
        &mut self,
        op: impl FnOnce(&mut ExecutionState) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut copy = self.fork();
        let value = op(&mut copy)?;
        *self = copy;
        Ok(value)
    }

    /// Moves pending storage writes of every contract into committed storage.
    pub fn commit(&mut self) {
        for storage in self.contracts.values_mut() {
            storage.commit();
        }
    }

    pub fn set_caller_override(
        &mut self,
        contract_address: ContractAddress,
        caller_address: Option<ContractAddress>,
    ) {
        match caller_address {
            Some(caller_address) => {
                self.pranked_contracts
                    .insert(contract_address, caller_address);
            }
            None => {
                self.pranked_contracts.remove(&contract_address);
            }
        }
    }

    pub fn caller_override(&self, contract_address: ContractAddress) -> Option<ContractAddress> {
        self.pranked_contracts.get(&contract_address).copied()
    }

    pub fn set_block_number_override(
        &mut self,
        contract_address: ContractAddress,
        block_number: Option<u64>,
    ) {
        set_override(&mut self.block_numbers, contract_address, block_number);
    }

    pub fn set_block_timestamp_override(
        &mut self,
        contract_address: ContractAddress,
        block_timestamp: Option<u64>,
    ) {
        set_override(&mut self.block_timestamps, contract_address, block_timestamp);
    }

    /// Block number as seen by `contract_address`.
    pub fn block_number(&self, contract_address: ContractAddress) -> u64 {
        self.block_numbers
            .get(&contract_address)
            .copied()
            .unwrap_or(self.block_info.block_number)
    }

    /// Block timestamp as seen by `contract_address`.
    pub fn block_timestamp(&self, contract_address: ContractAddress) -> u64 {
        self.block_timestamps
            .get(&contract_address)
            .copied()
            .unwrap_or(self.block_info.block_timestamp)
    }

    pub fn mock_call(
        &mut self,
        contract_address: ContractAddress,
        selector: Selector,
        return_values: Vec<Felt>,
    ) {
        self.mocked_calls
            .entry(contract_address)
            .or_default()
            .insert(selector, return_values);
    }

    pub fn mocked_call(&self, contract_address: ContractAddress, selector: Selector) -> Option<&[Felt]> {
        self.mocked_calls
            .get(&contract_address)
            .and_then(|selectors| selectors.get(&selector))
            .map(Vec::as_slice)
    }

    pub fn declare_class(&mut self, class_hash: ClassHash, class: Arc<ContractClass>) {
        self.declared_classes.insert(class_hash, class);
    }

    pub fn class(&self, class_hash: ClassHash) -> Option<&Arc<ContractClass>> {
        self.declared_classes.get(&class_hash)
    }

    /// Records the ABI of a declared class, including its events.
    pub fn register_abi(&mut self, class_hash: ClassHash, abi: Arc<Abi>) {
        for event in abi.events() {
            self.event_selector_to_name
                .insert(Selector::from_name(&event.name), event.name.clone());
            self.event_name_to_abi
                .insert(event.name.clone(), Arc::clone(&abi));
        }
        self.class_hash_to_abi.insert(class_hash, abi);
    }

    pub fn abi_of_class(&self, class_hash: ClassHash) -> Option<&Arc<Abi>> {
        self.class_hash_to_abi.get(&class_hash)
    }

    pub fn abi_of_contract(&self, contract_address: ContractAddress) -> Option<&Arc<Abi>> {
        self.class_hash_of(contract_address)
            .and_then(|class_hash| self.abi_of_class(class_hash))
    }

    pub fn event_name(&self, selector: Selector) -> Option<&str> {
        self.event_selector_to_name
            .get(&selector)
            .map(String::as_str)
    }

    pub fn event_abi(&self, name: &str) -> Option<&Arc<Abi>> {
        self.event_name_to_abi.get(name)
    }

    /// Creates empty storage for a new contract of class `class_hash`.
    pub fn initialize_contract(
        &mut self,
        contract_address: ContractAddress,
        class_hash: ClassHash,
    ) -> Result<(), StateError> {
        if self.contracts.contains_key(&contract_address) {
            return Err(StateError::AddressUnavailable(contract_address));
        }
        if !self.declared_classes.contains_key(&class_hash) {
            return Err(StateError::UndeclaredClass(class_hash));
        }
        self.contracts
            .insert(contract_address, ContractStorage::new(class_hash));
        self.contract_address_to_class_hash
            .insert(contract_address, class_hash);
        Ok(())
    }

    pub fn class_hash_of(&self, contract_address: ContractAddress) -> Option<ClassHash> {
        self.contract_address_to_class_hash
            .get(&contract_address)
            .copied()
    }

    pub fn is_deployed(&self, contract_address: ContractAddress) -> bool {
        self.contracts.contains_key(&contract_address)
    }

    /// Class executed by `call`.
    pub fn class_for_call(&self, call: &EntryPointCall) -> Result<Arc<ContractClass>, StateError> {
        let class_hash = match call.class_hash {
            Some(class_hash) => class_hash,
            None => {
                let code_address = call.code_address();
                self.class_hash_of(code_address)
                    .ok_or(StateError::ContractNotDeployed(code_address))?
            }
        };
        self.class(class_hash)
            .cloned()
            .ok_or(StateError::UndeclaredClass(class_hash))
    }

    pub fn storage_read(&self, contract_address: ContractAddress, key: Felt) -> Result<Felt, StateError> {
        self.contracts
            .get(&contract_address)
            .map(|storage| storage.read(key))
            .ok_or(StateError::ContractNotDeployed(contract_address))
    }

    pub fn storage_write(
        &mut self,
        contract_address: ContractAddress,
        key: Felt,
        value: Felt,
    ) -> Result<(), StateError> {
        self.contracts
            .get_mut(&contract_address)
            .map(|storage| storage.write(key, value))
            .ok_or(StateError::ContractNotDeployed(contract_address))
    }

    /// Reads `size` consecutive words starting at `base` from the storage of
    /// a contract other than the one executing.
    ///
    /// Only the words that were read are written back as pending updates.
    pub fn read_remote_storage(
        &mut self,
        contract_address: ContractAddress,
        base: Felt,
        size: usize,
    ) -> Result<Vec<Felt>, StateError> {
        let storage = self
            .contracts
            .get(&contract_address)
            .ok_or(StateError::ContractNotDeployed(contract_address))?;

        let mut view = storage.view();
        let values = (0..size)
            .map(|offset| view.read(base + Felt::from(offset)))
            .collect();
        let modifications = view.into_read_modifications();

        if let Some(storage) = self.contracts.get_mut(&contract_address) {
            storage.apply_updates(modifications);
        }
        Ok(values)
    }

    /// Returns the order tag of the next event in the current transaction.
    pub fn next_event_order(&mut self) -> u64 {
        let order = self.n_emitted_events;
        self.n_emitted_events += 1;
        order
    }

    /// Starts a new top-level transaction.
    pub fn begin_transaction(&mut self) {
        self.n_emitted_events = 0;
    }

    /// Salt used by `prepare` when none is given.
    pub fn next_deploy_salt(&mut self) -> Felt {
        let salt = Felt::from(self.deploy_salt);
        self.deploy_salt += 1;
        salt
    }

    pub fn expected_revert(&self) -> Option<&ExpectedRevert> {
        self.expected_revert.as_ref()
    }

    pub fn expected_events(&self) -> &[ExpectedEvent] {
        &self.expected_events
    }

    /// Appends a line to the output captured for the current phase.
    pub fn record_output(&mut self, line: &str) {
        let output = self
            .captured_output
            .entry(self.phase.output_name().to_string())
            .or_default();
        output.push_str(line);
        output.push('\n');
    }

    /// Captured output, keyed by phase name.
    pub fn captured_output(&self) -> &BTreeMap<String, String> {
        &self.captured_output
    }

    pub fn record_covered_locations(&mut self, locations: impl IntoIterator<Item = CoveredLocation>) {
        self.covered_locations.extend(locations);
    }

    pub fn take_covered_locations(&mut self) -> Vec<CoveredLocation> {
        std::mem::take(&mut self.covered_locations)
    }
}

fn set_override(
    overrides: &mut HashMap<ContractAddress, u64>,
    contract_address: ContractAddress,
    value: Option<u64>,
) {
    match value {
        Some(value) => {
            overrides.insert(contract_address, value);
        }
        None => {
            overrides.remove(&contract_address);
        }
    }
}

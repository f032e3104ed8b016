//! The syscall interface the VM calls into, and its cheatable implementation.

use starkforge_common::{ClassHash, ContractAddress, Felt, Selector, calculate_contract_address};

use crate::{
    CallInfo, CallType, CheatArgs, CheatValue, CheatcodeRegistry, EntryPointCall, ExecutionState,
    OrderedEvent, RevertError, VmError,
};

/// Outbound calls made by executing code.
pub trait CallInterceptor {
    fn call_contract(
        &mut self,
        contract_address: ContractAddress,
        selector: Selector,
        calldata: &[Felt],
    ) -> Result<Vec<Felt>, VmError>;

    /// Runs the code of `contract_address` on the storage of the current
    /// contract.
    fn delegate_call(
        &mut self,
        contract_address: ContractAddress,
        selector: Selector,
        calldata: &[Felt],
    ) -> Result<Vec<Felt>, VmError>;

    /// Runs the code of a declared class on the storage of the current
    /// contract.
    fn library_call(
        &mut self,
        class_hash: ClassHash,
        selector: Selector,
        calldata: &[Felt],
    ) -> Result<Vec<Felt>, VmError>;

    fn deploy(
        &mut self,
        class_hash: ClassHash,
        salt: Felt,
        constructor_calldata: &[Felt],
        deploy_from_zero: bool,
    ) -> Result<ContractAddress, VmError>;
}

/// Storage accesses of the current contract.
pub trait StorageInterceptor {
    fn storage_read(&mut self, address: Felt) -> Result<Felt, VmError>;

    fn storage_write(&mut self, address: Felt, value: Felt) -> Result<(), VmError>;
}

/// Every syscall available to executing code.
pub trait SyscallHandler: CallInterceptor + StorageInterceptor {
    fn get_contract_address(&self) -> ContractAddress;

    fn get_caller_address(&self) -> ContractAddress;

    fn get_block_number(&self) -> u64;

    fn get_block_timestamp(&self) -> u64;

    fn emit_event(&mut self, keys: Vec<Felt>, data: Vec<Felt>);

    /// Prints a line to the captured output of the running test.
    fn print(&mut self, message: &str);

    /// Invokes the cheatcode registered under `name`.
    fn cheatcode(&mut self, name: &str, args: CheatArgs) -> Result<CheatValue, VmError>;
}

/// Runs `call` through the VM, with a [`CheatableSyscallHandler`] for the
/// new call frame.
pub fn execute_entry_point(
    state: &mut ExecutionState,
    registry: &CheatcodeRegistry,
    call: EntryPointCall,
) -> Result<CallInfo, VmError> {
    let class = state.class_for_call(&call)?;
    let mut handler =
        CheatableSyscallHandler::new(state, registry, call.storage_address, call.caller_address);
    let output = registry
        .vm()
        .execute_entry_point(&call, &class, &mut handler)?;

    let CheatableSyscallHandler {
        state,
        internal_calls,
        events,
        ..
    } = handler;
    state.record_covered_locations(output.covered_locations);

    Ok(CallInfo {
        call,
        retdata: output.retdata,
        resources: output.resources,
        events,
        internal_calls,
    })
}

/// Initializes a contract at `contract_address` and runs its constructor.
///
/// Returns the trace of the constructor call, if the class has one.
pub fn deploy_contract(
    state: &mut ExecutionState,
    registry: &CheatcodeRegistry,
    class_hash: ClassHash,
    contract_address: ContractAddress,
    constructor_calldata: &[Felt],
    caller_address: ContractAddress,
) -> Result<Option<CallInfo>, VmError> {
    state.initialize_contract(contract_address, class_hash)?;

    let has_constructor = state
        .class(class_hash)
        .is_some_and(|class| class.abi.constructor().is_some());
    if !has_constructor {
        if !constructor_calldata.is_empty() {
            return Err(RevertError::new(
                "TRANSACTION_FAILED",
                "Cannot pass calldata to a contract with no constructor.",
            )
            .into());
        }
        return Ok(None);
    }

    let call = EntryPointCall::constructor(
        contract_address,
        constructor_calldata.to_vec(),
        caller_address,
    );
    execute_entry_point(state, registry, call).map(Some)
}

/// Syscall handler of a single call frame, applying the cheats recorded in
/// [`ExecutionState`].
pub struct CheatableSyscallHandler<'a> {
    state: &'a mut ExecutionState,
    registry: &'a CheatcodeRegistry,
    contract_address: ContractAddress,
    caller_address: ContractAddress,
    internal_calls: Vec<CallInfo>,
    events: Vec<OrderedEvent>,
}

impl<'a> CheatableSyscallHandler<'a> {
    pub fn new(
        state: &'a mut ExecutionState,
        registry: &'a CheatcodeRegistry,
        contract_address: ContractAddress,
        caller_address: ContractAddress,
    ) -> Self {
        Self {
            state,
            registry,
            contract_address,
            caller_address,
            internal_calls: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn state(&mut self) -> &mut ExecutionState {
        &mut *self.state
    }

    pub fn registry(&self) -> &'a CheatcodeRegistry {
        self.registry
    }

    /// Calls made from this frame, in call order.
    pub fn internal_calls(&self) -> &[CallInfo] {
        &self.internal_calls
    }

    pub(crate) fn push_internal_call(&mut self, call_info: CallInfo) {
        self.internal_calls.push(call_info);
    }

    fn execute(&mut self, call: EntryPointCall) -> Result<Vec<Felt>, VmError> {
        let call_info = execute_entry_point(&mut *self.state, self.registry, call)?;
        let retdata = call_info.retdata.clone();
        self.internal_calls.push(call_info);
        Ok(retdata)
    }
}

impl CallInterceptor for CheatableSyscallHandler<'_> {
    fn call_contract(
        &mut self,
        contract_address: ContractAddress,
        selector: Selector,
        calldata: &[Felt],
    ) -> Result<Vec<Felt>, VmError> {
        if let Some(return_values) = self.state.mocked_call(contract_address, selector) {
            trace!(target: "cheatcodes", %contract_address, ?selector, "mocked call");
            return Ok(return_values.to_vec());
        }

        self.execute(EntryPointCall::external(
            contract_address,
            selector,
            calldata.to_vec(),
            self.contract_address,
        ))
    }

    fn delegate_call(
        &mut self,
        contract_address: ContractAddress,
        selector: Selector,
        calldata: &[Felt],
    ) -> Result<Vec<Felt>, VmError> {
        self.execute(EntryPointCall {
            call_type: CallType::Delegate,
            code_address: Some(contract_address),
            ..EntryPointCall::external(
                self.contract_address,
                selector,
                calldata.to_vec(),
                self.caller_address,
            )
        })
    }

    fn library_call(
        &mut self,
        class_hash: ClassHash,
        selector: Selector,
        calldata: &[Felt],
    ) -> Result<Vec<Felt>, VmError> {
        self.execute(EntryPointCall {
            call_type: CallType::Delegate,
            class_hash: Some(class_hash),
            ..EntryPointCall::external(
                self.contract_address,
                selector,
                calldata.to_vec(),
                self.caller_address,
            )
        })
    }

    fn deploy(
        &mut self,
        class_hash: ClassHash,
        salt: Felt,
        constructor_calldata: &[Felt],
        deploy_from_zero: bool,
    ) -> Result<ContractAddress, VmError> {
        let deployer = if deploy_from_zero {
            ContractAddress::ZERO
        } else {
            self.contract_address
        };
        let contract_address =
            calculate_contract_address(salt, class_hash, constructor_calldata, deployer);

        let registry = self.registry;
        let caller_address = self.contract_address;
        let constructor_call = self.state.copy_and_apply(|state| {
            deploy_contract(
                state,
                registry,
                class_hash,
                contract_address,
                constructor_calldata,
                caller_address,
            )
        })?;
        if let Some(call_info) = constructor_call {
            self.internal_calls.push(call_info);
        }
        Ok(contract_address)
    }
}

impl StorageInterceptor for CheatableSyscallHandler<'_> {
    fn storage_read(&mut self, address: Felt) -> Result<Felt, VmError> {
        Ok(self.state.storage_read(self.contract_address, address)?)
    }

    fn storage_write(&mut self, address: Felt, value: Felt) -> Result<(), VmError> {
        Ok(self
            .state
            .storage_write(self.contract_address, address, value)?)
    }
}

impl SyscallHandler for CheatableSyscallHandler<'_> {
    fn get_contract_address(&self) -> ContractAddress {
        self.contract_address
    }

    fn get_caller_address(&self) -> ContractAddress {
        self.state
            .caller_override(self.contract_address)
            .unwrap_or(self.caller_address)
    }

    fn get_block_number(&self) -> u64 {
        self.state.block_number(self.contract_address)
    }

    fn get_block_timestamp(&self) -> u64 {
        self.state.block_timestamp(self.contract_address)
    }

    fn emit_event(&mut self, keys: Vec<Felt>, data: Vec<Felt>) {
        let order = self.state.next_event_order();
        self.events.push(OrderedEvent {
            order,
            from_address: self.contract_address,
            keys,
            data,
        });
    }

    fn print(&mut self, message: &str) {
        self.state.record_output(message);
    }

    fn cheatcode(&mut self, name: &str, args: CheatArgs) -> Result<CheatValue, VmError> {
        let registry = self.registry;
        registry.dispatch(self, name, &args)
    }
}

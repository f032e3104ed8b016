use std::sync::Arc;

use starkforge_cheatcodes::{RevertError, SyscallHandler, VmError};
use starkforge_common::{
    Abi, AbiEntry, EventAbiEntry, Felt, FunctionAbiEntry, StructAbiEntry, TypedParameter,
};

/// Body of a scripted entry point.
pub type EntryPointFn =
    Arc<dyn Fn(&mut dyn SyscallHandler, &[Felt]) -> Result<Vec<Felt>, VmError> + Send + Sync>;

/// A revert with the `TRANSACTION_FAILED` error type.
pub fn fail(message: impl Into<String>) -> VmError {
    RevertError::new("TRANSACTION_FAILED", message).into()
}

#[derive(Clone)]
pub(crate) struct ScriptedFunction {
    pub(crate) name: String,
    pub(crate) inputs: Vec<TypedParameter>,
    pub(crate) body: EntryPointFn,
    pub(crate) n_steps: u64,
}

impl ScriptedFunction {
    fn abi_entry(&self) -> FunctionAbiEntry {
        FunctionAbiEntry {
            name: self.name.clone(),
            inputs: self.inputs.clone(),
            outputs: Vec::new(),
        }
    }
}

/// A contract whose entry points are Rust closures.
#[derive(Clone, Default)]
pub struct ScriptedContract {
    pub(crate) functions: Vec<ScriptedFunction>,
    pub(crate) constructor: Option<ScriptedFunction>,
    structs: Vec<StructAbiEntry>,
    events: Vec<EventAbiEntry>,
}

impl ScriptedContract {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds functions that do nothing.
    #[must_use]
    pub fn with_noops(self, names: &[&str]) -> Self {
        names
            .iter()
            .fold(self, |contract, name| contract.function(name, |_, _| Ok(Vec::new())))
    }

    #[must_use]
    pub fn function(
        self,
        name: &str,
        body: impl Fn(&mut dyn SyscallHandler, &[Felt]) -> Result<Vec<Felt>, VmError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.function_with_typed_inputs(name, &[], body)
    }

    /// Adds a function taking felt parameters.
    #[must_use]
    pub fn function_with_inputs(
        self,
        name: &str,
        inputs: &[&str],
        body: impl Fn(&mut dyn SyscallHandler, &[Felt]) -> Result<Vec<Felt>, VmError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        let inputs: Vec<_> = inputs.iter().map(|input| (*input, "felt")).collect();
        self.function_with_typed_inputs(name, &inputs, body)
    }

    /// Adds a function taking `(name, type)` parameters.
    #[must_use]
    pub fn function_with_typed_inputs(
        mut self,
        name: &str,
        inputs: &[(&str, &str)],
        body: impl Fn(&mut dyn SyscallHandler, &[Felt]) -> Result<Vec<Felt>, VmError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.functions.push(scripted_function(name, inputs, body));
        self
    }

    #[must_use]
    pub fn constructor(
        mut self,
        inputs: &[&str],
        body: impl Fn(&mut dyn SyscallHandler, &[Felt]) -> Result<Vec<Felt>, VmError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        let inputs: Vec<_> = inputs.iter().map(|input| (*input, "felt")).collect();
        self.constructor = Some(scripted_function("constructor", &inputs, body));
        self
    }

    #[must_use]
    pub fn with_struct(mut self, name: &str, size: usize) -> Self {
        self.structs.push(StructAbiEntry {
            name: name.to_string(),
            size,
            members: Vec::new(),
        });
        self
    }

    #[must_use]
    pub fn with_event(mut self, name: &str) -> Self {
        self.events.push(EventAbiEntry {
            name: name.to_string(),
            keys: Vec::new(),
            data: Vec::new(),
        });
        self
    }

    pub fn function_names(&self) -> Vec<String> {
        self.functions.iter().map(|f| f.name.clone()).collect()
    }

    pub fn abi(&self) -> Abi {
        let structs = self.structs.iter().cloned().map(AbiEntry::Struct);
        let events = self.events.iter().cloned().map(AbiEntry::Event);
        let constructor = self
            .constructor
            .iter()
            .map(|constructor| AbiEntry::Constructor(constructor.abi_entry()));
        let functions = self
            .functions
            .iter()
            .map(|function| AbiEntry::Function(function.abi_entry()));

        Abi(structs
            .chain(events)
            .chain(constructor)
            .chain(functions)
            .collect())
    }
}

fn scripted_function(
    name: &str,
    inputs: &[(&str, &str)],
    body: impl Fn(&mut dyn SyscallHandler, &[Felt]) -> Result<Vec<Felt>, VmError>
    + Send
    + Sync
    + 'static,
) -> ScriptedFunction {
    ScriptedFunction {
        name: name.to_string(),
        inputs: inputs
            .iter()
            .map(|(name, ty)| TypedParameter {
                name: (*name).to_string(),
                ty: (*ty).to_string(),
            })
            .collect(),
        body: Arc::new(body),
        n_steps: 10,
    }
}

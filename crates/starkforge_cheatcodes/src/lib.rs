//! # starkforge-cheatcodes
//!
//! The cheatable execution state, the syscall handler that applies cheats to
//! executing code, and the cheatcode implementations.

#![allow(elided_lifetimes_in_paths)] // Cheats context uses 2 lifetimes

#[macro_use]
extern crate tracing;

#[macro_use]
mod error;
mod cheats;
mod registry;
mod state;
mod storage;
mod syscalls;
mod values;
mod vm;

pub use cheats::{ExpectedEvent, ExpectedRevert, verify_expectations};
pub use error::{CheatcodeError, CheatcodeErrorKind, Result};
pub use registry::{CheatcodeDependencies, CheatcodeRegistry};
pub use state::{BlockInfo, ExecutionPhase, ExecutionState, FuzzControls, StateError};
pub use storage::{ContractStorage, StorageView};
pub use syscalls::{
    CallInterceptor, CheatableSyscallHandler, StorageInterceptor, SyscallHandler,
    deploy_contract, execute_entry_point,
};
pub use values::{
    CheatArgs, CheatValue, DeclaredContract, DeployedContract, PreparedContract,
    StrategyDescriptor,
};
pub use vm::{
    CallInfo, CallType, ContractVm, CoveredLocation, EntryPointCall, EntryPointOutput,
    EntryPointType, ExecutionResources, OrderedEvent, RevertError, VmError,
};

use starkforge_common::ContractAddress;

/// Cheatcode implementation.
pub trait Cheatcode: Send + Sync + std::fmt::Debug {
    /// Name the cheatcode is invoked by.
    fn name(&self) -> &'static str;

    /// Applies this cheatcode to the given state.
    ///
    /// Implement this function if you don't need to execute calls.
    fn apply(&self, state: &mut ExecutionState, args: &CheatArgs) -> Result {
        let _ = (state, args);
        bail!("`{}` requires an execution context", self.name())
    }

    /// Applies this cheatcode to the given context.
    ///
    /// Implement this function if you need to compile, declare or call
    /// contracts.
    #[inline(always)]
    fn apply_full(&self, ccx: &mut CheatsCtxt, args: &CheatArgs) -> Result {
        self.apply(ccx.state(), args)
    }

    #[inline]
    fn apply_traced(&self, ccx: &mut CheatsCtxt, args: &CheatArgs) -> Result {
        #[inline(never)]
        fn trace_span_and_call(name: &'static str, args: &CheatArgs) -> tracing::span::EnteredSpan {
            let span = debug_span!(target: "cheatcodes", "apply", cheat = name);
            let entered = span.entered();
            trace!(target: "cheatcodes", ?args, "applying");
            entered
        }

        #[inline(never)]
        fn trace_return(result: &Result) {
            trace!(
                target: "cheatcodes",
                return = match result {
                    Ok(value) => format!("{value:?}"),
                    Err(e) => e.to_string(),
                }
            );
        }

        let _span = trace_span_and_call(self.name(), args);
        let result = self.apply_full(ccx, args).map_err(|error| match error {
            VmError::Cheatcode(error) => VmError::Cheatcode(error.with_cheatcode(self.name())),
            other => other,
        });
        trace_return(&result);
        result
    }
}

/// The cheatcode context: the syscall handler of the frame that invoked the
/// cheatcode.
pub struct CheatsCtxt<'h, 'a> {
    pub(crate) handler: &'h mut CheatableSyscallHandler<'a>,
}

impl<'a> CheatsCtxt<'_, 'a> {
    pub fn state(&mut self) -> &mut ExecutionState {
        self.handler.state()
    }

    pub fn registry(&self) -> &'a CheatcodeRegistry {
        self.handler.registry()
    }

    /// Address of the contract that invoked the cheatcode.
    pub fn contract_address(&self) -> ContractAddress {
        self.handler.get_contract_address()
    }

    pub fn handler(&mut self) -> &mut CheatableSyscallHandler<'a> {
        &mut *self.handler
    }
}

use crate::{CheatArgs, CheatValue, Cheatcode, ExecutionPhase, ExecutionState, Result, VmError};

/// `assume(condition)`: discards the current fuzz example unless `condition`
/// holds.
#[derive(Debug)]
pub(crate) struct AssumeCheatcode;

impl Cheatcode for AssumeCheatcode {
    fn name(&self) -> &'static str {
        "assume"
    }

    fn apply(&self, state: &mut ExecutionState, args: &CheatArgs) -> Result {
        ensure!(state.fuzz.is_fuzz_run, "Can only be used in fuzz tests.");
        if args.truthy(0, "condition")? {
            Ok(CheatValue::None)
        } else {
            Err(VmError::Rejected)
        }
    }
}

/// `reject()`: discards the current fuzz example.
#[derive(Debug)]
pub(crate) struct RejectCheatcode;

impl Cheatcode for RejectCheatcode {
    fn name(&self) -> &'static str {
        "reject"
    }

    fn apply(&self, state: &mut ExecutionState, _args: &CheatArgs) -> Result {
        ensure!(state.fuzz.is_fuzz_run, "Can only be used in fuzz tests.");
        Err(VmError::Rejected)
    }
}

/// `given(parameter=strategy, ...)`: selects the strategies fuzzed
/// parameters are drawn from.
#[derive(Debug)]
pub(crate) struct GivenCheatcode;

impl Cheatcode for GivenCheatcode {
    fn name(&self) -> &'static str {
        "given"
    }

    fn apply(&self, state: &mut ExecutionState, args: &CheatArgs) -> Result {
        ensure!(
            state.phase == ExecutionPhase::CaseSetup,
            "Can only be used in setup cases."
        );
        ensure!(
            args.positional().is_empty(),
            "Strategies must be passed as keyword arguments."
        );
        for (parameter, value) in args.keyword() {
            let CheatValue::Strategy(strategy) = value else {
                bail!("Argument `{parameter}` must be a strategy.");
            };
            state
                .fuzz
                .strategies
                .insert(parameter.clone(), strategy.clone());
        }
        Ok(CheatValue::None)
    }
}

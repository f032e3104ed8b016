use crate::{CheatArgs, CheatValue, Cheatcode, ExecutionState, Result};

/// `prank(contract_address, caller_address)`: makes `contract_address` see
/// `caller_address` as its caller. A missing caller removes the override.
#[derive(Debug)]
pub(crate) struct PrankCheatcode;

impl Cheatcode for PrankCheatcode {
    fn name(&self) -> &'static str {
        "prank"
    }

    fn apply(&self, state: &mut ExecutionState, args: &CheatArgs) -> Result {
        let contract_address = args.address(0, "contract_address")?;
        let caller_address = args.opt_address(1, "caller_address")?;
        state.set_caller_override(contract_address, caller_address);
        Ok(CheatValue::None)
    }
}

#[derive(Debug)]
pub(crate) struct WarpCheatcode;

impl Cheatcode for WarpCheatcode {
    fn name(&self) -> &'static str {
        "warp"
    }

    fn apply(&self, state: &mut ExecutionState, args: &CheatArgs) -> Result {
        let contract_address = args.address(0, "contract_address")?;
        let block_timestamp = args.opt_u64(1, "block_timestamp")?;
        state.set_block_timestamp_override(contract_address, block_timestamp);
        Ok(CheatValue::None)
    }
}

#[derive(Debug)]
pub(crate) struct RollCheatcode;

impl Cheatcode for RollCheatcode {
    fn name(&self) -> &'static str {
        "roll"
    }

    fn apply(&self, state: &mut ExecutionState, args: &CheatArgs) -> Result {
        let contract_address = args.address(0, "contract_address")?;
        let block_number = args.opt_u64(1, "block_number")?;
        state.set_block_number_override(contract_address, block_number);
        Ok(CheatValue::None)
    }
}

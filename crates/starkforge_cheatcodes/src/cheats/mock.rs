use crate::{CheatArgs, CheatValue, Cheatcode, ExecutionState, Result};

#[derive(Debug)]
pub(crate) struct MockCallCheatcode;

impl Cheatcode for MockCallCheatcode {
    fn name(&self) -> &'static str {
        "mock_call"
    }

    fn apply(&self, state: &mut ExecutionState, args: &CheatArgs) -> Result {
        let contract_address = args.address(0, "contract_address")?;
        let selector = args.selector(1, "selector")?;
        let return_values = args.felts_or_empty(2, "return_values")?;
        state.mock_call(contract_address, selector, return_values);
        Ok(CheatValue::None)
    }
}

#[derive(Debug)]
pub(crate) struct ClearMockCallCheatcode;

impl Cheatcode for ClearMockCallCheatcode {
    fn name(&self) -> &'static str {
        "clear_mock_call"
    }

    fn apply(&self, state: &mut ExecutionState, args: &CheatArgs) -> Result {
        let contract_address = args.address(0, "contract_address")?;
        let selector = args.selector(1, "selector")?;

        let Some(selectors) = state.mocked_calls.get_mut(&contract_address) else {
            bail!("Contract {contract_address} doesn't have mocked selectors.");
        };
        ensure!(
            selectors.remove(&selector).is_some(),
            "Couldn't find mocked selector {selector} for an address {contract_address}."
        );
        if selectors.is_empty() {
            state.mocked_calls.remove(&contract_address);
        }
        Ok(CheatValue::None)
    }
}

use std::path::Path;

use starkforge_common::{ContractAddress, Felt, calculate_contract_address};

use crate::{
    CheatArgs, Cheatcode, CheatsCtxt, DeclaredContract, DeployedContract, ExecutionState,
    PreparedContract, Result, cheats::declare::declare_contract, deploy_contract,
};

#[derive(Debug)]
pub(crate) struct PrepareCheatcode;

impl Cheatcode for PrepareCheatcode {
    fn name(&self) -> &'static str {
        "prepare"
    }

    fn apply(&self, state: &mut ExecutionState, args: &CheatArgs) -> Result {
        let declared = args.declared(0, "declared")?;
        let constructor_calldata = args.felts_or_empty(1, "constructor_calldata")?;
        let salt = args.opt_felt(2, "salt")?;

        Ok(prepare_contract(state, declared, constructor_calldata, salt).into())
    }
}

#[derive(Debug)]
pub(crate) struct DeployCheatcode;

impl Cheatcode for DeployCheatcode {
    fn name(&self) -> &'static str {
        "deploy"
    }

    fn apply_full(&self, ccx: &mut CheatsCtxt, args: &CheatArgs) -> Result {
        let prepared = args.prepared(0, "prepared")?;
        Ok(deploy_prepared(ccx, prepared)?.into())
    }
}

#[derive(Debug)]
pub(crate) struct DeployContractCheatcode;

impl Cheatcode for DeployContractCheatcode {
    fn name(&self) -> &'static str {
        "deploy_contract"
    }

    fn apply_full(&self, ccx: &mut CheatsCtxt, args: &CheatArgs) -> Result {
        args.ensure_keyword_only(2, &["config"])?;
        let contract = args.str(0, "contract")?;
        let constructor_calldata = args.felts_or_empty(1, "constructor_calldata")?;

        let declared = declare_contract(ccx, Path::new(contract))?;
        let prepared = prepare_contract(ccx.state(), declared, constructor_calldata, None);
        Ok(deploy_prepared(ccx, &prepared)?.into())
    }
}

pub(crate) fn prepare_contract(
    state: &mut ExecutionState,
    declared: DeclaredContract,
    constructor_calldata: Vec<Felt>,
    salt: Option<Felt>,
) -> PreparedContract {
    let salt = salt.unwrap_or_else(|| state.next_deploy_salt());
    let contract_address = calculate_contract_address(
        salt,
        declared.class_hash,
        &constructor_calldata,
        ContractAddress::ZERO,
    );
    PreparedContract {
        contract_address,
        class_hash: declared.class_hash,
        constructor_calldata,
        salt,
    }
}

/// Initializes the prepared contract and runs its constructor, called by the
/// contract that invoked the cheatcode.
pub(crate) fn deploy_prepared(
    ccx: &mut CheatsCtxt,
    prepared: &PreparedContract,
) -> Result<DeployedContract> {
    let registry = ccx.registry();
    let caller_address = ccx.contract_address();

    let constructor_call = ccx.state().copy_and_apply(|state| {
        deploy_contract(
            state,
            registry,
            prepared.class_hash,
            prepared.contract_address,
            &prepared.constructor_calldata,
            caller_address,
        )
    })?;
    if let Some(call_info) = constructor_call {
        ccx.handler().push_internal_call(call_info);
    }

    Ok(DeployedContract {
        contract_address: prepared.contract_address,
    })
}

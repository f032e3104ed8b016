use starkforge_common::{ContractAddress, Felt, abi::FELT_TYPE, felt::storage_var_address};

use crate::{CheatArgs, CheatValue, Cheatcode, CheatsCtxt, Result, StorageInterceptor};

/// `load(target_contract_address, variable_name, variable_type, key=[])`:
/// reads the words of a storage variable.
#[derive(Debug)]
pub(crate) struct LoadCheatcode;

impl Cheatcode for LoadCheatcode {
    fn name(&self) -> &'static str {
        "load"
    }

    fn apply_full(&self, ccx: &mut CheatsCtxt, args: &CheatArgs) -> Result {
        let target = args.address(0, "target_contract_address")?;
        let variable_name = args.str(1, "variable_name")?;
        let variable_type = args.str(2, "variable_type")?;
        let key = args.felts_or_empty(3, "key")?;

        let size = variable_size(ccx, target, variable_type)?;
        let base = storage_var_address(variable_name, &key);

        let values = if target == ccx.contract_address() {
            (0..size)
                .map(|offset| ccx.handler().storage_read(base + Felt::from(offset)))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            ccx.state().read_remote_storage(target, base, size)?
        };
        Ok(CheatValue::Felts(values))
    }
}

/// `store(target_contract_address, variable_name, value, key=[])`: writes
/// consecutive words of a storage variable.
#[derive(Debug)]
pub(crate) struct StoreCheatcode;

impl Cheatcode for StoreCheatcode {
    fn name(&self) -> &'static str {
        "store"
    }

    fn apply_full(&self, ccx: &mut CheatsCtxt, args: &CheatArgs) -> Result {
        let target = args.address(0, "target_contract_address")?;
        let variable_name = args.str(1, "variable_name")?;
        let value = args.felts_or_empty(2, "value")?;
        let key = args.felts_or_empty(3, "key")?;

        let base = storage_var_address(variable_name, &key);
        let local = target == ccx.contract_address();
        for (offset, word) in value.into_iter().enumerate() {
            let address = base + Felt::from(offset);
            if local {
                ccx.handler().storage_write(address, word)?;
            } else {
                ccx.state().storage_write(target, address, word)?;
            }
        }
        Ok(CheatValue::None)
    }
}

fn variable_size(ccx: &mut CheatsCtxt, target: ContractAddress, variable_type: &str) -> Result<usize> {
    if variable_type == FELT_TYPE {
        return Ok(1);
    }
    let size = ccx
        .state()
        .abi_of_contract(target)
        .and_then(|abi| abi.type_size(variable_type));
    match size {
        Some(size) => Ok(size),
        None => bail!("Type {variable_type} has not been found in contract {target}"),
    }
}

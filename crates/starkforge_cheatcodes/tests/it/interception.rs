use starkforge_cheatcodes::{CheatArgs, ExecutionPhase, VmError};
use starkforge_common::{
    ClassHash, ContractAddress, Felt, Selector, calculate_contract_address,
    felt::storage_var_address,
};
use starkforge_test_utils::{ScriptedContract, fail};

use crate::helpers::{BALANCE_CONTRACT, TestEnvironment, deploy_balance};

#[test]
fn deploy_syscall_runs_constructor() {
    let mut env = TestEnvironment::new(ScriptedContract::new().function("test_factory", |sys, _| {
        let declared = sys.cheatcode("declare", CheatArgs::new().arg(BALANCE_CONTRACT))?;
        let Some(declared) = declared.as_declared() else {
            return Err(fail("declare returned no class"));
        };
        let address = sys.deploy(declared.class_hash, Felt::from(1), &[Felt::from(5)], false)?;
        let mut retdata = vec![address.felt()];
        retdata.extend(sys.call_contract(address, Selector::from_name("get_balance"), &[])?);
        Ok(retdata)
    }));

    let retdata = env.retdata("test_factory");
    let address = ContractAddress(retdata.first().copied().expect("address returned"));
    assert!(env.state.is_deployed(address));
    assert_eq!(retdata.get(1), Some(&Felt::from(5)));
}

#[test]
fn failed_deploy_leaves_no_contract() {
    let mut env = TestEnvironment::new(ScriptedContract::new().function("test_failed", |sys, _| {
        let declared = sys.cheatcode("declare", CheatArgs::new().arg("contracts/reverting.cairo"))?;
        let Some(declared) = declared.as_declared() else {
            return Err(fail("declare returned no class"));
        };
        match sys.deploy(declared.class_hash, Felt::from(1), &[], true) {
            Err(VmError::Revert(_)) => Ok(vec![declared.class_hash.felt()]),
            Ok(_) => Err(fail("constructor should revert")),
            Err(error) => Err(error),
        }
    }));
    env.fixture.add_contract(
        "contracts/reverting.cairo",
        ScriptedContract::new().constructor(&[], |_, _| Err(fail("constructor failed"))),
    );

    let retdata = env.retdata("test_failed");
    let class_hash = ClassHash(retdata.first().copied().expect("class hash returned"));
    assert!(env.state.class(class_hash).is_some());
    let address =
        calculate_contract_address(Felt::from(1), class_hash, &[], ContractAddress::ZERO);
    assert!(!env.state.is_deployed(address));
}

#[test]
fn forks_do_not_see_each_other() {
    let mut env = TestEnvironment::new(
        ScriptedContract::new()
            .function("setup", |sys, _| {
                let address = deploy_balance(sys, 10)?;
                Ok(vec![address.felt()])
            })
            .function_with_inputs("increase", &["target"], |sys, calldata| {
                let target = ContractAddress(calldata.first().copied().unwrap_or_default());
                sys.call_contract(target, Selector::from_name("increase"), &[Felt::from(1)])
            }),
    );
    let address = ContractAddress(
        env.retdata("setup")
            .first()
            .copied()
            .expect("address returned"),
    );
    env.state.commit();

    let base = env.state.fork();
    let mut first = env.state.fork();
    let outcome = env.invoke_on(&mut first, "increase", vec![address.felt()]);
    assert!(outcome.is_ok());

    let key = storage_var_address("balance", &[]);
    assert_eq!(first.storage_read(address, key).ok(), Some(Felt::from(11)));
    assert_eq!(base.storage_read(address, key).ok(), Some(Felt::from(10)));
    assert_eq!(env.state.storage_read(address, key).ok(), Some(Felt::from(10)));
}

#[test]
fn print_is_captured_per_phase() {
    let mut env = TestEnvironment::new(ScriptedContract::new().function("test_print", |sys, _| {
        sys.print("hello");
        sys.print("world");
        Ok(Vec::new())
    }));
    env.state.phase = ExecutionPhase::Test;
    env.retdata("test_print");

    assert_eq!(
        env.state.captured_output().get("test").map(String::as_str),
        Some("hello\nworld\n")
    );
    assert!(!env.state.captured_output().contains_key("setup"));
}

#[test]
fn executed_functions_report_covered_locations() {
    let mut env = TestEnvironment::new(ScriptedContract::new().function("test_cover", |sys, _| {
        deploy_balance(sys, 0)?;
        Ok(Vec::new())
    }));
    env.retdata("test_cover");

    let covered = env.state.take_covered_locations();
    assert!(covered.iter().any(|location| location.path.ends_with("test_cheats.cairo")));
    assert!(covered.iter().any(|location| location.path.ends_with("balance.cairo")));
    assert!(env.state.take_covered_locations().is_empty());
}

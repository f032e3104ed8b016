use std::sync::Arc;

use starkforge_cheatcodes::{
    CheatArgs, CheatValue, CheatcodeErrorKind, ExpectedEvent, SyscallHandler, VmError,
};
use starkforge_common::{ContractAddress, Felt, Selector, felt::storage_var_address};
use starkforge_test_utils::{ScriptedContract, fail};

use crate::helpers::{BALANCE_CONTRACT, TestEnvironment, deploy_balance};

fn cheatcode_error(error: VmError) -> starkforge_cheatcodes::CheatcodeError {
    match error {
        VmError::Cheatcode(error) => error,
        other => panic!("expected a cheatcode error, got {other}"),
    }
}

#[test]
fn mock_call_intercepts_until_cleared() {
    let mut env = TestEnvironment::new(ScriptedContract::new().function("test_mock", |sys, _| {
        let address = deploy_balance(sys, 100)?;
        let selector = Selector::from_name("get_balance");
        sys.cheatcode(
            "mock_call",
            CheatArgs::new()
                .arg(address)
                .arg("get_balance")
                .arg(vec![Felt::from(42)]),
        )?;
        let mocked = sys.call_contract(address, selector, &[])?;
        sys.cheatcode(
            "clear_mock_call",
            CheatArgs::new().arg(address).arg("get_balance"),
        )?;
        let real = sys.call_contract(address, selector, &[])?;
        Ok([mocked, real].concat())
    }));

    assert_eq!(env.retdata("test_mock"), [Felt::from(42), Felt::from(100)]);
}

#[test]
fn clear_mock_call_without_mocks_fails() {
    let mut env = TestEnvironment::new(
        ScriptedContract::new()
            .function("test_no_mocks", |sys, _| {
                sys.cheatcode(
                    "clear_mock_call",
                    CheatArgs::new()
                        .arg(ContractAddress::from(0x123u64))
                        .arg("get_balance"),
                )?;
                Ok(Vec::new())
            })
            .function("test_other_selector", |sys, _| {
                let address = ContractAddress::from(0x123u64);
                sys.cheatcode(
                    "mock_call",
                    CheatArgs::new().arg(address).arg("get_caller"),
                )?;
                sys.cheatcode(
                    "clear_mock_call",
                    CheatArgs::new().arg(address).arg("get_balance"),
                )?;
                Ok(Vec::new())
            }),
    );

    let error = cheatcode_error(env.invoke("test_no_mocks").unwrap_err());
    assert_eq!(error.cheatcode(), Some("clear_mock_call"));
    assert_eq!(error.message(), "Contract 0x123 doesn't have mocked selectors.");

    let error = cheatcode_error(env.invoke("test_other_selector").unwrap_err());
    assert_eq!(
        error.message(),
        format!(
            "Couldn't find mocked selector {} for an address 0x123.",
            Selector::from_name("get_balance")
        )
    );
}

#[test]
fn prank_overrides_caller_seen_by_target() {
    let mut env = TestEnvironment::new(ScriptedContract::new().function("test_prank", |sys, _| {
        let address = deploy_balance(sys, 0)?;
        let get_caller = Selector::from_name("get_caller");
        let before = sys.call_contract(address, get_caller, &[])?;
        sys.cheatcode(
            "prank",
            CheatArgs::new().arg(address).arg(ContractAddress::from(0x999u64)),
        )?;
        let pranked = sys.call_contract(address, get_caller, &[])?;
        sys.cheatcode("prank", CheatArgs::new().arg(address))?;
        let after = sys.call_contract(address, get_caller, &[])?;
        Ok([before, pranked, after].concat())
    }));

    let test_contract = env.test_contract.felt();
    assert_eq!(
        env.retdata("test_prank"),
        [test_contract, Felt::from(0x999), test_contract]
    );
}

#[test]
fn roll_and_warp_apply_to_target_only() {
    let mut env = TestEnvironment::new(ScriptedContract::new().function("test_block", |sys, _| {
        let address = deploy_balance(sys, 0)?;
        sys.cheatcode("roll", CheatArgs::new().arg(address).arg(50u64))?;
        sys.cheatcode("warp", CheatArgs::new().arg(address).arg(60u64))?;
        let mut block = sys.call_contract(address, Selector::from_name("get_block"), &[])?;
        block.push(Felt::from(sys.get_block_number()));
        block.push(Felt::from(sys.get_block_timestamp()));
        Ok(block)
    }));

    assert_eq!(
        env.retdata("test_block"),
        [Felt::from(50), Felt::from(60), Felt::from(1), Felt::ZERO]
    );
}

#[test]
fn declare_prepare_deploy_uses_precomputed_address() {
    let mut env = TestEnvironment::new(ScriptedContract::new().function("test_deploy", |sys, _| {
        let declared = sys.cheatcode("declare", CheatArgs::new().arg(BALANCE_CONTRACT))?;
        let prepared = sys.cheatcode(
            "prepare",
            CheatArgs::new()
                .arg(declared)
                .arg(vec![Felt::from(7)])
                .kwarg("salt", Felt::from(3)),
        )?;
        let Some(prepared_address) = prepared.as_prepared().map(|p| p.contract_address) else {
            return Err(fail("prepare returned no contract"));
        };
        let deployed = sys.cheatcode("deploy", CheatArgs::new().arg(prepared))?;
        let Some(deployed) = deployed.as_deployed() else {
            return Err(fail("deploy returned no contract"));
        };
        let balance = sys.call_contract(
            deployed.contract_address,
            Selector::from_name("get_balance"),
            &[],
        )?;
        Ok([
            vec![prepared_address.felt(), deployed.contract_address.felt()],
            balance,
        ]
        .concat())
    }));

    let retdata = env.retdata("test_deploy");
    assert_eq!(retdata.first(), retdata.get(1));
    assert_eq!(retdata.get(2), Some(&Felt::from(7)));

    let address = ContractAddress(retdata.first().copied().expect("address returned"));
    assert!(env.state.is_deployed(address));
}

#[test]
fn declare_rejects_extra_positional_arguments() {
    let mut env = TestEnvironment::new(ScriptedContract::new().function("test_declare", |sys, _| {
        sys.cheatcode(
            "declare",
            CheatArgs::new()
                .arg(BALANCE_CONTRACT)
                .arg(CheatValue::Str("config".to_string())),
        )?;
        Ok(Vec::new())
    }));

    let error = cheatcode_error(env.invoke("test_declare").unwrap_err());
    similar_asserts::assert_eq!(error.kind(), CheatcodeErrorKind::KeywordOnlyArgument);
    assert_eq!(error.cheatcode(), Some("declare"));
}

#[test]
fn load_and_store_remote_storage() {
    let mut env = TestEnvironment::new(ScriptedContract::new().function("test_storage", |sys, _| {
        let address = deploy_balance(sys, 100)?;
        let loaded = sys.cheatcode(
            "load",
            CheatArgs::new().arg(address).arg("balance").arg("felt"),
        )?;
        sys.cheatcode(
            "store",
            CheatArgs::new()
                .arg(address)
                .arg("balance")
                .arg(vec![Felt::from(7)]),
        )?;
        let stored = sys.call_contract(address, Selector::from_name("get_balance"), &[])?;
        let point = sys.cheatcode(
            "load",
            CheatArgs::new().arg(address).arg("Point").arg("Point"),
        )?;

        let mut retdata = loaded.as_felts().map(<[Felt]>::to_vec).unwrap_or_default();
        retdata.extend(stored);
        retdata.extend(point.as_felts().map(<[Felt]>::to_vec).unwrap_or_default());
        Ok(retdata)
    }));

    assert_eq!(
        env.retdata("test_storage"),
        [Felt::from(100), Felt::from(7), Felt::ZERO, Felt::ZERO]
    );
}

#[test]
fn load_reads_storage_of_current_contract() {
    let counter = storage_var_address("counter", &[]);
    let mut env = TestEnvironment::new(ScriptedContract::new().function(
        "test_local",
        move |sys, _| {
            sys.storage_write(counter, Felt::from(5))?;
            let address = sys.get_contract_address();
            let loaded = sys.cheatcode(
                "load",
                CheatArgs::new().arg(address).arg("counter").arg("felt"),
            )?;
            Ok(loaded.as_felts().map(<[Felt]>::to_vec).unwrap_or_default())
        },
    ));

    assert_eq!(env.retdata("test_local"), [Felt::from(5)]);
}

#[test]
fn load_felt_does_not_need_the_target_abi() {
    let target = ContractAddress::from(0x1234);
    let mut env = TestEnvironment::new(ScriptedContract::new().function(
        "test_load",
        move |sys, _| {
            let loaded = sys.cheatcode(
                "load",
                CheatArgs::new().arg(target).arg("balance").arg("felt"),
            )?;
            Ok(loaded.as_felts().map(<[Felt]>::to_vec).unwrap_or_default())
        },
    ));
    let class = env
        .registry
        .compiler()
        .compile_contract(&env.fixture.root().join(BALANCE_CONTRACT))
        .unwrap();
    let class_hash = env.registry.vm().declare(&mut env.state, Arc::new(class)).unwrap();
    env.state.initialize_contract(target, class_hash).unwrap();
    assert!(env.state.abi_of_contract(target).is_none());

    assert_eq!(env.retdata("test_load"), [Felt::ZERO]);
}

#[test]
fn load_unknown_type_fails() {
    let mut env = TestEnvironment::new(ScriptedContract::new().function("test_load", |sys, _| {
        let address = deploy_balance(sys, 0)?;
        sys.cheatcode(
            "load",
            CheatArgs::new().arg(address).arg("balance").arg("Uint256"),
        )?;
        Ok(Vec::new())
    }));

    let error = cheatcode_error(env.invoke("test_load").unwrap_err());
    assert!(error.message().starts_with("Type Uint256 has not been found in contract 0x"));
}

#[test]
fn expect_revert_matches_revert() {
    fn call_fail(sys: &mut dyn SyscallHandler) -> Result<Vec<Felt>, VmError> {
        let address = deploy_balance(sys, 0)?;
        sys.call_contract(address, Selector::from_name("fail"), &[])
    }

    let mut env = TestEnvironment::new(
        ScriptedContract::new()
            .function("test_expected", |sys, _| {
                sys.cheatcode(
                    "expect_revert",
                    CheatArgs::new().arg("TRANSACTION_FAILED").arg("too low"),
                )?;
                call_fail(sys)
            })
            .function("test_mismatch", |sys, _| {
                sys.cheatcode(
                    "expect_revert",
                    CheatArgs::new().kwarg("error_message", "something else"),
                )?;
                call_fail(sys)
            })
            .function("test_succeeds", |sys, _| {
                sys.cheatcode("expect_revert", CheatArgs::new())?;
                Ok(Vec::new())
            }),
    );

    assert!(env.invoke("test_expected").expect("revert was expected").is_none());

    let error = cheatcode_error(env.invoke("test_mismatch").unwrap_err());
    similar_asserts::assert_eq!(error.kind(), CheatcodeErrorKind::ExpectedRevertMismatch);

    let error = cheatcode_error(env.invoke("test_succeeds").unwrap_err());
    similar_asserts::assert_eq!(error.kind(), CheatcodeErrorKind::ExpectedRevert);

    // Expectations do not leak into later invocations.
    assert!(env.state.expected_revert().is_none());
}

#[test]
fn expect_events_checks_emitted_events() {
    fn emit(sys: &mut dyn SyscallHandler) -> Result<Vec<Felt>, VmError> {
        let address = deploy_balance(sys, 0)?;
        sys.call_contract(address, Selector::from_name("emit_transfer"), &[])
    }

    let mut env = TestEnvironment::new(
        ScriptedContract::new()
            .function("test_emitted", |sys, _| {
                sys.cheatcode(
                    "expect_events",
                    CheatArgs::new().arg(ExpectedEvent::named("Transfer").with_data(vec![Felt::from(1)])),
                )?;
                emit(sys)
            })
            .function("test_missing", |sys, _| {
                sys.cheatcode(
                    "expect_events",
                    CheatArgs::new().arg("Transfer").arg("Approval"),
                )?;
                emit(sys)
            }),
    );

    assert!(env.invoke("test_emitted").expect("events emitted").is_some());

    let error = cheatcode_error(env.invoke("test_missing").unwrap_err());
    similar_asserts::assert_eq!(error.kind(), CheatcodeErrorKind::ExpectedEventsMissing);
    assert!(error.message().contains("Approval"));
}

#[test]
fn unknown_cheatcode_fails() {
    let mut env = TestEnvironment::new(ScriptedContract::new().function("test_unknown", |sys, _| {
        sys.cheatcode("start_prank", CheatArgs::new())?;
        Ok(Vec::new())
    }));

    let error = cheatcode_error(env.invoke("test_unknown").unwrap_err());
    similar_asserts::assert_eq!(error.kind(), CheatcodeErrorKind::UnknownCheatcode);
}

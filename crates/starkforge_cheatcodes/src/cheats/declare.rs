use std::{path::Path, sync::Arc};

use crate::{CheatArgs, Cheatcode, CheatsCtxt, DeclaredContract, Result};

#[derive(Debug)]
pub(crate) struct DeclareCheatcode;

impl Cheatcode for DeclareCheatcode {
    fn name(&self) -> &'static str {
        "declare"
    }

    fn apply_full(&self, ccx: &mut CheatsCtxt, args: &CheatArgs) -> Result {
        // `config` only affects transactions sent to a network.
        args.ensure_keyword_only(1, &["config"])?;
        let contract = args.str(0, "contract")?;

        Ok(declare_contract(ccx, Path::new(contract))?.into())
    }
}

/// Compiles the contract at `path` and declares its class.
pub(crate) fn declare_contract(ccx: &mut CheatsCtxt, path: &Path) -> Result<DeclaredContract> {
    let registry = ccx.registry();
    let path = registry.dependencies().resolve_path(path);
    let class = registry
        .compiler()
        .compile_contract(&path)
        .map(Arc::new)
        .map_err(|err| fmt_err!("{err}"))?;

    let class_hash = ccx
        .state()
        .copy_and_apply(|state| registry.vm().declare(state, Arc::clone(&class)))?;
    ccx.state()
        .register_abi(class_hash, Arc::new(class.abi.clone()));

    debug!(target: "cheatcodes", path = %path.display(), %class_hash, "declared");
    Ok(DeclaredContract { class_hash })
}

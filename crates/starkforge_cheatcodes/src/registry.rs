use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use alloy_primitives::map::HashMap;
use starkforge_common::Compiler;

use crate::{
    CheatArgs, CheatValue, Cheatcode, CheatcodeError, CheatcodeErrorKind, CheatsCtxt,
    ContractVm, Result, VmError, cheats, syscalls::CheatableSyscallHandler,
};

/// Collaborators cheatcodes use to compile, declare and run contracts.
#[derive(Clone)]
pub struct CheatcodeDependencies {
    pub vm: Arc<dyn ContractVm>,
    pub compiler: Arc<dyn Compiler>,
    /// Relative contract paths passed to `declare` resolve against this.
    pub project_root: PathBuf,
}

impl CheatcodeDependencies {
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        let path = self.project_root.join(path);
        dunce::canonicalize(&path).unwrap_or(path)
    }
}

impl fmt::Debug for CheatcodeDependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheatcodeDependencies")
            .field("project_root", &self.project_root)
            .finish_non_exhaustive()
    }
}

/// Cheatcodes available to executing code, by name.
///
/// Each worker builds its own registry; it holds no state of its own, all
/// cheat effects go to the [`ExecutionState`](crate::ExecutionState) of the
/// invocation.
#[derive(Debug)]
pub struct CheatcodeRegistry {
    dependencies: CheatcodeDependencies,
    cheatcodes: HashMap<&'static str, Arc<dyn Cheatcode>>,
}

impl CheatcodeRegistry {
    /// Creates a registry with every built-in cheatcode.
    pub fn new(dependencies: CheatcodeDependencies) -> Self {
        let mut registry = Self {
            dependencies,
            cheatcodes: HashMap::default(),
        };
        for cheatcode in cheats::builtin() {
            registry.register(cheatcode);
        }
        registry
    }

    /// Registers `cheatcode`, replacing any cheatcode with the same name.
    pub fn register(&mut self, cheatcode: Arc<dyn Cheatcode>) {
        self.cheatcodes.insert(cheatcode.name(), cheatcode);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Cheatcode>> {
        self.cheatcodes.get(name)
    }

    /// Names of the registered cheatcodes, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.cheatcodes.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn dependencies(&self) -> &CheatcodeDependencies {
        &self.dependencies
    }

    pub fn vm(&self) -> &dyn ContractVm {
        self.dependencies.vm.as_ref()
    }

    pub fn compiler(&self) -> &dyn Compiler {
        self.dependencies.compiler.as_ref()
    }

    pub(crate) fn dispatch(
        &self,
        handler: &mut CheatableSyscallHandler<'_>,
        name: &str,
        args: &CheatArgs,
    ) -> Result<CheatValue> {
        let Some(cheatcode) = self.cheatcodes.get(name) else {
            return Err(VmError::Cheatcode(CheatcodeError::new(
                CheatcodeErrorKind::UnknownCheatcode,
                format!("Unknown cheatcode `{name}`."),
            )));
        };
        let mut ccx = CheatsCtxt { handler };
        cheatcode.apply_traced(&mut ccx, args)
    }
}

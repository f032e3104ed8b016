use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::RwLock;
use starkforge_cheatcodes::{
    ContractVm, CoveredLocation, EntryPointCall, EntryPointOutput, EntryPointType,
    ExecutionResources, RevertError, SyscallHandler, VmError,
};
use starkforge_common::{
    ClassHash, CompileError, Compiler, ContractClass, Selector, felt::sn_keccak,
};

use crate::contract::ScriptedContract;

#[derive(Default)]
struct ProjectContents {
    contracts: BTreeMap<PathBuf, Arc<ScriptedContract>>,
    broken: BTreeMap<PathBuf, String>,
}

/// Contracts known to a [`ScriptedCompiler`] and executable by a
/// [`ScriptedVm`], keyed by path.
#[derive(Clone, Default)]
pub struct ScriptedProject {
    contents: Arc<RwLock<ProjectContents>>,
}

impl ScriptedProject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_contract(&self, path: impl AsRef<Path>, contract: ScriptedContract) {
        self.contents
            .write()
            .contracts
            .insert(normalize(path.as_ref()), Arc::new(contract));
    }

    /// Registers a file the compiler fails to parse.
    pub fn add_broken(&self, path: impl AsRef<Path>, message: &str) {
        self.contents
            .write()
            .broken
            .insert(normalize(path.as_ref()), message.to_string());
    }

    pub fn compiler(&self) -> Arc<dyn Compiler> {
        Arc::new(ScriptedCompiler {
            project: self.clone(),
        })
    }

    pub fn vm(&self) -> Arc<dyn ContractVm> {
        Arc::new(ScriptedVm {
            project: self.clone(),
        })
    }

    fn contract(&self, path: &Path) -> Result<Arc<ScriptedContract>, CompileError> {
        let path = normalize(path);
        let contents = self.contents.read();
        if let Some(message) = contents.broken.get(&path) {
            return Err(CompileError::Parse {
                path,
                message: message.clone(),
            });
        }
        contents
            .contracts
            .get(&path)
            .cloned()
            .ok_or(CompileError::NotFound { path })
    }
}

fn normalize(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Compiles contracts registered in a [`ScriptedProject`]. The program of a
/// compiled class is the path of the contract.
pub struct ScriptedCompiler {
    project: ScriptedProject,
}

impl Compiler for ScriptedCompiler {
    fn compile_contract(&self, path: &Path) -> Result<ContractClass, CompileError> {
        let contract = self.project.contract(path)?;
        let program = normalize(path).to_string_lossy().into_owned().into_bytes();
        Ok(ContractClass::new(contract.abi(), program))
    }

    fn function_names(&self, path: &Path) -> Result<Vec<String>, CompileError> {
        Ok(self.project.contract(path)?.function_names())
    }
}

/// Executes classes compiled by a [`ScriptedCompiler`].
pub struct ScriptedVm {
    project: ScriptedProject,
}

impl ContractVm for ScriptedVm {
    fn class_hash(&self, class: &ContractClass) -> Result<ClassHash, VmError> {
        Ok(ClassHash(sn_keccak(&class.program)))
    }

    fn execute_entry_point(
        &self,
        call: &EntryPointCall,
        class: &ContractClass,
        syscalls: &mut dyn SyscallHandler,
    ) -> Result<EntryPointOutput, VmError> {
        let path = PathBuf::from(String::from_utf8_lossy(&class.program).into_owned());
        let contract = self
            .project
            .contract(&path)
            .map_err(|error| eyre::eyre!("cannot load program: {error}"))?;

        let (line, function) = match call.entry_point_type {
            EntryPointType::Constructor => (0, contract.constructor.as_ref()),
            EntryPointType::External | EntryPointType::L1Handler => contract
                .functions
                .iter()
                .enumerate()
                .find(|(_, function)| {
                    Selector::from_name(&function.name) == call.entry_point_selector
                })
                .map_or((0, None), |(index, function)| (index + 1, Some(function))),
        };
        let Some(function) = function else {
            return Err(RevertError::new(
                "ENTRY_POINT_NOT_FOUND_IN_CONTRACT",
                format!("Entry point {} not found in contract.", call.entry_point_selector),
            )
            .into());
        };

        let retdata = (function.body)(syscalls, &call.calldata)?;
        Ok(EntryPointOutput {
            retdata,
            resources: ExecutionResources {
                n_steps: function.n_steps,
                n_memory_holes: 0,
                builtin_instance_counter: BTreeMap::from([(
                    "range_check_builtin".to_string(),
                    1,
                )]),
            },
            covered_locations: vec![CoveredLocation { path, line }],
        })
    }
}

use alloy_primitives::Bytes;
use serde::{Deserialize, Serialize};

use crate::abi::Abi;

/// A compiled contract class: its ABI and the opaque program the VM executes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractClass {
    pub abi: Abi,
    pub program: Bytes,
}

impl ContractClass {
    pub fn new(abi: Abi, program: impl Into<Bytes>) -> Self {
        Self {
            abi,
            program: program.into(),
        }
    }
}

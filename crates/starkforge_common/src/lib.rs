//! Common types shared by the starkforge crates: field elements, contract
//! identifiers, ABIs and the compiler interface.

#[macro_use]
extern crate tracing;

pub mod abi;
pub mod address;
pub mod class;
pub mod compiler;
pub mod credentials;
pub mod felt;

pub use abi::{Abi, AbiEntry, EventAbiEntry, FunctionAbiEntry, StructAbiEntry, TypedParameter};
pub use address::{ClassHash, ContractAddress, Selector, calculate_contract_address};
pub use class::ContractClass;
pub use compiler::{CompileError, Compiler};
pub use felt::{Felt, parse_felt};

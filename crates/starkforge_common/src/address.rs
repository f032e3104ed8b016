//! Typed identifiers of contracts, classes and entry points.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::felt::{ADDRESS_BOUND, Felt, hash_on_elements, sn_keccak};

macro_rules! felt_newtype {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(
            Clone,
            Copy,
            Debug,
            Default,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Serialize,
            Deserialize,
            derive_more::From,
        )]
        #[serde(transparent)]
        pub struct $name(pub Felt);

        impl $name {
            /// The zero value.
            pub const ZERO: Self = Self(Felt::ZERO);

            /// Returns the underlying field element.
            pub fn felt(&self) -> Felt {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(Felt::from(value))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{:x}", self.0)
            }
        }
    };
}

felt_newtype!(
    /// Address of a deployed (or prepared) contract.
    ContractAddress
);
felt_newtype!(
    /// Hash identifying a declared contract class.
    ClassHash
);
felt_newtype!(
    /// Entry point selector, derived from the entry point name.
    Selector
);

/// Name of the constructor entry point.
pub const CONSTRUCTOR_NAME: &str = "constructor";

impl Selector {
    /// Selector of the entry point called `name`.
    pub fn from_name(name: &str) -> Self {
        Self(sn_keccak(name.as_bytes()))
    }

    /// Selector of the constructor entry point.
    pub fn constructor() -> Self {
        Self::from_name(CONSTRUCTOR_NAME)
    }
}

/// Prefix mixed into every contract address computation.
const CONTRACT_ADDRESS_PREFIX: &[u8] = b"STARKNET_CONTRACT_ADDRESS";

/// Computes the address a class deploys to for the given salt, constructor
/// calldata and deployer.
pub fn calculate_contract_address(
    salt: Felt,
    class_hash: ClassHash,
    constructor_calldata: &[Felt],
    deployer: ContractAddress,
) -> ContractAddress {
    let prefix = Felt::from_be_slice(CONTRACT_ADDRESS_PREFIX);
    let hash = hash_on_elements(&[
        prefix,
        deployer.0,
        salt,
        class_hash.0,
        hash_on_elements(constructor_calldata),
    ]);
    ContractAddress(hash % ADDRESS_BOUND)
}

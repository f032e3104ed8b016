//! Values exchanged between contract code and cheatcodes.

use std::collections::BTreeMap;

use starkforge_common::{ClassHash, ContractAddress, Felt, Selector};

use crate::{CheatcodeError, CheatcodeErrorKind, ExpectedEvent};

/// Result of `declare`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeclaredContract {
    pub class_hash: ClassHash,
}

/// Result of `prepare`: everything needed to deploy at a known address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedContract {
    pub contract_address: ContractAddress,
    pub class_hash: ClassHash,
    pub constructor_calldata: Vec<Felt>,
    pub salt: Felt,
}

/// Result of `deploy`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeployedContract {
    pub contract_address: ContractAddress,
}

/// Source of fuzzed values for one test parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StrategyDescriptor {
    /// Any field element.
    Felts,
    /// Integers in the inclusive range `min..=max`.
    Integers { min: u128, max: u128 },
    /// One of the given values.
    OneOf(Vec<Felt>),
}

impl StrategyDescriptor {
    pub fn integers(min: u128, max: u128) -> Self {
        Self::Integers { min, max }
    }

    pub fn one_of(values: impl IntoIterator<Item = Felt>) -> Self {
        Self::OneOf(values.into_iter().collect())
    }
}

/// A value passed to or returned from a cheatcode.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CheatValue {
    #[default]
    None,
    Bool(bool),
    Felt(Felt),
    Felts(Vec<Felt>),
    Str(String),
    Declared(DeclaredContract),
    Prepared(PreparedContract),
    Deployed(DeployedContract),
    Event(ExpectedEvent),
    Strategy(StrategyDescriptor),
}

impl CheatValue {
    fn type_name(&self) -> &'static str {
        match self {
            CheatValue::None => "none",
            CheatValue::Bool(_) => "bool",
            CheatValue::Felt(_) => "felt",
            CheatValue::Felts(_) => "list of felts",
            CheatValue::Str(_) => "string",
            CheatValue::Declared(_) => "declared contract",
            CheatValue::Prepared(_) => "prepared contract",
            CheatValue::Deployed(_) => "deployed contract",
            CheatValue::Event(_) => "event",
            CheatValue::Strategy(_) => "strategy",
        }
    }

    pub fn as_felt(&self) -> Option<Felt> {
        match self {
            CheatValue::Felt(felt) => Some(*felt),
            _ => None,
        }
    }

    pub fn as_felts(&self) -> Option<&[Felt]> {
        match self {
            CheatValue::Felts(felts) => Some(felts),
            _ => None,
        }
    }

    pub fn as_declared(&self) -> Option<DeclaredContract> {
        match self {
            CheatValue::Declared(declared) => Some(*declared),
            _ => None,
        }
    }

    pub fn as_prepared(&self) -> Option<&PreparedContract> {
        match self {
            CheatValue::Prepared(prepared) => Some(prepared),
            _ => None,
        }
    }

    pub fn as_deployed(&self) -> Option<DeployedContract> {
        match self {
            CheatValue::Deployed(deployed) => Some(*deployed),
            _ => None,
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for CheatValue {
                fn from(value: $ty) -> Self {
                    CheatValue::$variant(value)
                }
            }
        )*
    };
}

impl_from!(
    bool => Bool,
    Felt => Felt,
    Vec<Felt> => Felts,
    String => Str,
    DeclaredContract => Declared,
    PreparedContract => Prepared,
    DeployedContract => Deployed,
    ExpectedEvent => Event,
    StrategyDescriptor => Strategy,
);

impl From<&str> for CheatValue {
    fn from(value: &str) -> Self {
        CheatValue::Str(value.to_string())
    }
}

impl From<u64> for CheatValue {
    fn from(value: u64) -> Self {
        CheatValue::Felt(Felt::from(value))
    }
}

impl From<ContractAddress> for CheatValue {
    fn from(value: ContractAddress) -> Self {
        CheatValue::Felt(value.0)
    }
}

impl From<ClassHash> for CheatValue {
    fn from(value: ClassHash) -> Self {
        CheatValue::Felt(value.0)
    }
}

impl From<Selector> for CheatValue {
    fn from(value: Selector) -> Self {
        CheatValue::Felt(value.0)
    }
}

impl<T: Into<CheatValue>> From<Option<T>> for CheatValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(CheatValue::None, Into::into)
    }
}

/// Positional and keyword arguments of a cheatcode invocation.
///
/// Accessors look an argument up by position first and by keyword second. A
/// [`CheatValue::None`] argument counts as absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheatArgs {
    positional: Vec<CheatValue>,
    keyword: BTreeMap<String, CheatValue>,
}

impl CheatArgs {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn arg(mut self, value: impl Into<CheatValue>) -> Self {
        self.positional.push(value.into());
        self
    }

    #[must_use]
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<CheatValue>) -> Self {
        self.keyword.insert(name.into(), value.into());
        self
    }

    pub fn positional(&self) -> &[CheatValue] {
        &self.positional
    }

    pub fn keyword(&self) -> &BTreeMap<String, CheatValue> {
        &self.keyword
    }

    pub fn get(&self, index: usize, name: &str) -> Option<&CheatValue> {
        self.positional
            .get(index)
            .or_else(|| self.keyword.get(name))
            .filter(|value| !matches!(value, CheatValue::None))
    }

    /// Fails if more than `max` positional arguments were passed; the
    /// remaining parameters, `keyword_only`, must be passed by name.
    pub fn ensure_keyword_only(&self, max: usize, keyword_only: &[&str]) -> Result<(), CheatcodeError> {
        if self.positional.len() <= max {
            return Ok(());
        }
        Err(CheatcodeError::new(
            CheatcodeErrorKind::KeywordOnlyArgument,
            format!(
                "Passed {} positional arguments, expected at most {max}. Pass [{}] as keyword arguments.",
                self.positional.len(),
                keyword_only.join(", ")
            ),
        ))
    }

    pub fn required(&self, index: usize, name: &str) -> Result<&CheatValue, CheatcodeError> {
        self.get(index, name)
            .ok_or_else(|| CheatcodeError::custom(format!("Missing argument `{name}`.")))
    }

    pub fn felt(&self, index: usize, name: &str) -> Result<Felt, CheatcodeError> {
        self.opt_felt(index, name)?
            .ok_or_else(|| CheatcodeError::custom(format!("Missing argument `{name}`.")))
    }

    pub fn opt_felt(&self, index: usize, name: &str) -> Result<Option<Felt>, CheatcodeError> {
        self.get(index, name)
            .map(|value| match value {
                CheatValue::Felt(felt) => Ok(*felt),
                CheatValue::Bool(flag) => Ok(Felt::from(u8::from(*flag))),
                CheatValue::Deployed(deployed) => Ok(deployed.contract_address.0),
                CheatValue::Declared(declared) => Ok(declared.class_hash.0),
                other => Err(mismatch(name, "a felt", other)),
            })
            .transpose()
    }

    /// A list of felts; absent arguments yield an empty list.
    pub fn felts_or_empty(&self, index: usize, name: &str) -> Result<Vec<Felt>, CheatcodeError> {
        match self.get(index, name) {
            None => Ok(Vec::new()),
            Some(CheatValue::Felts(felts)) => Ok(felts.clone()),
            Some(CheatValue::Felt(felt)) => Ok(vec![*felt]),
            Some(other) => Err(mismatch(name, "a list of felts", other)),
        }
    }

    pub fn str(&self, index: usize, name: &str) -> Result<&str, CheatcodeError> {
        self.opt_str(index, name)?
            .ok_or_else(|| CheatcodeError::custom(format!("Missing argument `{name}`.")))
    }

    pub fn opt_str(&self, index: usize, name: &str) -> Result<Option<&str>, CheatcodeError> {
        self.get(index, name)
            .map(|value| match value {
                CheatValue::Str(value) => Ok(value.as_str()),
                other => Err(mismatch(name, "a string", other)),
            })
            .transpose()
    }

    pub fn address(&self, index: usize, name: &str) -> Result<ContractAddress, CheatcodeError> {
        self.felt(index, name).map(ContractAddress)
    }

    pub fn opt_address(&self, index: usize, name: &str) -> Result<Option<ContractAddress>, CheatcodeError> {
        Ok(self.opt_felt(index, name)?.map(ContractAddress))
    }

    pub fn opt_u64(&self, index: usize, name: &str) -> Result<Option<u64>, CheatcodeError> {
        self.opt_felt(index, name)?
            .map(|felt| {
                u64::try_from(felt)
                    .map_err(|_err| CheatcodeError::custom(format!("Argument `{name}` does not fit in 64 bits.")))
            })
            .transpose()
    }

    /// A selector given either as a raw felt or as an entry point name.
    pub fn selector(&self, index: usize, name: &str) -> Result<Selector, CheatcodeError> {
        match self.required(index, name)? {
            CheatValue::Str(entry_point) => Ok(Selector::from_name(entry_point)),
            CheatValue::Felt(felt) => Ok(Selector(*felt)),
            other => Err(mismatch(name, "a selector", other)),
        }
    }

    pub fn declared(&self, index: usize, name: &str) -> Result<DeclaredContract, CheatcodeError> {
        match self.required(index, name)? {
            CheatValue::Declared(declared) => Ok(*declared),
            CheatValue::Felt(class_hash) => Ok(DeclaredContract {
                class_hash: ClassHash(*class_hash),
            }),
            other => Err(mismatch(name, "a declared contract", other)),
        }
    }

    pub fn prepared(&self, index: usize, name: &str) -> Result<&PreparedContract, CheatcodeError> {
        match self.required(index, name)? {
            CheatValue::Prepared(prepared) => Ok(prepared),
            other => Err(mismatch(name, "a prepared contract", other)),
        }
    }

    pub fn truthy(&self, index: usize, name: &str) -> Result<bool, CheatcodeError> {
        match self.required(index, name)? {
            CheatValue::Bool(flag) => Ok(*flag),
            CheatValue::Felt(felt) => Ok(!felt.is_zero()),
            other => Err(mismatch(name, "a bool", other)),
        }
    }
}

fn mismatch(name: &str, expected: &str, value: &CheatValue) -> CheatcodeError {
    CheatcodeError::custom(format!(
        "Argument `{name}` must be {expected}, got {}.",
        value.type_name()
    ))
}

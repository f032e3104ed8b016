//! Contract ABI model, as emitted next to compiled contract classes.

use serde::{Deserialize, Serialize};

/// Name of the single-word field element type.
pub const FELT_TYPE: &str = "felt";

/// A typed, named parameter of a function, event or struct.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

impl TypedParameter {
    pub fn felt(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: FELT_TYPE.to_string(),
        }
    }

    /// Whether the parameter is a single field element.
    pub fn is_felt(&self) -> bool {
        self.ty == FELT_TYPE
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionAbiEntry {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<TypedParameter>,
    #[serde(default)]
    pub outputs: Vec<TypedParameter>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructMember {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub offset: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructAbiEntry {
    pub name: String,
    pub size: usize,
    #[serde(default)]
    pub members: Vec<StructMember>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAbiEntry {
    pub name: String,
    #[serde(default)]
    pub keys: Vec<TypedParameter>,
    #[serde(default)]
    pub data: Vec<TypedParameter>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AbiEntry {
    Function(FunctionAbiEntry),
    Constructor(FunctionAbiEntry),
    L1Handler(FunctionAbiEntry),
    Struct(StructAbiEntry),
    Event(EventAbiEntry),
}

/// The ABI of a contract class.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Abi(pub Vec<AbiEntry>);

impl Abi {
    /// Parses an ABI from its JSON representation.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// External functions, in declaration order.
    pub fn functions(&self) -> impl Iterator<Item = &FunctionAbiEntry> {
        self.0.iter().filter_map(|entry| match entry {
            AbiEntry::Function(function) => Some(function),
            _ => None,
        })
    }

    pub fn function(&self, name: &str) -> Option<&FunctionAbiEntry> {
        self.functions().find(|function| function.name == name)
    }

    pub fn constructor(&self) -> Option<&FunctionAbiEntry> {
        self.0.iter().find_map(|entry| match entry {
            AbiEntry::Constructor(constructor) => Some(constructor),
            _ => None,
        })
    }

    pub fn struct_entry(&self, name: &str) -> Option<&StructAbiEntry> {
        self.0.iter().find_map(|entry| match entry {
            AbiEntry::Struct(entry) if entry.name == name => Some(entry),
            _ => None,
        })
    }

    pub fn events(&self) -> impl Iterator<Item = &EventAbiEntry> {
        self.0.iter().filter_map(|entry| match entry {
            AbiEntry::Event(event) => Some(event),
            _ => None,
        })
    }

    /// Number of storage words occupied by a value of type `ty`, if the type
    /// is known to this ABI.
    pub fn type_size(&self, ty: &str) -> Option<usize> {
        if ty == FELT_TYPE {
            return Some(1);
        }
        self.struct_entry(ty).map(|entry| entry.size)
    }
}

//! The device schema the expression compiler resolves variables against.
//!
//! An [`Inventory`] maps method names to their parameter list and result
//! shape. It is loaded once from JSON and consumed read-only by the
//! type-checking pass.

use std::collections::HashMap;

use serde::Deserialize;

use crate::expr::any::TypeName;

#[derive(Debug, Clone, Deserialize)]
pub struct Inventory {
    pub methods: HashMap<String, Method>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Method {
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub notification: bool,
    pub result: TypeDescriptor,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeDescriptor,
}

/// Shape of a value in a method signature.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "class", rename_all = "lowercase")]
pub enum TypeDescriptor {
    Leaf {
        name: TypeName,
    },
    Typedef {
        name: String,
        encoding: TypeName,
    },
    Enum(EnumDescriptor),
    Struct {
        name: String,
        elements: Vec<StructElement>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct StructElement {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeDescriptor,
}

/// A name <-> value table. Enum-typed operands behave as `Int32` in
/// expressions; the snapshot carries the member name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EnumDescriptor {
    pub name: String,
    pub elements: Vec<EnumElement>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EnumElement {
    pub name: String,
    pub value: i32,
}

impl EnumDescriptor {
    pub fn value_of(&self, name: &str) -> Option<i32> {
        self.elements.iter().find(|e| e.name == name).map(|e| e.value)
    }

    pub fn name_of(&self, value: i32) -> Option<&str> {
        self.elements
            .iter()
            .find(|e| e.value == value)
            .map(|e| e.name.as_str())
    }
}

impl TypeDescriptor {
    /// The scalar type this descriptor contributes to an expression, if any.
    /// Structs have no expression type; they can only be traversed.
    pub fn expr_type(&self) -> Option<TypeName> {
        match self {
            TypeDescriptor::Leaf { name } => Some(*name),
            TypeDescriptor::Typedef { encoding, .. } => Some(*encoding),
            TypeDescriptor::Enum(_) => Some(TypeName::Int32),
            TypeDescriptor::Struct { .. } => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumDescriptor> {
        match self {
            TypeDescriptor::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn element(&self, name: &str) -> Option<&TypeDescriptor> {
        match self {
            TypeDescriptor::Struct { elements, .. } => {
                elements.iter().find(|e| e.name == name).map(|e| &e.ty)
            }
            _ => None,
        }
    }
}

impl Inventory {
    pub fn new() -> Inventory {
        Inventory {
            methods: HashMap::new(),
        }
    }

    pub fn from_json(text: &str) -> Result<Inventory, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Look up a method by the name written in an expression. `a.b.c@x`
    /// may refer to the method registered as `a.b.c` or as its getter
    /// `a.b.c.get`; the canonical registered name is returned.
    pub fn resolve<'a>(&'a self, name: &str) -> Option<(&'a str, &'a Method)> {
        if let Some((k, m)) = self.methods.get_key_value(name) {
            return Some((k.as_str(), m));
        }
        let getter = format!("{name}.get");
        self.methods
            .get_key_value(getter.as_str())
            .map(|(k, m)| (k.as_str(), m))
    }

    /// Test/builder convenience.
    pub fn with_method(mut self, name: &str, method: Method) -> Inventory {
        self.methods.insert(name.to_string(), method);
        self
    }
}

impl Default for Inventory {
    fn default() -> Inventory {
        Inventory::new()
    }
}

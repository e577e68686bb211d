//! Declared and static expression types.

use std::fmt;

/// Name of the built-in array class. Array-typed targets accept any value.
pub const ARRAY_CLASS: &str = "Array";

/// A type as written in a declaration or computed for an expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Primitive integer type
    Int,
    /// Primitive character type
    Char,
    /// Primitive boolean type
    Boolean,
    /// Return type of subroutines producing no value
    Void,
    /// A class type, including `Array` and `String`
    Class(String),
    /// Type of the `null` literal
    Null,
    /// Not knowable at this point (forward or external call, array element)
    Unknown,
}

impl Type {
    /// Parse a type written in source: a primitive keyword or a class name.
    pub fn from_name(name: &str) -> Type {
        match name {
            "int" => Type::Int,
            "char" => Type::Char,
            "boolean" => Type::Boolean,
            "void" => Type::Void,
            _ => Type::Class(name.to_string()),
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Class(name) if name == ARRAY_CLASS)
    }

    /// The class name for object types.
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Type::Class(name) => Some(name),
            _ => None,
        }
    }

    /// Check if a value of this type may be stored into a `target` slot.
    pub fn is_assignable_to(&self, target: &Type) -> bool {
        if self == target {
            return true;
        }

        match (self, target) {
            // Unknown is assignable to/from anything (no cascading errors)
            (Type::Unknown, _) | (_, Type::Unknown) => true,
            // Array slots hold anything
            (_, t) if t.is_array() => true,
            // Int to boolean coercion; the converse is rejected
            (Type::Int, Type::Boolean) => true,
            (Type::Null, Type::Class(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Char => write!(f, "char"),
            Type::Boolean => write!(f, "boolean"),
            Type::Void => write!(f, "void"),
            Type::Class(name) => write!(f, "{}", name),
            Type::Null => write!(f, "null"),
            Type::Unknown => write!(f, "unknown"),
        }
    }
}

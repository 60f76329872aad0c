//! Dynamic values exchanged with the scripting side

use crate::compound::CompoundHandle;
use crate::descriptor::BaseInfo;
use crate::interop::Callable;
use std::fmt;
use std::rc::Rc;

/// A dynamically typed value
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// Handle wrapping a native structure or object
    Compound(Rc<CompoundHandle>),
    /// Raw metadata entry
    Info(Rc<BaseInfo>),
    /// Bound native function
    Function(Rc<Callable>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Bool(_) => "boolean",
            Self::Int(_) | Self::Float(_) => "number",
            Self::Str(_) => "string",
            Self::List(_) => "table",
            Self::Compound(_) => "compound",
            Self::Info(_) => "info",
            Self::Function(_) => "function",
        }
    }

    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Nil and false are false, everything else is true
    #[inline]
    pub fn truthy(&self) -> bool {
        !matches!(self, Self::Nil | Self::Bool(false))
    }

    /// Integer view; floats truncate toward zero
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// String view; numbers convert to their decimal form
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Str(s) => Some(s.clone()),
            Self::Int(v) => Some(v.to_string()),
            Self::Float(v) => Some(v.to_string()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_compound(&self) -> Option<&Rc<CompoundHandle>> {
        match self {
            Self::Compound(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn as_info(&self) -> Option<&Rc<BaseInfo>> {
        match self {
            Self::Info(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Rc<Callable>> {
        match self {
            Self::Function(callable) => Some(callable),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => *a as f64 == *b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Compound(a), Self::Compound(b)) => Rc::ptr_eq(a, b),
            (Self::Info(a), Self::Info(b)) => Rc::ptr_eq(a, b),
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => write!(f, "nil"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:?}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::List(items) => f.debug_list().entries(items).finish(),
            Self::Compound(handle) => write!(f, "{handle}"),
            Self::Info(info) => write!(f, "info {}", info.full_name()),
            Self::Function(callable) => write!(f, "{callable}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

impl From<Rc<CompoundHandle>> for Value {
    fn from(v: Rc<CompoundHandle>) -> Self {
        Self::Compound(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.truthy());
        assert!(!Value::Bool(false).truthy());
        assert!(Value::Int(0).truthy());
        assert!(Value::from("").truthy());
    }

    #[test]
    fn test_numeric_views() {
        assert_eq!(Value::Float(3.9).as_int(), Some(3));
        assert_eq!(Value::Float(-3.9).as_int(), Some(-3));
        assert_eq!(Value::Int(7).as_float(), Some(7.0));
        assert_eq!(Value::from("7").as_int(), None);
        assert_eq!(Value::Int(12).to_text().as_deref(), Some("12"));
    }

    #[test]
    fn test_equality() {
        assert_eq!(Value::Int(2), Value::Float(2.0));
        assert_ne!(Value::Int(2), Value::from("2"));
        assert_eq!(
            Value::from(vec![Value::Int(1), Value::Nil]),
            Value::List(vec![Value::Int(1), Value::Nil])
        );
    }
}

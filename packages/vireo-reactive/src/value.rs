use std::fmt;
use std::rc::Rc;

use crate::cell::{ObservedList, ObservedObject};

/// The dynamic result type produced by watcher evaluators.
///
/// Primitives compare by value. `Object` and `List` compare by identity
/// (`Rc::ptr_eq`): the runtime cannot see in-place mutation through a
/// reference comparison, which is why `Watcher::run` treats reference
/// results as always-possibly-changed.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Object(Rc<ObservedObject>),
    List(Rc<ObservedList>),
}

impl Value {
    /// Reference types fire watcher callbacks even when the identity is
    /// unchanged, since their contents may have mutated in place.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_) | Value::List(_))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Object(o) => write!(f, "Object(dep #{})", o.dep().id()),
            Value::List(l) => write!(f, "List(dep #{})", l.dep().id()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(Rc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(Rc::from(v.as_str()))
    }
}

impl From<Rc<ObservedObject>> for Value {
    fn from(v: Rc<ObservedObject>) -> Self {
        Value::Object(v)
    }
}

impl From<Rc<ObservedList>> for Value {
    fn from(v: Rc<ObservedList>) -> Self {
        Value::List(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_compare_by_value() {
        assert_eq!(Value::from(1), Value::from(1));
        assert_ne!(Value::from(1), Value::from(2));
        assert_eq!(Value::from("a"), Value::from("a"));
        assert_ne!(Value::from(1), Value::from(1.0));
        assert_eq!(Value::Undefined, Value::Undefined);
    }

    #[test]
    fn references_compare_by_identity() {
        let a = ObservedObject::new();
        let b = ObservedObject::new();
        assert_eq!(Value::from(a.clone()), Value::from(a.clone()));
        assert_ne!(Value::from(a.clone()), Value::from(b));
        assert!(Value::from(a).is_object());
        assert!(!Value::from(1).is_object());
    }
}

//! The dynamic datum flowing between actions.
//!
//! Every action receives a [`Value`] and hands a [`Value`] to the
//! continuation it picks. The plain variants (`Null` through `Record`) are
//! ordinary data; two variants are kernel-specific:
//!
//! - [`Value::Condition`]: a recoverable failure travelling the failure
//!   channel. Handlers receive the condition *as their input* and decide
//!   whether to resume, rollback, or restart.
//! - [`Value::Action`]: actions are first-class data, so a timeout handler
//!   can be handed the operation it may restart.
//!
//! Records use ordered maps so iteration (and therefore logging and trace
//! output) is deterministic.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::action::Action;
use crate::condition::Condition;

/// A dynamic value passed between actions.
#[derive(Clone, Default)]
pub enum Value {
    /// The absent value. Also the end-of-stream marker for collectors.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating-point number.
    Float(f64),
    /// A string.
    Str(String),
    /// An ordered list of values.
    List(Vec<Value>),
    /// A record with deterministically ordered keys.
    Record(BTreeMap<String, Value>),
    /// A recoverable failure value (see [`Condition`]).
    Condition(Rc<Condition>),
    /// A first-class action.
    Action(Action),
}

impl Value {
    /// Builds a record value from key/value pairs.
    pub fn record<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Record(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .collect(),
        )
    }

    /// Returns true if this is the absent value.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the string slice if this is a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns the integer if this is an integer value.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the list if this is a list value.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Returns the record map if this is a record value.
    #[must_use]
    pub const fn as_record(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Record(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the condition if this value carries one.
    #[must_use]
    pub fn as_condition(&self) -> Option<&Rc<Condition>> {
        match self {
            Self::Condition(c) => Some(c),
            _ => None,
        }
    }

    /// Returns the action if this value carries one.
    #[must_use]
    pub fn as_action(&self) -> Option<&Action> {
        match self {
            Self::Action(a) => Some(a),
            _ => None,
        }
    }

    /// A short single-line summary used by the trace hook and `drain`.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::Str(s) if s.chars().count() > 32 => {
                let head: String = s.chars().take(32).collect();
                format!("{head:?}…")
            }
            Self::List(items) => format!("list[{}]", items.len()),
            Self::Record(map) => format!("record{{{} keys}}", map.len()),
            other => format!("{other}"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Record(a), Self::Record(b)) => a == b,
            // Conditions and actions compare by identity.
            (Self::Condition(a), Self::Condition(b)) => Rc::ptr_eq(a, b),
            (Self::Action(a), Self::Action(b)) => a.same_instance(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Int(n) => write!(f, "Int({n})"),
            Self::Float(x) => write!(f, "Float({x})"),
            Self::Str(s) => write!(f, "Str({s:?})"),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Record(map) => f.debug_tuple("Record").field(map).finish(),
            Self::Condition(c) => write!(f, "Condition({c})"),
            Self::Action(a) => write!(f, "Action({})", a.name()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Record(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Self::Condition(c) => write!(f, "<condition {c}>"),
            Self::Action(a) => write!(f, "<action {}>", a.name()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<Action> for Value {
    fn from(a: Action) -> Self {
        Self::Action(a)
    }
}

/// Error converting a [`Value`] to an external representation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    /// Conditions carry live continuations and cannot leave the kernel.
    #[error("a condition value cannot be converted to JSON")]
    ConditionNotConvertible,
    /// Actions are opaque callables and cannot leave the kernel.
    #[error("an action value cannot be converted to JSON")]
    ActionNotConvertible,
    /// The JSON number did not fit any `Value` numeric variant.
    #[error("JSON number {0} is not representable")]
    NumberNotRepresentable(String),
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::Null),
            serde_json::Value::String(s) => Self::Str(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => Self::Record(
                map.into_iter().map(|(k, v)| (k, Self::from(v))).collect(),
            ),
        }
    }
}

impl TryFrom<&Value> for serde_json::Value {
    type Error = ValueError;

    fn try_from(value: &Value) -> Result<Self, ValueError> {
        Ok(match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Int(n) => Self::Number((*n).into()),
            Value::Float(x) => serde_json::Number::from_f64(*x)
                .map(Self::Number)
                .ok_or_else(|| ValueError::NumberNotRepresentable(x.to_string()))?,
            Value::Str(s) => Self::String(s.clone()),
            Value::List(items) => Self::Array(
                items
                    .iter()
                    .map(Self::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            Value::Record(map) => Self::Object(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), Self::try_from(v)?)))
                    .collect::<Result<_, ValueError>>()?,
            ),
            Value::Condition(_) => return Err(ValueError::ConditionNotConvertible),
            Value::Action(_) => return Err(ValueError::ActionNotConvertible),
        })
    }
}

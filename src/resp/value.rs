use crate::{Error, RedisError, Result};

/// A generic RESP2 reply from the Redis server.
///
/// `Nil` bulk strings and arrays are represented with `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    SimpleString(String),
    Integer(i64),
    BulkString(Option<Vec<u8>>),
    Array(Option<Vec<Value>>),
    Error(RedisError),
}

impl Value {
    /// `true` for the error reply class
    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// Converts an error reply into [`Error::Redis`], passing every other
    /// reply kind through.
    #[inline]
    pub fn into_result(self) -> Result<Value> {
        match self {
            Value::Error(e) => Err(Error::Redis(e)),
            _ => Ok(self),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::BulkString(None)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::SimpleString(s) => f.write_str(s),
            Value::Integer(i) => i.fmt(f),
            Value::BulkString(Some(s)) => String::from_utf8_lossy(s).fmt(f),
            Value::BulkString(None) => f.write_str("nil"),
            Value::Array(Some(v)) => {
                f.write_str("[")?;
                for (i, value) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    value.fmt(f)?;
                }
                f.write_str("]")
            }
            Value::Array(None) => f.write_str("[]"),
            Value::Error(e) => e.fmt(f),
        }
    }
}

//! Read-only introspection by path.
//!
//! Tracing tools and test harnesses ask a CPU for named values (`"pc"`,
//! `"flags.z"`) without depending on its concrete register layout. Queries
//! never touch the bus, so they have no side effects.

use std::fmt;

/// A queried value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    U8(u8),
    U16(u16),
    U64(u64),
    String(String),
}

impl Value {
    /// Numeric view, for comparisons in harnesses. Strings yield `None`.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Bool(v) => Some(u64::from(*v)),
            Value::U8(v) => Some(u64::from(*v)),
            Value::U16(v) => Some(u64::from(*v)),
            Value::U64(v) => Some(*v),
            Value::String(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "{v:02X}"),
            Value::U16(v) => write!(f, "{v:04X}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::U8(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::U16(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

/// A component whose state can be inspected by path.
pub trait Observable {
    /// Look up one value. Paths are dot-separated (`"flags.c"`).
    ///
    /// Returns `None` for unknown paths.
    fn query(&self, path: &str) -> Option<Value>;

    /// Every path `query` understands.
    fn query_paths(&self) -> &'static [&'static str];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_hex_for_registers() {
        assert_eq!(Value::from(0x0Au8).to_string(), "0A");
        assert_eq!(Value::from(0x01FDu16).to_string(), "01FD");
        assert_eq!(Value::from(7u64).to_string(), "7");
        assert_eq!(Value::from("NV-BDIZC").to_string(), "NV-BDIZC");
    }

    #[test]
    fn numeric_view() {
        assert_eq!(Value::Bool(true).as_u64(), Some(1));
        assert_eq!(Value::U16(0x1234).as_u64(), Some(0x1234));
        assert_eq!(Value::from("x").as_u64(), None);
    }
}

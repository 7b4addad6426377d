use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the two signaling values.
///
/// On the wire a request may name it by ordinal (`0`, `1`) or by name
/// (`"DOT"`, `"DASH"`); anything else is rejected during deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "SymbolRepr", into = "u8")]
#[repr(u8)]
pub enum Symbol {
    Dot = 0,
    Dash = 1,
}

impl Symbol {
    pub const ALL: [Symbol; 2] = [Symbol::Dot, Symbol::Dash];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Dot => "DOT",
            Self::Dash => "DASH",
        }
    }

    pub fn value(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for Symbol {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|s| s.value() == value)
            .ok_or_else(|| format!("invalid symbol value {}, expected 0 (DOT) or 1 (DASH)", value))
    }
}

impl FromStr for Symbol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|sym| sym.name() == s)
            .ok_or_else(|| format!("invalid symbol name {:?}, expected \"DOT\" or \"DASH\"", s))
    }
}

impl From<Symbol> for u8 {
    fn from(symbol: Symbol) -> Self {
        symbol.value()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SymbolRepr {
    Ordinal(u8),
    Name(String),
}

impl TryFrom<SymbolRepr> for Symbol {
    type Error = String;

    fn try_from(repr: SymbolRepr) -> Result<Self, Self::Error> {
        match repr {
            SymbolRepr::Ordinal(value) => Symbol::try_from(value),
            SymbolRepr::Name(name) => name.parse(),
        }
    }
}

/// Payload pushed to every receiver: `{"symbol":"DOT","value":0}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastMessage {
    pub symbol: String,
    pub value: u8,
}

impl From<Symbol> for BroadcastMessage {
    fn from(symbol: Symbol) -> Self {
        Self {
            symbol: symbol.name().to_string(),
            value: symbol.value(),
        }
    }
}

//! Command-boundary errors, rendered in the monitor's terse style.
//!
//! Every command recovers at its boundary: the dispatcher prints the message
//! and returns to the prompt.

use std::error;
use std::fmt;

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// An argument failed to parse: `<name>: <text>?` (or `<name>?` for an
    /// empty token).
    Argument { name: &'static str, text: String },
    /// An operand has no legal encoding: `<operand>?`. The operand is
    /// rendered at the raise site, where the label table is at hand.
    Operand { text: String },
    /// A relative branch target out of range.
    TooFar,
    /// The label buffer cannot hold another entry.
    LabelsFull,
}

impl Error {
    pub fn argument(name: &'static str, text: &str) -> Self {
        Self::Argument {
            name,
            text: text.to_string(),
        }
    }
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Argument { name, text } => {
                if text.is_empty() {
                    write!(f, "{}?", name)
                } else {
                    write!(f, "{}: {}?", name, text)
                }
            }
            Self::Operand { text } => write!(f, "{}?", text),
            Self::TooFar => write!(f, "too far"),
            Self::LabelsFull => write!(f, "full"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_terse_messages() {
        assert_eq!(Error::argument("start", "wat").to_string(), "start: wat?");
        assert_eq!(Error::argument("data", "").to_string(), "data?");
        assert_eq!(
            Error::Operand {
                text: "(IX+$05)".to_string()
            }
            .to_string(),
            "(IX+$05)?"
        );
        assert_eq!(Error::TooFar.to_string(), "too far");
        assert_eq!(Error::LabelsFull.to_string(), "full");
    }
}

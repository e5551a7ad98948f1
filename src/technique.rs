//! Operation selectors: which scheme, and which direction.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// The cryptographic scheme an operation is performed with.
///
/// Serialized on the wire as `"AES"` / `"RSA"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
pub enum Technique {
    Aes,
    Rsa,
}

impl Technique {
    pub fn as_str(self) -> &'static str {
        match self {
            Technique::Aes => "AES",
            Technique::Rsa => "RSA",
        }
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Encrypt,
    Decrypt,
}

impl Mode {
    /// Service endpoint path segment for this mode.
    pub fn endpoint(self) -> &'static str {
        match self {
            Mode::Encrypt => "encrypt",
            Mode::Decrypt => "decrypt",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.endpoint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_string(&Technique::Aes).unwrap(), "\"AES\"");
        assert_eq!(serde_json::to_string(&Technique::Rsa).unwrap(), "\"RSA\"");
        let parsed: Technique = serde_json::from_str("\"RSA\"").unwrap();
        assert_eq!(parsed, Technique::Rsa);
    }

    #[test]
    fn test_cli_names() {
        assert_eq!(Technique::from_str("aes", true).unwrap(), Technique::Aes);
        assert_eq!(Technique::from_str("RSA", true).unwrap(), Technique::Rsa);
        assert!(Technique::from_str("des", true).is_err());
    }
}

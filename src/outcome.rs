//! Successful operation results
//!
//! Failures are not a variant here: an operation that fails yields
//! `Err(CryptdeskError)`, whose message is the reason shown to the user.

use std::fmt;

use zeroize::Zeroizing;

use crate::artifact::AesKeyMaterial;
use crate::technique::Technique;

/// A freshly generated RSA key pair, as PEM text exactly as the service sent it.
#[derive(Clone, PartialEq, Eq)]
pub struct RsaKeyPair {
    private_key_pem: Zeroizing<String>,
    public_key_pem: String,
}

impl RsaKeyPair {
    pub fn new(private_key_pem: impl Into<String>, public_key_pem: impl Into<String>) -> Self {
        Self {
            private_key_pem: Zeroizing::new(private_key_pem.into()),
            public_key_pem: public_key_pem.into(),
        }
    }

    pub fn private_key_pem(&self) -> &str {
        &self.private_key_pem
    }

    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }
}

impl fmt::Debug for RsaKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaKeyPair")
            .field("private_key_pem", &"<redacted>")
            .field("public_key_pem", &self.public_key_pem)
            .finish()
    }
}

/// Keys generated by the service during encryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedKeys {
    Aes(AesKeyMaterial),
    Rsa(RsaKeyPair),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptSuccess {
    pub encrypted_content: String,
    pub generated_keys: GeneratedKeys,
}

impl EncryptSuccess {
    pub fn technique(&self) -> Technique {
        match self.generated_keys {
            GeneratedKeys::Aes(_) => Technique::Aes,
            GeneratedKeys::Rsa(_) => Technique::Rsa,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptSuccess {
    pub decrypted_content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    Encrypted(EncryptSuccess),
    Decrypted(DecryptSuccess),
}

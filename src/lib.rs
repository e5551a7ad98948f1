//! Cryptdesk - validate local key and content files, then encrypt or decrypt
//! them with AES or RSA through a remote crypto service.

#![forbid(unsafe_code)]

pub mod artifact;
pub mod client;
pub mod config;
pub mod error;
pub mod operation;
pub mod outcome;
pub mod package;
pub mod request;
pub mod technique;

pub use client::{CryptoService, HttpCryptoService};
pub use error::{CryptdeskError, ErrorCategory, ErrorKind, Result};
pub use operation::{OperationState, Phase, Session, Slot};
pub use technique::{Mode, Technique};

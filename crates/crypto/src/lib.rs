//! Envelope encryption for draft and attachment payloads.
//!
//! Every call to [`EnvelopeAead::encrypt`] generates a fresh AES-256-GCM data
//! key, encrypts the payload with it, and asks a [`KeyEncryptionKey`] to wrap
//! the data key. Ciphertexts are laid out as:
//!
//! ```text
//! | wrapped key length (u32 BE) | wrapped key | nonce (12) | ciphertext || tag (16) |
//! ```
//!
//! The caller-supplied associated data is authenticated but not stored, so a
//! ciphertext only decrypts under the exact associated data it was produced
//! with.

mod envelope;
mod error;
mod kek;
mod key;

pub use envelope::{EnvelopeAead, KEY_TEMPLATE};
pub use error::CryptoError;
pub use kek::{KeyEncryptionKey, KeyUri, LocalKek};
pub use key::{DataKey, MasterKey, parse_master_key};

//! Adapters - concrete implementations of ports (traits)

pub mod key_file;
mod pkcs11;
mod soft_token;

// Re-export for convenience
pub use key_file::TextKeyFile;
pub use pkcs11::{Pkcs11Pool, Pkcs11Session};
pub use soft_token::{SoftSession, SoftToken, DEFAULT_TOKEN_LABEL};

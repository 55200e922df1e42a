//! Ports (traits) for the HSM and the private-key file store
//!
//! The core depends on these abstractions, not on `cryptoki` or on a file
//! layout. Adapters in `crate::adapters` implement them.

mod hsm;
mod key_file;
mod session;

pub use hsm::{
    HsmCall, HsmSession, KeyType, Mechanism, ObjectClass, TemplateAttribute, TransientObject,
};
pub use key_file::PrivateKeyCodec;
pub use session::{Operation, ScopedSession, SessionPool, SessionRequest};

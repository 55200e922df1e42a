//! PrivateKeyCodec trait - capability to store private-key files

use crate::error::EddsaResult;
use crate::model::{EddsaKey, PrivateKeyFile};

/// Capability to persist and load the tagged elements of a private-key file
///
/// The codec owns the on-disk layout; the core only decides which
/// elements exist and what they mean.
pub trait PrivateKeyCodec {
    /// Write the elements for `key`
    fn write(&mut self, key: &EddsaKey, file: &PrivateKeyFile) -> EddsaResult<()>;

    /// Read the elements stored for `key`
    ///
    /// # Errors
    ///
    /// Returns `EddsaError::InvalidPrivateKeyFile` on malformed content
    fn read(&mut self, key: &EddsaKey) -> EddsaResult<PrivateKeyFile>;
}

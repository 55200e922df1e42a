//! HsmSession trait - the PKCS#11 object/attribute calls the core consumes

use std::fmt;

use tracing::warn;

use crate::error::EddsaResult;
use crate::model::{Attribute, AttributeType, ObjectHandle, SlotId};

/// HSM entry points, used to label failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HsmCall {
    OpenSession,
    Login,
    CreateObject,
    DestroyObject,
    GetAttributes,
    GenerateKeyPair,
    Sign,
    Verify,
    FindObjects,
}

impl fmt::Display for HsmCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HsmCall::OpenSession => "open-session",
            HsmCall::Login => "login",
            HsmCall::CreateObject => "create-object",
            HsmCall::DestroyObject => "destroy-object",
            HsmCall::GetAttributes => "get-attributes",
            HsmCall::GenerateKeyPair => "generate-key-pair",
            HsmCall::Sign => "sign",
            HsmCall::Verify => "verify",
            HsmCall::FindObjects => "find-objects",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectClass {
    PublicKey,
    PrivateKey,
}

/// PKCS#11 key types this backend creates or searches for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    /// `CKK_EC_EDWARDS`
    EcEdwards,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mechanism {
    /// `CKM_EC_EDWARDS_KEY_PAIR_GEN`
    EcEdwardsKeyPairGen,
    /// `CKM_EDDSA` (pure EdDSA, no prehash)
    Eddsa,
}

/// One entry of an object template or search template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateAttribute {
    Class(ObjectClass),
    KeyType(KeyType),
    Token(bool),
    Private(bool),
    Sensitive(bool),
    Extractable(bool),
    Sign(bool),
    Verify(bool),
    /// A byte-valued attribute; wiped when the template drops
    Bytes(Attribute),
}

/// Capability to drive PKCS#11 objects within one open session
///
/// Every call is fallible. Implementations report failures as
/// `EddsaError::CryptoOperationFailure` naming the call, except `verify`,
/// which reports a rejected signature as `EddsaError::VerificationFailed`.
pub trait HsmSession {
    /// Slot the session was opened on
    fn slot(&self) -> SlotId;

    fn create_object(&self, template: &[TemplateAttribute]) -> EddsaResult<ObjectHandle>;

    fn destroy_object(&self, object: ObjectHandle) -> EddsaResult<()>;

    /// Read byte-valued attributes, returned in the requested order
    fn get_attributes(
        &self,
        object: ObjectHandle,
        kinds: &[AttributeType],
    ) -> EddsaResult<Vec<Attribute>>;

    /// Generate a key pair, returning `(public, private)` handles
    fn generate_key_pair(
        &self,
        mechanism: Mechanism,
        public_template: &[TemplateAttribute],
        private_template: &[TemplateAttribute],
    ) -> EddsaResult<(ObjectHandle, ObjectHandle)>;

    /// Sign-init followed by a single-part sign
    fn sign(&self, mechanism: Mechanism, key: ObjectHandle, data: &[u8]) -> EddsaResult<Vec<u8>>;

    /// Verify-init followed by a single-part verify
    fn verify(
        &self,
        mechanism: Mechanism,
        key: ObjectHandle,
        data: &[u8],
        signature: &[u8],
    ) -> EddsaResult<()>;

    /// Find-init / find / find-final, returning at most `max` handles
    fn find_objects(
        &self,
        template: &[TemplateAttribute],
        max: usize,
    ) -> EddsaResult<Vec<ObjectHandle>>;
}

/// An HSM object destroyed when the guard drops
///
/// Destruction failures are logged and otherwise ignored; they never mask
/// the result of the operation that created the object.
pub struct TransientObject<'s, S: HsmSession + ?Sized> {
    session: &'s S,
    handle: ObjectHandle,
}

impl<'s, S: HsmSession + ?Sized> TransientObject<'s, S> {
    pub fn new(session: &'s S, handle: ObjectHandle) -> Self {
        Self { session, handle }
    }

    pub fn create(session: &'s S, template: &[TemplateAttribute]) -> EddsaResult<Self> {
        let handle = session.create_object(template)?;
        Ok(Self::new(session, handle))
    }

    pub fn handle(&self) -> ObjectHandle {
        self.handle
    }
}

impl<S: HsmSession + ?Sized> Drop for TransientObject<'_, S> {
    fn drop(&mut self) {
        if let Err(e) = self.session.destroy_object(self.handle) {
            warn!("Failed to destroy transient {}: {}", self.handle, e);
        }
    }
}

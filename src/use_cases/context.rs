//! Signing/verification context
//!
//! A context accumulates the bytes to sign or verify and runs exactly one
//! HSM operation when finalized. Finalizing consumes the context, so a
//! context is never reused after `sign` or `verify`.

use tracing::debug;

use crate::error::{EddsaError, EddsaResult};
use crate::model::{AttributeType, EddsaKey, KeyMaterial, SlotId};
use crate::ports::{
    HsmCall, HsmSession, KeyType, Mechanism, ObjectClass, Operation, ScopedSession, SessionPool,
    SessionRequest, TemplateAttribute, TransientObject,
};

/// What a context is opened for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextUsage {
    Sign,
    Verify,
}

pub struct SigningContext<'a, P: SessionPool + ?Sized> {
    pool: &'a P,
    key: &'a EddsaKey,
    usage: ContextUsage,
    buffer: Vec<u8>,
}

impl<'a, P: SessionPool + ?Sized> SigningContext<'a, P> {
    /// Open a context against `key`
    ///
    /// # Errors
    ///
    /// Returns `EddsaError::InvalidAlgorithm` if the key's material names a
    /// different curve than the key itself
    pub fn new(pool: &'a P, key: &'a EddsaKey, usage: ContextUsage) -> EddsaResult<Self> {
        if let Some(material) = key.material() {
            if material.get(AttributeType::EcParams).is_some() {
                let curve = material.algorithm()?;
                if curve != key.algorithm() {
                    return Err(EddsaError::InvalidAlgorithm {
                        algorithm: format!("{} material on an {} key", curve, key.algorithm()),
                    });
                }
            }
        }
        debug!("Opened {:?} context for {} key", usage, key.algorithm());
        Ok(Self {
            pool,
            key,
            usage,
            buffer: Vec::new(),
        })
    }

    pub fn usage(&self) -> ContextUsage {
        self.usage
    }

    /// Append message bytes
    pub fn update(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Sign the accumulated bytes into `out`, returning the signature length
    ///
    /// # Errors
    ///
    /// - `EddsaError::KeyMaterialMissing` without private material; no
    ///   session is acquired in that case
    /// - `EddsaError::InsufficientBuffer` if `out` is shorter than the
    ///   algorithm's signature
    /// - `EddsaError::SessionUnavailable` / `EddsaError::CryptoOperationFailure`
    ///   from the HSM
    pub fn sign(self, out: &mut [u8]) -> EddsaResult<usize> {
        let material = self
            .key
            .material()
            .filter(|material| material.is_private())
            .ok_or_else(|| EddsaError::KeyMaterialMissing {
                reason: "signing needs a private key".to_string(),
            })?;
        let algorithm = self.key.algorithm();

        let slot = self.select_slot(material)?;
        let session = ScopedSession::acquire(
            self.pool,
            &SessionRequest::eddsa(slot, material.requires_login()),
        )?;

        let needed = algorithm.signature_len();
        if out.len() < needed {
            return Err(EddsaError::InsufficientBuffer {
                needed,
                available: out.len(),
            });
        }

        let signature = if material.is_on_token() {
            let object = material
                .token_object()
                .ok_or_else(|| EddsaError::KeyMaterialMissing {
                    reason: "token key was never located".to_string(),
                })?;
            session.sign(Mechanism::Eddsa, object.handle, &self.buffer)?
        } else {
            let template = private_template(material)?;
            let transient = TransientObject::create(&*session, &template)?;
            session.sign(Mechanism::Eddsa, transient.handle(), &self.buffer)?
        };

        if signature.len() != needed {
            return Err(EddsaError::hsm(
                HsmCall::Sign,
                format!("{} byte signature, expected {}", signature.len(), needed),
            ));
        }
        out[..needed].copy_from_slice(&signature);
        debug!("Signed {} bytes with {} key", self.buffer.len(), algorithm);
        Ok(needed)
    }

    /// Sign into a freshly allocated buffer of the algorithm's length
    pub fn sign_to_vec(self) -> EddsaResult<Vec<u8>> {
        let mut signature = vec![0u8; self.key.algorithm().signature_len()];
        let len = self.sign(&mut signature)?;
        signature.truncate(len);
        Ok(signature)
    }

    /// Verify `signature` over the accumulated bytes
    ///
    /// Always goes through a transient public-key object.
    ///
    /// # Errors
    ///
    /// Returns `EddsaError::VerificationFailed` when the HSM rejects the
    /// signature
    pub fn verify(self, signature: &[u8]) -> EddsaResult<()> {
        let material = self
            .key
            .material()
            .ok_or_else(|| EddsaError::KeyMaterialMissing {
                reason: "verification needs a public key".to_string(),
            })?;
        let template = public_template(material)?;

        let slot = self.select_slot(material)?;
        let session = ScopedSession::acquire(
            self.pool,
            &SessionRequest::eddsa(slot, material.requires_login()),
        )?;
        let transient = TransientObject::create(&*session, &template)?;
        session.verify(Mechanism::Eddsa, transient.handle(), &self.buffer, signature)?;
        debug!(
            "Verified {} byte signature with {} key",
            signature.len(),
            self.key.algorithm()
        );
        Ok(())
    }

    fn select_slot(&self, material: &KeyMaterial) -> EddsaResult<SlotId> {
        match (material.is_on_token(), self.usage, material.slot()) {
            (true, ContextUsage::Sign, Some(slot)) => Ok(slot),
            _ => self.pool.best_slot(Operation::Eddsa),
        }
    }
}

fn required(material: &KeyMaterial, kind: AttributeType) -> EddsaResult<TemplateAttribute> {
    material
        .get(kind)
        .cloned()
        .map(TemplateAttribute::Bytes)
        .ok_or_else(|| EddsaError::KeyMaterialMissing {
            reason: format!("no {:?} attribute", kind),
        })
}

/// Session-only signing key built from the in-memory scalar
fn private_template(material: &KeyMaterial) -> EddsaResult<Vec<TemplateAttribute>> {
    Ok(vec![
        TemplateAttribute::Class(ObjectClass::PrivateKey),
        TemplateAttribute::KeyType(KeyType::EcEdwards),
        TemplateAttribute::Token(false),
        TemplateAttribute::Private(false),
        TemplateAttribute::Sign(true),
        required(material, AttributeType::EcParams)?,
        required(material, AttributeType::Value)?,
    ])
}

fn public_template(material: &KeyMaterial) -> EddsaResult<Vec<TemplateAttribute>> {
    Ok(vec![
        TemplateAttribute::Class(ObjectClass::PublicKey),
        TemplateAttribute::KeyType(KeyType::EcEdwards),
        TemplateAttribute::Token(false),
        TemplateAttribute::Private(false),
        TemplateAttribute::Verify(true),
        required(material, AttributeType::EcParams)?,
        required(material, AttributeType::EcPoint)?,
    ])
}

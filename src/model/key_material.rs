//! In-memory or token-referenced EdDSA key material
//!
//! Material is an ordered list of attribute records with unique tags.
//! A token-bound key keeps only public attributes in memory; the private
//! half is reachable through `object()` alone.

use crate::error::{EddsaError, EddsaResult};
use crate::model::{Algorithm, Attribute, AttributeType, ObjectHandle, SlotId, TokenObject};

#[derive(Debug, Default)]
pub struct KeyMaterial {
    attributes: Vec<Attribute>,
    on_token: bool,
    slot: Option<SlotId>,
    object: Option<ObjectHandle>,
    requires_login: bool,
}

impl KeyMaterial {
    /// Empty in-memory material
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty material for a key living on a token
    ///
    /// The object handle is attached later with `bind_object` once the
    /// token search has located it.
    pub fn token_bound(slot: SlotId, requires_login: bool) -> Self {
        Self {
            attributes: Vec::new(),
            on_token: true,
            slot: Some(slot),
            object: None,
            requires_login,
        }
    }

    pub fn get(&self, kind: AttributeType) -> Option<&Attribute> {
        self.attributes.iter().find(|attr| attr.kind() == kind)
    }

    /// Set an attribute, replacing (and wiping) any previous value
    ///
    /// # Errors
    ///
    /// Returns `EddsaError::KeyMaterialMissing` when a private scalar is
    /// set on token-bound material
    pub fn set(&mut self, kind: AttributeType, value: Vec<u8>) -> EddsaResult<()> {
        self.insert(Attribute::new(kind, value))
    }

    /// Same as `set` for an already built record
    pub fn insert(&mut self, attribute: Attribute) -> EddsaResult<()> {
        if self.on_token && attribute.kind().is_secret() {
            return Err(EddsaError::KeyMaterialMissing {
                reason: "token-bound keys never hold the private scalar".to_string(),
            });
        }
        match self
            .attributes
            .iter_mut()
            .find(|attr| attr.kind() == attribute.kind())
        {
            Some(slot) => *slot = attribute,
            None => self.attributes.push(attribute),
        }
        Ok(())
    }

    pub fn first(&self) -> Option<&Attribute> {
        self.attributes.first()
    }

    /// Attributes in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn is_on_token(&self) -> bool {
        self.on_token
    }

    pub fn slot(&self) -> Option<SlotId> {
        self.slot
    }

    pub fn object(&self) -> Option<ObjectHandle> {
        self.object
    }

    /// The token object this material is bound to, if located
    pub fn token_object(&self) -> Option<TokenObject> {
        match (self.on_token, self.slot, self.object) {
            (true, Some(slot), Some(handle)) => Some(TokenObject { slot, handle }),
            _ => None,
        }
    }

    pub fn requires_login(&self) -> bool {
        self.requires_login
    }

    pub(crate) fn bind_object(&mut self, handle: ObjectHandle) {
        self.object = Some(handle);
    }

    /// True when the key can sign: a scalar is present or the key is on a token
    pub fn is_private(&self) -> bool {
        self.get(AttributeType::Value).is_some() || self.on_token
    }

    /// Curve named by the `EcParams` attribute
    ///
    /// # Errors
    ///
    /// Returns `EddsaError::KeyMaterialMissing` without curve parameters,
    /// `EddsaError::InvalidAlgorithm` for a non-Edwards curve
    pub fn algorithm(&self) -> EddsaResult<Algorithm> {
        let params = self
            .get(AttributeType::EcParams)
            .ok_or_else(|| EddsaError::KeyMaterialMissing {
                reason: "no curve parameters".to_string(),
            })?;
        Algorithm::from_ec_params(params.value())
    }

    /// Wipe every record and forget any token binding
    ///
    /// Safe to call repeatedly.
    pub fn destroy(&mut self) {
        // Attribute buffers zero themselves on drop.
        self.attributes.clear();
        self.on_token = false;
        self.slot = None;
        self.object = None;
        self.requires_login = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn public_material() -> KeyMaterial {
        let mut material = KeyMaterial::new();
        material
            .set(
                AttributeType::EcParams,
                Algorithm::Ed25519.ec_params().to_vec(),
            )
            .unwrap();
        material
            .insert(Attribute::ec_point(&[9u8; 32]).unwrap())
            .unwrap();
        material
    }

    #[test]
    fn test_set_keeps_insertion_order() {
        let material = public_material();
        let kinds: Vec<_> = material.iter().map(|attr| attr.kind()).collect();
        assert_eq!(kinds, vec![AttributeType::EcParams, AttributeType::EcPoint]);
        assert_eq!(material.first().unwrap().kind(), AttributeType::EcParams);
    }

    #[test]
    fn test_set_replaces_without_duplicates() {
        let mut material = public_material();
        material.set(AttributeType::Value, vec![1u8; 32]).unwrap();
        material.set(AttributeType::Value, vec![2u8; 32]).unwrap();
        assert_eq!(material.len(), 3);
        assert_eq!(material.get(AttributeType::Value).unwrap().value(), &[2u8; 32]);
    }

    #[test]
    fn test_token_bound_rejects_scalar() {
        let mut material = KeyMaterial::token_bound(SlotId(0), true);
        let result = material.set(AttributeType::Value, vec![1u8; 32]);
        assert!(matches!(result, Err(EddsaError::KeyMaterialMissing { .. })));
        assert!(material.get(AttributeType::Value).is_none());
        assert!(material.is_private());
    }

    #[test]
    fn test_is_private() {
        let mut material = public_material();
        assert!(!material.is_private());
        material.set(AttributeType::Value, vec![1u8; 32]).unwrap();
        assert!(material.is_private());
    }

    #[test]
    fn test_algorithm_from_params() {
        assert_eq!(public_material().algorithm().unwrap(), Algorithm::Ed25519);
        assert!(KeyMaterial::new().algorithm().is_err());
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut material = public_material();
        material.destroy();
        assert!(material.is_empty());
        material.destroy();
        assert!(material.is_empty());
        assert!(!material.is_on_token());
    }

    #[test]
    fn test_token_object_requires_handle() {
        let mut material = KeyMaterial::token_bound(SlotId(4), true);
        assert!(material.token_object().is_none());
        material.bind_object(ObjectHandle(11));
        assert_eq!(
            material.token_object(),
            Some(TokenObject {
                slot: SlotId(4),
                handle: ObjectHandle(11)
            })
        );
    }
}

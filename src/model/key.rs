//! DNS-oriented EdDSA key handle

use subtle::ConstantTimeEq;

use crate::model::{Algorithm, AttributeType, KeyMaterial};

/// One Ed25519 or Ed448 key
///
/// A fresh handle has no material. Material arrives through generation,
/// wire import, private-key file parsing or the token loader.
#[derive(Debug)]
pub struct EddsaKey {
    algorithm: Algorithm,
    key_size: u32,
    material: Option<KeyMaterial>,
    engine: Option<String>,
    label: Option<String>,
    external: bool,
}

impl EddsaKey {
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            key_size: 0,
            material: None,
            engine: None,
            label: None,
            external: false,
        }
    }

    /// A key whose private half is managed entirely outside this process
    pub fn new_external(algorithm: Algorithm) -> Self {
        let mut key = Self::new(algorithm);
        key.external = true;
        key
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Key size in bits, zero until material is present
    pub fn key_size(&self) -> u32 {
        self.key_size
    }

    pub fn material(&self) -> Option<&KeyMaterial> {
        self.material.as_ref()
    }

    pub fn engine(&self) -> Option<&str> {
        self.engine.as_deref()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn is_external(&self) -> bool {
        self.external
    }

    pub fn has_material(&self) -> bool {
        self.material.is_some()
    }

    /// True when the key can sign
    pub fn is_private(&self) -> bool {
        self.material
            .as_ref()
            .is_some_and(|material| material.is_private())
    }

    /// True when the private half lives on a token
    pub fn is_on_token(&self) -> bool {
        self.material
            .as_ref()
            .is_some_and(|material| material.is_on_token())
    }

    pub(crate) fn install(&mut self, material: KeyMaterial, key_size: u32) {
        if let Some(mut old) = self.material.replace(material) {
            old.destroy();
        }
        self.key_size = key_size;
    }

    pub(crate) fn take_material(&mut self) -> Option<KeyMaterial> {
        self.material.take()
    }

    pub(crate) fn set_token_names(&mut self, engine: Option<&str>, label: &str) {
        self.engine = engine.map(str::to_owned);
        self.label = Some(label.to_owned());
    }

    /// Wipe and release the key material
    ///
    /// No-op on a key without material.
    pub fn destroy(&mut self) {
        if let Some(mut material) = self.material.take() {
            material.destroy();
        }
    }

    /// Key identity comparison
    ///
    /// Compares curve, public point and (when both sides have one) the
    /// private scalar, all in constant time. Token-bound keys are equal
    /// only when bound to the same token object.
    pub fn compare(&self, other: &EddsaKey) -> bool {
        let (a, b) = match (&self.material, &other.material) {
            (None, None) => return true,
            (Some(a), Some(b)) => (a, b),
            _ => return false,
        };

        for kind in [AttributeType::EcParams, AttributeType::EcPoint] {
            match (a.get(kind), b.get(kind)) {
                (None, None) => return true,
                (Some(x), Some(y)) if ct_equal(x.value(), y.value()) => {}
                _ => return false,
            }
        }

        // A public-only copy still identifies the same key as its private twin.
        if let (Some(x), Some(y)) = (a.get(AttributeType::Value), b.get(AttributeType::Value)) {
            if !ct_equal(x.value(), y.value()) {
                return false;
            }
        }

        match (a.is_on_token(), b.is_on_token()) {
            (false, false) => true,
            (true, true) => a.slot() == b.slot() && a.object() == b.object(),
            _ => false,
        }
    }
}

impl Drop for EddsaKey {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn ct_equal(a: &[u8], b: &[u8]) -> bool {
    // `ct_eq` on slices of unequal length is false without inspecting bytes.
    bool::from(a.ct_eq(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attribute, ObjectHandle, SlotId};

    fn material(point: u8, scalar: Option<u8>) -> KeyMaterial {
        let mut material = KeyMaterial::new();
        material
            .set(
                AttributeType::EcParams,
                Algorithm::Ed25519.ec_params().to_vec(),
            )
            .unwrap();
        material
            .insert(Attribute::ec_point(&[point; 32]).unwrap())
            .unwrap();
        if let Some(scalar) = scalar {
            material.set(AttributeType::Value, vec![scalar; 32]).unwrap();
        }
        material
    }

    fn key_with(material: KeyMaterial) -> EddsaKey {
        let mut key = EddsaKey::new(Algorithm::Ed25519);
        key.install(material, 256);
        key
    }

    fn token_key(handle: u64) -> EddsaKey {
        let mut m = KeyMaterial::token_bound(SlotId(0), true);
        m.set(
            AttributeType::EcParams,
            Algorithm::Ed25519.ec_params().to_vec(),
        )
        .unwrap();
        m.insert(Attribute::ec_point(&[1u8; 32]).unwrap()).unwrap();
        m.bind_object(ObjectHandle(handle));
        key_with(m)
    }

    #[test]
    fn test_compare_both_absent() {
        assert!(EddsaKey::new(Algorithm::Ed25519).compare(&EddsaKey::new(Algorithm::Ed25519)));
    }

    #[test]
    fn test_compare_one_absent() {
        let key = key_with(material(1, None));
        assert!(!key.compare(&EddsaKey::new(Algorithm::Ed25519)));
    }

    #[test]
    fn test_compare_reflexive() {
        let key = key_with(material(1, Some(2)));
        assert!(key.compare(&key));
    }

    #[test]
    fn test_compare_point_mismatch() {
        assert!(!key_with(material(1, None)).compare(&key_with(material(2, None))));
    }

    #[test]
    fn test_compare_public_vs_private_same_key() {
        let public = key_with(material(1, None));
        let private = key_with(material(1, Some(5)));
        assert!(public.compare(&private));
        assert!(private.compare(&public));
    }

    #[test]
    fn test_compare_scalar_mismatch() {
        assert!(!key_with(material(1, Some(2))).compare(&key_with(material(1, Some(3)))));
    }

    #[test]
    fn test_compare_token_binding() {
        assert!(token_key(7).compare(&token_key(7)));
        assert!(!token_key(7).compare(&token_key(8)));
        assert!(!token_key(7).compare(&key_with(material(1, None))));
    }

    #[test]
    fn test_destroy_clears_material() {
        let mut key = key_with(material(1, Some(2)));
        assert!(key.is_private());
        key.destroy();
        assert!(!key.has_material());
        key.destroy();
        assert!(!key.is_private());
    }

    #[test]
    fn test_install_sets_key_size() {
        let key = key_with(material(1, None));
        assert_eq!(key.key_size(), 256);
        assert!(!key.is_on_token());
    }

    #[test]
    fn test_new_external() {
        let key = EddsaKey::new_external(Algorithm::Ed448);
        assert!(key.is_external());
        assert_eq!(key.algorithm(), Algorithm::Ed448);
        assert!(!key.has_material());
        assert!(!EddsaKey::new(Algorithm::Ed448).is_external());
    }
}

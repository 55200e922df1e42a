//! Private-key file conversion
//!
//! Maps a key to the tagged elements of its private-key file and back.
//! The on-disk layout belongs to the `PrivateKeyCodec` port.

use tracing::debug;

use crate::error::{EddsaError, EddsaResult};
use crate::model::{
    AttributeType, EddsaKey, KeyMaterial, PrivateElement, PrivateKeyFile, PrivateTag,
};
use crate::ports::{PrivateKeyCodec, SessionPool};
use crate::use_cases::fetch;

/// Elements describing `key`'s private half
///
/// In order: the scalar (in-memory keys only), the engine, the label.
/// The engine is written only alongside a label. External keys produce an
/// empty file.
///
/// # Errors
///
/// Returns `EddsaError::NullKey` if the key has no material
pub fn to_private_file(key: &EddsaKey) -> EddsaResult<PrivateKeyFile> {
    let material = key.material().ok_or(EddsaError::NullKey)?;
    let mut file = PrivateKeyFile::new(key.algorithm());
    if key.is_external() {
        return Ok(file);
    }

    if let Some(value) = material.get(AttributeType::Value) {
        file.push(PrivateElement::new(
            PrivateTag::PrivateKey,
            value.value().to_vec(),
        )?);
    }
    if let Some(label) = key.label() {
        if let Some(engine) = key.engine() {
            file.push(PrivateElement::c_string(PrivateTag::Engine, engine)?);
        }
        file.push(PrivateElement::c_string(PrivateTag::Label, label)?);
    }
    Ok(file)
}

/// Materialize `key` from its private-key file
///
/// `public` is the matching public key, already loaded. External keys
/// take over its material. A file with a label binds the key to the token
/// through [`fetch`]; otherwise the file must carry the private scalar.
/// On failure `key` is left without material.
///
/// # Errors
///
/// Returns `EddsaError::InvalidPrivateKeyFile` for a missing public key,
/// an algorithm mismatch, elements an external key must not have, an
/// engine without a label, or a missing or mis-sized scalar
pub fn parse_private_file<P>(
    pool: &P,
    key: &mut EddsaKey,
    file: &PrivateKeyFile,
    public: Option<&mut EddsaKey>,
) -> EddsaResult<()>
where
    P: SessionPool + ?Sized,
{
    let result = materialize(pool, key, file, public);
    if result.is_err() {
        key.destroy();
    }
    result
}

fn materialize<P>(
    pool: &P,
    key: &mut EddsaKey,
    file: &PrivateKeyFile,
    public: Option<&mut EddsaKey>,
) -> EddsaResult<()>
where
    P: SessionPool + ?Sized,
{
    let public = public
        .filter(|public| public.has_material())
        .ok_or_else(|| EddsaError::private_file("public key required"))?;
    let algorithm = key.algorithm();
    if file.algorithm() != algorithm || public.algorithm() != algorithm {
        return Err(EddsaError::private_file(format!(
            "{} file for a {} key",
            file.algorithm(),
            algorithm
        )));
    }

    if key.is_external() {
        if !file.is_empty() {
            return Err(EddsaError::private_file(format!(
                "external key file has {} elements",
                file.len()
            )));
        }
        let key_size = public.key_size();
        if let Some(material) = public.take_material() {
            key.install(material, key_size);
        }
        debug!("External {} key took over its public material", algorithm);
        return Ok(());
    }

    let engine = file
        .find(PrivateTag::Engine)
        .map(PrivateElement::as_c_str)
        .transpose()?;
    let label = file
        .find(PrivateTag::Label)
        .map(PrivateElement::as_c_str)
        .transpose()?;

    match (label, engine) {
        (Some(label), engine) => fetch(pool, key, engine, Some(label), public),
        (None, Some(_)) => Err(EddsaError::private_file("engine given without a label")),
        (None, None) => {
            let material = in_memory_material(file, public)?;
            key.install(material, algorithm.key_bits());
            Ok(())
        }
    }
}

fn in_memory_material(file: &PrivateKeyFile, public: &EddsaKey) -> EddsaResult<KeyMaterial> {
    let algorithm = file.algorithm();
    let scalar = file
        .find(PrivateTag::PrivateKey)
        .ok_or_else(|| EddsaError::private_file("no private key element"))?;
    if scalar.data().len() != algorithm.scalar_len() {
        return Err(EddsaError::private_file(format!(
            "{} private key is {} bytes, expected {}",
            algorithm,
            scalar.data().len(),
            algorithm.scalar_len()
        )));
    }

    let source = public
        .material()
        .ok_or_else(|| EddsaError::private_file("public key required"))?;
    let mut material = KeyMaterial::new();
    for kind in [AttributeType::EcParams, AttributeType::EcPoint] {
        let attribute = source
            .get(kind)
            .ok_or_else(|| EddsaError::private_file(format!("public key has no {:?}", kind)))?;
        material.insert(attribute.clone())?;
    }
    material.set(AttributeType::Value, scalar.data().to_vec())?;
    Ok(material)
}

/// Write `key`'s private-key file through `codec`
pub fn write_private_file<C>(codec: &mut C, key: &EddsaKey) -> EddsaResult<()>
where
    C: PrivateKeyCodec + ?Sized,
{
    let file = to_private_file(key)?;
    codec.write(key, &file)
}

/// Read `key`'s private-key file through `codec` and parse it
pub fn read_private_file<C, P>(
    codec: &mut C,
    pool: &P,
    key: &mut EddsaKey,
    public: Option<&mut EddsaKey>,
) -> EddsaResult<()>
where
    C: PrivateKeyCodec + ?Sized,
    P: SessionPool + ?Sized,
{
    let file = codec.read(key)?;
    parse_private_file(pool, key, &file, public)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SoftToken;
    use crate::model::{Algorithm, SlotId};
    use crate::use_cases::{from_dns, from_label, generate, to_dns};

    fn public_of(key: &EddsaKey) -> EddsaKey {
        let mut public = EddsaKey::new(key.algorithm());
        from_dns(&mut public, &to_dns(key).unwrap()).unwrap();
        public
    }

    /// Stores the last written file in memory
    #[derive(Default)]
    struct MemoryCodec {
        stored: Option<PrivateKeyFile>,
    }

    impl PrivateKeyCodec for MemoryCodec {
        fn write(&mut self, _key: &EddsaKey, file: &PrivateKeyFile) -> EddsaResult<()> {
            self.stored = Some(file.clone());
            Ok(())
        }

        fn read(&mut self, _key: &EddsaKey) -> EddsaResult<PrivateKeyFile> {
            self.stored
                .clone()
                .ok_or_else(|| EddsaError::private_file("nothing stored"))
        }
    }

    #[test]
    fn test_in_memory_key_roundtrip() {
        let token = SoftToken::new();
        let mut original = EddsaKey::new(Algorithm::Ed448);
        generate(&token, &mut original).unwrap();
        let mut public = public_of(&original);

        let mut codec = MemoryCodec::default();
        write_private_file(&mut codec, &original).unwrap();
        let stored = codec.stored.as_ref().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored.elements()[0].tag(), PrivateTag::PrivateKey);

        let mut restored = EddsaKey::new(Algorithm::Ed448);
        read_private_file(&mut codec, &token, &mut restored, Some(&mut public)).unwrap();
        assert!(restored.is_private());
        assert!(restored.compare(&original));
        assert_eq!(restored.key_size(), 456);
    }

    #[test]
    fn test_token_key_file_has_engine_and_label() {
        let token = SoftToken::new();
        token
            .import_token_key(SlotId(0), Algorithm::Ed25519, "ksk", b"\x01")
            .unwrap();
        let mut key = EddsaKey::new(Algorithm::Ed25519);
        from_label(&token, &mut key, Some("pkcs11"), "pkcs11:object=ksk").unwrap();

        let file = to_private_file(&key).unwrap();
        let tags: Vec<_> = file.elements().iter().map(|e| e.tag()).collect();
        assert_eq!(tags, vec![PrivateTag::Engine, PrivateTag::Label]);

        let mut public = public_of(&key);
        let mut restored = EddsaKey::new(Algorithm::Ed25519);
        parse_private_file(&token, &mut restored, &file, Some(&mut public)).unwrap();
        assert!(restored.is_on_token());
        assert_eq!(restored.engine(), Some("pkcs11"));
        assert_eq!(restored.label(), Some("pkcs11:object=ksk"));
    }

    #[test]
    fn test_null_key() {
        let key = EddsaKey::new(Algorithm::Ed25519);
        assert_eq!(to_private_file(&key).unwrap_err(), EddsaError::NullKey);
    }

    #[test]
    fn test_external_key() {
        let token = SoftToken::new();
        let mut original = EddsaKey::new(Algorithm::Ed25519);
        generate(&token, &mut original).unwrap();
        let mut public = public_of(&original);

        let mut external = EddsaKey::new_external(Algorithm::Ed25519);
        parse_private_file(
            &token,
            &mut external,
            &PrivateKeyFile::new(Algorithm::Ed25519),
            Some(&mut public),
        )
        .unwrap();
        assert!(!public.has_material());
        assert!(external.compare(&original));
        assert!(to_private_file(&external).unwrap().is_empty());
    }

    #[test]
    fn test_external_key_rejects_elements() {
        let token = SoftToken::new();
        let mut original = EddsaKey::new(Algorithm::Ed25519);
        generate(&token, &mut original).unwrap();
        let mut public = public_of(&original);
        let file = to_private_file(&original).unwrap();

        let mut external = EddsaKey::new_external(Algorithm::Ed25519);
        let result = parse_private_file(&token, &mut external, &file, Some(&mut public));
        assert!(matches!(result, Err(EddsaError::InvalidPrivateKeyFile { .. })));
        assert!(public.has_material());
    }

    #[test]
    fn test_public_key_required() {
        let token = SoftToken::new();
        let file = PrivateKeyFile::new(Algorithm::Ed25519);
        let mut key = EddsaKey::new(Algorithm::Ed25519);
        assert!(matches!(
            parse_private_file(&token, &mut key, &file, None),
            Err(EddsaError::InvalidPrivateKeyFile { .. })
        ));
        let mut empty = EddsaKey::new(Algorithm::Ed25519);
        assert!(matches!(
            parse_private_file(&token, &mut key, &file, Some(&mut empty)),
            Err(EddsaError::InvalidPrivateKeyFile { .. })
        ));
    }

    #[test]
    fn test_engine_without_label_rejected() {
        let token = SoftToken::new();
        let mut original = EddsaKey::new(Algorithm::Ed25519);
        generate(&token, &mut original).unwrap();
        let mut public = public_of(&original);
        let mut file = PrivateKeyFile::new(Algorithm::Ed25519);
        file.push(PrivateElement::c_string(PrivateTag::Engine, "pkcs11").unwrap());

        let mut key = EddsaKey::new(Algorithm::Ed25519);
        let result = parse_private_file(&token, &mut key, &file, Some(&mut public));
        assert!(matches!(result, Err(EddsaError::InvalidPrivateKeyFile { .. })));
        assert!(!key.has_material());
    }

    #[test]
    fn test_short_scalar_rejected() {
        let token = SoftToken::new();
        let mut original = EddsaKey::new(Algorithm::Ed25519);
        generate(&token, &mut original).unwrap();
        let mut public = public_of(&original);
        let mut file = PrivateKeyFile::new(Algorithm::Ed25519);
        file.push(PrivateElement::new(PrivateTag::PrivateKey, vec![1u8; 31]).unwrap());

        let mut key = EddsaKey::new(Algorithm::Ed25519);
        let result = parse_private_file(&token, &mut key, &file, Some(&mut public));
        assert!(matches!(result, Err(EddsaError::InvalidPrivateKeyFile { .. })));
        assert!(!key.has_material());
    }

    #[test]
    fn test_algorithm_mismatch_rejected() {
        let token = SoftToken::new();
        let mut original = EddsaKey::new(Algorithm::Ed25519);
        generate(&token, &mut original).unwrap();
        let mut public = public_of(&original);
        let file = PrivateKeyFile::new(Algorithm::Ed448);

        let mut key = EddsaKey::new(Algorithm::Ed25519);
        assert!(parse_private_file(&token, &mut key, &file, Some(&mut public)).is_err());
    }

    #[test]
    fn test_every_failure_wipes_key() {
        let token = SoftToken::new();
        let mut original = EddsaKey::new(Algorithm::Ed25519);
        generate(&token, &mut original).unwrap();
        let mut public = public_of(&original);
        let mut bad_label = PrivateKeyFile::new(Algorithm::Ed25519);
        bad_label.push(PrivateElement::new(PrivateTag::Label, vec![0xff, 0xfe, 0]).unwrap());

        let mut key = EddsaKey::new(Algorithm::Ed25519);
        from_dns(&mut key, &to_dns(&original).unwrap()).unwrap();
        let result = parse_private_file(&token, &mut key, &bad_label, Some(&mut public));
        assert!(matches!(result, Err(EddsaError::InvalidPrivateKeyFile { .. })));
        assert!(!key.has_material());

        from_dns(&mut key, &to_dns(&original).unwrap()).unwrap();
        assert!(parse_private_file(&token, &mut key, &bad_label, None).is_err());
        assert!(!key.has_material());

        from_dns(&mut key, &to_dns(&original).unwrap()).unwrap();
        let ed448 = PrivateKeyFile::new(Algorithm::Ed448);
        assert!(parse_private_file(&token, &mut key, &ed448, Some(&mut public)).is_err());
        assert!(!key.has_material());

        let mut external = EddsaKey::new_external(Algorithm::Ed25519);
        from_dns(&mut external, &to_dns(&original).unwrap()).unwrap();
        let file = to_private_file(&original).unwrap();
        assert!(parse_private_file(&token, &mut external, &file, Some(&mut public)).is_err());
        assert!(!external.has_material());
    }
}

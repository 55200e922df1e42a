//! DNS wire encoding of EdDSA public keys (RFC 8080): the raw point

use tracing::debug;

use crate::error::{EddsaError, EddsaResult};
use crate::model::{Attribute, AttributeType, EddsaKey, KeyMaterial};

/// Public key bytes as carried in a DNSKEY record
///
/// # Errors
///
/// - `EddsaError::KeyMaterialMissing` if the key has no public point
/// - `EddsaError::InvalidEncoding` if the stored point is malformed
pub fn to_dns(key: &EddsaKey) -> EddsaResult<Vec<u8>> {
    let point = key
        .material()
        .and_then(|material| material.get(AttributeType::EcPoint))
        .ok_or_else(|| EddsaError::KeyMaterialMissing {
            reason: "no public point to encode".to_string(),
        })?;
    Ok(point.raw_point(key.algorithm().point_len())?.to_vec())
}

/// Import DNSKEY public key bytes into `key`
///
/// An empty buffer is accepted and leaves the key untouched.
pub fn from_dns(key: &mut EddsaKey, data: &[u8]) -> EddsaResult<()> {
    if data.is_empty() {
        return Ok(());
    }
    let algorithm = key.algorithm();
    if data.len() != algorithm.point_len() {
        return Err(EddsaError::encoding(format!(
            "{} public key is {} bytes, expected {}",
            algorithm,
            data.len(),
            algorithm.point_len()
        )));
    }

    let mut material = KeyMaterial::new();
    material.set(AttributeType::EcParams, algorithm.ec_params().to_vec())?;
    material.insert(Attribute::ec_point(data)?)?;
    key.install(material, (data.len() * 8) as u32);
    debug!("Imported {} public key from wire format", algorithm);
    Ok(())
}

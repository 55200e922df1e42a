//! Generate key use case
//!
//! The HSM generates an ephemeral key pair; its attributes are copied into
//! process memory and both HSM objects are destroyed before returning.

use tracing::info;

use crate::error::{EddsaError, EddsaResult};
use crate::model::{Algorithm, Attribute, AttributeType, EddsaKey, KeyMaterial};
use crate::ports::{
    HsmCall, HsmSession, KeyType, Mechanism, ObjectClass, Operation, ScopedSession, SessionPool,
    SessionRequest, TemplateAttribute, TransientObject,
};

/// Generate a new in-memory key pair for `key`'s algorithm
///
/// On success the key holds `EC_PARAMS, EC_POINT, VALUE` and its key size
/// is set. On failure the key is left without material.
///
/// # Arguments
///
/// * `pool` - Session pool; the best slot for EdDSA is used, without login
/// * `key` - Key handle to materialize
///
/// # Errors
///
/// Returns errors if:
/// - No session can be acquired
/// - Any HSM call fails (`CryptoOperationFailure`)
pub fn generate<P>(pool: &P, key: &mut EddsaKey) -> EddsaResult<()>
where
    P: SessionPool + ?Sized,
{
    let algorithm = key.algorithm();
    match generate_material(pool, algorithm) {
        Ok(material) => {
            key.install(material, algorithm.key_bits());
            info!("Generated {} key pair", algorithm);
            Ok(())
        }
        Err(e) => {
            key.destroy();
            Err(e)
        }
    }
}

fn generate_material<P>(pool: &P, algorithm: Algorithm) -> EddsaResult<KeyMaterial>
where
    P: SessionPool + ?Sized,
{
    let slot = pool.best_slot(Operation::Eddsa)?;
    let session = ScopedSession::acquire(pool, &SessionRequest::eddsa(slot, false))?;

    let params = Attribute::from_slice(AttributeType::EcParams, algorithm.ec_params());
    let public_template = [
        TemplateAttribute::Class(ObjectClass::PublicKey),
        TemplateAttribute::KeyType(KeyType::EcEdwards),
        TemplateAttribute::Token(false),
        TemplateAttribute::Private(false),
        TemplateAttribute::Verify(true),
        TemplateAttribute::Bytes(params.clone()),
    ];
    let private_template = [
        TemplateAttribute::Class(ObjectClass::PrivateKey),
        TemplateAttribute::KeyType(KeyType::EcEdwards),
        TemplateAttribute::Token(false),
        TemplateAttribute::Private(false),
        TemplateAttribute::Sensitive(false),
        TemplateAttribute::Extractable(true),
        TemplateAttribute::Sign(true),
    ];

    let (public, private) = session.generate_key_pair(
        Mechanism::EcEdwardsKeyPairGen,
        &public_template,
        &private_template,
    )?;
    let public = TransientObject::new(&*session, public);
    let private = TransientObject::new(&*session, private);

    let mut material = KeyMaterial::new();
    material.insert(params)?;

    let point = single(
        session.get_attributes(public.handle(), &[AttributeType::EcPoint])?,
        AttributeType::EcPoint,
    )?;
    point
        .raw_point(algorithm.point_len())
        .map_err(|e| EddsaError::hsm(HsmCall::GetAttributes, e))?;
    material.insert(point)?;

    let value = single(
        session.get_attributes(private.handle(), &[AttributeType::Value])?,
        AttributeType::Value,
    )?;
    if value.len() != algorithm.scalar_len() {
        return Err(EddsaError::hsm(
            HsmCall::GetAttributes,
            format!("{} byte private scalar", value.len()),
        ));
    }
    material.insert(value)?;

    Ok(material)
}

fn single(attributes: Vec<Attribute>, kind: AttributeType) -> EddsaResult<Attribute> {
    attributes
        .into_iter()
        .find(|attr| attr.kind() == kind)
        .ok_or_else(|| EddsaError::hsm(HsmCall::GetAttributes, format!("no {:?} returned", kind)))
}

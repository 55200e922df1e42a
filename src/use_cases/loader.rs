//! Token-bound key loader
//!
//! Resolves a `pkcs11:` label to the objects of a key that lives
//! permanently on a token. The private scalar never leaves the token; the
//! key only keeps the private object's handle.

use tracing::{debug, info};

use crate::error::{EddsaError, EddsaResult};
use crate::model::{
    Algorithm, AttributeType, EddsaKey, KeyMaterial, ObjectHandle, SearchKey, SlotId, TokenUri,
};
use crate::ports::{
    HsmSession, KeyType, ObjectClass, Operation, ScopedSession, SessionPool, SessionRequest,
    TemplateAttribute,
};

/// Bind `key` to the token key named by `label`
///
/// The public object supplies the curve and the point; the private object
/// is located and kept by handle. On failure the key is left without
/// material.
///
/// # Errors
///
/// - `EddsaError::InvalidLabel` for a malformed URI
/// - `EddsaError::NotFound` / `EddsaError::AmbiguousMatch` when the search
///   does not yield exactly one object
/// - `EddsaError::InvalidAlgorithm` when the token key is on another curve
pub fn from_label<P>(
    pool: &P,
    key: &mut EddsaKey,
    engine: Option<&str>,
    label: &str,
) -> EddsaResult<()>
where
    P: SessionPool + ?Sized,
{
    let algorithm = key.algorithm();
    let result = TokenUri::parse(label).and_then(|uri| load_public(pool, algorithm, &uri));
    bind(key, result, engine, label)
}

/// Bind `key` to the private token object named by `label`, taking the
/// public half from the already loaded `public` key
///
/// # Errors
///
/// Returns `EddsaError::NoEngine` without a label
pub fn fetch<P>(
    pool: &P,
    key: &mut EddsaKey,
    engine: Option<&str>,
    label: Option<&str>,
    public: &EddsaKey,
) -> EddsaResult<()>
where
    P: SessionPool + ?Sized,
{
    let label = label.ok_or(EddsaError::NoEngine)?;
    let algorithm = key.algorithm();
    let result = TokenUri::parse(label).and_then(|uri| copy_public(pool, algorithm, &uri, public));
    bind(key, result, engine, label)
}

fn bind(
    key: &mut EddsaKey,
    result: EddsaResult<KeyMaterial>,
    engine: Option<&str>,
    label: &str,
) -> EddsaResult<()> {
    match result {
        Ok(material) => {
            let algorithm = key.algorithm();
            key.install(material, algorithm.key_bits());
            key.set_token_names(engine, label);
            info!("Bound {} key to token object {:?}", algorithm, label);
            Ok(())
        }
        Err(e) => {
            key.destroy();
            Err(e)
        }
    }
}

fn load_public<P>(pool: &P, algorithm: Algorithm, uri: &TokenUri) -> EddsaResult<KeyMaterial>
where
    P: SessionPool + ?Sized,
{
    let slot = resolve_slot(pool, uri)?;
    let session = ScopedSession::acquire(pool, &SessionRequest::eddsa(slot, uri.requires_login()))?;

    let public = find_one(&*session, ObjectClass::PublicKey, uri.search())?;
    let mut material = KeyMaterial::token_bound(slot, uri.requires_login());
    for attribute in
        session.get_attributes(public, &[AttributeType::EcParams, AttributeType::EcPoint])?
    {
        material.insert(attribute)?;
    }
    check_curve(&material, algorithm)?;

    let private = find_one(&*session, ObjectClass::PrivateKey, uri.search())?;
    material.bind_object(private);
    Ok(material)
}

fn copy_public<P>(
    pool: &P,
    algorithm: Algorithm,
    uri: &TokenUri,
    public: &EddsaKey,
) -> EddsaResult<KeyMaterial>
where
    P: SessionPool + ?Sized,
{
    let source = public
        .material()
        .ok_or_else(|| EddsaError::KeyMaterialMissing {
            reason: "public key has no material".to_string(),
        })?;
    let slot = resolve_slot(pool, uri)?;

    let mut material = KeyMaterial::token_bound(slot, uri.requires_login());
    for kind in [AttributeType::EcParams, AttributeType::EcPoint] {
        let attribute = source
            .get(kind)
            .ok_or_else(|| EddsaError::KeyMaterialMissing {
                reason: format!("public key has no {:?}", kind),
            })?;
        material.insert(attribute.clone())?;
    }
    check_curve(&material, algorithm)?;

    let session = ScopedSession::acquire(pool, &SessionRequest::eddsa(slot, uri.requires_login()))?;
    let private = find_one(&*session, ObjectClass::PrivateKey, uri.search())?;
    material.bind_object(private);
    Ok(material)
}

fn check_curve(material: &KeyMaterial, algorithm: Algorithm) -> EddsaResult<()> {
    let curve = material.algorithm()?;
    if curve != algorithm {
        return Err(EddsaError::InvalidAlgorithm {
            algorithm: format!("token key is {}, expected {}", curve, algorithm),
        });
    }
    if let Some(point) = material.get(AttributeType::EcPoint) {
        point.raw_point(algorithm.point_len())?;
    }
    Ok(())
}

/// `slot-id` wins, then the `token` label, then the pool's default
fn resolve_slot<P>(pool: &P, uri: &TokenUri) -> EddsaResult<SlotId>
where
    P: SessionPool + ?Sized,
{
    if let Some(slot) = uri.slot() {
        return Ok(slot);
    }
    match uri.token() {
        Some(token) => pool.slot_for_token(token),
        None => pool.best_slot(Operation::Eddsa),
    }
}

fn find_one<S>(session: &S, class: ObjectClass, search: &SearchKey) -> EddsaResult<ObjectHandle>
where
    S: HsmSession + ?Sized,
{
    let template = [
        TemplateAttribute::Class(class),
        TemplateAttribute::KeyType(KeyType::EcEdwards),
        TemplateAttribute::Token(true),
        TemplateAttribute::Bytes(search.to_attribute()),
    ];
    let found = session.find_objects(&template, 2)?;
    debug!("Search for {:?} {} found {} objects", class, search, found.len());
    match found.as_slice() {
        [] => Err(EddsaError::NotFound {
            search: search.to_string(),
        }),
        [handle] => Ok(*handle),
        _ => Err(EddsaError::AmbiguousMatch {
            search: search.to_string(),
            count: found.len(),
        }),
    }
}

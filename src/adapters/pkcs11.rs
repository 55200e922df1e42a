//! PKCS#11 implementation of the HSM ports
//!
//! Loads a PKCS#11 module through `cryptoki` and maps the port calls onto
//! sessions of that module. Object handles are translated through a
//! pool-wide registry, since `cryptoki` handles cannot be rebuilt from an
//! integer.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cryptoki::context::{CInitializeArgs, Pkcs11};
use cryptoki::error::{Error as CkError, RvError};
use cryptoki::mechanism::Mechanism as CkMechanism;
use cryptoki::object::{
    Attribute as CkAttribute, AttributeType as CkAttributeType, KeyType as CkKeyType,
    ObjectClass as CkObjectClass, ObjectHandle as CkObjectHandle,
};
use cryptoki::session::{Session, UserType};
use cryptoki::slot::Slot;
use cryptoki::types::AuthPin;
use tracing::{debug, info};
use zeroize::Zeroize;

use crate::config::HsmConfig;
use crate::error::{EddsaError, EddsaResult};
use crate::model::{Attribute, AttributeType, ObjectHandle, Pin, SlotId};
use crate::ports::{
    HsmCall, HsmSession, KeyType, Mechanism, ObjectClass, Operation, SessionPool,
    SessionRequest, TemplateAttribute,
};

/// Map between our handles and `cryptoki` ones
///
/// `cryptoki` handles are not `Hash`, so the reverse lookup is a scan.
#[derive(Debug, Default)]
struct HandleRegistry {
    by_id: HashMap<u64, CkObjectHandle>,
    next: u64,
}

impl HandleRegistry {
    fn register(&mut self, handle: CkObjectHandle) -> ObjectHandle {
        if let Some((id, _)) = self.by_id.iter().find(|(_, known)| **known == handle) {
            return ObjectHandle(*id);
        }
        self.next += 1;
        self.by_id.insert(self.next, handle);
        ObjectHandle(self.next)
    }

    fn resolve(&self, call: HsmCall, object: ObjectHandle) -> EddsaResult<CkObjectHandle> {
        self.by_id
            .get(&object.id())
            .copied()
            .ok_or_else(|| EddsaError::hsm(call, format!("{} is not valid", object)))
    }

    fn forget(&mut self, object: ObjectHandle) {
        self.by_id.remove(&object.id());
    }
}

type SharedRegistry = Arc<Mutex<HandleRegistry>>;

fn lock(registry: &SharedRegistry) -> MutexGuard<'_, HandleRegistry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Session pool over a loaded PKCS#11 module
pub struct Pkcs11Pool {
    context: Pkcs11,
    pin: Option<Pin>,
    token: Option<String>,
    handles: SharedRegistry,
}

impl std::fmt::Debug for Pkcs11Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pkcs11Pool")
            .field("pin", &self.pin)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

impl Pkcs11Pool {
    /// Load and initialize the module named by `config`
    ///
    /// # Errors
    ///
    /// Returns `EddsaError::SessionUnavailable` if no module is configured
    /// or it cannot be loaded
    pub fn open(config: &HsmConfig) -> EddsaResult<Self> {
        let module = config
            .module
            .as_ref()
            .ok_or_else(|| EddsaError::SessionUnavailable {
                reason: "no PKCS#11 module configured".to_string(),
            })?;
        let context = Pkcs11::new(module).map_err(|e| EddsaError::SessionUnavailable {
            reason: format!("cannot load {}: {}", module.display(), e),
        })?;
        context
            .initialize(CInitializeArgs::OsThreads)
            .map_err(|e| EddsaError::SessionUnavailable {
                reason: format!("cannot initialize {}: {}", module.display(), e),
            })?;
        info!("Loaded PKCS#11 module {}", module.display());

        Ok(Self {
            context,
            pin: config.pin.clone(),
            token: config.token.clone(),
            handles: Arc::new(Mutex::new(HandleRegistry::default())),
        })
    }

    fn slots(&self) -> EddsaResult<Vec<Slot>> {
        self.context
            .get_slots_with_token()
            .map_err(|e| EddsaError::SessionUnavailable {
                reason: format!("cannot list slots: {}", e),
            })
    }

    fn supports(&self, slot: Slot, operation: Operation) -> bool {
        let wanted = match operation {
            Operation::Eddsa => CkMechanism::Eddsa.mechanism_type(),
        };
        self.context
            .get_mechanism_list(slot)
            .map(|mechanisms| mechanisms.contains(&wanted))
            .unwrap_or(false)
    }

    fn login(&self, session: &Session) -> EddsaResult<()> {
        let pin = self
            .pin
            .as_ref()
            .ok_or_else(|| EddsaError::SessionUnavailable {
                reason: "login required but no user PIN configured".to_string(),
            })?;
        match session.login(UserType::User, Some(&AuthPin::new(pin.expose().to_string()))) {
            Ok(()) | Err(CkError::Pkcs11(RvError::UserAlreadyLoggedIn, ..)) => Ok(()),
            Err(e) => Err(EddsaError::SessionUnavailable {
                reason: format!("login failed: {}", e),
            }),
        }
    }
}

impl SessionPool for Pkcs11Pool {
    type Session = Pkcs11Session;

    fn best_slot(&self, operation: Operation) -> EddsaResult<SlotId> {
        if let Some(token) = &self.token {
            return self.slot_for_token(token);
        }
        self.slots()?
            .into_iter()
            .find(|slot| self.supports(*slot, operation))
            .map(|slot| SlotId(slot.id()))
            .ok_or_else(|| EddsaError::SessionUnavailable {
                reason: format!("no token supports {:?}", operation),
            })
    }

    fn slot_for_token(&self, token_label: &str) -> EddsaResult<SlotId> {
        for slot in self.slots()? {
            let info = self.context.get_token_info(slot).map_err(|e| {
                EddsaError::SessionUnavailable {
                    reason: format!("cannot read token info: {}", e),
                }
            })?;
            if info.label().trim_end() == token_label {
                return Ok(SlotId(slot.id()));
            }
        }
        Err(EddsaError::NotFound {
            search: format!("token {:?}", token_label),
        })
    }

    fn acquire(&self, request: &SessionRequest) -> EddsaResult<Pkcs11Session> {
        let slot = self
            .slots()?
            .into_iter()
            .find(|slot| slot.id() == request.slot.id())
            .ok_or_else(|| EddsaError::SessionUnavailable {
                reason: format!("no token in {}", request.slot),
            })?;
        let opened = if request.read_write {
            self.context.open_rw_session(slot)
        } else {
            self.context.open_ro_session(slot)
        };
        let session = opened.map_err(|e| EddsaError::SessionUnavailable {
            reason: format!("cannot open session on {}: {}", request.slot, e),
        })?;
        if request.login {
            self.login(&session)?;
        }
        Ok(Pkcs11Session {
            session,
            slot: request.slot,
            handles: Arc::clone(&self.handles),
            created: RefCell::new(Vec::new()),
        })
    }

    fn release(&self, session: &mut Pkcs11Session) {
        // Closing the session destroys its session objects; drop their ids.
        let created = session.created.take();
        let mut registry = lock(&self.handles);
        for object in created {
            registry.forget(object);
        }
    }
}

/// One open PKCS#11 session
pub struct Pkcs11Session {
    session: Session,
    slot: SlotId,
    handles: SharedRegistry,
    created: RefCell<Vec<ObjectHandle>>,
}

impl std::fmt::Debug for Pkcs11Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pkcs11Session")
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

impl Pkcs11Session {
    fn resolve(&self, call: HsmCall, object: ObjectHandle) -> EddsaResult<CkObjectHandle> {
        lock(&self.handles).resolve(call, object)
    }

    fn register(&self, handle: CkObjectHandle) -> ObjectHandle {
        lock(&self.handles).register(handle)
    }

    fn register_created(&self, handle: CkObjectHandle) -> ObjectHandle {
        let object = self.register(handle);
        self.created.borrow_mut().push(object);
        object
    }
}

fn failure(call: HsmCall) -> impl Fn(CkError) -> EddsaError {
    move |e| EddsaError::hsm(call, e)
}

/// A `cryptoki` template; byte values are wiped on drop
struct CkTemplate(Vec<CkAttribute>);

impl CkTemplate {
    fn new(template: &[TemplateAttribute]) -> Self {
        Self(template.iter().map(to_cryptoki).collect())
    }
}

impl Drop for CkTemplate {
    fn drop(&mut self) {
        for attribute in &mut self.0 {
            if let CkAttribute::Value(bytes) = attribute {
                bytes.zeroize();
            }
        }
    }
}

fn to_cryptoki(attribute: &TemplateAttribute) -> CkAttribute {
    match attribute {
        TemplateAttribute::Class(ObjectClass::PublicKey) => {
            CkAttribute::Class(CkObjectClass::PUBLIC_KEY)
        }
        TemplateAttribute::Class(ObjectClass::PrivateKey) => {
            CkAttribute::Class(CkObjectClass::PRIVATE_KEY)
        }
        TemplateAttribute::KeyType(KeyType::EcEdwards) => {
            CkAttribute::KeyType(CkKeyType::EC_EDWARDS)
        }
        TemplateAttribute::Token(v) => CkAttribute::Token(*v),
        TemplateAttribute::Private(v) => CkAttribute::Private(*v),
        TemplateAttribute::Sensitive(v) => CkAttribute::Sensitive(*v),
        TemplateAttribute::Extractable(v) => CkAttribute::Extractable(*v),
        TemplateAttribute::Sign(v) => CkAttribute::Sign(*v),
        TemplateAttribute::Verify(v) => CkAttribute::Verify(*v),
        TemplateAttribute::Bytes(attr) => {
            let bytes = attr.value().to_vec();
            match attr.kind() {
                AttributeType::EcParams => CkAttribute::EcParams(bytes),
                AttributeType::EcPoint => CkAttribute::EcPoint(bytes),
                AttributeType::Value => CkAttribute::Value(bytes),
                AttributeType::Label => CkAttribute::Label(bytes),
                AttributeType::Id => CkAttribute::Id(bytes),
            }
        }
    }
}

fn to_cryptoki_type(kind: AttributeType) -> CkAttributeType {
    match kind {
        AttributeType::EcParams => CkAttributeType::EcParams,
        AttributeType::EcPoint => CkAttributeType::EcPoint,
        AttributeType::Value => CkAttributeType::Value,
        AttributeType::Label => CkAttributeType::Label,
        AttributeType::Id => CkAttributeType::Id,
    }
}

fn from_cryptoki(attribute: CkAttribute) -> Option<Attribute> {
    let (kind, bytes) = match attribute {
        CkAttribute::EcParams(bytes) => (AttributeType::EcParams, bytes),
        CkAttribute::EcPoint(bytes) => (AttributeType::EcPoint, bytes),
        CkAttribute::Value(bytes) => (AttributeType::Value, bytes),
        CkAttribute::Label(bytes) => (AttributeType::Label, bytes),
        CkAttribute::Id(bytes) => (AttributeType::Id, bytes),
        _ => return None,
    };
    Some(Attribute::new(kind, bytes))
}

fn to_cryptoki_mechanism(mechanism: Mechanism) -> CkMechanism<'static> {
    match mechanism {
        Mechanism::EcEdwardsKeyPairGen => CkMechanism::EccEdwardsKeyPairGen,
        Mechanism::Eddsa => CkMechanism::Eddsa,
    }
}

impl HsmSession for Pkcs11Session {
    fn slot(&self) -> SlotId {
        self.slot
    }

    fn create_object(&self, template: &[TemplateAttribute]) -> EddsaResult<ObjectHandle> {
        let template = CkTemplate::new(template);
        let handle = self
            .session
            .create_object(&template.0)
            .map_err(failure(HsmCall::CreateObject))?;
        Ok(self.register_created(handle))
    }

    fn destroy_object(&self, object: ObjectHandle) -> EddsaResult<()> {
        let handle = self.resolve(HsmCall::DestroyObject, object)?;
        self.session
            .destroy_object(handle)
            .map_err(failure(HsmCall::DestroyObject))?;
        lock(&self.handles).forget(object);
        self.created.borrow_mut().retain(|created| *created != object);
        Ok(())
    }

    fn get_attributes(
        &self,
        object: ObjectHandle,
        kinds: &[AttributeType],
    ) -> EddsaResult<Vec<Attribute>> {
        let handle = self.resolve(HsmCall::GetAttributes, object)?;
        let wanted: Vec<CkAttributeType> = kinds.iter().copied().map(to_cryptoki_type).collect();
        let mut found: Vec<Attribute> = self
            .session
            .get_attributes(handle, &wanted)
            .map_err(failure(HsmCall::GetAttributes))?
            .into_iter()
            .filter_map(from_cryptoki)
            .collect();

        let mut ordered = Vec::with_capacity(kinds.len());
        for kind in kinds {
            let index = found
                .iter()
                .position(|attr| attr.kind() == *kind)
                .ok_or_else(|| {
                    EddsaError::hsm(
                        HsmCall::GetAttributes,
                        format!("{} has no readable {:?}", object, kind),
                    )
                })?;
            ordered.push(found.swap_remove(index));
        }
        Ok(ordered)
    }

    fn generate_key_pair(
        &self,
        mechanism: Mechanism,
        public_template: &[TemplateAttribute],
        private_template: &[TemplateAttribute],
    ) -> EddsaResult<(ObjectHandle, ObjectHandle)> {
        let public_template = CkTemplate::new(public_template);
        let private_template = CkTemplate::new(private_template);
        let (public, private) = self
            .session
            .generate_key_pair(
                &to_cryptoki_mechanism(mechanism),
                &public_template.0,
                &private_template.0,
            )
            .map_err(failure(HsmCall::GenerateKeyPair))?;
        debug!("Generated key pair on {}", self.slot);
        Ok((self.register_created(public), self.register_created(private)))
    }

    fn sign(&self, mechanism: Mechanism, key: ObjectHandle, data: &[u8]) -> EddsaResult<Vec<u8>> {
        let handle = self.resolve(HsmCall::Sign, key)?;
        self.session
            .sign(&to_cryptoki_mechanism(mechanism), handle, data)
            .map_err(failure(HsmCall::Sign))
    }

    fn verify(
        &self,
        mechanism: Mechanism,
        key: ObjectHandle,
        data: &[u8],
        signature: &[u8],
    ) -> EddsaResult<()> {
        let handle = self.resolve(HsmCall::Verify, key)?;
        match self
            .session
            .verify(&to_cryptoki_mechanism(mechanism), handle, data, signature)
        {
            Ok(()) => Ok(()),
            Err(CkError::Pkcs11(RvError::SignatureInvalid | RvError::SignatureLenRange, ..)) => {
                Err(EddsaError::VerificationFailed)
            }
            Err(e) => Err(EddsaError::hsm(HsmCall::Verify, e)),
        }
    }

    fn find_objects(
        &self,
        template: &[TemplateAttribute],
        max: usize,
    ) -> EddsaResult<Vec<ObjectHandle>> {
        let template = CkTemplate::new(template);
        let found = self
            .session
            .find_objects(&template.0)
            .map_err(failure(HsmCall::FindObjects))?;
        Ok(found
            .into_iter()
            .take(max)
            .map(|handle| self.register(handle))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract_tests_for;
    use crate::ports::contract_tests::hsm_contract;

    fn pool_from_env() -> Pkcs11Pool {
        let config = HsmConfig::from_env().expect("invalid PK11EDDSA_* environment");
        Pkcs11Pool::open(&config).expect("PK11EDDSA_MODULE must name a PKCS#11 module")
    }

    #[test]
    fn test_open_without_module() {
        let result = Pkcs11Pool::open(&HsmConfig::default());
        assert!(matches!(
            result,
            Err(EddsaError::SessionUnavailable { .. })
        ));
    }

    #[test]
    fn test_template_conversion() {
        let template = CkTemplate::new(&[
            TemplateAttribute::Class(ObjectClass::PrivateKey),
            TemplateAttribute::KeyType(KeyType::EcEdwards),
            TemplateAttribute::Token(false),
            TemplateAttribute::Bytes(Attribute::from_slice(AttributeType::Value, &[7u8; 32])),
        ]);
        assert_eq!(template.0.len(), 4);
        assert_eq!(
            template.0[0].attribute_type(),
            CkAttributeType::Class
        );
        assert!(matches!(&template.0[3], CkAttribute::Value(v) if v.len() == 32));
    }

    #[test]
    fn test_registry_rejects_unknown_handle() {
        let registry = HandleRegistry::default();
        assert!(registry
            .resolve(HsmCall::Sign, ObjectHandle(1))
            .is_err());
        assert_eq!(registry.next, 0);
    }

    // Requires a PKCS#11 module - enable with: --features hardware-tests
    contract_tests_for!(
        pkcs11_contract,
        attrs = { #[cfg_attr(not(feature = "hardware-tests"), ignore)] },
        make = pool_from_env,
        tests = {
            test_best_slot_available => hsm_contract::test_best_slot_available,
            test_session_released_on_drop => hsm_contract::test_session_released_on_drop,
            test_generate_key_pair_extractable => hsm_contract::test_generate_key_pair_extractable,
            test_sign_verify_ed25519 => hsm_contract::test_sign_verify_ed25519,
            test_sign_verify_ed448 => hsm_contract::test_sign_verify_ed448,
            test_verify_rejects_tampered_signature => hsm_contract::test_verify_rejects_tampered_signature,
            test_find_objects_without_match => hsm_contract::test_find_objects_without_match,
            test_destroy_unknown_object_fails => hsm_contract::test_destroy_unknown_object_fails,
            test_generated_key_roundtrips_through_wire => hsm_contract::test_generated_key_roundtrips_through_wire,
        }
    );
}

//! In-process software token
//!
//! Implements the HSM ports with real Ed25519/Ed448 arithmetic
//! (`ed25519-dalek`, `ed448-goldilocks-plus`) over an in-memory object
//! store. Used by the test suites and by the CLI when no PKCS#11 module
//! is configured.
//!
//! The token keeps the bookkeeping tests need: open sessions, session
//! objects, objects reclaimed at release. Failures can be injected per
//! HSM call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ed25519_dalek::{Signer as _, Verifier as _};
use rand::RngCore;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::error::{EddsaError, EddsaResult};
use crate::model::{Algorithm, Attribute, AttributeType, ObjectHandle, SlotId};
use crate::ports::{
    HsmCall, HsmSession, KeyType, Mechanism, ObjectClass, Operation, SessionPool,
    SessionRequest, TemplateAttribute,
};

/// Label of the slot every `SoftToken` starts with
pub const DEFAULT_TOKEN_LABEL: &str = "softtoken";

#[derive(Debug, Clone)]
struct SoftSlot {
    id: SlotId,
    label: String,
}

#[derive(Debug, Clone)]
struct SoftObject {
    slot: SlotId,
    class: ObjectClass,
    key_type: KeyType,
    token: bool,
    private: bool,
    sensitive: bool,
    extractable: bool,
    can_sign: bool,
    can_verify: bool,
    attributes: Vec<Attribute>,
    owner: Option<u64>,
}

impl SoftObject {
    fn from_template(
        slot: SlotId,
        owner: u64,
        template: &[TemplateAttribute],
    ) -> EddsaResult<Self> {
        let mut object = SoftObject {
            slot,
            class: ObjectClass::PublicKey,
            key_type: KeyType::EcEdwards,
            token: false,
            private: false,
            sensitive: false,
            extractable: true,
            can_sign: false,
            can_verify: false,
            attributes: Vec::new(),
            owner: None,
        };
        let mut class = None;
        for entry in template {
            match entry {
                TemplateAttribute::Class(c) => class = Some(*c),
                TemplateAttribute::KeyType(k) => object.key_type = *k,
                TemplateAttribute::Token(v) => object.token = *v,
                TemplateAttribute::Private(v) => object.private = *v,
                TemplateAttribute::Sensitive(v) => object.sensitive = *v,
                TemplateAttribute::Extractable(v) => object.extractable = *v,
                TemplateAttribute::Sign(v) => object.can_sign = *v,
                TemplateAttribute::Verify(v) => object.can_verify = *v,
                TemplateAttribute::Bytes(attr) => object.set(attr.clone()),
            }
        }
        object.class = class.ok_or_else(|| {
            EddsaError::hsm(HsmCall::CreateObject, "template incomplete: no class")
        })?;
        if !object.token {
            object.owner = Some(owner);
        }
        Ok(object)
    }

    fn set(&mut self, attribute: Attribute) {
        match self
            .attributes
            .iter_mut()
            .find(|attr| attr.kind() == attribute.kind())
        {
            Some(slot) => *slot = attribute,
            None => self.attributes.push(attribute),
        }
    }

    fn get(&self, kind: AttributeType) -> Option<&Attribute> {
        self.attributes.iter().find(|attr| attr.kind() == kind)
    }

    fn algorithm(&self, call: HsmCall) -> EddsaResult<Algorithm> {
        let params = self
            .get(AttributeType::EcParams)
            .ok_or_else(|| EddsaError::hsm(call, "key has no EC parameters"))?;
        Algorithm::from_ec_params(params.value()).map_err(|e| EddsaError::hsm(call, e))
    }

    fn matches(&self, criterion: &TemplateAttribute) -> bool {
        match criterion {
            TemplateAttribute::Class(c) => self.class == *c,
            TemplateAttribute::KeyType(k) => self.key_type == *k,
            TemplateAttribute::Token(v) => self.token == *v,
            TemplateAttribute::Private(v) => self.private == *v,
            TemplateAttribute::Sensitive(v) => self.sensitive == *v,
            TemplateAttribute::Extractable(v) => self.extractable == *v,
            TemplateAttribute::Sign(v) => self.can_sign == *v,
            TemplateAttribute::Verify(v) => self.can_verify == *v,
            TemplateAttribute::Bytes(attr) => self
                .get(attr.kind())
                .is_some_and(|own| own.value() == attr.value()),
        }
    }
}

#[derive(Debug, Default)]
struct TokenState {
    slots: Vec<SoftSlot>,
    objects: HashMap<u64, SoftObject>,
    next_handle: u64,
    next_session: u64,
    open_sessions: usize,
    sessions_opened: usize,
    reclaimed_objects: usize,
    failures: Vec<HsmCall>,
    unavailable: bool,
}

impl TokenState {
    fn take_failure(&mut self, call: HsmCall) -> EddsaResult<()> {
        match self.failures.iter().position(|f| *f == call) {
            Some(index) => {
                self.failures.remove(index);
                Err(EddsaError::hsm(call, "injected failure"))
            }
            None => Ok(()),
        }
    }

    fn store(&mut self, object: SoftObject) -> ObjectHandle {
        self.next_handle += 1;
        self.objects.insert(self.next_handle, object);
        ObjectHandle(self.next_handle)
    }
}

/// Software PKCS#11 token, shareable between pools and tests
#[derive(Debug, Clone)]
pub struct SoftToken {
    state: Arc<Mutex<TokenState>>,
}

impl Default for SoftToken {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftToken {
    /// A token with one empty slot labelled `softtoken`
    pub fn new() -> Self {
        let state = TokenState {
            slots: vec![SoftSlot {
                id: SlotId(0),
                label: DEFAULT_TOKEN_LABEL.to_string(),
            }],
            ..TokenState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TokenState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add another slot carrying a token with `label`
    pub fn add_slot(&self, label: &str) -> SlotId {
        let mut state = self.lock();
        let id = SlotId(state.slots.len() as u64);
        state.slots.push(SoftSlot {
            id,
            label: label.to_string(),
        });
        id
    }

    /// Make the next call of kind `call` fail
    pub fn fail_next(&self, call: HsmCall) {
        self.lock().failures.push(call);
    }

    /// While set, no session can be acquired
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    pub fn open_sessions(&self) -> usize {
        self.lock().open_sessions
    }

    /// Sessions acquired over the token's lifetime
    pub fn sessions_opened(&self) -> usize {
        self.lock().sessions_opened
    }

    /// Live session (non-token) objects
    pub fn session_object_count(&self) -> usize {
        self.lock().objects.values().filter(|o| !o.token).count()
    }

    pub fn token_object_count(&self) -> usize {
        self.lock().objects.values().filter(|o| o.token).count()
    }

    /// Session objects a release had to clean up because their creator
    /// left them behind
    pub fn reclaimed_objects(&self) -> usize {
        self.lock().reclaimed_objects
    }

    /// Provision a persistent EdDSA key pair on `slot`
    ///
    /// The private half is a private, sensitive object; the public half is
    /// public. Both carry `label` and `id`. Returns the raw public point.
    pub fn import_token_key(
        &self,
        slot: SlotId,
        algorithm: Algorithm,
        label: &str,
        id: &[u8],
    ) -> EddsaResult<Vec<u8>> {
        let seed = random_seed(algorithm);
        let point = public_point(algorithm, &seed, HsmCall::CreateObject)?;

        let mut public = SoftObject {
            slot,
            class: ObjectClass::PublicKey,
            key_type: KeyType::EcEdwards,
            token: true,
            private: false,
            sensitive: false,
            extractable: true,
            can_sign: false,
            can_verify: true,
            attributes: Vec::new(),
            owner: None,
        };
        public.set(Attribute::from_slice(
            AttributeType::EcParams,
            algorithm.ec_params(),
        ));
        public.set(Attribute::ec_point(&point)?);
        public.set(Attribute::from_slice(AttributeType::Label, label.as_bytes()));
        public.set(Attribute::from_slice(AttributeType::Id, id));

        let mut private = public.clone();
        private.class = ObjectClass::PrivateKey;
        private.private = true;
        private.sensitive = true;
        private.extractable = false;
        private.can_sign = true;
        private.can_verify = false;
        private.set(Attribute::from_slice(AttributeType::Value, &seed));

        let mut state = self.lock();
        state.store(public);
        state.store(private);
        debug!("Provisioned {} token key {:?} on {}", algorithm, label, slot);
        Ok(point)
    }
}

impl SessionPool for SoftToken {
    type Session = SoftSession;

    fn best_slot(&self, _operation: Operation) -> EddsaResult<SlotId> {
        let state = self.lock();
        if state.unavailable {
            return Err(EddsaError::SessionUnavailable {
                reason: "token removed".to_string(),
            });
        }
        state
            .slots
            .first()
            .map(|slot| slot.id)
            .ok_or_else(|| EddsaError::SessionUnavailable {
                reason: "no slot with a token".to_string(),
            })
    }

    fn slot_for_token(&self, token_label: &str) -> EddsaResult<SlotId> {
        self.lock()
            .slots
            .iter()
            .find(|slot| slot.label == token_label)
            .map(|slot| slot.id)
            .ok_or_else(|| EddsaError::NotFound {
                search: format!("token {:?}", token_label),
            })
    }

    fn acquire(&self, request: &SessionRequest) -> EddsaResult<SoftSession> {
        let mut state = self.lock();
        if state.unavailable {
            return Err(EddsaError::SessionUnavailable {
                reason: "token removed".to_string(),
            });
        }
        if !state.slots.iter().any(|slot| slot.id == request.slot) {
            return Err(EddsaError::SessionUnavailable {
                reason: format!("no token in {}", request.slot),
            });
        }
        for call in [HsmCall::OpenSession, HsmCall::Login] {
            if call == HsmCall::Login && !request.login {
                continue;
            }
            state
                .take_failure(call)
                .map_err(|e| EddsaError::SessionUnavailable {
                    reason: e.to_string(),
                })?;
        }

        state.next_session += 1;
        state.open_sessions += 1;
        state.sessions_opened += 1;
        Ok(SoftSession {
            state: Arc::clone(&self.state),
            id: state.next_session,
            slot: request.slot,
            logged_in: request.login,
            read_write: request.read_write,
            released: false,
        })
    }

    fn release(&self, session: &mut SoftSession) {
        if session.released {
            return;
        }
        session.released = true;

        let mut state = self.lock();
        let before = state.objects.len();
        state
            .objects
            .retain(|_, object| object.owner != Some(session.id));
        let leaked = before - state.objects.len();
        if leaked > 0 {
            warn!("Session {} left {} objects behind", session.id, leaked);
            state.reclaimed_objects += leaked;
        }
        state.open_sessions -= 1;
    }
}

/// One session on a `SoftToken` slot
#[derive(Debug)]
pub struct SoftSession {
    state: Arc<Mutex<TokenState>>,
    id: u64,
    slot: SlotId,
    logged_in: bool,
    read_write: bool,
    released: bool,
}

impl SoftSession {
    fn lock(&self) -> MutexGuard<'_, TokenState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn visible(&self, object: &SoftObject) -> bool {
        object.slot == self.slot && (!object.private || self.logged_in)
    }

    /// Run `f` on a visible object, or fail the call with an invalid handle
    fn with_object<T>(
        &self,
        call: HsmCall,
        handle: ObjectHandle,
        f: impl FnOnce(&SoftObject) -> EddsaResult<T>,
    ) -> EddsaResult<T> {
        let mut state = self.lock();
        state.take_failure(call)?;
        match state.objects.get(&handle.id()) {
            Some(object) if self.visible(object) => f(object),
            _ => Err(EddsaError::hsm(call, format!("{} is not valid", handle))),
        }
    }
}

impl HsmSession for SoftSession {
    fn slot(&self) -> SlotId {
        self.slot
    }

    fn create_object(&self, template: &[TemplateAttribute]) -> EddsaResult<ObjectHandle> {
        let object = SoftObject::from_template(self.slot, self.id, template)?;
        object.algorithm(HsmCall::CreateObject)?;
        if object.token && !self.read_write {
            return Err(EddsaError::hsm(HsmCall::CreateObject, "session is read-only"));
        }
        let mut state = self.lock();
        state.take_failure(HsmCall::CreateObject)?;
        let handle = state.store(object);
        debug!("Created {} in session {}", handle, self.id);
        Ok(handle)
    }

    fn destroy_object(&self, object: ObjectHandle) -> EddsaResult<()> {
        let mut state = self.lock();
        state.take_failure(HsmCall::DestroyObject)?;
        let valid = state
            .objects
            .get(&object.id())
            .is_some_and(|found| self.visible(found));
        if !valid {
            return Err(EddsaError::hsm(
                HsmCall::DestroyObject,
                format!("{} is not valid", object),
            ));
        }
        state.objects.remove(&object.id());
        Ok(())
    }

    fn get_attributes(
        &self,
        object: ObjectHandle,
        kinds: &[AttributeType],
    ) -> EddsaResult<Vec<Attribute>> {
        self.with_object(HsmCall::GetAttributes, object, |found| {
            kinds
                .iter()
                .map(|kind| {
                    if kind.is_secret() && (found.sensitive || !found.extractable) {
                        return Err(EddsaError::hsm(
                            HsmCall::GetAttributes,
                            format!("{:?} is sensitive", kind),
                        ));
                    }
                    found.get(*kind).cloned().ok_or_else(|| {
                        EddsaError::hsm(
                            HsmCall::GetAttributes,
                            format!("{} has no {:?}", object, kind),
                        )
                    })
                })
                .collect()
        })
    }

    fn generate_key_pair(
        &self,
        mechanism: Mechanism,
        public_template: &[TemplateAttribute],
        private_template: &[TemplateAttribute],
    ) -> EddsaResult<(ObjectHandle, ObjectHandle)> {
        if mechanism != Mechanism::EcEdwardsKeyPairGen {
            return Err(EddsaError::hsm(
                HsmCall::GenerateKeyPair,
                format!("mechanism {:?} cannot generate keys", mechanism),
            ));
        }
        let mut public =
            SoftObject::from_template(self.slot, self.id, public_template).map_err(|_| {
                EddsaError::hsm(HsmCall::GenerateKeyPair, "public template incomplete")
            })?;
        let mut private =
            SoftObject::from_template(self.slot, self.id, private_template).map_err(|_| {
                EddsaError::hsm(HsmCall::GenerateKeyPair, "private template incomplete")
            })?;
        let algorithm = public.algorithm(HsmCall::GenerateKeyPair)?;

        let seed = random_seed(algorithm);
        let point = public_point(algorithm, &seed, HsmCall::GenerateKeyPair)?;
        public.set(Attribute::ec_point(&point)?);
        if let Some(params) = public.get(AttributeType::EcParams).cloned() {
            private.set(params);
        }
        private.set(Attribute::from_slice(AttributeType::Value, &seed));

        let mut state = self.lock();
        state.take_failure(HsmCall::GenerateKeyPair)?;
        let public = state.store(public);
        let private = state.store(private);
        debug!("Generated {} key pair in session {}", algorithm, self.id);
        Ok((public, private))
    }

    fn sign(&self, mechanism: Mechanism, key: ObjectHandle, data: &[u8]) -> EddsaResult<Vec<u8>> {
        if mechanism != Mechanism::Eddsa {
            return Err(EddsaError::hsm(HsmCall::Sign, "mechanism invalid"));
        }
        self.with_object(HsmCall::Sign, key, |found| {
            if found.class != ObjectClass::PrivateKey || !found.can_sign {
                return Err(EddsaError::hsm(HsmCall::Sign, "key cannot sign"));
            }
            let algorithm = found.algorithm(HsmCall::Sign)?;
            let seed = found
                .get(AttributeType::Value)
                .ok_or_else(|| EddsaError::hsm(HsmCall::Sign, "key has no value"))?;
            sign_raw(algorithm, seed.value(), data)
        })
    }

    fn verify(
        &self,
        mechanism: Mechanism,
        key: ObjectHandle,
        data: &[u8],
        signature: &[u8],
    ) -> EddsaResult<()> {
        if mechanism != Mechanism::Eddsa {
            return Err(EddsaError::hsm(HsmCall::Verify, "mechanism invalid"));
        }
        self.with_object(HsmCall::Verify, key, |found| {
            if found.class != ObjectClass::PublicKey || !found.can_verify {
                return Err(EddsaError::hsm(HsmCall::Verify, "key cannot verify"));
            }
            let algorithm = found.algorithm(HsmCall::Verify)?;
            let point = found
                .get(AttributeType::EcPoint)
                .ok_or_else(|| EddsaError::hsm(HsmCall::Verify, "key has no EC point"))?
                .raw_point(algorithm.point_len())
                .map_err(|e| EddsaError::hsm(HsmCall::Verify, e))?;
            verify_raw(algorithm, point, data, signature)
        })
    }

    fn find_objects(
        &self,
        template: &[TemplateAttribute],
        max: usize,
    ) -> EddsaResult<Vec<ObjectHandle>> {
        let mut state = self.lock();
        state.take_failure(HsmCall::FindObjects)?;
        let mut found: Vec<u64> = state
            .objects
            .iter()
            .filter(|(_, object)| self.visible(object))
            .filter(|(_, object)| template.iter().all(|c| object.matches(c)))
            .map(|(handle, _)| *handle)
            .collect();
        found.sort_unstable();
        found.truncate(max);
        Ok(found.into_iter().map(ObjectHandle).collect())
    }
}

fn random_seed(algorithm: Algorithm) -> Zeroizing<Vec<u8>> {
    let mut seed = Zeroizing::new(vec![0u8; algorithm.scalar_len()]);
    rand::rng().fill_bytes(&mut seed);
    seed
}

fn public_point(algorithm: Algorithm, seed: &[u8], call: HsmCall) -> EddsaResult<Vec<u8>> {
    match algorithm {
        Algorithm::Ed25519 => {
            let key = ed25519_signing_key(seed, call)?;
            Ok(key.verifying_key().to_bytes().to_vec())
        }
        Algorithm::Ed448 => {
            let key = ed448_goldilocks_plus::SigningKey::try_from(seed)
                .map_err(|_| EddsaError::hsm(call, "Ed448 seed rejected"))?;
            Ok(key.verifying_key().to_bytes().to_vec())
        }
    }
}

fn ed25519_signing_key(seed: &[u8], call: HsmCall) -> EddsaResult<ed25519_dalek::SigningKey> {
    let bytes: Zeroizing<[u8; 32]> = Zeroizing::new(
        seed.try_into()
            .map_err(|_| EddsaError::hsm(call, format!("Ed25519 seed of {} bytes", seed.len())))?,
    );
    Ok(ed25519_dalek::SigningKey::from_bytes(&bytes))
}

fn sign_raw(algorithm: Algorithm, seed: &[u8], data: &[u8]) -> EddsaResult<Vec<u8>> {
    match algorithm {
        Algorithm::Ed25519 => {
            let key = ed25519_signing_key(seed, HsmCall::Sign)?;
            Ok(key.sign(data).to_bytes().to_vec())
        }
        Algorithm::Ed448 => {
            let key = ed448_goldilocks_plus::SigningKey::try_from(seed)
                .map_err(|_| EddsaError::hsm(HsmCall::Sign, "Ed448 seed rejected"))?;
            Ok(key.sign_raw(data).to_bytes().to_vec())
        }
    }
}

fn verify_raw(algorithm: Algorithm, point: &[u8], data: &[u8], signature: &[u8]) -> EddsaResult<()> {
    if signature.len() != algorithm.signature_len() {
        return Err(EddsaError::VerificationFailed);
    }
    match algorithm {
        Algorithm::Ed25519 => {
            let point: [u8; 32] = point
                .try_into()
                .map_err(|_| EddsaError::hsm(HsmCall::Verify, "Ed25519 point length"))?;
            let key = ed25519_dalek::VerifyingKey::from_bytes(&point)
                .map_err(|e| EddsaError::hsm(HsmCall::Verify, e))?;
            let signature = ed25519_dalek::Signature::from_slice(signature)
                .map_err(|_| EddsaError::VerificationFailed)?;
            key.verify(data, &signature)
                .map_err(|_| EddsaError::VerificationFailed)
        }
        Algorithm::Ed448 => {
            let point: &[u8; 57] = point
                .try_into()
                .map_err(|_| EddsaError::hsm(HsmCall::Verify, "Ed448 point length"))?;
            let key = ed448_goldilocks_plus::VerifyingKey::from_bytes(point)
                .map_err(|_| EddsaError::hsm(HsmCall::Verify, "Ed448 point rejected"))?;
            let signature = ed448_goldilocks_plus::Signature::try_from(signature)
                .map_err(|_| EddsaError::VerificationFailed)?;
            key.verify_raw(&signature, data)
                .map_err(|_| EddsaError::VerificationFailed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract_tests_for;
    use crate::ports::contract_tests::hsm_contract;
    use crate::ports::ScopedSession;

    contract_tests_for!(
        soft_token_contract,
        make = SoftToken::new,
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

    fn session(token: &SoftToken, login: bool) -> ScopedSession<'_, SoftToken> {
        ScopedSession::acquire(token, &SessionRequest::eddsa(SlotId(0), login)).unwrap()
    }

    #[test]
    fn test_release_reclaims_session_objects() {
        let token = SoftToken::new();
        {
            let session = session(&token, false);
            session
                .create_object(&[
                    TemplateAttribute::Class(ObjectClass::PublicKey),
                    TemplateAttribute::Bytes(Attribute::from_slice(
                        AttributeType::EcParams,
                        Algorithm::Ed25519.ec_params(),
                    )),
                ])
                .unwrap();
            assert_eq!(token.session_object_count(), 1);
        }
        assert_eq!(token.session_object_count(), 0);
        assert_eq!(token.reclaimed_objects(), 1);
        assert_eq!(token.open_sessions(), 0);
    }

    #[test]
    fn test_private_objects_need_login() {
        let token = SoftToken::new();
        token
            .import_token_key(SlotId(0), Algorithm::Ed25519, "ksk", b"\x01")
            .unwrap();
        let template = [TemplateAttribute::Class(ObjectClass::PrivateKey)];

        assert!(session(&token, false).find_objects(&template, 2).unwrap().is_empty());
        assert_eq!(session(&token, true).find_objects(&template, 2).unwrap().len(), 1);
    }

    #[test]
    fn test_sensitive_value_not_readable() {
        let token = SoftToken::new();
        token
            .import_token_key(SlotId(0), Algorithm::Ed448, "ksk", b"\x01")
            .unwrap();
        let session = session(&token, true);
        let private = session
            .find_objects(&[TemplateAttribute::Class(ObjectClass::PrivateKey)], 1)
            .unwrap()[0];
        let result = session.get_attributes(private, &[AttributeType::Value]);
        assert!(matches!(
            result,
            Err(EddsaError::CryptoOperationFailure {
                operation: HsmCall::GetAttributes,
                ..
            })
        ));
    }

    #[test]
    fn test_injected_failure_fires_once() {
        let token = SoftToken::new();
        token.fail_next(HsmCall::FindObjects);
        let session = session(&token, false);
        assert!(session.find_objects(&[], 1).is_err());
        assert!(session.find_objects(&[], 1).is_ok());
    }

    #[test]
    fn test_unavailable_token() {
        let token = SoftToken::new();
        token.set_unavailable(true);
        assert!(matches!(
            token.best_slot(Operation::Eddsa),
            Err(EddsaError::SessionUnavailable { .. })
        ));
        assert!(token
            .acquire(&SessionRequest::eddsa(SlotId(0), false))
            .is_err());
        assert_eq!(token.open_sessions(), 0);
    }

    #[test]
    fn test_slot_for_token() {
        let token = SoftToken::new();
        let second = token.add_slot("dnssec");
        assert_eq!(token.slot_for_token("dnssec").unwrap(), second);
        assert!(matches!(
            token.slot_for_token("missing"),
            Err(EddsaError::NotFound { .. })
        ));
    }

    #[test]
    fn test_objects_scoped_to_slot() {
        let token = SoftToken::new();
        let other = token.add_slot("other");
        token
            .import_token_key(other, Algorithm::Ed25519, "zsk", b"\x02")
            .unwrap();
        let session = session(&token, true);
        assert!(session.find_objects(&[], 10).unwrap().is_empty());
    }
}

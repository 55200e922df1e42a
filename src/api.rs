use crate::error::{EddsaError, EddsaResult};
use crate::ports::{PrivateKeyCodec, SessionPool};
use crate::use_cases::{
    fetch as fetch_use_case, from_dns, from_label as from_label_use_case,
    generate as generate_use_case, read_private_file as read_private_file_use_case, to_dns,
    write_private_file as write_private_file_use_case, ContextUsage, SigningContext,
};

pub use crate::model::*;

/// EdDSA key backend over one session pool
///
/// Thin façade for callers that want one object per HSM; every method
/// delegates to the matching use case.
#[derive(Debug)]
pub struct EddsaProvider<P: SessionPool> {
    pool: P,
}

impl<P: SessionPool> EddsaProvider<P> {
    pub fn new(pool: P) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    /// Generate a fresh key pair on the HSM and extract it
    pub fn generate(&self, algorithm: Algorithm) -> EddsaResult<EddsaKey> {
        let mut key = EddsaKey::new(algorithm);
        generate_use_case(&self.pool, &mut key)?;
        Ok(key)
    }

    /// Load a token-resident key by its `pkcs11:` label
    pub fn from_label(
        &self,
        algorithm: Algorithm,
        engine: Option<&str>,
        label: &str,
    ) -> EddsaResult<EddsaKey> {
        let mut key = EddsaKey::new(algorithm);
        from_label_use_case(&self.pool, &mut key, engine, label)?;
        Ok(key)
    }

    /// Bind the private half named by `label` to an already loaded public key
    pub fn fetch(
        &self,
        public: &EddsaKey,
        engine: Option<&str>,
        label: Option<&str>,
    ) -> EddsaResult<EddsaKey> {
        let mut key = EddsaKey::new(public.algorithm());
        fetch_use_case(&self.pool, &mut key, engine, label, public)?;
        Ok(key)
    }

    /// Public key from its DNSKEY wire form
    pub fn public_from_dns(&self, algorithm: Algorithm, data: &[u8]) -> EddsaResult<EddsaKey> {
        let mut key = EddsaKey::new(algorithm);
        from_dns(&mut key, data)?;
        Ok(key)
    }

    pub fn to_dns(&self, key: &EddsaKey) -> EddsaResult<Vec<u8>> {
        to_dns(key)
    }

    pub fn context<'a>(
        &'a self,
        key: &'a EddsaKey,
        usage: ContextUsage,
    ) -> EddsaResult<SigningContext<'a, P>> {
        SigningContext::new(&self.pool, key, usage)
    }

    /// One-shot signature over `data`
    pub fn sign(&self, key: &EddsaKey, data: &[u8]) -> EddsaResult<Vec<u8>> {
        let mut ctx = self.context(key, ContextUsage::Sign)?;
        ctx.update(data);
        ctx.sign_to_vec()
    }

    /// One-shot verification of `signature` over `data`
    ///
    /// # Errors
    ///
    /// Returns `EddsaError::VerificationFailed` for a bad signature
    pub fn verify(&self, key: &EddsaKey, data: &[u8], signature: &[u8]) -> EddsaResult<()> {
        let mut ctx = self.context(key, ContextUsage::Verify)?;
        ctx.update(data);
        ctx.verify(signature)
    }

    pub fn write_private_file<C>(&self, codec: &mut C, key: &EddsaKey) -> EddsaResult<()>
    where
        C: PrivateKeyCodec + ?Sized,
    {
        write_private_file_use_case(codec, key)
    }

    /// Read a private key through `codec`, completing `public`
    ///
    /// External keys take over `public`'s material, which leaves `public`
    /// empty.
    pub fn read_private_file<C>(
        &self,
        codec: &mut C,
        key: &mut EddsaKey,
        public: &mut EddsaKey,
    ) -> EddsaResult<()>
    where
        C: PrivateKeyCodec + ?Sized,
    {
        if !public.has_material() {
            return Err(EddsaError::private_file("public key required"));
        }
        read_private_file_use_case(codec, &self.pool, key, Some(public))
    }
}

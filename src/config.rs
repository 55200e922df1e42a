//! HSM connection settings

use std::path::PathBuf;

use crate::error::EddsaResult;
use crate::model::Pin;

/// Path of the PKCS#11 module to load
pub const MODULE_ENV: &str = "PK11EDDSA_MODULE";
/// User PIN for token logins
pub const PIN_ENV: &str = "PK11EDDSA_PIN";
/// Label of the token keys are generated and used on by default
pub const TOKEN_ENV: &str = "PK11EDDSA_TOKEN";

/// Configuration for `Pkcs11Pool`
///
/// Without a module the CLI falls back to the in-process software token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HsmConfig {
    /// PKCS#11 module (`.so`) path
    pub module: Option<PathBuf>,
    /// User PIN, needed for token-bound keys
    pub pin: Option<Pin>,
    /// Token label preferred by the best-slot policy
    pub token: Option<String>,
}

impl HsmConfig {
    /// Read `PK11EDDSA_MODULE`, `PK11EDDSA_PIN` and `PK11EDDSA_TOKEN`
    ///
    /// Unset or empty variables leave the field at its default.
    pub fn from_env() -> EddsaResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> EddsaResult<Self> {
        let get = |name: &str| lookup(name).filter(|value| !value.is_empty());
        Ok(Self {
            module: get(MODULE_ENV).map(PathBuf::from),
            pin: get(PIN_ENV).map(Pin::new).transpose()?,
            token: get(TOKEN_ENV),
        })
    }

    pub fn with_module(mut self, module: impl Into<PathBuf>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn with_pin(mut self, pin: Pin) -> Self {
        self.pin = Some(pin);
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

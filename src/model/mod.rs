mod algorithm;
mod attribute;
mod key;
mod key_material;
mod pin;
mod private_file;
mod slot;
mod token_uri;

pub use algorithm::Algorithm;
pub use attribute::{Attribute, AttributeType, TAG_OCTET_STRING};
pub use key::EddsaKey;
pub use key_material::KeyMaterial;
pub use pin::Pin;
pub use private_file::{PrivateElement, PrivateKeyFile, PrivateTag};
pub use slot::{ObjectHandle, SlotId, TokenObject};
pub use token_uri::{SearchKey, TokenUri};

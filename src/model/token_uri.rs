//! PKCS#11 URIs naming token-resident keys (RFC 7512 subset)

use std::str::FromStr;

use crate::error::{EddsaError, EddsaResult};
use crate::model::{Attribute, AttributeType, SlotId};

const SCHEME: &str = "pkcs11:";

/// What a token search matches on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchKey {
    /// `CKA_LABEL`
    Label(String),
    /// `CKA_ID`
    Id(Vec<u8>),
}

impl SearchKey {
    /// The attribute a search template matches against
    pub fn to_attribute(&self) -> Attribute {
        match self {
            SearchKey::Label(label) => Attribute::from_slice(AttributeType::Label, label.as_bytes()),
            SearchKey::Id(id) => Attribute::from_slice(AttributeType::Id, id),
        }
    }
}

impl std::fmt::Display for SearchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchKey::Label(label) => write!(f, "label {:?}", label),
            SearchKey::Id(id) => write!(f, "id {}", hex::encode(id)),
        }
    }
}

/// A parsed `pkcs11:` URI
///
/// Recognized path attributes: `token`, `slot-id`, `object`, `id`.
/// `pin-source` is accepted in the path or the query. Other attributes
/// (`model`, `manufacturer`, `serial`, `type`, ...) are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenUri {
    token: Option<String>,
    slot: Option<SlotId>,
    search: SearchKey,
    pin_source: Option<String>,
}

impl TokenUri {
    pub fn parse(uri: &str) -> EddsaResult<Self> {
        let rest = uri
            .strip_prefix(SCHEME)
            .ok_or_else(|| invalid(format!("{:?} is not a pkcs11: URI", uri)))?;
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };

        let mut token = None;
        let mut slot = None;
        let mut object = None;
        let mut id = None;
        let mut pin_source = None;

        let path_attrs = path.split(';').filter(|part| !part.is_empty());
        let query_attrs = query
            .into_iter()
            .flat_map(|q| q.split('&'))
            .filter(|part| !part.is_empty());

        for part in path_attrs.chain(query_attrs) {
            let (name, value) = part
                .split_once('=')
                .ok_or_else(|| invalid(format!("attribute {:?} has no value", part)))?;
            let value = percent_decode(value)?;
            match name {
                "token" => token = Some(into_text(name, value)?),
                "object" => object = Some(into_text(name, value)?),
                "id" => id = Some(value),
                "pin-source" => pin_source = Some(into_text(name, value)?),
                "slot-id" => {
                    let text = into_text(name, value)?;
                    let number = text
                        .parse::<u64>()
                        .map_err(|_| invalid(format!("slot-id {:?} is not a number", text)))?;
                    slot = Some(SlotId(number));
                }
                _ => {}
            }
        }

        let search = match (object, id) {
            (Some(label), _) => SearchKey::Label(label),
            (None, Some(id)) => SearchKey::Id(id),
            (None, None) => return Err(invalid("neither object nor id given".to_string())),
        };

        Ok(Self {
            token,
            slot,
            search,
            pin_source,
        })
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn slot(&self) -> Option<SlotId> {
        self.slot
    }

    pub fn search(&self) -> &SearchKey {
        &self.search
    }

    pub fn pin_source(&self) -> Option<&str> {
        self.pin_source.as_deref()
    }

    /// Token-resident private keys are private objects and need a login
    pub fn requires_login(&self) -> bool {
        true
    }
}

impl FromStr for TokenUri {
    type Err = EddsaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn invalid(reason: String) -> EddsaError {
    EddsaError::InvalidLabel { reason }
}

fn into_text(name: &str, value: Vec<u8>) -> EddsaResult<String> {
    String::from_utf8(value).map_err(|_| invalid(format!("{} is not UTF-8", name)))
}

fn percent_decode(value: &str) -> EddsaResult<Vec<u8>> {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let digits = bytes
                .get(i + 1..i + 3)
                .ok_or_else(|| invalid(format!("truncated escape in {:?}", value)))?;
            let decoded = hex::decode(digits)
                .map_err(|_| invalid(format!("bad escape in {:?}", value)))?;
            out.extend_from_slice(&decoded);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object_label() {
        let uri = TokenUri::parse("pkcs11:token=dnssec;object=example.com-ksk").unwrap();
        assert_eq!(uri.token(), Some("dnssec"));
        assert_eq!(uri.search(), &SearchKey::Label("example.com-ksk".to_string()));
        assert!(uri.slot().is_none());
        assert!(uri.requires_login());
    }

    #[test]
    fn test_parse_id_percent_encoded() {
        let uri = TokenUri::parse("pkcs11:slot-id=2;id=%01%a0%FF").unwrap();
        assert_eq!(uri.slot(), Some(SlotId(2)));
        assert_eq!(uri.search(), &SearchKey::Id(vec![0x01, 0xa0, 0xff]));
    }

    #[test]
    fn test_object_wins_over_id() {
        let uri = TokenUri::parse("pkcs11:object=zsk;id=%01").unwrap();
        assert_eq!(uri.search(), &SearchKey::Label("zsk".to_string()));
    }

    #[test]
    fn test_pin_source_in_query() {
        let uri: TokenUri = "pkcs11:object=zsk?pin-source=file:/etc/pin".parse().unwrap();
        assert_eq!(uri.pin_source(), Some("file:/etc/pin"));
    }

    #[test]
    fn test_unknown_attributes_ignored() {
        let uri = TokenUri::parse("pkcs11:model=SoftHSM%20v2;object=a%20b").unwrap();
        assert_eq!(uri.search(), &SearchKey::Label("a b".to_string()));
    }

    #[test]
    fn test_rejects_missing_scheme() {
        assert!(matches!(
            TokenUri::parse("object=zsk"),
            Err(EddsaError::InvalidLabel { .. })
        ));
    }

    #[test]
    fn test_rejects_missing_search_key() {
        assert!(TokenUri::parse("pkcs11:token=dnssec").is_err());
    }

    #[test]
    fn test_rejects_bad_escape() {
        assert!(TokenUri::parse("pkcs11:object=%4").is_err());
        assert!(TokenUri::parse("pkcs11:object=%zz").is_err());
    }

    #[test]
    fn test_rejects_bad_slot_id() {
        assert!(TokenUri::parse("pkcs11:slot-id=two;object=a").is_err());
    }

    #[test]
    fn test_search_attribute() {
        let key = SearchKey::Id(vec![7]);
        let attr = key.to_attribute();
        assert_eq!(attr.kind(), AttributeType::Id);
        assert_eq!(attr.value(), &[7]);
    }
}

//! Text private-key file codec
//!
//! Reads and writes the DNSSEC `Private-key-format` layout:
//!
//! ```text
//! Private-key-format: v1.3
//! Algorithm: 15 (ED25519)
//! PrivateKey: <base64>
//! Engine: pkcs11
//! Label: pkcs11:object=example.com-ksk
//! ```

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{EddsaError, EddsaResult};
use crate::model::{Algorithm, EddsaKey, PrivateElement, PrivateKeyFile, PrivateTag};
use crate::ports::PrivateKeyCodec;

const FORMAT_FIELD: &str = "Private-key-format";
const FORMAT_VERSION: &str = "v1.3";
const ALGORITHM_FIELD: &str = "Algorithm";

/// Key timing metadata other tools store in the same file; skipped on read
const TIMING_FIELDS: &[&str] = &[
    "Created",
    "Publish",
    "Activate",
    "Revoke",
    "Inactive",
    "Delete",
    "SyncPublish",
    "SyncDelete",
];

/// `PrivateKeyCodec` over one text file
#[derive(Debug, Clone)]
pub struct TextKeyFile {
    path: PathBuf,
}

impl TextKeyFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PrivateKeyCodec for TextKeyFile {
    fn write(&mut self, key: &EddsaKey, file: &PrivateKeyFile) -> EddsaResult<()> {
        let text = render(file)?;
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut out = options.open(&self.path)?;
        out.write_all(text.as_bytes())?;
        debug!(
            "Wrote {} private key file {}",
            key.algorithm(),
            self.path.display()
        );
        Ok(())
    }

    fn read(&mut self, key: &EddsaKey) -> EddsaResult<PrivateKeyFile> {
        let text = Zeroizing::new(std::fs::read_to_string(&self.path)?);
        let file = parse(&text)?;
        if file.algorithm() != key.algorithm() {
            return Err(EddsaError::private_file(format!(
                "{} holds an {} key, expected {}",
                self.path.display(),
                file.algorithm(),
                key.algorithm()
            )));
        }
        Ok(file)
    }
}

/// Render `file` in the text layout
pub fn render(file: &PrivateKeyFile) -> EddsaResult<Zeroizing<String>> {
    let algorithm = file.algorithm();
    let mut text = Zeroizing::new(format!(
        "{}: {}\n{}: {} ({})\n",
        FORMAT_FIELD,
        FORMAT_VERSION,
        ALGORITHM_FIELD,
        algorithm.dnssec_number(),
        algorithm.mnemonic()
    ));
    for element in file.elements() {
        let value = if element.tag().is_text() {
            Zeroizing::new(element.as_c_str()?.to_string())
        } else {
            Zeroizing::new(BASE64.encode(element.data()))
        };
        text.push_str(element.tag().field_name());
        text.push_str(": ");
        text.push_str(&value);
        text.push('\n');
    }
    Ok(text)
}

/// Parse the text layout
///
/// # Errors
///
/// Returns `EddsaError::InvalidPrivateKeyFile` for a missing or unknown
/// header, an unknown field, or bad base64
pub fn parse(text: &str) -> EddsaResult<PrivateKeyFile> {
    let mut lines = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(';'));

    let (name, version) = lines
        .next()
        .and_then(split_field)
        .ok_or_else(|| EddsaError::private_file("empty key file"))?;
    if name != FORMAT_FIELD || !version.starts_with("v1.") {
        return Err(EddsaError::private_file(format!(
            "unsupported header {:?}",
            name
        )));
    }

    let (name, value) = lines
        .next()
        .and_then(split_field)
        .ok_or_else(|| EddsaError::private_file("missing Algorithm line"))?;
    if name != ALGORITHM_FIELD {
        return Err(EddsaError::private_file(format!(
            "expected Algorithm, found {:?}",
            name
        )));
    }
    let algorithm = parse_algorithm(value)?;

    let mut file = PrivateKeyFile::new(algorithm);
    for line in lines {
        let (name, value) = split_field(line)
            .ok_or_else(|| EddsaError::private_file(format!("malformed line {:?}", line)))?;
        if TIMING_FIELDS.contains(&name) {
            continue;
        }
        let tag = PrivateTag::from_field_name(name)
            .ok_or_else(|| EddsaError::private_file(format!("unknown field {:?}", name)))?;
        let element = if tag.is_text() {
            PrivateElement::c_string(tag, value)?
        } else {
            let data = BASE64
                .decode(value)
                .map_err(|e| EddsaError::private_file(format!("{}: {}", name, e)))?;
            PrivateElement::new(tag, data)?
        };
        file.push(element);
    }
    Ok(file)
}

fn split_field(line: &str) -> Option<(&str, &str)> {
    line.split_once(':')
        .map(|(name, value)| (name.trim(), value.trim()))
}

fn parse_algorithm(value: &str) -> EddsaResult<Algorithm> {
    let number = value
        .split_whitespace()
        .next()
        .and_then(|n| n.parse::<u8>().ok())
        .ok_or_else(|| EddsaError::private_file(format!("bad Algorithm {:?}", value)))?;
    Algorithm::from_dnssec_number(number)
        .map_err(|_| EddsaError::private_file(format!("algorithm {} is not EdDSA", number)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PrivateKeyFile {
        let mut file = PrivateKeyFile::new(Algorithm::Ed25519);
        file.push(PrivateElement::new(PrivateTag::PrivateKey, vec![0xa5; 32]).unwrap());
        file.push(PrivateElement::c_string(PrivateTag::Engine, "pkcs11").unwrap());
        file.push(PrivateElement::c_string(PrivateTag::Label, "pkcs11:object=ksk").unwrap());
        file
    }

    #[test]
    fn test_render_layout() {
        let text = render(&sample()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "Private-key-format: v1.3");
        assert_eq!(lines[1], "Algorithm: 15 (ED25519)");
        assert!(lines[2].starts_with("PrivateKey: pa"));
        assert_eq!(lines[3], "Engine: pkcs11");
        assert_eq!(lines[4], "Label: pkcs11:object=ksk");
    }

    #[test]
    fn test_parse_rendered() {
        let text = render(&sample()).unwrap();
        assert_eq!(parse(&text).unwrap(), sample());
    }

    #[test]
    fn test_parse_skips_timing_fields() {
        let text = "Private-key-format: v1.3\n\
                    Algorithm: 16 (ED448)\n\
                    Created: 20260101000000\n\
                    Label: pkcs11:id=%01\n";
        let file = parse(text).unwrap();
        assert_eq!(file.algorithm(), Algorithm::Ed448);
        assert_eq!(file.len(), 1);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        let cases = [
            "",
            "Algorithm: 15 (ED25519)\n",
            "Private-key-format: v2.0\nAlgorithm: 15\n",
            "Private-key-format: v1.3\nAlgorithm: 13 (ECDSAP256SHA256)\n",
            "Private-key-format: v1.3\nAlgorithm: 15\nModulus: AAAA\n",
            "Private-key-format: v1.3\nAlgorithm: 15\nPrivateKey: not*base64\n",
            "Private-key-format: v1.3\nAlgorithm: 15\ngarbage\n",
        ];
        for text in cases {
            assert!(
                matches!(parse(text), Err(EddsaError::InvalidPrivateKeyFile { .. })),
                "accepted {:?}",
                text
            );
        }
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut codec = TextKeyFile::new(dir.path().join("Kexample.+015+12345.private"));
        let key = EddsaKey::new(Algorithm::Ed25519);

        codec.write(&key, &sample()).unwrap();
        assert_eq!(codec.read(&key).unwrap(), sample());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(codec.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_read_rejects_other_algorithm() {
        let dir = tempfile::tempdir().unwrap();
        let mut codec = TextKeyFile::new(dir.path().join("key.private"));
        codec
            .write(&EddsaKey::new(Algorithm::Ed25519), &sample())
            .unwrap();
        let result = codec.read(&EddsaKey::new(Algorithm::Ed448));
        assert!(matches!(
            result,
            Err(EddsaError::InvalidPrivateKeyFile { .. })
        ));
    }

    #[test]
    fn test_read_missing_file() {
        let mut codec = TextKeyFile::new("/nonexistent/key.private");
        let key = EddsaKey::new(Algorithm::Ed25519);
        assert!(matches!(codec.read(&key), Err(EddsaError::Io(_))));
    }
}

//! Messages exchanged between execution contexts
//!
//! Two conversations exist: the orchestrator asks the page scanner for a
//! named file (JSON request/response, see [`crate::channel`]), and the
//! decryption client talks to the decryption engine over a persistent
//! connection (password, then ciphertext, then one reply string tagged with
//! the attempt that asked for it).

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Prefix marking an engine reply as an error report
pub const ERROR_PREFIX: &str = "Error";

/// Ask the page scanner to fetch the link named `filename`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub filename: String,
}

/// Page scanner reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScanResponse {
    /// Raw bytes of the matched link's target
    Vault {
        #[serde(rename = "vaultData")]
        vault_data: Vec<u8>,
    },
    /// The scanner could not produce the file
    Failed { error: String },
}

/// Message sent to the decryption engine
#[derive(Debug)]
pub enum EngineMessage {
    /// Passphrase for subsequent ciphertexts
    Password(SecretString),
    /// Vault bytes to decrypt with the last passphrase
    Ciphertext { attempt: u64, data: Vec<u8> },
}

/// Engine output, echoing the attempt of the ciphertext it answers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOutput {
    pub attempt: u64,
    pub text: String,
}

/// Message received from the decryption engine, classified by prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineReply {
    /// Error report; holds the whole message including the prefix
    Error(String),
    /// Decrypted document text
    Plaintext(String),
}

impl EngineReply {
    pub fn classify(message: String) -> Self {
        if message.starts_with(ERROR_PREFIX) {
            EngineReply::Error(message)
        } else {
            EngineReply::Plaintext(message)
        }
    }
}

impl ScanRequest {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
        }
    }
}

impl ScanResponse {
    pub fn vault(vault_data: Vec<u8>) -> Self {
        ScanResponse::Vault { vault_data }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        ScanResponse::Failed {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_request_wire_format() {
        let json = serde_json::to_string(&ScanRequest::new("pwd")).unwrap();
        assert_eq!(json, r#"{"filename":"pwd"}"#);
    }

    #[test]
    fn test_scan_response_wire_format() {
        let json = serde_json::to_string(&ScanResponse::vault(vec![1, 2])).unwrap();
        assert_eq!(json, r#"{"vaultData":[1,2]}"#);

        let parsed: ScanResponse = serde_json::from_str(r#"{"error":"HTTP 404"}"#).unwrap();
        assert_eq!(parsed, ScanResponse::failed("HTTP 404"));
    }

    #[test]
    fn test_reply_classification() {
        assert_eq!(
            EngineReply::classify("Error: bad password".into()),
            EngineReply::Error("Error: bad password".into())
        );
        assert_eq!(
            EngineReply::classify("<revelationdata/>".into()),
            EngineReply::Plaintext("<revelationdata/>".into())
        );
        // Prefix is case sensitive and must be at the start
        assert!(matches!(
            EngineReply::classify("error lower".into()),
            EngineReply::Plaintext(_)
        ));
        assert!(matches!(
            EngineReply::classify(" Error".into()),
            EngineReply::Plaintext(_)
        ));
    }
}

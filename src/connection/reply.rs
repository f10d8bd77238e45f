//! Reply decoding
//!
//! Raw Redis replies are turned into JSON-friendly [`Reply`] values using the
//! session's `decode_responses`, `encoding` and `encoding_errors` parameters.
//! Without `decode_responses`, valid UTF-8 is still returned as text and any
//! other bytes are Base64-encoded, so output stays lossless.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use redis::Value;
use serde::Serialize;

use crate::credential::{Credential, EncodingErrors};
use crate::error::{RedlineError, Result};

/// A decoded command reply
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Nil,
    Integer(i64),
    Float(f64),
    Text(String),
    Binary { base64: String },
    List(Vec<Reply>),
}

impl Reply {
    /// Decode a raw reply with the parameters of the session that produced it
    pub fn from_value(value: Value, params: &Credential) -> Result<Self> {
        match value {
            Value::Nil => Ok(Self::Nil),
            Value::Int(i) => Ok(Self::Integer(i)),
            Value::Double(f) => Ok(Self::Float(f)),
            Value::Okay => Ok(Self::Text("OK".to_string())),
            Value::SimpleString(s) => Ok(Self::Text(s)),
            Value::BulkString(bytes) => Self::from_bytes(bytes, params),
            Value::Array(items) | Value::Set(items) => items
                .into_iter()
                .map(|item| Self::from_value(item, params))
                .collect::<Result<Vec<_>>>()
                .map(Self::List),
            other => Ok(Self::Text(format!("{other:?}"))),
        }
    }

    fn from_bytes(bytes: Vec<u8>, params: &Credential) -> Result<Self> {
        if params.decode_responses {
            return decode(&bytes, &params.encoding, params.encoding_errors).map(Self::Text);
        }

        match String::from_utf8(bytes) {
            Ok(text) => Ok(Self::Text(text)),
            Err(e) => Ok(Self::Binary {
                base64: STANDARD.encode(e.into_bytes()),
            }),
        }
    }
}

/// Decode bytes with a named encoding and error policy
///
/// Supported encodings: `utf-8`, `ascii`, `latin-1` (and their common aliases).
pub fn decode(bytes: &[u8], encoding: &str, errors: EncodingErrors) -> Result<String> {
    match encoding.trim().to_ascii_lowercase().replace('_', "-").as_str() {
        "utf-8" | "utf8" => decode_utf8(bytes, errors),
        "ascii" | "us-ascii" => decode_ascii(bytes, errors),
        // Every byte is a valid code point, so the policy never applies
        "latin-1" | "latin1" | "iso-8859-1" => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        other => Err(RedlineError::config_error(format!("Unsupported encoding '{other}'"))),
    }
}

fn decode_utf8(bytes: &[u8], errors: EncodingErrors) -> Result<String> {
    match errors {
        EncodingErrors::Strict => String::from_utf8(bytes.to_vec()).map_err(|e| {
            RedlineError::validation_failed(format!("Reply is not valid utf-8: {e}"))
        }),
        EncodingErrors::Replace => Ok(String::from_utf8_lossy(bytes).into_owned()),
        EncodingErrors::Ignore => {
            let mut decoded = String::with_capacity(bytes.len());
            let mut rest = bytes;
            loop {
                match std::str::from_utf8(rest) {
                    Ok(valid) => {
                        decoded.push_str(valid);
                        return Ok(decoded);
                    }
                    Err(e) => {
                        let valid_up_to = e.valid_up_to();
                        decoded.push_str(&String::from_utf8_lossy(&rest[..valid_up_to]));
                        let skip = e.error_len().unwrap_or(rest.len() - valid_up_to);
                        rest = &rest[valid_up_to + skip..];
                    }
                }
            }
        }
    }
}

fn decode_ascii(bytes: &[u8], errors: EncodingErrors) -> Result<String> {
    let mut decoded = String::with_capacity(bytes.len());
    for (position, &byte) in bytes.iter().enumerate() {
        if byte.is_ascii() {
            decoded.push(char::from(byte));
            continue;
        }
        match errors {
            EncodingErrors::Strict => {
                return Err(RedlineError::validation_failed(format!(
                    "Reply is not valid ascii: byte 0x{byte:02x} at position {position}"
                )));
            }
            EncodingErrors::Replace => decoded.push(char::REPLACEMENT_CHARACTER),
            EncodingErrors::Ignore => {}
        }
    }
    Ok(decoded)
}

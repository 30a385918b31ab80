//! Fetch Helpers
//!
//! Building blocks for resolvers that talk to a JSON API. The coordinator does
//! not care how a payload is produced; these helpers just give resolvers one
//! error type for the ways a fetch goes wrong:
//!
//! - the request never completed (`Transport`)
//! - the body was not the expected JSON (`Decode`)
//! - the server answered with errors (`Remote`)
//! - the server answered, but had nothing for the key (`NotFound`)
//!
//! # Envelopes
//!
//! Responses are expected in the GraphQL shape:
//!
//! ```json
//! { "data": { "pokemon": { "name": "pikachu", "number": "025" } } }
//! { "data": { "pokemon": null }, "errors": [{ "message": "..." }] }
//! ```

use std::fmt::Display;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::query::RequestKey;

/// Why a fetch failed.
///
/// `Clone`, so it can be carried by an `Errored` request state.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Decode(#[source] Arc<serde_json::Error>),

    #[error("no {field} found for '{key}'")]
    NotFound { field: String, key: RequestKey },

    #[error("remote error: {message}")]
    Remote { message: String },
}

impl FetchError {
    /// Wrap any displayable transport error.
    pub fn transport(err: impl Display) -> Self {
        FetchError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(Arc::new(err))
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<Map<String, Value>>,
    #[serde(default)]
    errors: Vec<RemoteMessage>,
}

#[derive(Debug, Deserialize)]
struct RemoteMessage {
    message: String,
}

/// Decode `data.<field>` from a response body.
///
/// Remote errors win over any partial data. A missing or `null` field is
/// `NotFound` for `key`.
pub fn decode_envelope<T>(field: &str, key: &RequestKey, body: &[u8]) -> Result<T, FetchError>
where
    T: DeserializeOwned,
{
    let envelope: Envelope = serde_json::from_slice(body)?;

    if !envelope.errors.is_empty() {
        let message = envelope
            .errors
            .into_iter()
            .map(|e| e.message)
            .collect::<Vec<_>>()
            .join("\n");
        return Err(FetchError::Remote { message });
    }

    match envelope.data.and_then(|mut data| data.remove(field)) {
        Some(Value::Null) | None => Err(FetchError::NotFound {
            field: field.to_string(),
            key: key.clone(),
        }),
        Some(value) => Ok(serde_json::from_value(value)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Pokemon {
        name: String,
        id: u32,
    }

    fn key(name: &str) -> RequestKey {
        RequestKey::new(name)
    }

    #[test]
    fn decodes_payload() {
        let body = br#"{ "data": { "pokemon": { "name": "pikachu", "id": 25 } } }"#;
        let pokemon: Pokemon = decode_envelope("pokemon", &key("pikachu"), body).unwrap();
        assert_eq!(pokemon, Pokemon { name: "pikachu".into(), id: 25 });
    }

    #[test]
    fn null_payload_is_not_found() {
        let body = br#"{ "data": { "pokemon": null } }"#;
        let err = decode_envelope::<Pokemon>("pokemon", &key("missingno"), body).unwrap_err();

        assert!(matches!(err, FetchError::NotFound { ref key, .. } if key.as_str() == "missingno"));
        assert_eq!(err.to_string(), "no pokemon found for 'missingno'");
    }

    #[test]
    fn remote_errors_are_joined() {
        let body = br#"{
            "data": { "pokemon": null },
            "errors": [{ "message": "rate limited" }, { "message": "try later" }]
        }"#;
        let err = decode_envelope::<Pokemon>("pokemon", &key("mew"), body).unwrap_err();

        match err {
            FetchError::Remote { message } => assert_eq!(message, "rate limited\ntry later"),
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_body_is_decode_error() {
        let err = decode_envelope::<Pokemon>("pokemon", &key("mew"), b"<html>").unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));

        let wrong_shape = br#"{ "data": { "pokemon": { "name": 7 } } }"#;
        let err = decode_envelope::<Pokemon>("pokemon", &key("mew"), wrong_shape).unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[test]
    fn transport_errors_keep_message() {
        let err = FetchError::transport("connection reset");
        assert_eq!(err.to_string(), "transport failure: connection reset");
    }
}

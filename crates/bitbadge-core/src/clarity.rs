//! Clarity values and Stacks principals, backed by `clarity-repl`.
//!
//! Contract-call arguments and read-only results travel as hex-encoded
//! consensus serializations. The helpers here build the handful of value
//! shapes the badge contracts take and map library errors into
//! [`ClarityError`].

use std::io::Cursor;

use bitcoin::hex::{DisplayHex, FromHex};
use clarity_repl::clarity::codec::StacksMessageCodec;
use clarity_repl::clarity::representations::ClarityName;
use clarity_repl::clarity::types::{OptionalData, ResponseData, SequenceData, TupleData};

pub use clarity_repl::clarity::types::{
    PrincipalData, QualifiedContractIdentifier, StandardPrincipalData, Value as ClarityValue,
};

#[derive(Debug, thiserror::Error)]
pub enum ClarityError {
    #[error("invalid principal `{input}`: {reason}")]
    Principal { input: String, reason: String },

    #[error("invalid Clarity value: {0}")]
    Value(String),

    #[error("invalid hex: {0}")]
    Hex(String),

    #[error("cannot decode Clarity value: {0}")]
    Decode(String),

    #[error("{0} trailing bytes after serialized value")]
    TrailingBytes(usize),
}

// ==============================================================================
// Principals
// ==============================================================================

/// Standard or contract principal; a leading `'` is accepted.
pub fn parse_principal(s: &str) -> Result<PrincipalData, ClarityError> {
    let s = s.trim();
    PrincipalData::parse(s).map_err(|e| principal_error(s, e))
}

pub fn parse_standard_principal(s: &str) -> Result<StandardPrincipalData, ClarityError> {
    let s = s.trim();
    PrincipalData::parse_standard_principal(s).map_err(|e| principal_error(s, e))
}

/// `<address>.<contract-name>`
pub fn parse_contract_id(s: &str) -> Result<QualifiedContractIdentifier, ClarityError> {
    let s = s.trim();
    QualifiedContractIdentifier::parse(s).map_err(|e| principal_error(s, e))
}

fn principal_error(input: &str, reason: impl std::fmt::Display) -> ClarityError {
    ClarityError::Principal {
        input: input.to_owned(),
        reason: reason.to_string(),
    }
}

// ==============================================================================
// Construction
// ==============================================================================

pub fn uint(n: impl Into<u128>) -> ClarityValue {
    ClarityValue::UInt(n.into())
}

pub fn buffer(bytes: impl Into<Vec<u8>>) -> Result<ClarityValue, ClarityError> {
    ClarityValue::buff_from(bytes.into()).map_err(|e| ClarityError::Value(e.to_string()))
}

pub fn list(items: impl IntoIterator<Item = ClarityValue>) -> Result<ClarityValue, ClarityError> {
    ClarityValue::list_from(items.into_iter().collect())
        .map_err(|e| ClarityError::Value(e.to_string()))
}

pub fn tuple<'a>(
    fields: impl IntoIterator<Item = (&'a str, ClarityValue)>,
) -> Result<ClarityValue, ClarityError> {
    let data = fields
        .into_iter()
        .map(|(key, value)| {
            let name = ClarityName::try_from(key.to_owned())
                .map_err(|e| ClarityError::Value(format!("tuple key `{key}`: {e:?}")))?;
            Ok((name, value))
        })
        .collect::<Result<Vec<_>, ClarityError>>()?;
    TupleData::from_data(data)
        .map(ClarityValue::Tuple)
        .map_err(|e| ClarityError::Value(e.to_string()))
}

/// `(ok value)`
pub fn ok(value: ClarityValue) -> ClarityValue {
    ClarityValue::Response(ResponseData {
        committed: true,
        data: Box::new(value),
    })
}

// ==============================================================================
// Wire Encoding
// ==============================================================================

/// `0x`-prefixed consensus serialization, the form the node API expects.
pub fn to_hex(value: &ClarityValue) -> String {
    format!("0x{}", value.serialize_to_vec().to_lower_hex_string())
}

/// Inverse of [`to_hex`]; the prefix is optional and the whole input must
/// be consumed by a single value.
pub fn from_hex(hex: &str) -> Result<ClarityValue, ClarityError> {
    let raw = hex.trim();
    let raw = raw.strip_prefix("0x").unwrap_or(raw);
    let bytes = Vec::<u8>::from_hex(raw).map_err(|e| ClarityError::Hex(e.to_string()))?;

    let mut cursor = Cursor::new(&bytes);
    let value = ClarityValue::consensus_deserialize(&mut cursor)
        .map_err(|e| ClarityError::Decode(e.to_string()))?;

    let consumed = usize::try_from(cursor.position()).unwrap_or(bytes.len());
    match bytes.len().saturating_sub(consumed) {
        0 => Ok(value),
        trailing => Err(ClarityError::TrailingBytes(trailing)),
    }
}

// ==============================================================================
// Inspection
// ==============================================================================

/// Read-side accessors for values returned by read-only calls.
pub trait ClarityValueExt {
    /// Unwrap `(ok v)`, `(err v)` or `(some v)` one level; anything else is
    /// returned as-is.
    fn response_inner(&self) -> &ClarityValue;

    /// Tuple field lookup; `None` for non-tuples and missing keys.
    fn tuple_field(&self, name: &str) -> Option<&ClarityValue>;

    fn buffer_bytes(&self) -> Option<&[u8]>;

    fn is_ok_response(&self) -> bool;
}

impl ClarityValueExt for ClarityValue {
    fn response_inner(&self) -> &ClarityValue {
        match self {
            ClarityValue::Response(ResponseData { data, .. }) => data,
            ClarityValue::Optional(OptionalData { data: Some(data) }) => data,
            other => other,
        }
    }

    fn tuple_field(&self, name: &str) -> Option<&ClarityValue> {
        match self {
            ClarityValue::Tuple(data) => data.get(name).ok(),
            _ => None,
        }
    }

    fn buffer_bytes(&self) -> Option<&[u8]> {
        match self {
            ClarityValue::Sequence(SequenceData::Buffer(buff)) => Some(&buff.data),
            _ => None,
        }
    }

    fn is_ok_response(&self) -> bool {
        matches!(
            self,
            ClarityValue::Response(ResponseData {
                committed: true,
                ..
            })
        )
    }
}

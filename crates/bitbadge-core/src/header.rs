use bitcoin::hex::{DisplayHex, FromHex};
use serde::Serialize;

use crate::clarity::{self, ClarityError, ClarityValue};
use crate::error::ParseError;

pub const BLOCK_HEADER_LEN: usize = 80;

/// The six fields of a serialized block header, kept as raw wire-order bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockHeaderFields {
    pub version: [u8; 4],
    pub parent: [u8; 32],
    pub merkle_root: [u8; 32],
    pub timestamp: [u8; 4],
    pub nbits: [u8; 4],
    pub nonce: [u8; 4],
}

impl BlockHeaderFields {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        let raw: &[u8; BLOCK_HEADER_LEN] = bytes
            .try_into()
            .map_err(|_| ParseError::HeaderLength(bytes.len()))?;

        let mut fields = Self {
            version: [0; 4],
            parent: [0; 32],
            merkle_root: [0; 32],
            timestamp: [0; 4],
            nbits: [0; 4],
            nonce: [0; 4],
        };
        fields.version.copy_from_slice(&raw[0..4]);
        fields.parent.copy_from_slice(&raw[4..36]);
        fields.merkle_root.copy_from_slice(&raw[36..68]);
        fields.timestamp.copy_from_slice(&raw[68..72]);
        fields.nbits.copy_from_slice(&raw[72..76]);
        fields.nonce.copy_from_slice(&raw[76..80]);
        Ok(fields)
    }

    pub fn from_hex(header_hex: &str) -> Result<Self, ParseError> {
        let bytes =
            Vec::<u8>::from_hex(header_hex.trim()).map_err(|e| ParseError::Hex(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(BLOCK_HEADER_LEN);
        out.extend_from_slice(&self.version);
        out.extend_from_slice(&self.parent);
        out.extend_from_slice(&self.merkle_root);
        out.extend_from_slice(&self.timestamp);
        out.extend_from_slice(&self.nbits);
        out.extend_from_slice(&self.nonce);
        out
    }

    pub fn to_hex(&self) -> String {
        self.to_bytes().to_lower_hex_string()
    }

    /// The header as the contract's parsed-header tuple.
    pub fn to_clarity_tuple(&self) -> Result<ClarityValue, ClarityError> {
        clarity::tuple([
            ("version", clarity::buffer(self.version)?),
            ("parent", clarity::buffer(self.parent)?),
            ("merkle-root", clarity::buffer(self.merkle_root)?),
            ("timestamp", clarity::buffer(self.timestamp)?),
            ("nbits", clarity::buffer(self.nbits)?),
            ("nonce", clarity::buffer(self.nonce)?),
        ])
    }
}

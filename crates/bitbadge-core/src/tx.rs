//! Witness stripping and sender verification for Bitcoin transactions.
//!
//! The proof-verifying contract recomputes the paying txid from a legacy
//! (witness-free) serialization, so every raw transaction is projected onto
//! its non-witness fields before submission. The same raw transaction also
//! carries the spending key in its first input's witness, which lets the
//! client check who paid before asking the contract to mint.

use bitcoin::consensus::encode::{deserialize, serialize_hex};
use bitcoin::hashes::Hash;
use bitcoin::hex::FromHex;
use bitcoin::{CompressedPublicKey, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};
use tracing::debug;

use crate::error::ParseError;
use crate::network::NetworkParams;

// ==============================================================================
// Decoding
// ==============================================================================

/// Decode a hex transaction. Segwit marker/flag and witness fields are
/// accepted; trailing bytes are rejected.
pub fn decode_tx_hex(tx_hex: &str) -> Result<Transaction, ParseError> {
    let trimmed = tx_hex.trim();
    if trimmed.len() % 2 != 0 {
        return Err(ParseError::Hex(format!(
            "odd-length hex string ({} chars)",
            trimmed.len()
        )));
    }
    let bytes = Vec::<u8>::from_hex(trimmed).map_err(|e| ParseError::Hex(e.to_string()))?;
    deserialize(&bytes).map_err(|e| ParseError::Transaction(e.to_string()))
}

// ==============================================================================
// Witness Stripper
// ==============================================================================

/// Project a transaction onto version, input outpoints, outputs and locktime.
///
/// Script-sigs and witnesses are dropped and every sequence is reset to the
/// final value, so the result depends only on those fields.
pub fn strip(tx: &Transaction) -> Transaction {
    Transaction {
        version: tx.version,
        lock_time: tx.lock_time,
        input: tx
            .input
            .iter()
            .map(|txin| TxIn {
                previous_output: txin.previous_output,
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            })
            .collect(),
        output: tx
            .output
            .iter()
            .map(|txout| TxOut {
                value: txout.value,
                script_pubkey: txout.script_pubkey.clone(),
            })
            .collect(),
    }
}

/// Parse `tx_hex`, strip it and re-encode it in the legacy wire format.
pub fn strip_witness(tx_hex: &str) -> Result<String, ParseError> {
    let tx = decode_tx_hex(tx_hex)?;
    Ok(serialize_hex(&strip(&tx)))
}

/// Witness-free encoding to hand to the verifying contract.
///
/// Prefers the stripped projection. When the projection would change the
/// txid (the payer signalled a non-final sequence or used a script-sig), the
/// original inputs are kept and only the witnesses are removed, so the
/// contract hashes back to the txid the explorer proved.
pub fn submission_hex(tx_hex: &str) -> Result<String, ParseError> {
    let tx = decode_tx_hex(tx_hex)?;
    let stripped = strip(&tx);
    if stripped.compute_txid() == tx.compute_txid() {
        return Ok(serialize_hex(&stripped));
    }

    debug!(
        txid = %tx.compute_txid(),
        "stripped projection changes txid; keeping original sequences and script-sigs"
    );
    let mut unwitnessed = tx;
    for txin in &mut unwitnessed.input {
        txin.witness.clear();
    }
    Ok(serialize_hex(&unwitnessed))
}

// ==============================================================================
// Sender Verifier
// ==============================================================================

/// Render the P2WPKH address of a compressed public key for `params`.
pub fn derive_p2wpkh_address(
    pubkey: &[u8],
    params: &NetworkParams,
) -> Result<String, ParseError> {
    let key = CompressedPublicKey::from_slice(pubkey)
        .map_err(|e| ParseError::Address(format!("invalid compressed public key: {e}")))?;
    let hrp = bitcoin::bech32::Hrp::parse(params.bech32_hrp)
        .map_err(|e| ParseError::Address(format!("invalid bech32 prefix: {e}")))?;
    let program = key.wpubkey_hash();
    bitcoin::bech32::segwit::encode_v0(hrp, program.as_byte_array())
        .map_err(|e| ParseError::Address(format!("bech32 encoding failed: {e}")))
}

/// True iff the key in the first input's witness derives `expected_address`.
///
/// Any failure along the way (unparseable hex, no inputs, missing or empty
/// witness, malformed key) means "not verified".
pub fn verify_sender(tx_hex: &str, expected_address: &str, params: &NetworkParams) -> bool {
    let tx = match decode_tx_hex(tx_hex) {
        Ok(tx) => tx,
        Err(e) => {
            debug!(error = %e, "sender verification: transaction does not parse");
            return false;
        }
    };

    let Some(first_input) = tx.input.first() else {
        debug!("sender verification: transaction has no inputs");
        return false;
    };
    let Some(pubkey) = first_input.witness.last() else {
        debug!("sender verification: first input carries no witness");
        return false;
    };

    match derive_p2wpkh_address(pubkey, params) {
        Ok(derived) => {
            debug!(%derived, expected = expected_address, "sender verification");
            derived == expected_address
        }
        Err(e) => {
            debug!(error = %e, "sender verification: address derivation failed");
            false
        }
    }
}

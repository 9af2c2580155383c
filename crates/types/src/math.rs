/// Unit conversions and ABI word decoding shared by keeper components

use alloy_primitives::{Address, Bytes, U256};
use crate::constants::*;

// ============================================================================
// Unit Conversion
// ============================================================================

/// Convert a gwei amount to wei, truncating below one wei
pub fn gwei_to_wei(gwei: f64) -> U256 {
    if !gwei.is_finite() || gwei <= 0.0 {
        return U256::ZERO;
    }
    U256::from((gwei * WEI_PER_GWEI as f64) as u128)
}

/// Convert an ether amount to wei with gwei precision
pub fn eth_to_wei(eth: f64) -> U256 {
    if !eth.is_finite() || eth <= 0.0 {
        return U256::ZERO;
    }
    let gwei = (eth * WEI_PER_GWEI as f64) as u128;
    U256::from(gwei).saturating_mul(U256::from(WEI_PER_GWEI))
}

/// Convert wei to ether for display
pub fn wei_to_eth(wei: U256) -> f64 {
    let gwei = wei / U256::from(WEI_PER_GWEI);
    let gwei = u128::try_from(gwei).unwrap_or(u128::MAX);
    gwei as f64 / WEI_PER_GWEI as f64
}

/// Convert wei to gwei for display
pub fn wei_to_gwei(wei: U256) -> f64 {
    let wei = u128::try_from(wei).unwrap_or(u128::MAX);
    wei as f64 / WEI_PER_GWEI as f64
}

// ============================================================================
// ABI Word Decoding
// ============================================================================

/// Read the `index`th 32-byte word of `data`
fn word(data: &[u8], index: usize) -> Option<&[u8]> {
    let start = index.checked_mul(ABI_WORD_SIZE)?;
    data.get(start..start.checked_add(ABI_WORD_SIZE)?)
}

/// Decode a `uint256` return value
pub fn decode_uint(data: &[u8]) -> Option<U256> {
    word(data, 0).map(U256::from_be_slice)
}

/// Decode a `uint256` return value that must fit in 64 bits
pub fn decode_u64(data: &[u8]) -> Option<u64> {
    decode_uint(data).and_then(|value| u64::try_from(value).ok())
}

/// Decode a `bool` return value
pub fn decode_bool(data: &[u8]) -> Option<bool> {
    match decode_uint(data)? {
        value if value == U256::ZERO => Some(false),
        value if value == U256::from(1u8) => Some(true),
        _ => None,
    }
}

/// Decode an `address` return value
pub fn decode_address(data: &[u8]) -> Option<Address> {
    let word = word(data, 0)?;
    // Upper 12 bytes must be zero padding
    if word[..12].iter().any(|b| *b != 0) {
        return None;
    }
    Some(Address::from_slice(&word[12..]))
}

/// Decode a dynamic `bytes` return value (offset, length, payload)
pub fn decode_bytes(data: &[u8]) -> Option<Bytes> {
    let offset = usize::try_from(decode_uint(data)?).ok()?;
    let len_word = data.get(offset..offset.checked_add(ABI_WORD_SIZE)?)?;
    let len = usize::try_from(U256::from_be_slice(len_word)).ok()?;
    let start = offset + ABI_WORD_SIZE;
    let payload = data.get(start..start.checked_add(len)?)?;
    Some(Bytes::copy_from_slice(payload))
}

// ============================================================================
// ABI Word Encoding
// ============================================================================

/// Encode an address as a single ABI word
pub fn encode_address(address: Address) -> [u8; ABI_WORD_SIZE] {
    let mut out = [0u8; ABI_WORD_SIZE];
    out[12..].copy_from_slice(address.as_slice());
    out
}

/// Encode an integer as a single ABI word
pub fn encode_uint(value: U256) -> [u8; ABI_WORD_SIZE] {
    value.to_be_bytes::<ABI_WORD_SIZE>()
}

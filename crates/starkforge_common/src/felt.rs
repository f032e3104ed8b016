//! Field elements and the hashing helpers built on top of them.

use alloy_primitives::{U256, keccak256, uint};

/// A field element.
///
/// Arithmetic is not reduced automatically; the helpers in this module keep
/// their outputs below [`FIELD_PRIME`].
pub type Felt = U256;

/// The field prime, `2^251 + 17 * 2^192 + 1`.
pub const FIELD_PRIME: Felt =
    uint!(0x800000000000011000000000000000000000000000000000000000000000001_U256);

/// Exclusive upper bound of storage and contract addresses, `2^251 - 256`.
pub const ADDRESS_BOUND: Felt =
    uint!(0x7ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff00_U256);

const MASK_250: Felt =
    uint!(0x3ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff_U256);

/// Keccak-256 of `data`, truncated to its 250 low bits.
pub fn sn_keccak(data: &[u8]) -> Felt {
    U256::from_be_bytes(keccak256(data).0) & MASK_250
}

/// Deterministic hash of two field elements.
pub fn hash_pair(a: Felt, b: Felt) -> Felt {
    let preimage = [a.to_be_bytes::<32>(), b.to_be_bytes::<32>()].concat();
    sn_keccak(&preimage) % FIELD_PRIME
}

/// Chained hash of a sequence of field elements, terminated by its length.
pub fn hash_on_elements(values: &[Felt]) -> Felt {
    let folded = values
        .iter()
        .fold(Felt::ZERO, |acc, value| hash_pair(acc, *value));
    hash_pair(folded, Felt::from(values.len()))
}

/// Encodes an ASCII string of at most 31 characters as a field element.
pub fn short_string_to_felt(value: &str) -> Option<Felt> {
    if value.len() > 31 || !value.is_ascii() {
        return None;
    }
    Some(U256::from_be_slice(value.as_bytes()))
}

/// Address of a storage variable named `name`, indexed by `keys`.
pub fn storage_var_address(name: &str, keys: &[Felt]) -> Felt {
    let base = sn_keccak(name.as_bytes());
    keys.iter()
        .fold(base, |acc, key| hash_pair(acc, *key))
        % ADDRESS_BOUND
}

/// Parses a field element from `0x`-prefixed hex or decimal.
pub fn parse_felt(value: &str) -> Option<Felt> {
    let value = value.trim();
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => U256::from_str_radix(hex, 16),
        None => U256::from_str_radix(value, 10),
    };
    parsed.ok().filter(|felt| *felt < FIELD_PRIME)
}

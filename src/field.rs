use ruint::{aliases::U256, uint};

use crate::error::{Error, Result};
use crate::util::keccak256;

/// An element of the BN254 scalar field Fr.
///
/// Represented as a big-endian byte vector without Montgomery reduction.
pub type Field = U256;

// See <https://docs.rs/ark-bn254/latest/ark_bn254>
pub const MODULUS: Field =
    uint!(21888242871839275222246405745257275088548364400416034343698204186575808495617_U256);

/// Hash arbitrary data to a field element.
///
/// This is how the tree seed phrase becomes the level-0 zero value, matching
/// the on-chain `keccak256(seed) % FIELD_SIZE` derivation.
#[must_use]
pub fn hash_to_field(data: &[u8]) -> Field {
    // Never panics because the target uint is large enough.
    let n = U256::try_from_be_slice(&keccak256(data)).unwrap();
    n % MODULUS
}

/// Encode a field element as a fixed 32-byte big-endian value, zero-padded
/// on the left. This is the bit-exact format every value crossing a
/// component boundary uses.
#[must_use]
pub fn to_bytes32(value: Field) -> [u8; 32] {
    value.to_be_bytes()
}

/// Decode a fixed 32-byte big-endian value, rejecting non-canonical
/// encodings.
pub fn from_bytes32(bytes: [u8; 32]) -> Result<Field> {
    let value = U256::from_be_bytes(bytes);
    if value >= MODULUS {
        return Err(Error::InvalidInput(format!(
            "{value} is not a canonical field element"
        )));
    }
    Ok(value)
}

//! Poseidon hashing over the BN254 scalar field, circom parameterization.
//!
//! One primitive serves three uses, separated only by fixed extra
//! arguments: tree-node hashing, invitation commitments and nullifier
//! hashes. Outputs agree bit-for-bit with circomlib's Poseidon and the
//! on-chain hasher contract.

use ark_bn254::Fr;
use light_poseidon::{Poseidon as LightPoseidon, PoseidonHasher as _};

use crate::error::{Error, Result};
use crate::field::Field;
use crate::merkle_tree::Hasher;

/// Compute the two-value Poseidon hash.
///
/// Used for tree internal nodes and zero-value derivation.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if an argument does not fit in the field.
pub fn hash2(left: Field, right: Field) -> Result<Field> {
    let inputs = [to_fr(left)?, to_fr(right)?];
    Ok(hash_fixed(&inputs))
}

/// Compute the three-value Poseidon hash.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if an argument does not fit in the field.
pub fn hash3(a: Field, b: Field, c: Field) -> Result<Field> {
    let inputs = [to_fr(a)?, to_fr(b)?, to_fr(c)?];
    Ok(hash_fixed(&inputs))
}

/// Public commitment of a secret nullifier: `hash2(nullifier, 0)`.
///
/// The fixed second argument keeps commitments within the tree-node hash
/// primitive while making the derivation explicit.
pub fn commitment_hash(nullifier: Field) -> Result<Field> {
    hash2(nullifier, Field::ZERO)
}

/// Double-spend guard published with a join proof:
/// `hash3(nullifier, 1, leaf_index)`.
///
/// The fixed constant `1` separates it from commitments and node hashes;
/// the ledger must reject a second proof reusing the same value.
pub fn nullifier_hash(nullifier: Field, leaf_index: usize) -> Result<Field> {
    hash3(nullifier, Field::from(1), Field::from(leaf_index))
}

/// Node-hashing seam for [`crate::merkle_tree::MerkleTree`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Poseidon;

impl Hasher for Poseidon {
    fn hash_node(&self, left: Field, right: Field) -> Result<Field> {
        hash2(left, right)
    }
}

fn to_fr(value: Field) -> Result<Fr> {
    Fr::try_from(value)
        .map_err(|_| Error::InvalidInput(format!("{value} does not fit in the field")))
}

fn hash_fixed(inputs: &[Fr]) -> Field {
    // Arities 2 and 3 are always present in the circom parameter set, and
    // the input slice length matches the arity by construction.
    let mut poseidon = LightPoseidon::<Fr>::new_circom(inputs.len()).expect("supported arity");
    poseidon.hash(inputs).expect("input length matches arity").into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::MODULUS;
    use ruint::uint;

    #[test]
    fn test_hash2() {
        uint! {
            assert_eq!(
                hash2(0_U256, 0_U256).unwrap(),
                0x2098f5fb9e239eab3ceac3f27b81e481dc3124d55ffed523a839ee8446b64864_U256
            );
            assert_eq!(
                hash2(31213_U256, 132_U256).unwrap(),
                0x303f59cd0831b5633bcda50514521b33776b5d4280eb5868ba1dbbe2e4d76ab5_U256
            );
        }
    }

    #[test]
    fn test_commitment_is_plain_node_hash() {
        // Domain separation is solely the fixed zero argument, not a
        // separate primitive.
        let commitment = commitment_hash(Field::from(7)).unwrap();
        assert_eq!(commitment, hash2(Field::from(7), Field::ZERO).unwrap());
    }

    #[test]
    fn test_no_collision_across_uses() {
        let commitment = commitment_hash(Field::from(7)).unwrap();
        let nullifier = nullifier_hash(Field::from(7), 3).unwrap();
        assert_ne!(nullifier, commitment);
        assert_ne!(nullifier, hash2(Field::from(7), Field::from(3)).unwrap());
        assert_ne!(nullifier, hash2(Field::from(7), Field::from(1)).unwrap());
        assert_ne!(
            nullifier,
            hash3(Field::from(7), Field::ZERO, Field::from(3)).unwrap()
        );
    }

    #[test]
    fn test_nullifier_hash_binds_leaf_index() {
        let a = nullifier_hash(Field::from(7), 3).unwrap();
        let b = nullifier_hash(Field::from(7), 4).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_rejects_unreduced_input() {
        assert_eq!(
            hash2(MODULUS, Field::ZERO),
            Err(Error::InvalidInput(format!(
                "{MODULUS} does not fit in the field"
            )))
        );
        assert!(hash3(Field::ZERO, MODULUS, Field::ZERO).is_err());
        assert!(commitment_hash(Field::MAX).is_err());
    }
}

//! Opaque proving backend interface.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::field::Field;

/// Affine G1 point as coordinates.
pub type G1 = (Field, Field);

/// Affine G2 point as coefficient pairs.
pub type G2 = ([Field; 2], [Field; 2]);

/// Groth16 proof as the curve-point triple the paired verifier consumes.
///
/// The internal structure is opaque to this crate; it is relayed to the
/// ledger as-is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof(pub G1, pub G2, pub G1);

/// Private and public inputs handed to the proving backend.
///
/// The nullifier is the only secret; everything else is derived from it and
/// the synced tree. The root and path must be exactly the ones the emitted
/// proof attests to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinWitness {
    pub nullifier: Field,
    pub nullifier_hash: Field,
    pub root: Field,
    pub path_elements: Vec<Field>,
    pub path_indices: Vec<u8>,
    pub identity: Field,
}

/// Circuit plus Groth16 prover, treated as a service.
pub trait ProverService {
    /// Produce a join proof for `witness`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Proof`] when proof generation fails.
    fn prove(&self, witness: &JoinWitness) -> Result<Proof>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proof_serde_roundtrip() {
        let proof = Proof(
            (Field::from(1), Field::from(2)),
            (
                [Field::from(3), Field::from(4)],
                [Field::from(5), Field::from(6)],
            ),
            (Field::from(7), Field::from(8)),
        );
        let json = serde_json::to_value(proof).unwrap();
        let back: Proof = serde_json::from_value(json).unwrap();
        assert_eq!(back, proof);
    }
}

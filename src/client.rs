//! Client protocol: invitation creation, tree sync and join-proof assembly.

use rand::{thread_rng, Rng};

use crate::error::{Error, Result};
use crate::field::Field;
use crate::ledger::LedgerSource;
use crate::poseidon::{self, Poseidon};
use crate::poseidon_tree::PoseidonTree;
use crate::prover::{JoinWitness, Proof, ProverService};

/// A freshly drawn invitation.
///
/// The nullifier is shared with the invitee out-of-band and never leaves
/// the caller otherwise; the invitation commitment is what gets registered
/// on the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Invitation {
    pub nullifier: Field,
    pub invitation: Field,
}

/// Public inputs and proof to submit to the ledger for a join.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinBundle {
    pub nullifier_hash: Field,
    pub root: Field,
    pub proof: Proof,
}

/// Orchestrates the local tree against the ledger and the prover.
///
/// Exclusively owns at most one tree at a time; a reset constructs a new
/// tree and discards the old one outright, so there is no hidden shared
/// state to invalidate.
pub struct Client<P, L> {
    prover: P,
    ledger: L,
    tree: Option<PoseidonTree>,
}

impl<P: ProverService, L: LedgerSource> Client<P, L> {
    #[must_use]
    pub fn new(prover: P, ledger: L) -> Self {
        Self {
            prover,
            ledger,
            tree: None,
        }
    }

    /// The local tree, if one has been built.
    #[must_use]
    pub fn tree(&self) -> Option<&PoseidonTree> {
        self.tree.as_ref()
    }

    /// Draw a fresh nullifier and derive its invitation commitment.
    ///
    /// Touches no shared state. The caller transmits the nullifier
    /// out-of-band and submits the invitation to the ledger.
    pub fn create_invitation(&self) -> Result<Invitation> {
        self.create_invitation_rng(&mut thread_rng())
    }

    /// Like [`Self::create_invitation`] with explicit entropy.
    pub fn create_invitation_rng(&self, rng: &mut impl Rng) -> Result<Invitation> {
        // 248 bits keep the nullifier below the field modulus while leaving
        // guessing and collision infeasible.
        let mut bytes = [0_u8; 31];
        rng.fill_bytes(&mut bytes);
        // Never panics because the target uint is large enough.
        let nullifier = Field::try_from_be_slice(&bytes).unwrap();
        let invitation = poseidon::commitment_hash(nullifier)?;
        Ok(Invitation {
            nullifier,
            invitation,
        })
    }

    /// Discard the local tree and construct a fresh one matching the
    /// ledger's configured depth and seed.
    pub fn reset_tree(&mut self) -> Result<()> {
        let tree = PoseidonTree::new(self.ledger.levels()?, Poseidon, self.ledger.seed_phrase()?)?;
        self.tree = Some(tree);
        Ok(())
    }

    /// Bring the local tree up to the ledger's current leaf count.
    ///
    /// Inserts every missing index strictly in increasing order; a gap
    /// would desynchronize all subsequent roots. A no-op when the ledger
    /// has not advanced. A ledger count below the local one means the
    /// append-only assumption broke and is fatal.
    pub fn sync(&mut self) -> Result<&PoseidonTree> {
        if self.tree.is_none() {
            self.reset_tree()?;
        }
        let Some(tree) = self.tree.as_mut() else {
            unreachable!("tree was just initialized")
        };
        let total = self.ledger.total_invitations()?;
        if total < tree.total_elements() {
            return Err(Error::SyncGapDetected(format!(
                "ledger reports {total} invitations, local tree already holds {}",
                tree.total_elements()
            )));
        }
        for index in tree.total_elements()..total {
            let invitation = self.ledger.invitation_at(index)?;
            tree.insert(invitation)?;
        }
        Ok(tree)
    }

    /// Assemble the bundle that redeems `nullifier` for `identity`.
    ///
    /// Syncs, locates the invitation leaf, extracts its path, computes the
    /// nullifier hash and hands the witness to the prover. The root and
    /// path given to the prover are exactly the ones the returned bundle
    /// attests to; the tree is not mutated in between.
    pub fn build_join_proof(&mut self, identity: Field, nullifier: Field) -> Result<JoinBundle> {
        let (index, merkle_path) = {
            let tree = self.sync()?;
            let invitation = poseidon::commitment_hash(nullifier)?;
            let index = tree
                .get_index_by_element(invitation)?
                .ok_or(Error::InvitationNotFound)?;
            (index, tree.path(index)?)
        };
        let nullifier_hash = poseidon::nullifier_hash(nullifier, index)?;
        let witness = JoinWitness {
            nullifier,
            nullifier_hash,
            root: merkle_path.root,
            path_elements: merkle_path.path_elements,
            path_indices: merkle_path.path_indices,
            identity,
        };
        let proof = self.prover.prove(&witness)?;
        Ok(JoinBundle {
            nullifier_hash,
            root: witness.root,
            proof,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use rand::SeedableRng as _;
    use rand_chacha::ChaChaRng;

    use super::*;
    use crate::ledger::InMemoryLedger;

    const LEVELS: usize = 4;
    const SEED: &str = "zkyc.seed";

    /// Derives a stand-in proof deterministically from the witness.
    struct StubProver;

    impl ProverService for StubProver {
        fn prove(&self, witness: &JoinWitness) -> Result<Proof> {
            let tag = poseidon::hash2(witness.nullifier_hash, witness.root)?;
            Ok(Proof((tag, tag), ([tag, tag], [tag, tag]), (tag, tag)))
        }
    }

    struct FailingProver;

    impl ProverService for FailingProver {
        fn prove(&self, _witness: &JoinWitness) -> Result<Proof> {
            Err(Error::Proof("backend unavailable".to_owned()))
        }
    }

    /// Ledger whose advertised count can be forced below reality.
    struct ShrinkingLedger {
        inner: InMemoryLedger,
        reported_total: usize,
    }

    impl LedgerSource for ShrinkingLedger {
        fn levels(&self) -> Result<usize> {
            self.inner.levels()
        }

        fn seed_phrase(&self) -> Result<String> {
            self.inner.seed_phrase()
        }

        fn total_invitations(&self) -> Result<usize> {
            Ok(self.reported_total)
        }

        fn invitation_at(&self, index: usize) -> Result<Field> {
            self.inner.invitation_at(index)
        }
    }

    fn shared_ledger() -> Rc<RefCell<InMemoryLedger>> {
        Rc::new(RefCell::new(InMemoryLedger::new(LEVELS, SEED)))
    }

    #[test]
    fn test_create_invitation_derives_commitment() {
        let client = Client::new(StubProver, shared_ledger());
        let mut rng = ChaChaRng::seed_from_u64(1);
        let invitation = client.create_invitation_rng(&mut rng).unwrap();
        assert!(invitation.nullifier < Field::from(1) << 248);
        assert_eq!(
            invitation.invitation,
            poseidon::commitment_hash(invitation.nullifier).unwrap()
        );

        let other = client.create_invitation_rng(&mut rng).unwrap();
        assert_ne!(other.nullifier, invitation.nullifier);
    }

    #[test]
    fn test_sync_mirrors_ledger_order() {
        let ledger = shared_ledger();
        let mut client = Client::new(StubProver, Rc::clone(&ledger));
        for value in [21, 22, 23] {
            ledger.borrow_mut().register(Field::from(value));
        }

        let tree = client.sync().unwrap();
        assert_eq!(tree.total_elements(), 3);
        assert_eq!(tree.n_levels(), LEVELS);
        assert_eq!(tree.seed(), SEED);
        assert_eq!(tree.get_index_by_element(Field::from(23)).unwrap(), Some(2));

        // The ledger advances; a later sync picks up only the new leaves.
        ledger.borrow_mut().register(Field::from(24));
        let tree = client.sync().unwrap();
        assert_eq!(tree.total_elements(), 4);
        assert_eq!(tree.get_index_by_element(Field::from(24)).unwrap(), Some(3));
    }

    #[test]
    fn test_sync_is_idempotent() {
        let ledger = shared_ledger();
        let mut client = Client::new(StubProver, Rc::clone(&ledger));
        ledger.borrow_mut().register(Field::from(99));

        let root = client.sync().unwrap().root().unwrap();
        let tree = client.sync().unwrap();
        assert_eq!(tree.root().unwrap(), root);
        assert_eq!(tree.total_elements(), 1);
    }

    #[test]
    fn test_sync_detects_shrinking_ledger() {
        let mut inner = InMemoryLedger::new(LEVELS, SEED);
        inner.register(Field::from(1));
        inner.register(Field::from(2));
        let mut client = Client::new(
            StubProver,
            ShrinkingLedger {
                inner,
                reported_total: 2,
            },
        );
        client.sync().unwrap();

        client.ledger.reported_total = 1;
        assert!(matches!(client.sync(), Err(Error::SyncGapDetected(_))));
    }

    #[test]
    fn test_reset_tree_discards_local_state() {
        let ledger = shared_ledger();
        let mut client = Client::new(StubProver, Rc::clone(&ledger));
        ledger.borrow_mut().register(Field::from(1));
        client.sync().unwrap();
        assert_eq!(client.tree().unwrap().total_elements(), 1);

        client.reset_tree().unwrap();
        assert_eq!(client.tree().unwrap().total_elements(), 0);

        // The next sync rebuilds from the ledger in full.
        assert_eq!(client.sync().unwrap().total_elements(), 1);
    }

    #[test]
    fn test_build_join_proof() {
        let ledger = shared_ledger();
        let mut client = Client::new(StubProver, Rc::clone(&ledger));
        let mut rng = ChaChaRng::seed_from_u64(2);

        let invitation = client.create_invitation_rng(&mut rng).unwrap();
        ledger.borrow_mut().register(invitation.invitation);

        let identity = Field::from(0xabcd);
        let bundle = client
            .build_join_proof(identity, invitation.nullifier)
            .unwrap();

        assert_eq!(
            bundle.nullifier_hash,
            poseidon::nullifier_hash(invitation.nullifier, 0).unwrap()
        );
        let tree = client.tree().unwrap();
        assert_eq!(bundle.root, tree.root().unwrap());
        let path = tree.path(0).unwrap();
        assert_eq!(path.leaf, invitation.invitation);
        assert_eq!(path.compute_root(&Poseidon).unwrap(), bundle.root);
    }

    #[test]
    fn test_unknown_nullifier_is_not_found() {
        let ledger = shared_ledger();
        let mut client = Client::new(StubProver, Rc::clone(&ledger));
        let mut rng = ChaChaRng::seed_from_u64(3);

        let registered = client.create_invitation_rng(&mut rng).unwrap();
        ledger.borrow_mut().register(registered.invitation);

        let unknown = client.create_invitation_rng(&mut rng).unwrap();
        assert_eq!(
            client.build_join_proof(Field::ZERO, unknown.nullifier),
            Err(Error::InvitationNotFound)
        );
    }

    #[test]
    fn test_prover_failure_is_distinct_from_not_found() {
        let ledger = shared_ledger();
        let mut client = Client::new(FailingProver, Rc::clone(&ledger));
        let mut rng = ChaChaRng::seed_from_u64(4);

        let invitation = client.create_invitation_rng(&mut rng).unwrap();
        ledger.borrow_mut().register(invitation.invitation);

        assert_eq!(
            client.build_join_proof(Field::ZERO, invitation.nullifier),
            Err(Error::Proof("backend unavailable".to_owned()))
        );
    }

    #[test]
    fn test_duplicate_commitment_resolves_to_newest_leaf() {
        let ledger = shared_ledger();
        let mut client = Client::new(StubProver, Rc::clone(&ledger));
        let mut rng = ChaChaRng::seed_from_u64(5);

        let invitation = client.create_invitation_rng(&mut rng).unwrap();
        ledger.borrow_mut().register(invitation.invitation);
        ledger.borrow_mut().register(Field::from(50));
        ledger.borrow_mut().register(invitation.invitation);

        let bundle = client
            .build_join_proof(Field::ZERO, invitation.nullifier)
            .unwrap();
        assert_eq!(
            bundle.nullifier_hash,
            poseidon::nullifier_hash(invitation.nullifier, 2).unwrap()
        );
    }
}

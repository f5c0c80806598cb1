use crate::*;

/// The eligibility leaf for a voter address.
///
/// The registrar builds the committed set from this same rule, so the
/// client-side pipeline can locate its own leaf in the published set.
pub fn leaf_for(address: &Address) -> Hash256 {
    Hash256::digest(address.as_bytes())
}

/// Holds the current eligibility commitment and checks inclusion proofs
/// against it.
///
/// Root mutation never retroactively invalidates already-recorded
/// nullifiers; elections verify against whichever root is current at cast
/// time.
#[derive(Default)]
pub struct EligibilityOracle {
    root: Option<Hash256>,
    events: Vec<Event>,
}

impl EligibilityOracle {
    pub fn new() -> Self {
        EligibilityOracle::default()
    }

    /// Overwrite the current root. Verifier capability only; the zero root
    /// is refused.
    pub fn update_root(
        &mut self,
        auth: &AuthContext,
        caller: &Address,
        new_root: Hash256,
    ) -> Result<(), Error> {
        auth.require(caller, Role::Verifier)?;
        if new_root.is_zero() {
            return Err(Error::InvalidInput("eligibility root is the zero value"));
        }

        let old_root = self.root.unwrap_or(Hash256::ZERO);
        self.root = Some(new_root);

        log::info!("eligibility root updated: {} -> {}", old_root, new_root);
        self.events.push(Event::EligibilityRootUpdated { old_root, new_root });
        Ok(())
    }

    pub fn current_root(&self) -> Option<Hash256> {
        self.root
    }

    /// Check an inclusion proof for an account's leaf against the current
    /// root.
    pub fn verify(
        &self,
        account: &Address,
        proof: &[Hash256],
        leaf: Hash256,
    ) -> Result<bool, Error> {
        if account.is_zero() {
            return Err(Error::InvalidInput("account is the zero address"));
        }
        self.verify_proof(proof, leaf)
    }

    /// The same check without the account argument; this is what vote
    /// intake uses, where the prover is anonymous.
    pub fn verify_proof(&self, proof: &[Hash256], leaf: Hash256) -> Result<bool, Error> {
        let root = self
            .root
            .ok_or_else(|| Error::NotFound("eligibility root", "no root has been set".to_string()))?;
        Ok(merkle::verify_path(&root, &leaf, proof))
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::new([n; ADDRESS_LENGTH])
    }

    fn oracle_with_root(root: Hash256) -> EligibilityOracle {
        let admin = addr(1);
        let verifier = addr(2);
        let mut auth = AuthContext::new(admin);
        auth.grant(&admin, verifier, Scope::Global, Role::Verifier)
            .unwrap();

        let mut oracle = EligibilityOracle::new();
        oracle.update_root(&auth, &verifier, root).unwrap();
        oracle
    }

    #[test]
    fn update_root_is_verifier_gated() {
        let admin = addr(1);
        let auth = AuthContext::new(admin);
        let mut oracle = EligibilityOracle::new();

        assert!(matches!(
            oracle.update_root(&auth, &admin, Hash256::digest(b"root")),
            Err(Error::Unauthorized(Role::Verifier))
        ));
        assert!(oracle.current_root().is_none());
    }

    #[test]
    fn zero_root_is_refused() {
        let admin = addr(1);
        let verifier = addr(2);
        let mut auth = AuthContext::new(admin);
        auth.grant(&admin, verifier, Scope::Global, Role::Verifier)
            .unwrap();

        let mut oracle = EligibilityOracle::new();
        assert!(matches!(
            oracle.update_root(&auth, &verifier, Hash256::ZERO),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn verify_without_root_fails() {
        let oracle = EligibilityOracle::new();
        assert!(matches!(
            oracle.verify(&addr(9), &[], Hash256::digest(b"leaf")),
            Err(Error::NotFound(..))
        ));
    }

    #[test]
    fn verify_rejects_zero_account() {
        let oracle = oracle_with_root(Hash256::digest(b"root"));
        assert!(matches!(
            oracle.verify(&Address::ZERO, &[], Hash256::digest(b"leaf")),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn root_update_emits_old_and_new_pair() {
        let mut oracle = oracle_with_root(Hash256::digest(b"root"));
        let events = oracle.take_events();
        assert_eq!(
            events,
            vec![Event::EligibilityRootUpdated {
                old_root: Hash256::ZERO,
                new_root: Hash256::digest(b"root"),
            }]
        );
    }

    #[test]
    fn thousand_member_set_has_no_false_results() {
        let members: Vec<Address> = (0..1000u32).map(|i| {
            let mut bytes = [0u8; ADDRESS_LENGTH];
            bytes[..4].copy_from_slice(&i.to_be_bytes());
            bytes[4] = 1;
            Address::new(bytes)
        }).collect();
        let leaves: Vec<Hash256> = members.iter().map(leaf_for).collect();

        let tree = MerkleTree::build(&leaves).unwrap();
        let oracle = oracle_with_root(tree.root());

        // Every genuine member verifies against the root
        for (member, leaf) in members.iter().zip(&leaves) {
            let proof = tree.prove(leaf).unwrap();
            assert!(oracle.verify(member, &proof.siblings, *leaf).unwrap());
        }

        // No leaf outside the set verifies, even on a genuine member's path
        for i in 0..1000u32 {
            let outsider = Hash256::digest(format!("outsider-{}", i).as_bytes());
            let proof = tree.prove(&leaves[(i as usize) % leaves.len()]).unwrap();
            assert!(!oracle.verify(&addr(9), &proof.siblings, outsider).unwrap());
        }
    }
}

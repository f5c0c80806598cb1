use crate::*;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use chrono::Utc;
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const VOTER_SECRET_LENGTH: usize = 32;
const AES_IV_LENGTH: usize = 12;

type AesKey = [u8; 32];

/// Cooperative cancellation for a running preparation.
///
/// Checked between the discrete pipeline steps; a step already running is
/// never interrupted.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What gets encrypted at step 2. Only the voter, holding the secret, can
/// open it again.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BallotPlaintext {
    pub selection: u32,
    pub election: ElectionId,
    pub voter_address: Address,
    pub timestamp: i64,
}

/// The witness handed to the external proving system.
#[derive(Debug, Clone)]
pub struct VoteWitness {
    pub election: ElectionId,
    pub candidate_index: u32,
    pub candidate_hash: Hash256,
    pub vote_hash: Hash256,
    pub eligibility_root: Hash256,
    pub voter_commitment: Hash256,
    pub voter_secret: [u8; VOTER_SECRET_LENGTH],
    pub identity_trapdoor: [u8; 32],
    pub voter_leaf: Hash256,
    pub merkle_path: Vec<Hash256>,
    pub path_directions: Vec<bool>,
}

pub struct ProverOutput {
    pub proof: Vec<u8>,
    pub public_signals: Vec<u8>,
}

/// The external proving capability. CPU-bound; run the whole preparation on
/// a worker thread, off any interaction-blocking path.
pub trait Prover {
    fn prove(&self, witness: &VoteWitness) -> Result<ProverOutput, Error>;
}

/// Everything `prepare_vote` hands back. The ciphertext and the commitment
/// together let the voter privately prove their own vote later without any
/// third party learning the binding.
pub struct VotePreparation {
    pub encrypted_vote: Vec<u8>,
    pub merkle_proof: MerkleProof,
    pub proof: Vec<u8>,
    pub public_signals: Vec<u8>,
    pub voter_secret: [u8; VOTER_SECRET_LENGTH],
    pub voter_commitment: Hash256,
    pub vote_hash: Hash256,
}

impl VotePreparation {
    /// The submission form an Election accepts.
    pub fn into_submission(self) -> VoteSubmission {
        VoteSubmission {
            encrypted_vote: self.encrypted_vote,
            merkle_proof: self.merkle_proof.siblings,
            voter_leaf: self.merkle_proof.leaf,
            proof: self.proof,
            public_inputs: self.public_signals,
        }
    }
}

/// Client-side preparation of the encrypted-vote + Merkle-proof + zk-proof
/// bundle a voter submits.
///
/// Any step failing aborts the whole preparation; no partial bundle is
/// returned or reused.
pub struct VoteProofPipeline<'a, P: Prover> {
    prover: &'a P,
    cancel: CancelToken,
}

impl<'a, P: Prover> VoteProofPipeline<'a, P> {
    pub fn new(prover: &'a P) -> Self {
        VoteProofPipeline {
            prover,
            cancel: CancelToken::new(),
        }
    }

    /// Share `cancel` with the caller so an in-flight preparation can be
    /// abandoned between steps.
    pub fn with_cancel(prover: &'a P, cancel: CancelToken) -> Self {
        VoteProofPipeline { prover, cancel }
    }

    pub fn prepare_vote(
        &self,
        selection: usize,
        candidates: &[Address],
        election: ElectionId,
        voter_address: Address,
        eligible_leaves: &[Hash256],
    ) -> Result<VotePreparation, Error> {
        if voter_address.is_zero() {
            return Err(Error::InvalidInput("voter address is the zero address"));
        }
        if selection >= candidates.len() {
            return Err(Error::InvalidInput(
                "candidate selection is out of range for this election",
            ));
        }
        let candidate = candidates[selection];

        // Step 1: fresh voter secret
        self.checkpoint()?;
        let mut voter_secret = [0u8; VOTER_SECRET_LENGTH];
        OsRng.fill_bytes(&mut voter_secret);

        // Step 2: encrypt the ballot and compute the binding hashes
        self.checkpoint()?;
        let plaintext = BallotPlaintext {
            selection: selection as u32,
            election,
            voter_address,
            timestamp: Utc::now().timestamp(),
        };
        let encoded = serde_cbor::to_vec(&plaintext)?;
        let encrypted_vote = encrypt_ballot(&voter_secret, &encoded)?;

        let voter_leaf = leaf_for(&voter_address);
        let vote_hash = vote_hash(&election, &candidate, &voter_secret);
        let commitment = voter_commitment(&voter_secret, &voter_leaf);

        // Step 3: Merkle inclusion proof against the eligible set
        self.checkpoint()?;
        let tree = MerkleTree::build(eligible_leaves)?;
        let merkle_proof = tree.prove(&voter_leaf).ok_or(Error::NotEligible)?;

        // Step 4: witness construction and the external prover
        self.checkpoint()?;
        let witness = VoteWitness {
            election,
            candidate_index: selection as u32,
            candidate_hash: Hash256::digest(candidate.as_bytes()),
            vote_hash,
            eligibility_root: tree.root(),
            voter_commitment: commitment,
            voter_secret,
            identity_trapdoor: derive_trapdoor(&voter_secret),
            voter_leaf,
            merkle_path: merkle_proof.siblings.clone(),
            path_directions: merkle_proof.directions.clone(),
        };
        let ProverOutput {
            proof,
            public_signals,
        } = self.prover.prove(&witness)?;

        // Step 5: assemble the bundle
        self.checkpoint()?;
        Ok(VotePreparation {
            encrypted_vote,
            merkle_proof,
            proof,
            public_signals,
            voter_secret,
            voter_commitment: commitment,
            vote_hash,
        })
    }

    fn checkpoint(&self) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// The hash binding candidate, election, and secret.
pub fn vote_hash(
    election: &ElectionId,
    candidate: &Address,
    voter_secret: &[u8; VOTER_SECRET_LENGTH],
) -> Hash256 {
    let mut hasher = Sha256::new();
    hasher.update(election.as_bytes());
    hasher.update(candidate.as_bytes());
    hasher.update(voter_secret);
    Hash256::new(hasher.finalize().into())
}

/// The hash binding the voter's secret and leaf.
pub fn voter_commitment(
    voter_secret: &[u8; VOTER_SECRET_LENGTH],
    voter_leaf: &Hash256,
) -> Hash256 {
    let mut hasher = Sha256::new();
    hasher.update(voter_secret);
    hasher.update(voter_leaf.as_bytes());
    Hash256::new(hasher.finalize().into())
}

/// Open an encrypted ballot with the voter's own secret.
pub fn decrypt_ballot(
    voter_secret: &[u8; VOTER_SECRET_LENGTH],
    ciphertext: &[u8],
) -> Result<BallotPlaintext, Error> {
    if ciphertext.len() <= AES_IV_LENGTH {
        return Err(Error::DecryptionFailed);
    }
    let key = ballot_key(voter_secret);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));

    let (iv, encrypted) = ciphertext.split_at(AES_IV_LENGTH);
    let plain = cipher
        .decrypt(Nonce::from_slice(iv), encrypted)
        .map_err(|_| Error::DecryptionFailed)?;

    Ok(serde_cbor::from_slice(&plain)?)
}

fn encrypt_ballot(
    voter_secret: &[u8; VOTER_SECRET_LENGTH],
    msg: &[u8],
) -> Result<Vec<u8>, Error> {
    let key = ballot_key(voter_secret);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));

    let mut iv = [0u8; AES_IV_LENGTH];
    rand::thread_rng().fill_bytes(&mut iv);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), msg)
        .map_err(|_| Error::EncryptionFailed)?;

    let mut output = Vec::with_capacity(AES_IV_LENGTH + ciphertext.len());
    output.extend_from_slice(&iv);
    output.extend(ciphertext);
    Ok(output)
}

fn ballot_key(voter_secret: &[u8; VOTER_SECRET_LENGTH]) -> AesKey {
    let h = Hkdf::<Sha256>::new(None, voter_secret);
    let mut out = [0u8; 32];
    h.expand(b"univote_ballot_key", &mut out).unwrap();
    out
}

// Derive the auxiliary identity trapdoor from the voter secret
fn derive_trapdoor(voter_secret: &[u8; VOTER_SECRET_LENGTH]) -> [u8; 32] {
    use rand_chacha::rand_core::{RngCore, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    let h = Hkdf::<Sha256>::new(None, voter_secret);
    let mut seed = [0u8; 32];
    h.expand(b"univote_identity_trapdoor", &mut seed).unwrap();

    let mut rng = ChaCha20Rng::from_seed(seed);
    let mut trapdoor = [0u8; 32];
    rng.fill_bytes(&mut trapdoor);
    trapdoor
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingProver;

    impl Prover for RecordingProver {
        fn prove(&self, witness: &VoteWitness) -> Result<ProverOutput, Error> {
            let public_signals = serde_cbor::to_vec(&(
                witness.election.to_string(),
                witness.candidate_hash.to_string(),
                witness.vote_hash.to_string(),
                witness.eligibility_root.to_string(),
                true,
                witness.voter_commitment.to_string(),
            ))?;
            Ok(ProverOutput {
                proof: b"zk-proof".to_vec(),
                public_signals,
            })
        }
    }

    struct FailingProver;

    impl Prover for FailingProver {
        fn prove(&self, _witness: &VoteWitness) -> Result<ProverOutput, Error> {
            Err(Error::ProverFailed("constraint system unsatisfied".to_string()))
        }
    }

    fn addr(n: u8) -> Address {
        Address::new([n; ADDRESS_LENGTH])
    }

    fn setup() -> (Vec<Address>, Vec<Address>, Vec<Hash256>, ElectionId) {
        let candidates: Vec<Address> = (30..33).map(addr).collect();
        let voters: Vec<Address> = (10..18).map(addr).collect();
        let leaves: Vec<Hash256> = voters.iter().map(leaf_for).collect();
        (candidates, voters, leaves, ElectionId::derive("SU", 1))
    }

    #[test]
    fn prepares_a_complete_bundle() {
        let (candidates, voters, leaves, election) = setup();
        let prover = RecordingProver;
        let pipeline = VoteProofPipeline::new(&prover);

        let prepared = pipeline
            .prepare_vote(1, &candidates, election, voters[0], &leaves)
            .unwrap();

        // The leaf and path verify against the set the proof was built from
        let tree = MerkleTree::build(&leaves).unwrap();
        assert_eq!(prepared.merkle_proof.leaf, leaf_for(&voters[0]));
        assert!(verify_path(
            &tree.root(),
            &prepared.merkle_proof.leaf,
            &prepared.merkle_proof.siblings,
        ));

        // The voter can open its own ballot; nobody without the secret can
        let plaintext = decrypt_ballot(&prepared.voter_secret, &prepared.encrypted_vote).unwrap();
        assert_eq!(plaintext.selection, 1);
        assert_eq!(plaintext.election, election);
        assert_eq!(plaintext.voter_address, voters[0]);

        let wrong_secret = [9u8; VOTER_SECRET_LENGTH];
        assert!(matches!(
            decrypt_ballot(&wrong_secret, &prepared.encrypted_vote),
            Err(Error::DecryptionFailed)
        ));

        // Binding hashes are reproducible from the returned secret
        assert_eq!(
            prepared.vote_hash,
            vote_hash(&election, &candidates[1], &prepared.voter_secret)
        );
        assert_eq!(
            prepared.voter_commitment,
            voter_commitment(&prepared.voter_secret, &prepared.merkle_proof.leaf)
        );

        let submission = prepared.into_submission();
        assert_eq!(submission.proof, b"zk-proof".to_vec());
    }

    #[test]
    fn fresh_secret_per_preparation() {
        let (candidates, voters, leaves, election) = setup();
        let prover = RecordingProver;
        let pipeline = VoteProofPipeline::new(&prover);

        let first = pipeline
            .prepare_vote(0, &candidates, election, voters[0], &leaves)
            .unwrap();
        let second = pipeline
            .prepare_vote(0, &candidates, election, voters[0], &leaves)
            .unwrap();
        assert_ne!(first.voter_secret, second.voter_secret);
        assert_ne!(first.voter_commitment, second.voter_commitment);
    }

    #[test]
    fn out_of_range_selection_is_refused() {
        let (candidates, voters, leaves, election) = setup();
        let prover = RecordingProver;
        let pipeline = VoteProofPipeline::new(&prover);

        assert!(matches!(
            pipeline.prepare_vote(candidates.len(), &candidates, election, voters[0], &leaves),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn ineligible_voter_is_refused() {
        let (candidates, _, leaves, election) = setup();
        let prover = RecordingProver;
        let pipeline = VoteProofPipeline::new(&prover);

        assert!(matches!(
            pipeline.prepare_vote(0, &candidates, election, addr(99), &leaves),
            Err(Error::NotEligible)
        ));
    }

    #[test]
    fn prover_failure_aborts_the_preparation() {
        let (candidates, voters, leaves, election) = setup();
        let prover = FailingProver;
        let pipeline = VoteProofPipeline::new(&prover);

        assert!(matches!(
            pipeline.prepare_vote(0, &candidates, election, voters[0], &leaves),
            Err(Error::ProverFailed(_))
        ));
    }

    #[test]
    fn cancelled_token_stops_before_work() {
        let (candidates, voters, leaves, election) = setup();
        let prover = RecordingProver;
        let cancel = CancelToken::new();
        let pipeline = VoteProofPipeline::with_cancel(&prover, cancel.clone());

        cancel.cancel();
        assert!(matches!(
            pipeline.prepare_vote(0, &candidates, election, voters[0], &leaves),
            Err(Error::Cancelled)
        ));
    }

    #[test]
    fn trapdoor_is_deterministic_in_the_secret() {
        let secret = [7u8; VOTER_SECRET_LENGTH];
        assert_eq!(derive_trapdoor(&secret), derive_trapdoor(&secret));
        assert_ne!(derive_trapdoor(&secret), derive_trapdoor(&[8u8; 32]));
    }
}

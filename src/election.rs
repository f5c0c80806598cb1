use crate::*;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use num_enum::TryFromPrimitive;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

/// Election lifecycle phases.
///
/// Phase only advances `Registration -> Voting -> Tally -> Results ->
/// Completed`; `Cancelled` is reachable from the first three and halts
/// every mutating entry point thereafter.
#[derive(Serialize, Deserialize, TryFromPrimitive, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ElectionPhase {
    Registration = 1,
    Voting = 2,
    Tally = 3,
    Results = 4,
    Completed = 5,
    Cancelled = 6,
}

impl std::fmt::Display for ElectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            ElectionPhase::Registration => "Registration",
            ElectionPhase::Voting => "Voting",
            ElectionPhase::Tally => "Tally",
            ElectionPhase::Results => "Results",
            ElectionPhase::Completed => "Completed",
            ElectionPhase::Cancelled => "Cancelled",
        };
        write!(f, "{}", name)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ElectionConfig {
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub eligibility_root: Hash256,
    pub is_active: bool,
}

/// The artifacts one voter submits to `cast_vote`. The core treats every
/// field as opaque bytes; encoding is an external concern.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VoteSubmission {
    #[serde(with = "hex_serde")]
    pub encrypted_vote: Vec<u8>,

    /// Ordered sibling-hash sequence for the voter leaf.
    pub merkle_proof: Vec<Hash256>,
    pub voter_leaf: Hash256,

    #[serde(with = "hex_serde")]
    pub proof: Vec<u8>,

    #[serde(with = "hex_serde")]
    pub public_inputs: Vec<u8>,
}

impl VoteSubmission {
    /// Pack into bytes
    pub fn as_bytes(&self) -> Vec<u8> {
        serde_cbor::to_vec(self).expect("univote: Unexpected error packing vote submission")
    }

    /// Unpack from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        // If it starts with `{` then it's JSON
        if bytes.first() == Some(&b'{') {
            Ok(serde_json::from_slice(bytes)?)
        } else {
            Ok(serde_cbor::from_slice(bytes)?)
        }
    }
}

/// One recorded vote: the replay nullifier and the opaque ciphertext kept
/// for tallying. The chosen candidate never appears in plaintext.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StoredBallot {
    pub nullifier: Hash256,

    #[serde(with = "hex_serde")]
    pub encrypted_vote: Vec<u8>,
}

/// One election instance: the phase state machine plus its own candidate
/// list and nullifier set, bound at approval time to an eligibility oracle,
/// the global candidate registry, and a proof verifier.
///
/// Mutating operations take `&mut self`; the factory arena hands instances
/// out behind a per-instance lock, which is what makes the nullifier
/// check-then-insert a single indivisible step.
pub struct Election {
    pub id: ElectionId,
    config: ElectionConfig,
    phase: ElectionPhase,
    candidates: IndexMap<Address, String>,
    nullifiers: HashSet<Hash256>,
    ballots: Vec<StoredBallot>,
    result_hash: Option<Hash256>,
    oracle: Arc<RwLock<EligibilityOracle>>,
    candidate_registry: Arc<RwLock<CandidateRegistry>>,
    proof_verifier: Arc<dyn ProofVerifier>,
    events: Vec<Event>,
}

impl Election {
    pub(crate) fn new(
        id: ElectionId,
        config: ElectionConfig,
        oracle: Arc<RwLock<EligibilityOracle>>,
        candidate_registry: Arc<RwLock<CandidateRegistry>>,
        proof_verifier: Arc<dyn ProofVerifier>,
    ) -> Self {
        Election {
            id,
            config,
            phase: ElectionPhase::Registration,
            candidates: IndexMap::new(),
            nullifiers: HashSet::new(),
            ballots: Vec::new(),
            result_hash: None,
            oracle,
            candidate_registry,
            proof_verifier,
            events: Vec::new(),
        }
    }

    fn ensure_active(&self) -> Result<(), Error> {
        if self.config.is_active {
            Ok(())
        } else {
            Err(Error::Paused)
        }
    }

    fn ensure_phase(&self, expected: ElectionPhase) -> Result<(), Error> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(Error::WrongPhase {
                expected,
                actual: self.phase,
            })
        }
    }

    /// Admit a candidate to this election's own list. ElectionAdmin only,
    /// Registration phase only, and the address must be verified in the
    /// global registry.
    pub fn register_candidate(
        &mut self,
        auth: &mut AuthContext,
        caller: &Address,
        address: Address,
        content_hash: &str,
    ) -> Result<(), Error> {
        self.ensure_active()?;
        auth.require_scoped(caller, self.id, Role::ElectionAdmin)?;
        self.ensure_phase(ElectionPhase::Registration)?;

        if self.candidates.contains_key(&address) {
            return Err(Error::AlreadyExists(
                "election candidate",
                address.to_string(),
            ));
        }
        {
            let registry = self
                .candidate_registry
                .read()
                .expect("univote: candidate registry lock poisoned");
            if !registry.is_verified(&address)? {
                return Err(Error::InvalidInput("candidate is not verified"));
            }
        }

        self.candidates.insert(address, content_hash.to_string());
        auth.grant_internal(address, Scope::Election(self.id), Role::Candidate);

        log::info!("election {}: candidate {} admitted", self.id, address);
        self.events
            .push(Event::ElectionCandidateRegistered {
                election: self.id,
                address,
            });
        Ok(())
    }

    /// Open voting. ElectionAdmin only, from Registration, no earlier than
    /// the configured start time.
    pub fn start(&mut self, auth: &AuthContext, caller: &Address) -> Result<(), Error> {
        self.start_at(auth, caller, Utc::now())
    }

    /// Time-explicit variant of `start` for ledger-time callers.
    pub fn start_at(
        &mut self,
        auth: &AuthContext,
        caller: &Address,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        self.ensure_active()?;
        auth.require_scoped(caller, self.id, Role::ElectionAdmin)?;
        self.ensure_phase(ElectionPhase::Registration)?;
        if now < self.config.start_time {
            return Err(Error::Timing("voting window has not opened"));
        }

        self.phase = ElectionPhase::Voting;
        log::info!("election {}: voting started", self.id);
        self.events.push(Event::ElectionStarted { election: self.id });
        Ok(())
    }

    /// Accept one anonymous vote bundle.
    ///
    /// Order of checks: active, phase, window, Merkle eligibility against
    /// the oracle's current root, zk proof, then the nullifier. The
    /// nullifier check and insert happen as one step under the instance
    /// lock. On success the nullifier and the opaque ciphertext are
    /// recorded; the chosen candidate is never stored in plaintext.
    pub fn cast_vote(&mut self, submission: VoteSubmission) -> Result<Hash256, Error> {
        self.cast_vote_at(submission, Utc::now())
    }

    /// Time-explicit variant of `cast_vote` for ledger-time callers.
    pub fn cast_vote_at(
        &mut self,
        submission: VoteSubmission,
        now: DateTime<Utc>,
    ) -> Result<Hash256, Error> {
        self.ensure_active()?;
        self.ensure_phase(ElectionPhase::Voting)?;
        if now >= self.config.end_time {
            return Err(Error::Timing("voting window has closed"));
        }

        let eligible = {
            let oracle = self.oracle.read().expect("univote: oracle lock poisoned");
            oracle.verify_proof(&submission.merkle_proof, submission.voter_leaf)?
        };
        if !eligible {
            return Err(Error::ProofInvalid(
                "merkle proof does not match the eligibility root",
            ));
        }

        if !self
            .proof_verifier
            .verify(&submission.proof, &submission.public_inputs)
        {
            return Err(Error::ProofInvalid("vote proof rejected by the verifier"));
        }

        let nullifier = self.nullifier_for(&submission.voter_leaf);
        if self.nullifiers.contains(&nullifier) {
            return Err(Error::Replay);
        }
        self.nullifiers.insert(nullifier);
        self.ballots.push(StoredBallot {
            nullifier,
            encrypted_vote: submission.encrypted_vote,
        });

        log::info!("election {}: vote cast, nullifier {}", self.id, nullifier);
        self.events.push(Event::VoteCast {
            election: self.id,
            nullifier,
        });
        Ok(nullifier)
    }

    /// The replay nullifier for a voter leaf.
    ///
    /// Derived from the stable leaf, never from the per-attempt voter
    /// secret or commitment: regenerating the secret yields the same
    /// nullifier. Namespaced by election id, so one leaf may vote once in
    /// each election it is eligible for.
    pub fn nullifier_for(&self, leaf: &Hash256) -> Hash256 {
        let mut hasher = Sha256::new();
        hasher.update(b"univote.nullifier");
        hasher.update(self.id.as_bytes());
        hasher.update(leaf.as_bytes());
        Hash256::new(hasher.finalize().into())
    }

    /// Close voting. ElectionAdmin only, from Voting, no earlier than the
    /// configured end time.
    pub fn end(&mut self, auth: &AuthContext, caller: &Address) -> Result<(), Error> {
        self.end_at(auth, caller, Utc::now())
    }

    /// Time-explicit variant of `end` for ledger-time callers.
    pub fn end_at(
        &mut self,
        auth: &AuthContext,
        caller: &Address,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        self.ensure_active()?;
        auth.require_scoped(caller, self.id, Role::ElectionAdmin)?;
        self.ensure_phase(ElectionPhase::Voting)?;
        if now < self.config.end_time {
            return Err(Error::Timing("voting window has not closed"));
        }

        self.phase = ElectionPhase::Tally;
        log::info!("election {}: voting ended", self.id);
        self.events.push(Event::ElectionEnded { election: self.id });
        Ok(())
    }

    /// Record the tally: a proof that `result_hash` is the correct
    /// aggregation of all recorded encrypted votes, checked through the
    /// injected verifier.
    pub fn tally_votes(
        &mut self,
        auth: &AuthContext,
        caller: &Address,
        tally_proof: &[u8],
        tally_public_inputs: &[u8],
        result_hash: Hash256,
    ) -> Result<(), Error> {
        self.ensure_active()?;
        auth.require_scoped(caller, self.id, Role::ElectionAdmin)?;
        self.ensure_phase(ElectionPhase::Tally)?;

        if !self.proof_verifier.verify(tally_proof, tally_public_inputs) {
            return Err(Error::ProofInvalid("tally proof rejected by the verifier"));
        }

        self.result_hash = Some(result_hash);
        self.phase = ElectionPhase::Results;
        log::info!("election {}: tally recorded", self.id);
        self.events.push(Event::TallyRecorded {
            election: self.id,
            result_hash,
        });
        Ok(())
    }

    /// Make the recorded result permanently queryable.
    pub fn publish_results(&mut self, auth: &AuthContext, caller: &Address) -> Result<(), Error> {
        self.ensure_active()?;
        auth.require_scoped(caller, self.id, Role::ElectionAdmin)?;
        self.ensure_phase(ElectionPhase::Results)?;
        let result_hash = self
            .result_hash
            .ok_or_else(|| Error::NotFound("tally result", self.id.to_string()))?;

        self.phase = ElectionPhase::Completed;
        log::info!("election {}: results published", self.id);
        self.events.push(Event::ResultsPublished {
            election: self.id,
            result_hash,
        });
        Ok(())
    }

    /// Halt the election. DefaultAdmin-level capability only; allowed from
    /// Registration, Voting, or Tally. Every later mutating call fails
    /// Paused.
    pub fn cancel(&mut self, auth: &AuthContext, caller: &Address) -> Result<(), Error> {
        auth.require(caller, Role::DefaultAdmin)?;

        match self.phase {
            ElectionPhase::Completed => Err(Error::AlreadyCompleted),
            ElectionPhase::Cancelled => Err(Error::Paused),
            ElectionPhase::Results => Err(Error::WrongPhase {
                expected: ElectionPhase::Tally,
                actual: self.phase,
            }),
            _ => {
                self.config.is_active = false;
                self.phase = ElectionPhase::Cancelled;
                log::warn!("election {}: cancelled", self.id);
                self.events.push(Event::ElectionCancelled { election: self.id });
                Ok(())
            }
        }
    }

    // Read-only views
    // ----------------------------------

    pub fn phase(&self) -> ElectionPhase {
        self.phase
    }

    pub fn config(&self) -> &ElectionConfig {
        &self.config
    }

    pub fn candidates(&self) -> &IndexMap<Address, String> {
        &self.candidates
    }

    pub fn ballots(&self) -> &[StoredBallot] {
        &self.ballots
    }

    pub fn vote_count(&self) -> usize {
        self.ballots.len()
    }

    pub fn nullifier_used(&self, nullifier: &Hash256) -> bool {
        self.nullifiers.contains(nullifier)
    }

    pub fn result_hash(&self) -> Option<Hash256> {
        self.result_hash
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}

use crate::*;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::sync::{Arc, Mutex, RwLock};

/// Everything an ElectionOfficer submits to propose an election: the
/// schedule, the eligibility commitment, and the shared stores the new
/// instance will be bound to.
#[derive(Clone)]
pub struct ProposalSpec {
    pub university_code: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub eligibility_root: Hash256,
    pub oracle: Arc<RwLock<EligibilityOracle>>,
    pub candidate_registry: Arc<RwLock<CandidateRegistry>>,
    pub proof_verifier: Arc<dyn ProofVerifier>,
}

/// A pending or approved proposal. Immutable once approved.
pub struct ElectionProposal {
    pub university_code: String,
    pub proposal_id: u64,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub eligibility_root: Hash256,
    pub proposer: Address,
    pub approved: bool,
    oracle: Arc<RwLock<EligibilityOracle>>,
    candidate_registry: Arc<RwLock<CandidateRegistry>>,
    proof_verifier: Arc<dyn ProofVerifier>,
}

/// The proposal/approval workflow gating creation of Election instances,
/// and the arena those instances live in.
#[derive(Default)]
pub struct ElectionFactory {
    proposals: IndexMap<(String, u64), ElectionProposal>,
    proposal_count: IndexMap<String, u64>,
    elections: IndexMap<ElectionId, Arc<Mutex<Election>>>,
    by_university: IndexMap<String, Vec<ElectionId>>,
    events: Vec<Event>,
}

impl ElectionFactory {
    pub fn new() -> Self {
        ElectionFactory::default()
    }

    /// Submit a proposal. ElectionOfficer capability only; the university
    /// must exist and be active, the schedule must be ordered, and the
    /// eligibility root must be non-zero. Returns the per-university
    /// proposal id (a monotonically increasing counter).
    pub fn propose(
        &mut self,
        auth: &AuthContext,
        caller: &Address,
        universities: &UniversityRegistry,
        spec: ProposalSpec,
    ) -> Result<u64, Error> {
        auth.require(caller, Role::ElectionOfficer)?;

        let university = universities.get(&spec.university_code)?;
        if !university.is_active {
            return Err(Error::InvalidInput("university is deactivated"));
        }
        if spec.eligibility_root.is_zero() {
            return Err(Error::InvalidInput("eligibility root is the zero value"));
        }
        if spec.start_time >= spec.end_time {
            return Err(Error::InvalidInput(
                "election start time must precede its end time",
            ));
        }

        let count = self
            .proposal_count
            .entry(spec.university_code.clone())
            .or_insert(0);
        *count += 1;
        let proposal_id = *count;

        let proposal = ElectionProposal {
            university_code: spec.university_code.clone(),
            proposal_id,
            title: spec.title,
            start_time: spec.start_time,
            end_time: spec.end_time,
            eligibility_root: spec.eligibility_root,
            proposer: *caller,
            approved: false,
            oracle: spec.oracle,
            candidate_registry: spec.candidate_registry,
            proof_verifier: spec.proof_verifier,
        };
        self.proposals
            .insert((spec.university_code.clone(), proposal_id), proposal);

        log::info!(
            "election proposal {}/{} submitted",
            spec.university_code,
            proposal_id
        );
        self.events.push(Event::ElectionProposalSubmitted {
            university_code: spec.university_code,
            proposal_id,
        });
        Ok(proposal_id)
    }

    /// Approve a proposal and instantiate its Election. DAO capability
    /// only; exactly one approval transition per proposal. The new
    /// instance starts in Registration and its proposer is granted
    /// ElectionAdmin scoped to it.
    pub fn approve(
        &mut self,
        auth: &mut AuthContext,
        caller: &Address,
        university_code: &str,
        proposal_id: u64,
    ) -> Result<ElectionId, Error> {
        auth.require(caller, Role::Dao)?;

        let key = (university_code.to_string(), proposal_id);
        let proposal = self.proposals.get_mut(&key).ok_or_else(|| {
            Error::NotFound(
                "election proposal",
                format!("{}/{}", university_code, proposal_id),
            )
        })?;
        if proposal.approved {
            return Err(Error::AlreadyExists(
                "election approval",
                format!("{}/{}", university_code, proposal_id),
            ));
        }

        let id = ElectionId::derive(university_code, proposal_id);
        let config = ElectionConfig {
            title: proposal.title.clone(),
            start_time: proposal.start_time,
            end_time: proposal.end_time,
            eligibility_root: proposal.eligibility_root,
            is_active: true,
        };
        let election = Election::new(
            id,
            config,
            Arc::clone(&proposal.oracle),
            Arc::clone(&proposal.candidate_registry),
            Arc::clone(&proposal.proof_verifier),
        );
        proposal.approved = true;
        let proposer = proposal.proposer;

        auth.grant_internal(proposer, Scope::Election(id), Role::ElectionAdmin);
        self.elections.insert(id, Arc::new(Mutex::new(election)));
        self.by_university
            .entry(university_code.to_string())
            .or_default()
            .push(id);

        log::info!(
            "election proposal {}/{} approved as {}",
            university_code,
            proposal_id,
            id
        );
        self.events.push(Event::ElectionApproved {
            university_code: university_code.to_string(),
            proposal_id,
            election: id,
        });
        Ok(id)
    }

    pub fn list_elections(&self, university_code: &str) -> &[ElectionId] {
        self.by_university
            .get(university_code)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

    /// The per-instance handle; mutating operations run under its lock.
    pub fn election(&self, id: ElectionId) -> Result<Arc<Mutex<Election>>, Error> {
        self.elections
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound("election", id.to_string()))
    }

    pub fn proposal(
        &self,
        university_code: &str,
        proposal_id: u64,
    ) -> Result<&ElectionProposal, Error> {
        self.proposals
            .get(&(university_code.to_string(), proposal_id))
            .ok_or_else(|| {
                Error::NotFound(
                    "election proposal",
                    format!("{}/{}", university_code, proposal_id),
                )
            })
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}

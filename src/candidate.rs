use crate::*;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;

/// A global candidate record.
///
/// Profile documents (name, platform, photo, ...) live in external
/// content-addressed storage; only the content-address string is stored and
/// compared here.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Candidate {
    pub address: Address,
    pub content_hash: String,
    pub is_verified: bool,
    pub registration_timestamp: DateTime<Utc>,
}

/// The global candidate directory with a verification flag per candidate.
#[derive(Default)]
pub struct CandidateRegistry {
    candidates: IndexMap<Address, Candidate>,
    events: Vec<Event>,
}

impl CandidateRegistry {
    pub fn new() -> Self {
        CandidateRegistry::default()
    }

    /// Register a new candidate, unverified. CandidateManager capability
    /// only; grants the Candidate capability to the address.
    pub fn register(
        &mut self,
        auth: &mut AuthContext,
        caller: &Address,
        address: Address,
        content_hash: &str,
    ) -> Result<(), Error> {
        auth.require(caller, Role::CandidateManager)?;
        if address.is_zero() {
            return Err(Error::InvalidInput("candidate address is the zero address"));
        }
        if self.candidates.contains_key(&address) {
            return Err(Error::AlreadyExists("candidate", address.to_string()));
        }

        let candidate = Candidate {
            address,
            content_hash: content_hash.to_string(),
            is_verified: false,
            registration_timestamp: Utc::now(),
        };
        self.candidates.insert(address, candidate);
        auth.grant_internal(address, Scope::Global, Role::Candidate);

        log::info!("candidate {} registered", address);
        self.events.push(Event::CandidateRegistered { address });
        Ok(())
    }

    /// Replace a candidate's content address. The manager or the candidate
    /// itself may do this.
    pub fn update_info(
        &mut self,
        auth: &AuthContext,
        caller: &Address,
        address: Address,
        new_hash: &str,
    ) -> Result<(), Error> {
        let allowed =
            *caller == address || auth.has(caller, Scope::Global, Role::CandidateManager);
        if !allowed {
            return Err(Error::Unauthorized(Role::CandidateManager));
        }

        let candidate = self
            .candidates
            .get_mut(&address)
            .ok_or_else(|| Error::NotFound("candidate", address.to_string()))?;
        candidate.content_hash = new_hash.to_string();

        log::info!("candidate {} info updated", address);
        self.events.push(Event::CandidateInfoUpdated { address });
        Ok(())
    }

    /// Toggle the verification flag. CandidateManager capability only.
    pub fn set_verified(
        &mut self,
        auth: &AuthContext,
        caller: &Address,
        address: Address,
        verified: bool,
    ) -> Result<(), Error> {
        auth.require(caller, Role::CandidateManager)?;
        let candidate = self
            .candidates
            .get_mut(&address)
            .ok_or_else(|| Error::NotFound("candidate", address.to_string()))?;
        candidate.is_verified = verified;

        log::info!("candidate {} verified: {}", address, verified);
        self.events.push(Event::CandidateVerificationStatusUpdated {
            address,
            is_verified: verified,
        });
        Ok(())
    }

    pub fn get(&self, address: &Address) -> Result<&Candidate, Error> {
        self.candidates
            .get(address)
            .ok_or_else(|| Error::NotFound("candidate", address.to_string()))
    }

    pub fn is_verified(&self, address: &Address) -> Result<bool, Error> {
        Ok(self.get(address)?.is_verified)
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}

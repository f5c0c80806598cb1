use crate::*;

/// Protocol events, consumed by the embedding application via each
/// component's event buffer (the library analog of a log/notification
/// subscription).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum Event {
    UniversityRegistered {
        code: String,
    },
    UniversityAdminUpdated {
        code: String,
        old_wallet: Address,
        new_wallet: Address,
    },
    UniversityStatusUpdated {
        code: String,
        is_active: bool,
    },
    CandidateRegistered {
        address: Address,
    },
    CandidateInfoUpdated {
        address: Address,
    },
    CandidateVerificationStatusUpdated {
        address: Address,
        is_verified: bool,
    },
    ElectionProposalSubmitted {
        university_code: String,
        proposal_id: u64,
    },
    ElectionApproved {
        university_code: String,
        proposal_id: u64,
        election: ElectionId,
    },
    ElectionCandidateRegistered {
        election: ElectionId,
        address: Address,
    },
    ElectionStarted {
        election: ElectionId,
    },
    VoteCast {
        election: ElectionId,
        nullifier: Hash256,
    },
    ElectionEnded {
        election: ElectionId,
    },
    TallyRecorded {
        election: ElectionId,
        result_hash: Hash256,
    },
    ResultsPublished {
        election: ElectionId,
        result_hash: Hash256,
    },
    ElectionCancelled {
        election: ElectionId,
    },
    EligibilityRootUpdated {
        old_root: Hash256,
        new_root: Hash256,
    },
}

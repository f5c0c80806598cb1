use crate::*;
use indexmap::{IndexMap, IndexSet};

/// A named capability bound to a principal, checked before a privileged
/// operation executes.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Registrar,
    Dao,
    ElectionOfficer,
    CandidateManager,
    Candidate,
    UniversityAdmin,
    Verifier,
    VerifiedVoter,
    ElectionAdmin,
    DefaultAdmin,
}

impl Role {
    pub const ALL: [Role; 10] = [
        Role::Registrar,
        Role::Dao,
        Role::ElectionOfficer,
        Role::CandidateManager,
        Role::Candidate,
        Role::UniversityAdmin,
        Role::Verifier,
        Role::VerifiedVoter,
        Role::ElectionAdmin,
        Role::DefaultAdmin,
    ];

    /// The stable name this capability is known by externally.
    pub fn name(&self) -> &'static str {
        match self {
            Role::Registrar => "REGISTRAR_ROLE",
            Role::Dao => "DAO_ROLE",
            Role::ElectionOfficer => "ELECTION_OFFICER_ROLE",
            Role::CandidateManager => "CANDIDATE_MANAGER_ROLE",
            Role::Candidate => "CANDIDATE_ROLE",
            Role::UniversityAdmin => "UNIVERSITY_ADMIN_ROLE",
            Role::Verifier => "VERIFIER_ROLE",
            Role::VerifiedVoter => "VERIFIED_VOTER_ROLE",
            Role::ElectionAdmin => "ELECTION_ADMIN_ROLE",
            Role::DefaultAdmin => "DEFAULT_ADMIN_ROLE",
        }
    }

    /// The fixed-width capability identifier: the hash of the stable name.
    pub fn id(&self) -> Hash256 {
        Hash256::digest(self.name().as_bytes())
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Where a capability applies: everywhere, or on one Election instance.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Global,
    Election(ElectionId),
}

/// The per-principal capability sets, injected into every mutating
/// operation.
///
/// `grant` and `revoke` are themselves gated on DefaultAdmin; the grants a
/// registry operation confers on its own (UniversityAdmin on registration,
/// Candidate on admission, ElectionAdmin on approval) go through the
/// crate-internal unchecked paths.
#[derive(Default, Clone)]
pub struct AuthContext {
    grants: IndexMap<Address, IndexSet<(Scope, Role)>>,
}

impl AuthContext {
    /// Bootstrap a context with one DefaultAdmin.
    pub fn new(default_admin: Address) -> Self {
        let mut ctx = AuthContext::default();
        ctx.grant_internal(default_admin, Scope::Global, Role::DefaultAdmin);
        ctx
    }

    pub fn grant(
        &mut self,
        caller: &Address,
        to: Address,
        scope: Scope,
        role: Role,
    ) -> Result<(), Error> {
        self.require(caller, Role::DefaultAdmin)?;
        self.grant_internal(to, scope, role);
        Ok(())
    }

    pub fn revoke(
        &mut self,
        caller: &Address,
        from: &Address,
        scope: Scope,
        role: Role,
    ) -> Result<(), Error> {
        self.require(caller, Role::DefaultAdmin)?;
        self.revoke_internal(from, scope, role);
        Ok(())
    }

    pub(crate) fn grant_internal(&mut self, to: Address, scope: Scope, role: Role) {
        self.grants.entry(to).or_default().insert((scope, role));
    }

    pub(crate) fn revoke_internal(&mut self, from: &Address, scope: Scope, role: Role) {
        if let Some(set) = self.grants.get_mut(from) {
            set.shift_remove(&(scope, role));
        }
    }

    pub fn has(&self, who: &Address, scope: Scope, role: Role) -> bool {
        self.grants
            .get(who)
            .map_or(false, |set| set.contains(&(scope, role)))
    }

    /// Check a global capability; Unauthorized when absent.
    pub fn require(&self, who: &Address, role: Role) -> Result<(), Error> {
        if self.has(who, Scope::Global, role) {
            Ok(())
        } else {
            Err(Error::Unauthorized(role))
        }
    }

    /// Check a capability scoped to one Election instance.
    pub fn require_scoped(
        &self,
        who: &Address,
        election: ElectionId,
        role: Role,
    ) -> Result<(), Error> {
        if self.has(who, Scope::Election(election), role) {
            Ok(())
        } else {
            Err(Error::Unauthorized(role))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn addr(n: u8) -> Address {
        Address::new([n; ADDRESS_LENGTH])
    }

    #[test]
    fn capability_ids_are_collision_free() {
        let ids: HashSet<Hash256> = Role::ALL.iter().map(|role| role.id()).collect();
        assert_eq!(ids.len(), Role::ALL.len());
    }

    #[test]
    fn grant_requires_default_admin() {
        let admin = addr(1);
        let outsider = addr(2);
        let registrar = addr(3);

        let mut auth = AuthContext::new(admin);

        assert!(matches!(
            auth.grant(&outsider, registrar, Scope::Global, Role::Registrar),
            Err(Error::Unauthorized(Role::DefaultAdmin))
        ));
        assert!(!auth.has(&registrar, Scope::Global, Role::Registrar));

        auth.grant(&admin, registrar, Scope::Global, Role::Registrar)
            .unwrap();
        assert!(auth.has(&registrar, Scope::Global, Role::Registrar));

        auth.revoke(&admin, &registrar, Scope::Global, Role::Registrar)
            .unwrap();
        assert!(!auth.has(&registrar, Scope::Global, Role::Registrar));
    }

    #[test]
    fn scoped_grants_do_not_leak() {
        let admin = addr(1);
        let officer = addr(2);
        let id_a = ElectionId::derive("SU", 1);
        let id_b = ElectionId::derive("SU", 2);

        let mut auth = AuthContext::new(admin);
        auth.grant(&admin, officer, Scope::Election(id_a), Role::ElectionAdmin)
            .unwrap();

        assert!(auth.require_scoped(&officer, id_a, Role::ElectionAdmin).is_ok());
        assert!(matches!(
            auth.require_scoped(&officer, id_b, Role::ElectionAdmin),
            Err(Error::Unauthorized(Role::ElectionAdmin))
        ));
        assert!(auth.require(&officer, Role::ElectionAdmin).is_err());
    }
}

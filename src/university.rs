use crate::*;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;

/// An institution record. Universities are deactivatable, never deleted.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct University {
    pub code: String,
    pub name: String,
    pub admin_wallet: Address,
    pub is_active: bool,
    pub registration_date: DateTime<Utc>,
}

/// The institution directory, with admin-wallet binding per university.
#[derive(Default)]
pub struct UniversityRegistry {
    universities: IndexMap<String, University>,
    events: Vec<Event>,
}

impl UniversityRegistry {
    pub fn new() -> Self {
        UniversityRegistry::default()
    }

    /// Register a new university. Registrar capability only; grants
    /// UniversityAdmin to the admin wallet.
    pub fn register(
        &mut self,
        auth: &mut AuthContext,
        caller: &Address,
        name: &str,
        code: &str,
        admin_wallet: Address,
    ) -> Result<(), Error> {
        auth.require(caller, Role::Registrar)?;
        if admin_wallet.is_zero() {
            return Err(Error::InvalidInput(
                "university admin wallet is the zero address",
            ));
        }
        if self.universities.contains_key(code) {
            return Err(Error::AlreadyExists("university", code.to_string()));
        }

        let university = University {
            code: code.to_string(),
            name: name.to_string(),
            admin_wallet,
            is_active: true,
            registration_date: Utc::now(),
        };
        self.universities.insert(code.to_string(), university);
        auth.grant_internal(admin_wallet, Scope::Global, Role::UniversityAdmin);

        log::info!("university {} registered", code);
        self.events.push(Event::UniversityRegistered {
            code: code.to_string(),
        });
        Ok(())
    }

    /// Re-point a university's admin binding. The caller must be the
    /// Registrar, a DefaultAdmin, or the current admin wallet.
    pub fn update_admin(
        &mut self,
        auth: &mut AuthContext,
        caller: &Address,
        code: &str,
        new_wallet: Address,
    ) -> Result<(), Error> {
        if new_wallet.is_zero() {
            return Err(Error::InvalidInput(
                "university admin wallet is the zero address",
            ));
        }

        let university = self
            .universities
            .get_mut(code)
            .ok_or_else(|| Error::NotFound("university", code.to_string()))?;

        let allowed = *caller == university.admin_wallet
            || auth.has(caller, Scope::Global, Role::Registrar)
            || auth.has(caller, Scope::Global, Role::DefaultAdmin);
        if !allowed {
            return Err(Error::Unauthorized(Role::UniversityAdmin));
        }

        let old_wallet = university.admin_wallet;
        university.admin_wallet = new_wallet;
        auth.revoke_internal(&old_wallet, Scope::Global, Role::UniversityAdmin);
        auth.grant_internal(new_wallet, Scope::Global, Role::UniversityAdmin);

        log::info!("university {} admin updated", code);
        self.events.push(Event::UniversityAdminUpdated {
            code: code.to_string(),
            old_wallet,
            new_wallet,
        });
        Ok(())
    }

    /// Activate or deactivate a university. Registrar capability only.
    pub fn set_status(
        &mut self,
        auth: &AuthContext,
        caller: &Address,
        code: &str,
        active: bool,
    ) -> Result<(), Error> {
        auth.require(caller, Role::Registrar)?;
        let university = self
            .universities
            .get_mut(code)
            .ok_or_else(|| Error::NotFound("university", code.to_string()))?;
        university.is_active = active;

        log::info!("university {} active: {}", code, active);
        self.events.push(Event::UniversityStatusUpdated {
            code: code.to_string(),
            is_active: active,
        });
        Ok(())
    }

    pub fn get(&self, code: &str) -> Result<&University, Error> {
        self.universities
            .get(code)
            .ok_or_else(|| Error::NotFound("university", code.to_string()))
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}

use super::domain::{ClientKey, Matter, MatterId, UserId};
use super::error::CaseError;
use super::store::CaseStore;

/// How the caller proves a claim on a matter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseAccess {
    /// Signed-in user. Must own the matter.
    Owner(UserId),
    /// Anonymous browser key. Only valid while nobody has claimed the matter.
    ClientKey(ClientKey),
}

impl CaseAccess {
    pub fn actor(&self) -> String {
        match self {
            Self::Owner(user) => format!("user:{user}"),
            Self::ClientKey(_) => "anonymous".to_string(),
        }
    }

    pub fn permits(&self, matter: &Matter) -> bool {
        match self {
            Self::Owner(user) => matter.is_owned_by(user),
            Self::ClientKey(key) => matter.user_id.is_none() && &matter.client_key == key,
        }
    }
}

/// Loads a matter the caller may act on. Absent and foreign matters both
/// surface as `NotFound` so ids cannot be enumerated.
pub fn authorize<S>(store: &S, access: &CaseAccess, id: &MatterId) -> Result<Matter, CaseError>
where
    S: CaseStore + ?Sized,
{
    match store.fetch_matter(id)? {
        Some(matter) if access.permits(&matter) => Ok(matter),
        _ => Err(CaseError::NotFound("matter")),
    }
}

pub fn authorize_owner<S>(store: &S, owner: &UserId, id: &MatterId) -> Result<Matter, CaseError>
where
    S: CaseStore + ?Sized,
{
    authorize(store, &CaseAccess::Owner(owner.clone()), id)
}

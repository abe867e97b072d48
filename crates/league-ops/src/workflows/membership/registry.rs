use serde::{Deserialize, Serialize};

use super::domain::RemovalType;

/// Request to create a league record for an onboarded club.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionRequest {
    pub club_id: String,
    pub creator_user_id: String,
    pub league_name: String,
    pub description: String,
}

/// Handle to a league record owned by the remote registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeagueRef {
    pub league_id: String,
}

/// User profile as known to the remote registry, read at submission time to
/// denormalize display fields onto the application record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryUser {
    pub user_id: String,
    pub name: String,
    pub email: String,
}

/// Club record as known to the remote registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryClub {
    pub club_id: String,
    pub name: String,
}

/// Outbound port for the remote league registry. Adapters own connection
/// handling and must enforce short call timeouts; the orchestrator treats a
/// timed-out call as failed, never as assumed-succeeded.
pub trait LeagueRegistry: Send + Sync {
    /// Create the league record. Fails with [`RegistryError::DuplicateLeague`]
    /// when an active verified league already exists for the club; callers
    /// retrying after a prior partial success treat that as already done.
    fn provision_league(&self, request: ProvisionRequest) -> Result<LeagueRef, RegistryError>;

    /// Remove or deactivate the league record, per the removal type. Fails
    /// with [`RegistryError::LeagueNotFound`] when no verified league exists,
    /// which callers treat as already-compensated.
    fn deprovision_league(&self, club_id: &str, removal: RemovalType)
        -> Result<(), RegistryError>;

    fn user_clubs(&self, user_id: &str) -> Result<Vec<RegistryClub>, RegistryError>;

    fn user_by_id(&self, user_id: &str) -> Result<Option<RegistryUser>, RegistryError>;
}

/// Error enumeration for remote registry calls.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("an active verified league already exists for this club")]
    DuplicateLeague,
    #[error("no verified league exists for this club")]
    LeagueNotFound,
    #[error("registry call timed out")]
    Timeout,
    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

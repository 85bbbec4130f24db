use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

pub type CrmResult<T> = Result<T, CrmError>;

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("unknown stage `{0}`")]
    InvalidStage(String),
    #[error("deal {0} not found")]
    DealNotFound(Uuid),
    #[error("contact {0} not found")]
    ContactNotFound(Uuid),
    #[error("{0}")]
    InvalidInput(String),
    #[error("deal {0} was modified concurrently")]
    Conflict(Uuid),
    #[error(transparent)]
    Db(#[from] DbErr),
}

impl CrmError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::DealNotFound(_) | Self::ContactNotFound(_))
    }
}

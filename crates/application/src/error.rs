use domain::{AuthError, DomainError, StoreError};
use thiserror::Error;

use crate::hub::HubError;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),
    #[error("hub error: {0}")]
    Hub(#[from] HubError),
}

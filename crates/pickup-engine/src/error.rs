use pickup_core::BackendError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no candidate confirmed by any search step")]
    NotFound,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

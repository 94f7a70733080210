use crate::store::StoreError;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("bookmark not found")]
    NotFound,

    #[error("bookmark with this url already exists at id {0}")]
    AlreadyExists(String),

    #[error("no bookmark sources are available")]
    NoSourcesAvailable,

    #[error("another xhub process is already syncing")]
    SyncInProgress,

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("io error: {0:?}")]
    IO(#[from] std::io::Error),

    #[error("unexpected error: {0:?}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Map the store's not-found into the app's, keeping every other failure.
    pub fn from_lookup(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::NotFound,
            err => AppError::Store(err),
        }
    }
}

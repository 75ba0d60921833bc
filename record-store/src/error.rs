use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage failure: {0}")]
    Storage(#[from] std::io::Error),
}

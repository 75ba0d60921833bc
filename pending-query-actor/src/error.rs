use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PendingError {
    #[error("transaction {transaction_id} is already pending")]
    DuplicateTransaction { transaction_id: u16 },

    #[error("pending query actor has stopped")]
    ActorClosed,
}

use crate::error::PendingError;
use crate::pending_table::{DuplicatePolicy, PendingQuery, PendingTable};
use dns::DomainName;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const CHANNEL_CAPACITY: usize = 1024;

type RegisterResult = Result<Option<PendingQuery>, PendingError>;

enum ActorMessage {
    Register {
        query: PendingQuery,
        policy: DuplicatePolicy,
        responder: oneshot::Sender<RegisterResult>,
    },
    Resolve {
        transaction_id: u16,
        question: Option<DomainName>,
        now: Instant,
        responder: oneshot::Sender<Option<PendingQuery>>,
    },
    Withdraw {
        query: PendingQuery,
        responder: oneshot::Sender<bool>,
    },
    Sweep {
        now: Instant,
        responder: oneshot::Sender<usize>,
    },
    Len {
        responder: oneshot::Sender<usize>,
    },
}

struct Actor {
    receiver: mpsc::Receiver<ActorMessage>,
    table: PendingTable,
}

impl Actor {
    fn new(receiver: mpsc::Receiver<ActorMessage>, timeout: Duration) -> Self {
        Self {
            receiver,
            table: PendingTable::new(timeout),
        }
    }

    fn handle_message(&mut self, msg: ActorMessage) {
        match msg {
            ActorMessage::Register {
                query,
                policy,
                responder,
            } => {
                let now = Instant::now();
                let _ = responder.send(self.table.register(query, policy, now));
            }
            ActorMessage::Resolve {
                transaction_id,
                question,
                now,
                responder,
            } => {
                let found = self.table.resolve(transaction_id, question.as_ref(), now);
                let _ = responder.send(found);
            }
            ActorMessage::Withdraw { query, responder } => {
                let _ = responder.send(self.table.withdraw(&query));
            }
            ActorMessage::Sweep { now, responder } => {
                let _ = responder.send(self.table.sweep_expired(now));
            }
            ActorMessage::Len { responder } => {
                let _ = responder.send(self.table.len());
            }
        }
    }
}

async fn run_as_actor(mut actor: Actor) {
    while let Some(msg) = actor.receiver.recv().await {
        actor.handle_message(msg);
    }

    tracing::debug!("pending query actor stopped, {} entries dropped", actor.table.len());
}

/// Handle to the actor owning the pending table. Clones share the table; the
/// actor stops once every handle is dropped.
#[derive(Clone)]
pub struct ActorHandle {
    sender: mpsc::Sender<ActorMessage>,
}

impl ActorHandle {
    /// Spawns the actor. Must be called inside a tokio runtime.
    pub fn new(timeout: Duration) -> Self {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let actor = Actor::new(receiver, timeout);
        tokio::spawn(run_as_actor(actor));

        Self { sender }
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> ActorMessage,
    ) -> Result<T, PendingError> {
        let (sender, receiver) = oneshot::channel();
        self.sender
            .send(make(sender))
            .await
            .map_err(|_| PendingError::ActorClosed)?;

        receiver.await.map_err(|_| PendingError::ActorClosed)
    }

    pub async fn register(
        &self,
        query: PendingQuery,
        policy: DuplicatePolicy,
    ) -> Result<Option<PendingQuery>, PendingError> {
        tracing::debug!(
            "pending: register id {} for {} from {}",
            query.transaction_id,
            query.question,
            query.client
        );

        self.call(|responder| ActorMessage::Register {
            query,
            policy,
            responder,
        })
        .await?
    }

    pub async fn resolve(
        &self,
        transaction_id: u16,
        question: Option<DomainName>,
    ) -> Result<Option<PendingQuery>, PendingError> {
        self.resolve_at(transaction_id, question, Instant::now()).await
    }

    pub async fn resolve_at(
        &self,
        transaction_id: u16,
        question: Option<DomainName>,
        now: Instant,
    ) -> Result<Option<PendingQuery>, PendingError> {
        self.call(|responder| ActorMessage::Resolve {
            transaction_id,
            question,
            now,
            responder,
        })
        .await
    }

    /// Removes `query` if it has not been resolved or replaced meanwhile.
    pub async fn withdraw(&self, query: PendingQuery) -> Result<bool, PendingError> {
        self.call(|responder| ActorMessage::Withdraw { query, responder })
            .await
    }

    pub async fn sweep_expired(&self, now: Instant) -> Result<usize, PendingError> {
        self.call(|responder| ActorMessage::Sweep { now, responder })
            .await
    }

    pub async fn len(&self) -> Result<usize, PendingError> {
        self.call(|responder| ActorMessage::Len { responder }).await
    }

    /// Sweeps every `period`. The task holds only a weak sender, so it ends
    /// once every `ActorHandle` is dropped.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let weak = self.sender.downgrade();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;

                let handle = match weak.upgrade() {
                    Some(sender) => ActorHandle { sender },
                    None => break,
                };
                match handle.sweep_expired(Instant::now()).await {
                    Ok(0) => {}
                    Ok(removed) => tracing::debug!("swept {} expired pending queries", removed),
                    Err(_) => break,
                }
            }
        })
    }
}

use crate::answer::{cached_answer, is_cacheable};
use crate::error::EngineError;
use crate::transport::Transport;
use bytes::Bytes;
use dns::{DomainName, Message, ResourceRecord};
use pending_query_actor::{ActorHandle, DuplicatePolicy, PendingError, PendingQuery};
use record_store::{RecordStore, Storage};
use std::convert::TryFrom;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Clone, Debug)]
pub struct EngineSettings {
    pub upstream: SocketAddr,
    pub forwarding_only: bool,
    /// TTL, in seconds, of answers built from the cache.
    pub answer_ttl: u32,
    pub duplicate_policy: DuplicatePolicy,
}

impl EngineSettings {
    pub fn new(upstream: SocketAddr) -> Self {
        Self {
            upstream,
            forwarding_only: false,
            answer_ttl: 60,
            duplicate_policy: DuplicatePolicy::Replace,
        }
    }
}

/// What became of one datagram.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    AnsweredFromCache { client: SocketAddr, addresses: usize },
    Forwarded { transaction_id: u16 },
    /// `cached` counts the addresses that were new to the cache.
    Relayed { client: SocketAddr, cached: usize },
    Dropped(DropReason),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DropReason {
    Malformed,
    NoQuestion,
    /// A live query already holds the id and duplicates are rejected.
    DuplicateTransaction,
    /// No live pending query matches the response.
    Unsolicited,
    /// A response that did not come from the upstream resolver.
    UnexpectedSource,
}

pub struct ResolutionEngine<T, S> {
    transport: T,
    store: RecordStore<S>,
    pending: ActorHandle,
    settings: EngineSettings,
}

impl<T, S> ResolutionEngine<T, S>
where
    T: Transport + 'static,
    S: Storage + 'static,
{
    pub fn new(
        transport: T,
        store: RecordStore<S>,
        pending: ActorHandle,
        settings: EngineSettings,
    ) -> Self {
        Self {
            transport,
            store,
            pending,
            settings,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn store(&self) -> &RecordStore<S> {
        &self.store
    }

    pub fn pending(&self) -> &ActorHandle {
        &self.pending
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Receives forever, handling every datagram on its own task.
    pub async fn run(self: Arc<Self>, max_datagram_size: usize) {
        let mut buf = vec![0u8; max_datagram_size];

        loop {
            let (len, from) = match self.transport.receive(&mut buf).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!("receive failed: {}", e);
                    if !is_connection_error(&e) {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                    continue;
                }
            };

            let datagram = Bytes::copy_from_slice(&buf[..len]);
            let engine = self.clone();
            tokio::spawn(async move {
                match engine.handle_datagram(&datagram, from).await {
                    Ok(outcome) => tracing::debug!("{} bytes from {}: {:?}", len, from, outcome),
                    Err(e) => tracing::warn!("datagram from {} abandoned: {}", from, e),
                }
            });
        }
    }

    /// Retries failed storage writes every `period`.
    pub fn spawn_store_flusher(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let engine = self.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;

                match engine.store.flush_unpersisted().await {
                    Ok(0) => {}
                    Ok(n) => tracing::info!("persisted {} records after earlier failures", n),
                    Err(e) => tracing::error!("records still not persisted: {}", e),
                }
            }
        })
    }

    pub async fn handle_datagram(
        &self,
        datagram: &[u8],
        from: SocketAddr,
    ) -> Result<Outcome, EngineError> {
        let msg = match dns::decode(datagram) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!("dropping malformed datagram from {}: {}", from, e);
                return Ok(Outcome::Dropped(DropReason::Malformed));
            }
        };

        if msg.flags.is_response {
            self.on_response(&msg, datagram, from).await
        } else {
            self.on_query(&msg, datagram, from).await
        }
    }

    async fn on_query(
        &self,
        msg: &Message,
        datagram: &[u8],
        client: SocketAddr,
    ) -> Result<Outcome, EngineError> {
        let question = match msg.first_question() {
            Some(q) => q,
            // relayed as is, registered under the root name
            None if self.settings.forwarding_only => {
                return self.forward(msg.id, DomainName::root(), datagram, client).await;
            }
            None => {
                tracing::debug!("query {} from {} has no question", msg.id, client);
                return Ok(Outcome::Dropped(DropReason::NoQuestion));
            }
        };

        if !self.settings.forwarding_only && is_cacheable(msg) {
            if let Some(addresses) = self.store.lookup(&question.name).await {
                tracing::debug!("cache hit for {}: {:?}", question.name, addresses);

                let ttl = i32::try_from(self.settings.answer_ttl).unwrap_or(i32::MAX);
                let answer = cached_answer(msg, &addresses, ttl);
                let bytes = dns::encode(&answer)?;
                self.send(&bytes, client).await?;

                return Ok(Outcome::AnsweredFromCache {
                    client,
                    addresses: addresses.len(),
                });
            }

            tracing::debug!("cache miss for {}", question.name);
        }

        self.forward(msg.id, question.name.clone(), datagram, client)
            .await
    }

    // Registers before sending so that an upstream answer can never arrive
    // ahead of its pending entry.
    async fn forward(
        &self,
        transaction_id: u16,
        question: DomainName,
        datagram: &[u8],
        client: SocketAddr,
    ) -> Result<Outcome, EngineError> {
        let query = PendingQuery::new(transaction_id, client, question);

        match self
            .pending
            .register(query.clone(), self.settings.duplicate_policy)
            .await
        {
            Ok(None) => {}
            Ok(Some(displaced)) => {
                tracing::warn!(
                    "transaction {} from {} displaced the pending query from {} for {}",
                    transaction_id,
                    client,
                    displaced.client,
                    displaced.question
                );
            }
            Err(PendingError::DuplicateTransaction { .. }) => {
                tracing::warn!(
                    "transaction {} from {} is already pending, query dropped",
                    transaction_id,
                    client
                );
                return Ok(Outcome::Dropped(DropReason::DuplicateTransaction));
            }
            Err(e) => return Err(e.into()),
        }

        if let Err(e) = self.send(datagram, self.settings.upstream).await {
            self.pending.withdraw(query).await?;
            return Err(e);
        }

        Ok(Outcome::Forwarded { transaction_id })
    }

    async fn on_response(
        &self,
        msg: &Message,
        datagram: &[u8],
        from: SocketAddr,
    ) -> Result<Outcome, EngineError> {
        if !same_endpoint(from, self.settings.upstream) {
            tracing::debug!("response {} from {} is not from upstream", msg.id, from);
            return Ok(Outcome::Dropped(DropReason::UnexpectedSource));
        }

        let echoed = msg.first_question().map(|q| q.name.clone());
        let pending = match self.pending.resolve(msg.id, echoed).await? {
            Some(p) => p,
            None => {
                tracing::debug!("unsolicited response {} dropped", msg.id);
                return Ok(Outcome::Dropped(DropReason::Unsolicited));
            }
        };

        let mut cached = 0;
        if pending.question.is_root() {
            tracing::debug!("response {} has no name to cache under", msg.id);
        } else if msg.flags.truncated {
            tracing::debug!("truncated response {} relayed without caching", msg.id);
        } else {
            for address in msg.answers.iter().filter_map(ResourceRecord::ipv4) {
                // cached under the name the client asked for, not the owner
                // name of the record, which differs behind a CNAME
                match self.store.insert(&pending.question, address).await {
                    Ok(true) => cached += 1,
                    Ok(false) => {}
                    Err(e) => tracing::error!(
                        "caching {} -> {} failed: {}",
                        pending.question,
                        address,
                        e
                    ),
                }
            }
        }

        self.send(datagram, pending.client).await?;

        Ok(Outcome::Relayed {
            client: pending.client,
            cached,
        })
    }

    async fn send(&self, bytes: &[u8], to: SocketAddr) -> Result<(), EngineError> {
        self.transport
            .send_to(bytes, to)
            .await
            .map(|_| ())
            .map_err(|source| EngineError::Send { to, source })
    }
}

fn is_connection_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::ConnectionReset
    )
}

// a dual-stack socket reports IPv4 peers as IPv4-mapped IPv6
fn same_endpoint(a: SocketAddr, b: SocketAddr) -> bool {
    fn unmapped(ip: IpAddr) -> IpAddr {
        match ip {
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
            v4 => v4,
        }
    }

    a.port() == b.port() && unmapped(a.ip()) == unmapped(b.ip())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dns::{Flags, Question, RecordType, ResponseCode};
    use record_store::MemoryStorage;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    const UPSTREAM: ([u8; 4], u16) = ([9, 9, 9, 9], 53);
    const EXAMPLE_ADDR: Ipv4Addr = Ipv4Addr::new(93, 184, 216, 34);

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
        fail_sends: AtomicBool,
    }

    impl RecordingTransport {
        fn take_sent(&self) -> Vec<(Vec<u8>, SocketAddr)> {
            std::mem::take(&mut *self.sent.lock().unwrap())
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn receive(&self, _buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)> {
            std::future::pending().await
        }

        async fn send_to(&self, bytes: &[u8], to: SocketAddr) -> std::io::Result<usize> {
            if self.fail_sends.load(Ordering::SeqCst) {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "send disabled"));
            }
            self.sent.lock().unwrap().push((bytes.to_vec(), to));
            Ok(bytes.len())
        }
    }

    type TestEngine = ResolutionEngine<RecordingTransport, MemoryStorage>;

    fn upstream() -> SocketAddr {
        SocketAddr::from(UPSTREAM)
    }

    fn client(port: u16) -> SocketAddr {
        SocketAddr::from(([192, 168, 1, 10], port))
    }

    fn name(s: &str) -> DomainName {
        s.parse().unwrap()
    }

    fn engine_with(settings: EngineSettings, timeout: Duration) -> TestEngine {
        ResolutionEngine::new(
            RecordingTransport::default(),
            RecordStore::new(MemoryStorage::new()),
            ActorHandle::new(timeout),
            settings,
        )
    }

    fn engine() -> TestEngine {
        engine_with(EngineSettings::new(upstream()), Duration::from_secs(5))
    }

    fn query(id: u16, qname: &str) -> Vec<u8> {
        dns::encode_query(id, name(qname), RecordType::A).unwrap()
    }

    fn response(id: u16, qname: &str, answers: Vec<ResourceRecord>) -> Vec<u8> {
        let msg = Message {
            id,
            flags: Flags {
                is_response: true,
                recursion_desired: true,
                recursion_available: true,
                ..Flags::default()
            },
            questions: vec![Question::new(name(qname), RecordType::A)],
            answers,
            ..Message::default()
        };
        dns::encode(&msg).unwrap()
    }

    fn a(owner: &str, address: Ipv4Addr) -> ResourceRecord {
        ResourceRecord::a(name(owner), 300, address)
    }

    #[tokio::test]
    async fn miss_then_hit() {
        let engine = engine();
        let q = query(0x0101, "example.com");

        // miss: forwarded untouched and registered
        let outcome = engine.handle_datagram(&q, client(40000)).await.unwrap();
        assert_eq!(outcome, Outcome::Forwarded { transaction_id: 0x0101 });
        assert_eq!(engine.transport().take_sent(), vec![(q.clone(), upstream())]);
        assert_eq!(engine.pending().len().await, Ok(1));

        // upstream answers: cached and relayed to the client
        let r = response(0x0101, "example.com", vec![a("example.com", EXAMPLE_ADDR)]);
        let outcome = engine.handle_datagram(&r, upstream()).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::Relayed {
                client: client(40000),
                cached: 1
            }
        );
        assert_eq!(engine.transport().take_sent(), vec![(r, client(40000))]);
        assert_eq!(
            engine.store().lookup(&name("example.com")).await,
            Some(vec![EXAMPLE_ADDR])
        );
        assert_eq!(engine.pending().len().await, Ok(0));

        // hit: answered locally, nothing sent upstream, nothing pending
        let q2 = query(0x0202, "EXAMPLE.com");
        let outcome = engine.handle_datagram(&q2, client(40001)).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::AnsweredFromCache {
                client: client(40001),
                addresses: 1
            }
        );

        let sent = engine.transport().take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, client(40001));
        let answer = dns::decode(&sent[0].0).unwrap();
        assert_eq!(answer.id, 0x0202);
        assert!(answer.flags.is_response);
        assert_eq!(answer.flags.response_code, ResponseCode::NoError);
        assert_eq!(answer.answers.len(), 1);
        assert_eq!(answer.answers[0].ipv4(), Some(EXAMPLE_ADDR));
        assert_eq!(answer.answers[0].ttl, 60);
        assert_eq!(engine.pending().len().await, Ok(0));
    }

    #[tokio::test]
    async fn unsolicited_response_is_dropped() {
        let engine = engine();
        let r = response(0x0303, "example.com", vec![a("example.com", EXAMPLE_ADDR)]);

        let outcome = engine.handle_datagram(&r, upstream()).await.unwrap();
        assert_eq!(outcome, Outcome::Dropped(DropReason::Unsolicited));
        assert!(engine.transport().take_sent().is_empty());
        assert!(engine.store().is_empty().await);
    }

    #[tokio::test]
    async fn late_response_after_expiry() {
        // every entry is already expired when the answer arrives
        let engine = engine_with(EngineSettings::new(upstream()), Duration::from_millis(0));

        engine
            .handle_datagram(&query(0x0404, "example.com"), client(40000))
            .await
            .unwrap();
        engine.transport().take_sent();

        let r = response(0x0404, "example.com", vec![a("example.com", EXAMPLE_ADDR)]);
        let outcome = engine.handle_datagram(&r, upstream()).await.unwrap();
        assert_eq!(outcome, Outcome::Dropped(DropReason::Unsolicited));
        assert!(engine.transport().take_sent().is_empty());
        assert!(engine.store().is_empty().await);
    }

    #[tokio::test]
    async fn forwarding_only_never_answers_from_cache() {
        let mut settings = EngineSettings::new(upstream());
        settings.forwarding_only = true;
        let engine = engine_with(settings, Duration::from_secs(5));
        engine
            .store()
            .insert(&name("example.com"), EXAMPLE_ADDR)
            .await
            .unwrap();

        for id in 1..=3u16 {
            let q = query(id, "example.com");
            let outcome = engine.handle_datagram(&q, client(40000 + id)).await.unwrap();
            assert_eq!(outcome, Outcome::Forwarded { transaction_id: id });
            assert_eq!(engine.transport().take_sent(), vec![(q, upstream())]);
        }
        assert_eq!(engine.pending().len().await, Ok(3));
    }

    #[tokio::test]
    async fn malformed_datagrams_change_nothing() {
        let engine = engine();

        let mut q = query(0x0505, "example.com");
        q.truncate(q.len() - 3);

        for bad in vec![vec![], vec![0u8; 5], q] {
            let outcome = engine.handle_datagram(&bad, client(40000)).await.unwrap();
            assert_eq!(outcome, Outcome::Dropped(DropReason::Malformed));
        }
        assert!(engine.transport().take_sent().is_empty());
        assert_eq!(engine.pending().len().await, Ok(0));
    }

    #[tokio::test]
    async fn query_without_question_is_dropped() {
        let engine = engine();
        let empty = dns::encode(&Message {
            id: 9,
            ..Message::default()
        })
        .unwrap();

        let outcome = engine.handle_datagram(&empty, client(40000)).await.unwrap();
        assert_eq!(outcome, Outcome::Dropped(DropReason::NoQuestion));
        assert!(engine.transport().take_sent().is_empty());
    }

    #[tokio::test]
    async fn forwarding_only_relays_query_without_question() {
        let mut settings = EngineSettings::new(upstream());
        settings.forwarding_only = true;
        let engine = engine_with(settings, Duration::from_secs(5));

        let empty = dns::encode(&Message {
            id: 9,
            ..Message::default()
        })
        .unwrap();
        let outcome = engine.handle_datagram(&empty, client(40000)).await.unwrap();
        assert_eq!(outcome, Outcome::Forwarded { transaction_id: 9 });
        assert_eq!(engine.transport().take_sent(), vec![(empty, upstream())]);

        let reply = dns::encode(&Message {
            id: 9,
            flags: Flags {
                is_response: true,
                ..Flags::default()
            },
            answers: vec![a("example.com", EXAMPLE_ADDR)],
            ..Message::default()
        })
        .unwrap();
        let outcome = engine.handle_datagram(&reply, upstream()).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::Relayed {
                client: client(40000),
                cached: 0
            }
        );
        assert_eq!(engine.transport().take_sent(), vec![(reply, client(40000))]);
        assert!(engine.store().is_empty().await);
    }

    #[tokio::test]
    async fn response_from_elsewhere_is_ignored() {
        let engine = engine();
        engine
            .handle_datagram(&query(0x0606, "example.com"), client(40000))
            .await
            .unwrap();
        engine.transport().take_sent();

        let r = response(0x0606, "example.com", vec![a("example.com", Ipv4Addr::new(6, 6, 6, 6))]);
        let spoofer = SocketAddr::from(([6, 6, 6, 6], 53));
        let outcome = engine.handle_datagram(&r, spoofer).await.unwrap();
        assert_eq!(outcome, Outcome::Dropped(DropReason::UnexpectedSource));
        assert!(engine.store().is_empty().await);

        // the real answer still finds its entry
        let r = response(0x0606, "example.com", vec![a("example.com", EXAMPLE_ADDR)]);
        let outcome = engine.handle_datagram(&r, upstream()).await.unwrap();
        assert!(matches!(outcome, Outcome::Relayed { .. }));
    }

    #[tokio::test]
    async fn mapped_upstream_address_is_accepted() {
        let engine = engine();
        engine
            .handle_datagram(&query(0x0707, "example.com"), client(40000))
            .await
            .unwrap();

        let mapped = SocketAddr::new(
            IpAddr::V6(Ipv4Addr::from(UPSTREAM.0).to_ipv6_mapped()),
            UPSTREAM.1,
        );
        let r = response(0x0707, "example.com", vec![a("example.com", EXAMPLE_ADDR)]);
        let outcome = engine.handle_datagram(&r, mapped).await.unwrap();
        assert!(matches!(outcome, Outcome::Relayed { .. }));
    }

    #[tokio::test]
    async fn all_answers_cached_under_question_name() {
        let engine = engine();
        engine
            .handle_datagram(&query(0x0808, "www.example.com"), client(40000))
            .await
            .unwrap();
        engine.transport().take_sent();

        // CNAME to a different owner, two addresses, one already cached
        let target = name("edge.example.net");
        let mut cname_rdata = vec![];
        for label in target.labels() {
            cname_rdata.push(label.len() as u8);
            cname_rdata.extend_from_slice(label);
        }
        cname_rdata.push(0);
        let cname = ResourceRecord {
            name: name("www.example.com"),
            rtype: RecordType::Cname,
            rclass: 1,
            ttl: 300,
            rdata: cname_rdata,
        };
        let second = Ipv4Addr::new(93, 184, 216, 35);
        engine
            .store()
            .insert(&name("www.example.com"), second)
            .await
            .unwrap();

        let r = response(
            0x0808,
            "www.example.com",
            vec![
                cname,
                a("edge.example.net", EXAMPLE_ADDR),
                a("edge.example.net", second),
            ],
        );
        let outcome = engine.handle_datagram(&r, upstream()).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::Relayed {
                client: client(40000),
                cached: 1
            }
        );
        assert_eq!(engine.transport().take_sent(), vec![(r, client(40000))]);
        assert_eq!(
            engine.store().lookup(&name("www.example.com")).await,
            Some(vec![second, EXAMPLE_ADDR])
        );
        assert_eq!(engine.store().lookup(&name("edge.example.net")).await, None);
    }

    #[tokio::test]
    async fn storage_failure_still_relays() {
        let engine = engine();
        engine.store().storage().set_fail_writes(true);

        engine
            .handle_datagram(&query(0x0909, "example.com"), client(40000))
            .await
            .unwrap();
        engine.transport().take_sent();

        let r = response(0x0909, "example.com", vec![a("example.com", EXAMPLE_ADDR)]);
        let outcome = engine.handle_datagram(&r, upstream()).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::Relayed {
                client: client(40000),
                cached: 0
            }
        );
        assert_eq!(engine.transport().take_sent(), vec![(r, client(40000))]);
        assert_eq!(
            engine.store().lookup(&name("example.com")).await,
            Some(vec![EXAMPLE_ADDR])
        );
        assert_eq!(engine.store().unpersisted_len().await, 1);
    }

    #[tokio::test]
    async fn truncated_response_is_not_cached() {
        let engine = engine();
        engine
            .handle_datagram(&query(0x0a0a, "example.com"), client(40000))
            .await
            .unwrap();

        let mut r = dns::decode(&response(
            0x0a0a,
            "example.com",
            vec![a("example.com", EXAMPLE_ADDR)],
        ))
        .unwrap();
        r.flags.truncated = true;
        let r = dns::encode(&r).unwrap();

        let outcome = engine.handle_datagram(&r, upstream()).await.unwrap();
        assert!(matches!(outcome, Outcome::Relayed { cached: 0, .. }));
        assert!(engine.store().is_empty().await);
    }

    #[tokio::test]
    async fn non_a_queries_are_forwarded() {
        let engine = engine();
        engine
            .store()
            .insert(&name("example.com"), EXAMPLE_ADDR)
            .await
            .unwrap();

        let q = dns::encode_query(0x0b0b, name("example.com"), RecordType::Aaaa).unwrap();
        let outcome = engine.handle_datagram(&q, client(40000)).await.unwrap();
        assert_eq!(outcome, Outcome::Forwarded { transaction_id: 0x0b0b });
    }

    #[tokio::test]
    async fn reused_id_goes_to_latest_client() {
        let engine = engine();
        engine
            .handle_datagram(&query(0x0c0c, "example.com"), client(40000))
            .await
            .unwrap();
        engine
            .handle_datagram(&query(0x0c0c, "example.com"), client(40001))
            .await
            .unwrap();
        engine.transport().take_sent();
        assert_eq!(engine.pending().len().await, Ok(1));

        let r = response(0x0c0c, "example.com", vec![a("example.com", EXAMPLE_ADDR)]);
        let outcome = engine.handle_datagram(&r, upstream()).await.unwrap();
        assert!(matches!(outcome, Outcome::Relayed { client: c, .. } if c == client(40001)));
    }

    #[tokio::test]
    async fn reused_id_rejected_when_configured() {
        let mut settings = EngineSettings::new(upstream());
        settings.duplicate_policy = DuplicatePolicy::Reject;
        let engine = engine_with(settings, Duration::from_secs(5));

        engine
            .handle_datagram(&query(0x0d0d, "example.com"), client(40000))
            .await
            .unwrap();
        engine.transport().take_sent();

        let outcome = engine
            .handle_datagram(&query(0x0d0d, "example.com"), client(40001))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Dropped(DropReason::DuplicateTransaction));
        assert!(engine.transport().take_sent().is_empty());
    }

    #[tokio::test]
    async fn mismatched_echo_does_not_consume_entry() {
        let engine = engine();
        engine
            .handle_datagram(&query(0x0e0e, "example.com"), client(40000))
            .await
            .unwrap();

        let stale = response(0x0e0e, "other.org", vec![a("other.org", Ipv4Addr::new(1, 1, 1, 1))]);
        let outcome = engine.handle_datagram(&stale, upstream()).await.unwrap();
        assert_eq!(outcome, Outcome::Dropped(DropReason::Unsolicited));
        assert_eq!(engine.pending().len().await, Ok(1));
    }

    #[tokio::test]
    async fn failed_forward_withdraws_registration() {
        let engine = engine();
        engine.transport().fail_sends.store(true, Ordering::SeqCst);

        let result = engine
            .handle_datagram(&query(0x0f0f, "example.com"), client(40000))
            .await;
        assert!(matches!(result, Err(EngineError::Send { .. })));
        assert_eq!(engine.pending().len().await, Ok(0));
    }

    #[tokio::test]
    async fn outstanding_queries_do_not_block_new_ones() {
        let engine = Arc::new(engine());

        let tasks = (1..=20u16)
            .map(|id| {
                let engine = engine.clone();
                tokio::spawn(async move {
                    engine
                        .handle_datagram(&query(id, &format!("host{}.example.com", id)), client(41000 + id))
                        .await
                        .unwrap()
                })
            })
            .collect::<Vec<_>>();
        for t in tasks {
            assert!(matches!(t.await.unwrap(), Outcome::Forwarded { .. }));
        }
        assert_eq!(engine.pending().len().await, Ok(20));
        engine.transport().take_sent();

        // answers arrive in reverse order, each reaches its own client
        for id in (1..=20u16).rev() {
            let qname = format!("host{}.example.com", id);
            let r = response(id, &qname, vec![a(&qname, Ipv4Addr::new(10, 0, 0, id as u8))]);
            let outcome = engine.handle_datagram(&r, upstream()).await.unwrap();
            assert_eq!(
                outcome,
                Outcome::Relayed {
                    client: client(41000 + id),
                    cached: 1
                }
            );
        }
        assert_eq!(engine.store().len().await, 20);
    }
}

//! In-memory test doubles for the end-to-end scenarios in `scenarios.rs`.
//!
//! Every collaborator the coordinator only knows through a trait gets a
//! recording, in-memory stand-in here: a client handle that stores every
//! `calc_done`/`send_chunks` call it receives, and a registry that hands
//! back a fixed client list.

use chunkmesh_core::{ClientId, OutputChunk, Result, ServerId};
use chunkmesh_coordinator::{ClientHandle, ClusterRegistry, CpuCounter};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub struct SendChunksCall {
    pub server: ServerId,
    pub n: usize,
}

#[derive(Default)]
struct Inner {
    calc_done: Vec<OutputChunk>,
    send_chunks: Vec<SendChunksCall>,
    server_up: Vec<ServerId>,
}

/// A recording [`ClientHandle`]: every call is appended to a shared log so
/// test assertions can inspect what the coordinator sent, in what order.
#[derive(Clone)]
pub struct TestClient {
    id: ClientId,
    inner: Arc<Mutex<Inner>>,
}

impl TestClient {
    pub fn new(id: &str) -> Self {
        Self {
            id: ClientId(id.to_string()),
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    pub fn calc_done_calls(&self) -> Vec<OutputChunk> {
        self.inner.lock().unwrap().calc_done.clone()
    }

    pub fn send_chunks_calls(&self) -> Vec<SendChunksCall> {
        self.inner.lock().unwrap().send_chunks.clone()
    }

    pub fn server_up_calls(&self) -> Vec<ServerId> {
        self.inner.lock().unwrap().server_up.clone()
    }
}

impl ClientHandle for TestClient {
    fn id(&self) -> ClientId {
        self.id.clone()
    }

    async fn server_up(&self, server: ServerId) {
        self.inner.lock().unwrap().server_up.push(server);
    }

    async fn send_chunks(&self, server: ServerId, n: usize) {
        self.inner
            .lock()
            .unwrap()
            .send_chunks
            .push(SendChunksCall { server, n });
    }

    async fn calc_done(&self, out: OutputChunk) {
        self.inner.lock().unwrap().calc_done.push(out);
    }
}

/// A [`ClusterRegistry`] that always registers successfully and enumerates a
/// fixed, preset list of clients.
pub struct TestRegistry {
    clients: Vec<TestClient>,
}

impl TestRegistry {
    pub fn new(clients: Vec<TestClient>) -> Self {
        Self { clients }
    }
}

impl ClusterRegistry for TestRegistry {
    type Client = TestClient;

    async fn register_server(&self, _cluster: &str, _server: ServerId) -> Result<()> {
        Ok(())
    }

    async fn get_clients(&self, _cluster: &str) -> Result<Vec<Self::Client>> {
        Ok(self.clients.clone())
    }
}

/// A [`CpuCounter`] that reports a fixed count, so scenarios control
/// `max_workers` deterministically instead of depending on the test host's
/// actual core count.
pub struct FixedCpuCounter(pub usize);

impl CpuCounter for FixedCpuCounter {
    fn cpu_count(&self) -> Result<usize> {
        Ok(self.0)
    }
}

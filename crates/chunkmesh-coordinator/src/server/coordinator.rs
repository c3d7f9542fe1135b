//! The scheduler FSM and the coordinator's event loop.
//!
//! [`CoordinatorActor`] owns every piece of mutable state — backlog,
//! in-flight table, processed-jobs set, scheduler counters, and the client
//! registry — and is driven by a single `tokio::select!` over four sources:
//! the public message channel, worker termination reports, and the
//! self-signal `newdata`. Nothing outside the loop ever touches this state
//! directly; [`CoordinatorHandle`] is the only way in.
//!
//! The two-state FSM from the scheduling model (waiting / feeding) is never
//! stored explicitly: it is fully determined by `workers` vs `max_workers` at
//! any quiescent point, so materializing it as a field would just be another
//! thing that could drift out of sync with the counters it's derived from.

use chunkmesh_core::{Chunk, ClientId, Error, JobRef, OutputChunk, Result, ServerId, SideEffect};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::server::backlog::Backlog;
use crate::server::hooks::{dispatch_post_hook, run_pre_hook_if_needed, ProcessedJobs};
use crate::server::protocol::{ClientHandle, ClusterRegistry, CpuCounter};
use crate::server::supervisor::{
    spawn_worker, CalcId, InFlightEntry, WorkerDown, WorkerOutcome, MAX_ATTEMPTS,
};

/// Default pull-request size when a binary doesn't override it.
pub const DEFAULT_NUM_CHUNKS: usize = 16;

/// Reply to a [`CoordinatorHandle::change_worker_number`] request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeWorkerNumberReply {
    Ok,
    BadNumber,
}

/// Reply to a [`CoordinatorHandle::set_numchunks`] request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetNumChunksReply {
    Ok(usize),
    BadSize,
}

/// Messages accepted by the coordinator's event loop.
pub enum CoordinatorMsg<Cl: ClientHandle> {
    ClientData(Cl),
    ProcessChunks { client: Cl, chunks: Vec<Chunk> },
    JobCleanup { client: ClientId, job_ref: JobRef, post: Option<Arc<dyn SideEffect>> },
    ChangeWorkerNumber { n: i64, reply: oneshot::Sender<ChangeWorkerNumberReply> },
    GetWorkerNumber { reply: oneshot::Sender<(usize, usize)> },
    SetNumChunks { size: i64, reply: oneshot::Sender<SetNumChunksReply> },
    GetNumChunks { reply: oneshot::Sender<usize> },
}

fn channel_error(context: &str) -> Error {
    Error::ChannelError { context: context.to_string() }
}

/// A cheaply-cloneable reference to a running coordinator.
pub struct CoordinatorHandle<Cl: ClientHandle> {
    tx: mpsc::Sender<CoordinatorMsg<Cl>>,
}

impl<Cl: ClientHandle> Clone for CoordinatorHandle<Cl> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<Cl: ClientHandle> CoordinatorHandle<Cl> {
    /// `client_data(pid)`: the client has work available.
    pub async fn client_data(&self, client: Cl) -> Result<()> {
        self.tx
            .send(CoordinatorMsg::ClientData(client))
            .await
            .map_err(|_| channel_error("coordinator closed while sending client_data"))
    }

    /// `process_chunks(batch)`: batch delivery from `client`.
    pub async fn process_chunks(&self, client: Cl, chunks: Vec<Chunk>) -> Result<()> {
        self.tx
            .send(CoordinatorMsg::ProcessChunks { client, chunks })
            .await
            .map_err(|_| channel_error("coordinator closed while sending process_chunks"))
    }

    /// `job_cleanup(client, ref, post)`.
    pub async fn job_cleanup(
        &self,
        client: ClientId,
        job_ref: JobRef,
        post: Option<Arc<dyn SideEffect>>,
    ) -> Result<()> {
        self.tx
            .send(CoordinatorMsg::JobCleanup { client, job_ref, post })
            .await
            .map_err(|_| channel_error("coordinator closed while sending job_cleanup"))
    }

    /// `change_worker_number(n)`.
    pub async fn change_worker_number(&self, n: i64) -> Result<ChangeWorkerNumberReply> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(CoordinatorMsg::ChangeWorkerNumber { n, reply: reply_tx })
            .await
            .map_err(|_| channel_error("coordinator closed while sending change_worker_number"))?;
        reply_rx
            .await
            .map_err(|_| channel_error("coordinator dropped change_worker_number reply"))
    }

    /// `get_worker_number()` -> `(workers, max_workers)`.
    pub async fn get_worker_number(&self) -> Result<(usize, usize)> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(CoordinatorMsg::GetWorkerNumber { reply: reply_tx })
            .await
            .map_err(|_| channel_error("coordinator closed while sending get_worker_number"))?;
        reply_rx
            .await
            .map_err(|_| channel_error("coordinator dropped get_worker_number reply"))
    }

    /// `set_numchunks(size)`.
    pub async fn set_numchunks(&self, size: i64) -> Result<SetNumChunksReply> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(CoordinatorMsg::SetNumChunks { size, reply: reply_tx })
            .await
            .map_err(|_| channel_error("coordinator closed while sending set_numchunks"))?;
        reply_rx
            .await
            .map_err(|_| channel_error("coordinator dropped set_numchunks reply"))
    }

    /// `get_numchunks()`.
    pub async fn get_numchunks(&self) -> Result<usize> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(CoordinatorMsg::GetNumChunks { reply: reply_tx })
            .await
            .map_err(|_| channel_error("coordinator closed while sending get_numchunks"))?;
        reply_rx
            .await
            .map_err(|_| channel_error("coordinator dropped get_numchunks reply"))
    }
}

/// Owns every piece of coordinator state and runs the event loop.
pub struct CoordinatorActor<Cl: ClientHandle> {
    server_id: ServerId,
    backlog: Backlog,
    in_flight: HashMap<CalcId, InFlightEntry>,
    processed: ProcessedJobs,
    clients: HashMap<ClientId, Cl>,
    workers: usize,
    max_workers: usize,
    num_chunks: usize,
    next_calc_id: u64,
    msg_rx: mpsc::Receiver<CoordinatorMsg<Cl>>,
    newdata_tx: mpsc::Sender<()>,
    newdata_rx: mpsc::Receiver<()>,
    down_tx: mpsc::Sender<WorkerDown>,
    down_rx: mpsc::Receiver<WorkerDown>,
}

impl<Cl: ClientHandle> CoordinatorActor<Cl> {
    /// Registers with the cluster, broadcasts `server_up` to every currently
    /// known client, and spawns the event loop. See §4.1: registration
    /// failure is fatal, an empty client enumeration is not.
    pub async fn spawn<Reg>(
        server_id: ServerId,
        cluster: &str,
        registry: &Reg,
        cpu_counter: &dyn CpuCounter,
        num_chunks: usize,
    ) -> Result<CoordinatorHandle<Cl>>
    where
        Reg: ClusterRegistry<Client = Cl>,
    {
        registry.register_server(cluster, server_id.clone()).await?;

        let clients = match registry.get_clients(cluster).await {
            Ok(clients) => clients,
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_e, "client enumeration failed, starting with no known clients");
                Vec::new()
            }
        };

        let max_workers = cpu_counter.cpu_count()?;

        let mut client_map = HashMap::with_capacity(clients.len());
        for client in clients {
            client.server_up(server_id.clone()).await;
            client_map.insert(client.id(), client);
        }

        let (msg_tx, msg_rx) = mpsc::channel(256);
        let (newdata_tx, newdata_rx) = mpsc::channel(1);
        let (down_tx, down_rx) = mpsc::channel(256);

        let actor = CoordinatorActor {
            server_id,
            backlog: Backlog::new(),
            in_flight: HashMap::new(),
            processed: ProcessedJobs::new(),
            clients: client_map,
            workers: 0,
            max_workers,
            num_chunks,
            next_calc_id: 0,
            msg_rx,
            newdata_tx,
            newdata_rx,
            down_tx,
            down_rx,
        };

        tokio::spawn(actor.run());

        Ok(CoordinatorHandle { tx: msg_tx })
    }

    fn signal_newdata(&self) {
        let _ = self.newdata_tx.try_send(());
    }

    fn alloc_calc_id(&mut self) -> CalcId {
        let id = CalcId(self.next_calc_id);
        self.next_calc_id += 1;
        id
    }

    /// Spawns a supervised worker for `chunk` at `attempt`, recording the
    /// in-flight entry. Returns `false` (and spawns nothing) if the
    /// originating client isn't known to this coordinator.
    fn spawn_with_attempt(&mut self, chunk: Chunk, attempt: u8) -> bool {
        let Some(client) = self.clients.get(&chunk.client).cloned() else {
            #[cfg(feature = "tracing")]
            tracing::warn!(client = ?chunk.client, "dropping chunk for unknown client");
            return false;
        };
        let calc_id = self.alloc_calc_id();
        self.in_flight.insert(
            calc_id,
            InFlightEntry { attempt, chunk: chunk.clone() },
        );
        spawn_worker(calc_id, chunk, client, self.down_tx.clone());
        true
    }

    /// `let need = max_workers - workers; dispatch up to need; spawn a
    /// worker per chunk`. Called directly after any state change that might
    /// free capacity, and via the `newdata` self-signal after any change
    /// that might create new work.
    async fn dispatch_tick(&mut self) {
        let need = self.max_workers.saturating_sub(self.workers);
        if need == 0 {
            return;
        }

        let result = self.backlog.dispatch(need);

        for client_id in result.refills {
            if let Some(client) = self.clients.get(&client_id) {
                client.send_chunks(self.server_id.clone(), self.num_chunks).await;
            }
        }

        for chunk in result.chunks {
            if self.spawn_with_attempt(chunk, 0) {
                self.workers += 1;
            }
        }
    }

    async fn handle_msg(&mut self, msg: CoordinatorMsg<Cl>) {
        match msg {
            CoordinatorMsg::ClientData(client) => {
                let id = client.id();
                client.send_chunks(self.server_id.clone(), self.num_chunks).await;
                self.clients.insert(id, client);
            }
            CoordinatorMsg::ProcessChunks { client, chunks } => {
                if chunks.is_empty() {
                    return;
                }
                let first = &chunks[0];
                run_pre_hook_if_needed(
                    &mut self.processed,
                    &first.client,
                    &first.job_ref,
                    first.pre.as_ref(),
                )
                .await;

                self.clients.insert(client.id(), client.clone());
                self.backlog.push_batch(client.id(), chunks);
                self.signal_newdata();
            }
            CoordinatorMsg::JobCleanup { client, job_ref, post } => {
                if self.processed.unmark(&client, &job_ref) {
                    dispatch_post_hook(post);
                }
            }
            CoordinatorMsg::ChangeWorkerNumber { n, reply } => {
                if n < 0 {
                    let _ = reply.send(ChangeWorkerNumberReply::BadNumber);
                    return;
                }
                let n = n as usize;
                if n > self.max_workers {
                    self.max_workers = n;
                    self.signal_newdata();
                } else {
                    self.max_workers = n;
                }
                let _ = reply.send(ChangeWorkerNumberReply::Ok);
            }
            CoordinatorMsg::GetWorkerNumber { reply } => {
                let _ = reply.send((self.workers, self.max_workers));
            }
            CoordinatorMsg::SetNumChunks { size, reply } => {
                if size > 0 {
                    self.num_chunks = size as usize;
                    let _ = reply.send(SetNumChunksReply::Ok(self.num_chunks));
                } else {
                    let _ = reply.send(SetNumChunksReply::BadSize);
                }
            }
            CoordinatorMsg::GetNumChunks { reply } => {
                let _ = reply.send(self.num_chunks);
            }
        }
    }

    async fn handle_down(&mut self, down: WorkerDown) {
        let entry = self.in_flight.remove(&down.calc_id);
        match down.outcome {
            WorkerOutcome::Normal => {
                self.workers = self.workers.saturating_sub(1);
                self.dispatch_tick().await;
            }
            WorkerOutcome::Abnormal(reason) => {
                let Some(entry) = entry else { return };
                if entry.attempt < MAX_ATTEMPTS {
                    if !self.spawn_with_attempt(entry.chunk, entry.attempt + 1) {
                        self.workers = self.workers.saturating_sub(1);
                    }
                } else {
                    self.workers = self.workers.saturating_sub(1);
                    let chunk = entry.chunk;
                    let output = OutputChunk::all_failed(
                        chunk.job_ref.clone(),
                        chunk.seq,
                        chunk.data.len(),
                        reason,
                    );
                    if let Some(client) = self.clients.get(&chunk.client).cloned() {
                        client.calc_done(output).await;
                    }
                }
            }
        }
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                maybe_msg = self.msg_rx.recv() => {
                    match maybe_msg {
                        Some(msg) => self.handle_msg(msg).await,
                        None => break,
                    }
                }
                Some(down) = self.down_rx.recv() => {
                    self.handle_down(down).await;
                }
                Some(()) = self.newdata_rx.recv() => {
                    self.dispatch_tick().await;
                }
            }
        }
    }
}

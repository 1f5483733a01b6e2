//! Worker-pool TCP front end.
//!
//! Three concerns are kept apart: the accept loop, one cheap reader task per
//! connection, and a fixed pool of workers that parse frames and publish
//! samples. Readers hand frames to the workers through a bounded queue with
//! a non-blocking offer: under overload frames are dropped, never buffered
//! into the socket path.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use skywatch_connection::{Registry, Session};
use skywatch_protocol::{encode_line, parse_frame, Ack, AckStatus, ClientFrame, MetricEnvelope};
use skywatch_queue::Publisher;
use skywatch_timer::TimerManager;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::TcpServerConfig;

/// Deadline on steady-state reads; only breaks the read loop out to re-check
/// shutdown, inactivity is enforced by the timer manager.
const READ_DEADLINE: Duration = Duration::from_secs(30);

type SharedWriter = Arc<tokio::sync::Mutex<OwnedWriteHalf>>;

/// One framed message pulled off a socket, awaiting worker-side processing.
pub struct ConnectionJob {
    pub connection_id: String,
    pub zipcode: String,
    pub city: String,
    pub payload: String,
    pub received_at: DateTime<Utc>,
    pub writer: SharedWriter,
}

pub struct WorkerPoolServer {
    config: TcpServerConfig,
    registry: Arc<Registry>,
    timers: Arc<TimerManager>,
    publisher: Arc<dyn Publisher>,
    jobs_tx: async_channel::Sender<ConnectionJob>,
    jobs_rx: async_channel::Receiver<ConnectionJob>,
    shutdown: CancellationToken,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    worker_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPoolServer {
    pub fn new(
        config: TcpServerConfig,
        registry: Arc<Registry>,
        timers: Arc<TimerManager>,
        publisher: Arc<dyn Publisher>,
    ) -> Arc<Self> {
        let (jobs_tx, jobs_rx) = async_channel::bounded(config.job_queue_size.max(1));
        Arc::new(Self {
            config,
            registry,
            timers,
            publisher,
            jobs_tx,
            jobs_rx,
            shutdown: CancellationToken::new(),
            accept_task: Mutex::new(None),
            worker_tasks: Mutex::new(Vec::new()),
        })
    }

    /// Bind the listener, start the workers and the accept loop. Returns the
    /// bound address.
    pub async fn start(self: &Arc<Self>) -> anyhow::Result<SocketAddr> {
        let listener = TcpListener::bind(("0.0.0.0", self.config.port))
            .await
            .context("failed to bind TCP listener")?;
        let addr = listener.local_addr().context("listener has no address")?;

        if self.config.use_worker_pool {
            let worker_count = self.config.effective_worker_count();
            let mut workers = self
                .worker_tasks
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            for worker_id in 0..worker_count {
                let server = self.clone();
                workers.push(tokio::spawn(server.worker_loop(worker_id)));
            }
            tracing::info!(port = addr.port(), workers = worker_count, "TCP server listening");
        } else {
            tracing::info!(port = addr.port(), "TCP server listening (inline processing)");
        }

        let server = self.clone();
        let handle = tokio::spawn(server.accept_loop(listener));
        *self.accept_task.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);

        Ok(addr)
    }

    /// Shut down: stop accepting, close the job queue, let the workers
    /// drain. Readers observe the root cancellation and close their sockets.
    pub async fn stop(&self) {
        tracing::info!("stopping TCP server");
        self.shutdown.cancel();

        let accept = self
            .accept_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = accept {
            let _ = handle.await;
        }

        self.jobs_tx.close();
        let workers: Vec<_> = self
            .worker_tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for handle in workers {
            let _ = handle.await;
        }
        tracing::info!("TCP server stopped");
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        loop {
            let accepted = tokio::select! {
                _ = self.shutdown.cancelled() => return,
                accepted = listener.accept() => accepted,
            };
            match accepted {
                Ok((socket, peer)) => {
                    if self.registry.count() >= self.config.max_connections {
                        tracing::warn!(%peer, "maximum connections reached, rejecting");
                        drop(socket);
                        continue;
                    }
                    let server = self.clone();
                    tokio::spawn(server.handle_connection(socket, peer));
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }

    /// Reader task: identify window, registration, then the steady frame
    /// loop. Cheap by design; everything per-frame beyond line splitting
    /// happens on the workers.
    async fn handle_connection(self: Arc<Self>, socket: TcpStream, peer: SocketAddr) {
        let connection_id = skywatch_common::id::connection_id();
        tracing::debug!(connection = %connection_id, %peer, "new connection");

        let (read_half, write_half) = socket.into_split();
        let writer: SharedWriter = Arc::new(tokio::sync::Mutex::new(write_half));
        let mut reader = BufReader::new(read_half);

        // Identify window: exactly one valid identify frame, or ack an error
        // and close.
        let identity = match timeout(
            self.config.identify_timeout,
            read_frame_line(&mut reader),
        )
        .await
        {
            Err(_elapsed) => {
                tracing::warn!(connection = %connection_id, "identify timeout");
                let _ = send_ack(&writer, AckStatus::Error).await;
                return;
            }
            Ok(Err(e)) => {
                tracing::debug!(connection = %connection_id, error = %e, "closed before identify");
                return;
            }
            Ok(Ok(None)) => {
                tracing::debug!(connection = %connection_id, "closed before identify");
                return;
            }
            Ok(Ok(Some(line))) => match parse_frame(line.as_bytes()) {
                Ok(ClientFrame::Identify(identity)) => identity,
                Ok(_) => {
                    tracing::warn!(connection = %connection_id, "expected identify frame");
                    let _ = send_ack(&writer, AckStatus::Error).await;
                    return;
                }
                Err(e) => {
                    tracing::warn!(connection = %connection_id, error = %e, "invalid identify frame");
                    let _ = send_ack(&writer, AckStatus::Error).await;
                    return;
                }
            },
        };

        let session = Arc::new(Session::new(
            connection_id.clone(),
            identity.zipcode.clone(),
            identity.city.clone(),
        ));
        if let Err(e) = self.registry.register(session.clone()) {
            tracing::warn!(connection = %connection_id, error = %e, "registration refused");
            let _ = send_ack(&writer, AckStatus::Error).await;
            return;
        }

        tracing::info!(
            connection = %connection_id,
            zipcode = %identity.zipcode,
            city = %identity.city,
            "client identified"
        );

        if send_ack(&writer, AckStatus::Identified).await.is_ok() {
            self.schedule_inactivity(&session);
            self.read_loop(&mut reader, &session, &writer).await;
        }

        // Cleanup: run on every exit path once the session is registered.
        if let Err(e) = self.registry.unregister(&connection_id) {
            tracing::debug!(connection = %connection_id, error = %e, "unregister after close");
        }
        self.timers.cancel(&inactivity_timer_id(&connection_id));
        tracing::info!(connection = %connection_id, "connection closed");
    }

    async fn read_loop(
        &self,
        reader: &mut BufReader<OwnedReadHalf>,
        session: &Arc<Session>,
        writer: &SharedWriter,
    ) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return,
                _ = session.closed() => return,
                read = timeout(READ_DEADLINE, read_frame_line(reader)) => {
                    let line = match read {
                        Err(_elapsed) => continue,
                        Ok(Err(e)) => {
                            tracing::debug!(connection = %session.connection_id, error = %e, "read failed");
                            return;
                        }
                        Ok(Ok(None)) => return,
                        Ok(Ok(Some(line))) => line,
                    };

                    let job = ConnectionJob {
                        connection_id: session.connection_id.clone(),
                        zipcode: session.zipcode.clone(),
                        city: session.city.clone(),
                        payload: line,
                        received_at: Utc::now(),
                        writer: writer.clone(),
                    };

                    if self.config.use_worker_pool {
                        match self.jobs_tx.try_send(job) {
                            Ok(()) => {}
                            Err(async_channel::TrySendError::Full(job)) => {
                                tracing::warn!(
                                    connection = %job.connection_id,
                                    "job queue full, dropping frame"
                                );
                            }
                            Err(async_channel::TrySendError::Closed(_)) => return,
                        }
                    } else {
                        self.process_job(job, 0).await;
                    }

                    if let Err(e) = self.registry.update_activity(&session.connection_id) {
                        tracing::debug!(connection = %session.connection_id, error = %e, "activity update failed");
                    }
                    self.schedule_inactivity(session);
                }
            }
        }
    }

    async fn worker_loop(self: Arc<Self>, worker_id: usize) {
        tracing::debug!(worker = worker_id, "worker started");
        while let Ok(job) = self.jobs_rx.recv().await {
            self.process_job(job, worker_id).await;
        }
        tracing::debug!(worker = worker_id, "worker stopped");
    }

    /// Parse and handle one frame. Metrics are fire-and-forget: they are
    /// published keyed by zipcode and never acked, so the hot path does not
    /// write to the socket. Keepalives are acked.
    async fn process_job(&self, job: ConnectionJob, worker_id: usize) {
        let frame = match parse_frame(job.payload.as_bytes()) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(
                    worker = worker_id,
                    connection = %job.connection_id,
                    error = %e,
                    "discarding unparseable frame"
                );
                return;
            }
        };

        match frame {
            ClientFrame::Metrics(metrics) => {
                let envelope = MetricEnvelope {
                    connection_id: job.connection_id,
                    zipcode: job.zipcode,
                    city: job.city,
                    received_at: job.received_at,
                    data: metrics.data,
                };
                let encoded = match envelope.encode() {
                    Ok(encoded) => encoded,
                    Err(e) => {
                        tracing::error!(worker = worker_id, error = %e, "failed to encode sample");
                        return;
                    }
                };
                if let Err(e) = self.publisher.publish(&envelope.zipcode, encoded).await {
                    tracing::error!(
                        worker = worker_id,
                        zipcode = %envelope.zipcode,
                        error = %e,
                        "failed to publish sample"
                    );
                }
            }
            ClientFrame::Keepalive => {
                if let Err(e) = send_ack(&job.writer, AckStatus::Alive).await {
                    tracing::debug!(
                        worker = worker_id,
                        connection = %job.connection_id,
                        error = %e,
                        "keepalive ack failed"
                    );
                }
            }
            ClientFrame::Identify(_) => {
                tracing::warn!(
                    worker = worker_id,
                    connection = %job.connection_id,
                    "unexpected identify frame mid-session"
                );
            }
        }
    }

    /// Arm (or re-arm) the inactivity timer. Replace-by-id keeps exactly one
    /// event per connection; firing cancels the session token, which the
    /// reader observes.
    fn schedule_inactivity(&self, session: &Arc<Session>) {
        let timer_id = inactivity_timer_id(&session.connection_id);
        let expiry = Instant::now() + self.config.inactivity_timeout;
        let session_for_cb = session.clone();
        let callback = Box::new(move || {
            tracing::info!(
                connection = %session_for_cb.connection_id,
                "inactivity timeout, closing connection"
            );
            session_for_cb.close();
        });
        if let Err(e) = self.timers.schedule(timer_id, expiry, callback) {
            tracing::warn!(connection = %session.connection_id, error = %e, "could not arm inactivity timer");
        }
    }
}

fn inactivity_timer_id(connection_id: &str) -> String {
    format!("inactivity:{connection_id}")
}

/// Read one newline-terminated frame. `None` means a clean EOF.
async fn read_frame_line(
    reader: &mut BufReader<OwnedReadHalf>,
) -> std::io::Result<Option<String>> {
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

async fn send_ack(writer: &SharedWriter, status: AckStatus) -> anyhow::Result<()> {
    let frame = encode_line(&Ack::new(status))?;
    let mut writer = writer.lock().await;
    writer.write_all(&frame).await?;
    Ok(())
}

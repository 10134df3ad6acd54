//! TCP Server
//!
//! Accepts connections and hands each one to its own worker thread.

use std::io;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use super::Connection;
use crate::config::Config;
use crate::engine::Engine;
use crate::error::{Result, StrataError};

/// How long the accept loop sleeps when no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A connection worker and a handle on its socket for shutdown
struct Worker {
    stream: TcpStream,
    handle: JoinHandle<()>,
}

/// Stops a running server from another thread
#[derive(Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::Release);
    }
}

/// TCP server for StrataKV
pub struct Server {
    config: Config,
    engine: Arc<Engine>,
    listener: TcpListener,
    shutdown: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
    workers: Mutex<Vec<Worker>>,
}

impl Server {
    /// Bind the listen address from `config`
    pub fn bind(config: Config, engine: Arc<Engine>) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr).map_err(|e| {
            StrataError::Network(format!("Failed to bind {}: {}", config.listen_addr, e))
        })?;
        listener.set_nonblocking(true)?;

        Ok(Self {
            config,
            engine,
            listener,
            shutdown: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicUsize::new(0)),
            workers: Mutex::new(Vec::new()),
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
        }
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Number of connections being served
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Serve until shutdown is signalled (blocking)
    ///
    /// On shutdown, open connections are closed and their workers joined.
    pub fn run(&self) -> Result<()> {
        tracing::info!("Listening on {}", self.local_addr()?);

        while !self.shutdown.load(Ordering::Acquire) {
            match self.listener.accept() {
                Ok((stream, addr)) => self.admit(stream, addr),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.reap_finished();
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        self.close_all();
        tracing::info!("Server stopped");
        Ok(())
    }

    fn admit(&self, stream: TcpStream, addr: SocketAddr) {
        if self.active.load(Ordering::Acquire) >= self.config.max_connections {
            tracing::warn!(
                "Rejecting {}: connection limit {} reached",
                addr,
                self.config.max_connections
            );
            let _ = stream.shutdown(Shutdown::Both);
            return;
        }

        if let Err(e) = self.spawn_worker(stream, addr) {
            tracing::warn!("Failed to start worker for {}: {}", addr, e);
        }
    }

    fn spawn_worker(&self, stream: TcpStream, addr: SocketAddr) -> Result<()> {
        // Accepted sockets inherit non-blocking mode on some platforms
        stream.set_nonblocking(false)?;
        let control = stream.try_clone()?;

        let mut connection = Connection::new(stream, Arc::clone(&self.engine))?;
        connection.set_timeouts(self.config.read_timeout_ms, self.config.write_timeout_ms)?;

        let active = Arc::clone(&self.active);
        active.fetch_add(1, Ordering::AcqRel);

        let spawned = thread::Builder::new()
            .name(format!("conn-{}", addr))
            .spawn(move || {
                if let Err(e) = connection.handle() {
                    tracing::warn!("Connection {} ended with error: {}", addr, e);
                }
                connection.close();
                active.fetch_sub(1, Ordering::AcqRel);
            });

        match spawned {
            Ok(handle) => {
                self.workers.lock().push(Worker {
                    stream: control,
                    handle,
                });
                Ok(())
            }
            Err(e) => {
                self.active.fetch_sub(1, Ordering::AcqRel);
                Err(e.into())
            }
        }
    }

    /// Join workers whose connections have ended
    fn reap_finished(&self) {
        let mut workers = self.workers.lock();
        let (finished, running): (Vec<Worker>, Vec<Worker>) =
            workers.drain(..).partition(|w| w.handle.is_finished());
        *workers = running;
        drop(workers);

        for worker in finished {
            let _ = worker.handle.join();
        }
    }

    fn close_all(&self) {
        let workers: Vec<Worker> = self.workers.lock().drain(..).collect();
        tracing::debug!("Closing {} open connections", workers.len());

        for worker in &workers {
            let _ = worker.stream.shutdown(Shutdown::Both);
        }
        for worker in workers {
            let _ = worker.handle.join();
        }
    }
}

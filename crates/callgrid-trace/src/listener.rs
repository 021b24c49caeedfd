use crate::wire::{TraceEvent, parse_line};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

pub const DEFAULT_PORT: u16 = 56789;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("could not bind trace listener on {host}:{port}: {source}")]
    Bind {
        host: String,
        port: u16,
        source: io::Error,
    },
    #[error("trace listener I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub host: String,
    /// Port to bind. When busy, `port + 1` is tried once. Zero picks a free port.
    pub port: u16,
    /// Events buffered before new ones are dropped.
    pub capacity: usize,
    /// How often the accept loop checks the stop flag.
    pub poll_interval: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            capacity: 4096,
            poll_interval: Duration::from_millis(250),
        }
    }
}

type Waker = Arc<dyn Fn() + Send + Sync>;

/// Receives trace lines on a worker thread.
///
/// The worker only parses and forwards: events wait in a bounded channel
/// until the UI thread calls [`TraceListener::drain`]. Stopping sets a flag
/// the accept loop checks after each poll interval.
pub struct TraceListener {
    port: u16,
    events: Receiver<TraceEvent>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for TraceListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceListener")
            .field("port", &self.port)
            .field("running", &self.is_running())
            .finish()
    }
}

impl TraceListener {
    pub fn start(config: ListenerConfig) -> Result<Self, TraceError> {
        Self::spawn(config, None)
    }

    /// Like [`TraceListener::start`], calling `waker` after each queued event
    /// so an idle UI can schedule a repaint.
    pub fn start_with_waker(
        config: ListenerConfig,
        waker: impl Fn() + Send + Sync + 'static,
    ) -> Result<Self, TraceError> {
        Self::spawn(config, Some(Arc::new(waker)))
    }

    fn spawn(config: ListenerConfig, waker: Option<Waker>) -> Result<Self, TraceError> {
        let std_listener = bind(&config.host, config.port)?;
        std_listener.set_nonblocking(true)?;
        let port = std_listener.local_addr()?.port();

        let (tx, events) = bounded(config.capacity.max(1));
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = stop.clone();
        let poll = config.poll_interval;

        let handle = std::thread::Builder::new()
            .name("callgrid-trace".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        tracing::error!("Failed to start trace runtime: {}", e);
                        return;
                    }
                };
                runtime.block_on(accept_loop(std_listener, tx, worker_stop, poll, waker));
            })?;

        tracing::info!("Trace listener on {}:{}", config.host, port);
        Ok(Self {
            port,
            events,
            stop,
            handle: Some(handle),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Take every event received so far.
    pub fn drain(&self) -> Vec<TraceEvent> {
        self.events.try_iter().collect()
    }

    /// Signal the worker and wait for it to exit.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Trace listener thread panicked");
            }
            tracing::info!("Trace listener on port {} stopped", self.port);
        }
    }
}

impl Drop for TraceListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn bind(host: &str, port: u16) -> Result<std::net::TcpListener, TraceError> {
    match std::net::TcpListener::bind((host, port)) {
        Ok(listener) => Ok(listener),
        Err(first) if port != 0 && port < u16::MAX => {
            tracing::warn!("Port {} busy ({}), trying {}", port, first, port + 1);
            std::net::TcpListener::bind((host, port + 1)).map_err(|source| TraceError::Bind {
                host: host.to_string(),
                port: port + 1,
                source,
            })
        }
        Err(source) => Err(TraceError::Bind {
            host: host.to_string(),
            port,
            source,
        }),
    }
}

async fn accept_loop(
    std_listener: std::net::TcpListener,
    tx: Sender<TraceEvent>,
    stop: Arc<AtomicBool>,
    poll: Duration,
    waker: Option<Waker>,
) {
    let listener = match TcpListener::from_std(std_listener) {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to register trace listener: {}", e);
            return;
        }
    };

    while !stop.load(Ordering::Relaxed) {
        match tokio::time::timeout(poll, listener.accept()).await {
            Err(_) => continue,
            Ok(Ok((socket, addr))) => {
                tracing::debug!("Trace client connected from {}", addr);
                tokio::spawn(read_lines(socket, tx.clone(), waker.clone()));
            }
            Ok(Err(e)) => {
                tracing::error!("Trace accept failed: {}", e);
            }
        }
    }
}

async fn read_lines(socket: TcpStream, tx: Sender<TraceEvent>, waker: Option<Waker>) {
    let mut lines = BufReader::new(socket).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(e) => {
                tracing::debug!("Trace connection closed: {}", e);
                return;
            }
        };
        let Some(event) = parse_line(&line) else {
            continue;
        };
        match tx.try_send(event) {
            Ok(()) => {
                if let Some(wake) = &waker {
                    wake();
                }
            }
            Err(TrySendError::Full(event)) => {
                tracing::debug!("Trace queue full, dropping {:?}", event);
            }
            Err(TrySendError::Disconnected(_)) => return,
        }
    }
}

//! TCP listener.
//!
//! Connection slots are reserved at accept time: each accepted socket takes
//! a semaphore permit that lives as long as its connection task, so a burst
//! of accepts cannot overshoot `max_connections`.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::SinkExt;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::codec::{FramedWrite, LinesCodec};
use tracing::{info, warn};

use crate::broker::Broker;
use crate::config::{BrokerSettings, Settings};
use crate::transport::connection::handle_connection;
use crate::utils::error::BrokerError;

/// TCP listener accepting line-protocol connections until the broker's
/// shutdown token is cancelled.
pub struct TcpServer {
    listener: TcpListener,
    broker: Arc<Broker>,
    settings: BrokerSettings,
}

impl TcpServer {
    /// Bind the listener. A bind failure is fatal to the process.
    pub async fn bind(settings: &Settings, broker: Arc<Broker>) -> Result<Self, BrokerError> {
        let addr = settings.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| BrokerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        info!(%addr, "linesub listening");

        Ok(Self {
            listener,
            broker,
            settings: settings.broker.clone(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, BrokerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until shutdown, then wait for every connection
    /// task to finish its teardown.
    pub async fn run(self) -> Result<(), BrokerError> {
        let shutdown = self.broker.shutdown_token();
        let limit = self.settings.max_connections.min(Semaphore::MAX_PERMITS);
        let slots = Arc::new(Semaphore::new(limit));
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,

                accepted = self.listener.accept() => {
                    let (socket, addr) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!(error = %e, "accept failed");
                            continue;
                        }
                    };

                    let Ok(slot) = Arc::clone(&slots).try_acquire_owned() else {
                        warn!(%addr, limit = self.settings.max_connections, "connection limit reached");
                        connections.spawn(reject(socket));
                        continue;
                    };

                    let broker = self.broker.clone();
                    let settings = self.settings.clone();
                    connections.spawn(async move {
                        handle_connection(socket, addr, broker, settings).await;
                        drop(slot);
                    });
                }

                // Reap finished connection tasks.
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        info!(open = connections.len(), "listener stopped, waiting for connections");
        while connections.join_next().await.is_some() {}
        Ok(())
    }
}

async fn reject(socket: TcpStream) {
    let mut sink = FramedWrite::new(socket, LinesCodec::new());
    if sink.send("> SERVER FULL").await.is_ok() {
        let _ = sink.into_inner().shutdown().await;
    }
}

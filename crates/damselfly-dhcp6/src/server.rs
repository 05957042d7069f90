//! DHCPv6 server run loop
//!
//! Wires the listeners to the dispatcher: each listener runs its own
//! receive loop, and every inbound datagram is handled on its own tokio
//! task so a slow or faulty walk never stalls other requests. A panic
//! inside one walk is caught at the task boundary and resolved to that
//! request's error disposition only.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::dispatcher::{Dispatcher, Disposition};
use crate::duid::Duid;
use crate::error::{DispatchError, Result, ServerError};
use crate::listener::Listener;
use crate::pipeline::compile_pipeline;

/// Event emitted by the server
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A listener is bound and serving
    Started {
        listener: String,
        bind_addr: SocketAddr,
    },
    /// Received a decodable request
    Request {
        listener: String,
        source: SocketAddr,
        message_type: String,
    },
    /// Transmitted a reply
    Answer {
        listener: String,
        source: SocketAddr,
        reply_type: String,
    },
    /// Deliberately transmitted nothing
    NoAnswer {
        listener: String,
        source: SocketAddr,
    },
    /// A request failed; nothing was transmitted
    RequestError {
        listener: String,
        source: SocketAddr,
        error: String,
    },
    /// All listeners have shut down
    Stopped,
}

/// DHCPv6 server
pub struct Server {
    dispatcher: Arc<Dispatcher>,
    config: ServerConfig,
    event_sender: broadcast::Sender<ServerEvent>,
}

impl Server {
    /// Build a server from its configuration
    ///
    /// Compiles the pipeline up front, so a bad configuration fails here
    /// and never starts serving.
    pub fn new(config: ServerConfig) -> Result<Self> {
        let server_id = config
            .server_id
            .parse::<Duid>()
            .map_err(|e| ServerError::InvalidServerId(e.to_string()))?;

        let pipeline = compile_pipeline(&config.pipeline)?;
        let dispatcher = Arc::new(
            Dispatcher::new(pipeline, server_id).with_rapid_commit(config.allow_rapid_commit),
        );

        let (event_sender, _) = broadcast::channel(1024);
        Ok(Self {
            dispatcher,
            config,
            event_sender,
        })
    }

    /// The dispatcher serving this server's pipeline
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Subscribe to server events
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.event_sender.subscribe()
    }

    /// Swap in a new pipeline configuration without dropping requests
    ///
    /// A rejected configuration leaves the running pipeline untouched.
    pub fn reload(&self, config: &ServerConfig) -> Result<()> {
        self.dispatcher.reload(&config.pipeline)?;
        Ok(())
    }

    /// Bind every configured listener and serve until shutdown
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut loops = Vec::with_capacity(self.config.listeners.len());

        // Bind everything before serving anything, so a bad listener
        // configuration fails the whole startup.
        for listener_config in &self.config.listeners {
            let listener = Arc::new(Listener::bind(listener_config).await?);
            let bind_addr = listener.local_addr().map_err(|e| ServerError::BindFailed {
                addr: SocketAddr::new(listener_config.address.into(), listener_config.port),
                source: e,
            })?;

            info!(listener = listener.name(), addr = %bind_addr, "listener started");
            let _ = self.event_sender.send(ServerEvent::Started {
                listener: listener.name().to_string(),
                bind_addr,
            });

            loops.push(tokio::spawn(listener_loop(
                listener,
                Arc::clone(&self.dispatcher),
                self.event_sender.clone(),
                shutdown.clone(),
            )));
        }

        for task in loops {
            let _ = task.await;
        }

        info!("server stopped");
        let _ = self.event_sender.send(ServerEvent::Stopped);
        Ok(())
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("dispatcher", &self.dispatcher)
            .field("listeners", &self.config.listeners)
            .finish_non_exhaustive()
    }
}

/// Receive loop for one listener
async fn listener_loop(
    listener: Arc<Listener>,
    dispatcher: Arc<Dispatcher>,
    events: broadcast::Sender<ServerEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut buf = [0u8; 65535];

    loop {
        tokio::select! {
            result = listener.receive(&mut buf) => {
                match result {
                    Ok((len, source)) => {
                        let data = buf[..len].to_vec();
                        tokio::spawn(handle_datagram(
                            Arc::clone(&listener),
                            Arc::clone(&dispatcher),
                            events.clone(),
                            data,
                            source,
                        ));
                    }
                    Err(e) => {
                        error!(listener = listener.name(), error = %e, "error receiving datagram");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!(listener = listener.name(), "listener shutting down");
                    break;
                }
            }
        }
    }
}

/// Handle one inbound datagram to its final disposition
async fn handle_datagram(
    listener: Arc<Listener>,
    dispatcher: Arc<Dispatcher>,
    events: broadcast::Sender<ServerEvent>,
    data: Vec<u8>,
    source: SocketAddr,
) {
    let request = match listener.decode(&data, source) {
        Ok(request) => request,
        Err(e) => {
            debug!(listener = listener.name(), source = %source, error = %e, "undecodable datagram dropped");
            return;
        }
    };

    debug!(
        listener = listener.name(),
        source = %source,
        msg_type = ?request.message_type(),
        "received request"
    );
    let _ = events.send(ServerEvent::Request {
        listener: listener.name().to_string(),
        source,
        message_type: format!("{:?}", request.message_type()),
    });

    let marks = listener.initial_marks();

    // The walk runs on its own task so a panic inside a filter or handler
    // is contained to this request.
    let walk = {
        let dispatcher = Arc::clone(&dispatcher);
        let request = request.clone();
        tokio::spawn(async move { dispatcher.dispatch(request, marks).await })
    };

    let disposition = match walk.await {
        Ok(disposition) => disposition,
        Err(e) => {
            error!(listener = listener.name(), source = %source, error = %e, "pipeline walk panicked");
            Disposition::Error(DispatchError::Panicked {
                reason: e.to_string(),
            })
        }
    };

    match disposition {
        Disposition::Answer(response) => {
            let reply_type = format!("{:?}", response.reply_type());
            // An encode failure must not leak a half-built reply; the
            // request degrades to an error with nothing transmitted.
            match response.finalize_bytes(&request, dispatcher.server_id()) {
                Ok(bytes) => match listener.send(&bytes, source).await {
                    Ok(()) => {
                        info!(
                            listener = listener.name(),
                            source = %source,
                            reply_type = %reply_type,
                            "sent reply"
                        );
                        let _ = events.send(ServerEvent::Answer {
                            listener: listener.name().to_string(),
                            source,
                            reply_type,
                        });
                    }
                    Err(e) => {
                        error!(listener = listener.name(), source = %source, error = %e, "failed to send reply");
                        let _ = events.send(ServerEvent::RequestError {
                            listener: listener.name().to_string(),
                            source,
                            error: e.to_string(),
                        });
                    }
                },
                Err(e) => {
                    error!(listener = listener.name(), source = %source, error = %e, "failed to encode reply");
                    let _ = events.send(ServerEvent::RequestError {
                        listener: listener.name().to_string(),
                        source,
                        error: e.to_string(),
                    });
                }
            }
        }
        Disposition::NoAnswer => {
            let _ = events.send(ServerEvent::NoAnswer {
                listener: listener.name().to_string(),
                source,
            });
        }
        Disposition::Error(e) => {
            let _ = events.send(ServerEvent::RequestError {
                listener: listener.name().to_string(),
                source,
                error: e.to_string(),
            });
        }
    }
}

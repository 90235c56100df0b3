//! `Race18Server` builder and server loop.
//!
//! This is the entry point for running a game server. It ties together
//! all the layers: transport → protocol → dispatcher → rooms.

use std::net::SocketAddr;
use std::time::Duration;

use race18_protocol::JsonCodec;
use race18_room::{Dice, DiceFactory, RoomConfig, RoomRegistry};
use race18_transport::{Transport, WebSocketTransport};
use tokio::task::JoinHandle;

use crate::dispatch::{Dispatcher, DispatcherHandle, spawn_dispatcher};
use crate::handler::handle_connection;
use crate::{Race18Error, ServerConfig};

/// Builder for configuring and starting a server.
///
/// # Example
///
/// ```rust,no_run
/// use race18::prelude::*;
///
/// # async fn run() -> Result<(), Race18Error> {
/// let server = Race18Server::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct Race18ServerBuilder {
    config: ServerConfig,
    dice: Option<DiceFactory>,
}

impl Race18ServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            dice: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets room capacity, idle timeout and sweep interval.
    pub fn room_config(mut self, room: RoomConfig) -> Self {
        self.config.room = room;
        self
    }

    /// Sets how often idle rooms are swept.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.room.sweep_interval = interval;
        self
    }

    /// Supplies the dice for every new room. Defaults to
    /// [`ServerDice`](race18_room::ServerDice).
    pub fn dice<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Dice> + Send + 'static,
    {
        self.dice = Some(Box::new(factory));
        self
    }

    /// Binds the listener and starts the dispatcher.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<Race18Server, Race18Error> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;

        let rooms = match self.dice {
            Some(dice) => RoomRegistry::with_dice(self.config.room.clone(), dice),
            None => RoomRegistry::new(self.config.room.clone()),
        };
        let (dispatcher, dispatcher_task) =
            spawn_dispatcher(Dispatcher::new(rooms), self.config.room.sweep_interval);

        Ok(Race18Server {
            transport,
            dispatcher,
            dispatcher_task,
            codec: JsonCodec,
        })
    }
}

impl Default for Race18ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running game server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct Race18Server {
    transport: WebSocketTransport,
    dispatcher: DispatcherHandle,
    dispatcher_task: JoinHandle<()>,
    codec: JsonCodec,
}

impl Race18Server {
    /// Creates a new builder.
    pub fn builder() -> Race18ServerBuilder {
        Race18ServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop, spawning a handler task per connection.
    ///
    /// Returns only if the dispatcher task stops.
    pub async fn run(mut self) -> Result<(), Race18Error> {
        tracing::info!(addr = ?self.local_addr().ok(), "Race to 18 server running");

        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let dispatcher = self.dispatcher.clone();
                        let codec = self.codec;
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, codec, dispatcher).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                    }
                },
                _ = &mut self.dispatcher_task => {
                    tracing::error!("dispatcher stopped, shutting down");
                    return Err(Race18Error::DispatcherClosed);
                }
            }
        }
    }
}

//! TCP acceptor, per-connection protocol tasks, and the authoritative
//! tick loop.
//!
//! Sessions never touch the game state directly. Each reader task parses
//! inbound lines and forwards intents over a [`GameCommand`] channel; the
//! tick loop owns the [`GameState`], applies commands as they arrive and
//! advances the simulation on a fixed interval. Outbound delivery goes
//! through the per-session queues held by the [`SessionRegistry`], so
//! writing to a stalled peer can never delay a tick.

use crate::game::GameState;
use crate::session::SessionRegistry;
use log::{debug, error, info};
use shared::{ClientPacket, Direction, ServerPacket};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Intents travelling from session tasks into the tick loop. These are
/// the only mutation entry points besides the tick itself, so processing
/// them on the loop serializes them with it by construction.
#[derive(Debug)]
pub enum GameCommand {
    Join { name: String },
    Leave { name: String },
    SetDirection { name: String, direction: Direction },
}

/// Main server: listening socket, session roster and the authoritative
/// game state driven at a fixed tick period.
pub struct Server {
    listener: TcpListener,
    registry: Arc<RwLock<SessionRegistry>>,
    game: GameState,
    tick_period: Duration,
    cmd_tx: mpsc::UnboundedSender<GameCommand>,
    cmd_rx: mpsc::UnboundedReceiver<GameCommand>,
}

impl Server {
    pub async fn new(addr: &str, tick_period: Duration) -> Result<Self, BoxError> {
        let listener = TcpListener::bind(addr).await?;
        info!("server listening on {}", listener.local_addr()?);

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            registry: Arc::new(RwLock::new(SessionRegistry::new())),
            game: GameState::new(),
            tick_period,
            cmd_tx,
            cmd_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, BoxError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections and runs the tick loop until the task is
    /// dropped. Never returns on its own.
    pub async fn run(self) -> Result<(), BoxError> {
        let Server {
            listener,
            registry,
            mut game,
            tick_period,
            cmd_tx,
            mut cmd_rx,
        } = self;

        // acceptor task: one reader task per accepted connection
        {
            let registry = Arc::clone(&registry);
            let cmd_tx = cmd_tx.clone();
            tokio::spawn(async move {
                accept_loop(listener, registry, cmd_tx).await;
            });
        }

        let mut ticker = interval(tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                Some(cmd) = cmd_rx.recv() => {
                    apply_command(&mut game, cmd);
                }
                _ = ticker.tick() => {
                    step(&mut game, &registry).await;
                }
            }
        }
    }
}

/// Dispatches one session intent into the game state.
fn apply_command(game: &mut GameState, cmd: GameCommand) {
    match cmd {
        GameCommand::Join { name } => game.add_player(&name),
        GameCommand::Leave { name } => game.remove_player(&name),
        GameCommand::SetDirection { name, direction } => game.set_direction(&name, direction),
    }
}

/// One authoritative tick: advance the simulation, settle the dead
/// (GAMEOVER to their own connection only, then close it) and broadcast
/// the resulting snapshot to everyone still registered.
async fn step(game: &mut GameState, registry: &Arc<RwLock<SessionRegistry>>) {
    let dead = game.update();
    let state_line = ServerPacket::State(game.snapshot()).encode();

    let mut registry = registry.write().await;
    for name in &dead {
        registry.send_to(name, &ServerPacket::GameOver.encode());
        registry.remove(name);
    }
    registry.broadcast(&state_line);
}

async fn accept_loop(
    listener: TcpListener,
    registry: Arc<RwLock<SessionRegistry>>,
    cmd_tx: mpsc::UnboundedSender<GameCommand>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!("connection accepted from {}", addr);
                let registry = Arc::clone(&registry);
                let cmd_tx = cmd_tx.clone();
                tokio::spawn(async move {
                    handle_connection(stream, addr, registry, cmd_tx).await;
                });
            }
            Err(e) => {
                error!("failed to accept connection: {}", e);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }
}

/// Per-connection protocol state machine: one JOIN line to go active,
/// then MOVE/CHAT lines until EOF or error, then teardown.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    registry: Arc<RwLock<SessionRegistry>>,
    cmd_tx: mpsc::UnboundedSender<GameCommand>,
) {
    let (read_half, write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    // Handshaking: exactly one line, which must be a JOIN. Anything else
    // closes the connection with no registration and no reply.
    let name = match lines.next_line().await {
        Ok(Some(line)) => match ClientPacket::parse(&line) {
            Some(ClientPacket::Join { name }) => name,
            _ => {
                debug!("{} sent no JOIN handshake, closing", addr);
                return;
            }
        },
        Ok(None) => {
            debug!("{} closed before the handshake", addr);
            return;
        }
        Err(e) => {
            debug!("handshake read failed for {}: {}", addr, e);
            return;
        }
    };

    let (out_tx, out_rx) = mpsc::unbounded_channel();
    spawn_session_writer(name.clone(), write_half, out_rx);

    {
        let mut registry = registry.write().await;
        registry.insert(&name, out_tx);
        registry.broadcast(&join_notice(&name));
    }
    if cmd_tx.send(GameCommand::Join { name: name.clone() }).is_err() {
        error!("game loop is gone, dropping connection from {}", addr);
        return;
    }
    info!("[{}] joined from {}", name, addr);

    // Active: forward MOVE intents, relay CHAT, ignore everything else.
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match ClientPacket::parse(&line) {
                Some(ClientPacket::Move { direction }) => {
                    let _ = cmd_tx.send(GameCommand::SetDirection {
                        name: name.clone(),
                        direction,
                    });
                }
                Some(ClientPacket::Chat { text }) => {
                    let relay = ServerPacket::Chat {
                        text: format!("[{}]: {}", name, text),
                    };
                    registry.write().await.broadcast(&relay.encode());
                }
                _ => {}
            },
            Ok(None) => break,
            Err(e) => {
                debug!("read failed for [{}]: {}", name, e);
                break;
            }
        }
    }

    // Termination: same path for EOF, I/O error and server-side close.
    let _ = cmd_tx.send(GameCommand::Leave { name: name.clone() });
    {
        let mut registry = registry.write().await;
        registry.remove(&name);
        registry.broadcast(&leave_notice(&name));
    }
    info!("[{}] disconnected", name);
}

/// Writer task: drains the session's queue into the socket. Ends when
/// the queue closes (session removed) or the peer becomes unwritable,
/// then releases the write half.
fn spawn_session_writer(
    name: String,
    mut write_half: OwnedWriteHalf,
    mut out_rx: mpsc::UnboundedReceiver<String>,
) {
    tokio::spawn(async move {
        while let Some(line) = out_rx.recv().await {
            if let Err(e) = write_half.write_all(format!("{}\n", line).as_bytes()).await {
                debug!("write to [{}] failed: {}", name, e);
                break;
            }
        }
        let _ = write_half.shutdown().await;
        debug!("writer for [{}] finished", name);
    });
}

fn join_notice(name: &str) -> String {
    ServerPacket::Chat {
        text: format!("[{}] 님이 입장했습니다.", name),
    }
    .encode()
}

fn leave_notice(name: &str) -> String {
    ServerPacket::Chat {
        text: format!("[{}] 님이 퇴장했습니다.", name),
    }
    .encode()
}

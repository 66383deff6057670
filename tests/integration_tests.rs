//! Integration tests for the grid-snake server
//!
//! These tests run the real server on an ephemeral port and drive it
//! with real TCP clients speaking the line protocol.

use server::network::Server;
use shared::{GameSnapshot, ServerPacket, SnakeView};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

async fn start_server(tick_ms: u64) -> SocketAddr {
    let server = Server::new("127.0.0.1:0", Duration::from_millis(tick_ms))
        .await
        .expect("failed to bind test server");
    let addr = server.local_addr().expect("server has a local address");
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    addr
}

struct TestClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    write: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("failed to connect");
        let (read_half, write_half) = stream.into_split();
        TestClient {
            lines: BufReader::new(read_half).lines(),
            write: write_half,
        }
    }

    async fn send(&mut self, line: &str) {
        self.write
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .expect("failed to write line");
    }

    /// Next line from the server, or `None` once the connection closed.
    async fn recv(&mut self) -> Option<String> {
        match timeout(RECV_TIMEOUT, self.lines.next_line()).await {
            Ok(Ok(line)) => line,
            Ok(Err(_)) => None,
            Err(_) => panic!("timed out waiting for a server line"),
        }
    }

    /// Next STATE snapshot, skipping chat traffic.
    async fn next_state(&mut self) -> GameSnapshot {
        loop {
            let line = self
                .recv()
                .await
                .expect("connection closed while waiting for STATE");
            match ServerPacket::parse(&line) {
                Some(ServerPacket::State(snapshot)) => return snapshot,
                Some(_) => continue,
                None => panic!("unparseable server line: {}", line),
            }
        }
    }

    /// Next STATE snapshot that contains the named snake (joins take
    /// effect one tick later, so the first broadcasts may miss it).
    async fn next_state_with(&mut self, name: &str) -> GameSnapshot {
        loop {
            let snapshot = self.next_state().await;
            if snapshot.snakes.iter().any(|snake| snake.name == name) {
                return snapshot;
            }
        }
    }

    /// Next CHAT line containing the needle, skipping everything else.
    async fn next_chat_containing(&mut self, needle: &str) -> String {
        loop {
            let line = self
                .recv()
                .await
                .expect("connection closed while waiting for CHAT");
            if let Some(ServerPacket::Chat { text }) = ServerPacket::parse(&line) {
                if text.contains(needle) {
                    return text;
                }
            }
        }
    }

    /// Waits for GAMEOVER, skipping anything else; panics if the
    /// connection closes or times out first.
    async fn expect_gameover(&mut self) {
        loop {
            let line = self
                .recv()
                .await
                .expect("connection closed before GAMEOVER");
            if ServerPacket::parse(&line) == Some(ServerPacket::GameOver) {
                return;
            }
        }
    }

    /// True if GAMEOVER arrives before `max_states` further STATE lines.
    async fn gameover_within(&mut self, max_states: usize) -> bool {
        let mut states = 0;
        while states < max_states {
            let Some(line) = self.recv().await else {
                return false;
            };
            match ServerPacket::parse(&line) {
                Some(ServerPacket::GameOver) => return true,
                Some(ServerPacket::State(_)) => states += 1,
                _ => {}
            }
        }
        false
    }
}

fn find<'a>(snapshot: &'a GameSnapshot, name: &str) -> Option<&'a SnakeView> {
    snapshot.snakes.iter().find(|snake| snake.name == name)
}

fn score_of(snapshot: &GameSnapshot, name: &str) -> u32 {
    snapshot
        .scores
        .iter()
        .find(|(player, _)| player == name)
        .map(|(_, score)| *score)
        .unwrap_or(0)
}

/// LIFECYCLE TESTS
mod lifecycle_tests {
    use super::*;

    /// A player that sends no moves drifts right one cell per tick at
    /// constant length, then dies at the wall and is disconnected.
    #[tokio::test]
    async fn idle_player_drifts_right_then_dies_at_the_wall() {
        let addr = start_server(40).await;
        let mut client = TestClient::connect(addr).await;
        client.send("JOIN solo").await;

        let first = client.next_state_with("solo").await;
        let snake = find(&first, "solo").expect("solo is present");
        let mut expected_x = snake.body[0].x;
        assert_eq!(snake.body[0].y, 10);

        for _ in 0..5 {
            let snapshot = client.next_state_with("solo").await;
            let snake = find(&snapshot, "solo").expect("solo is present");
            expected_x += 1;
            assert_eq!(snake.body[0].x, expected_x);
            assert_eq!(snake.body[0].y, 10);
            // length 3 unless an apple happened to be on the path; a
            // just-eaten apple scores now but grows one tick later
            let score = score_of(&snapshot, "solo");
            let length = snake.body.len() as u32;
            assert!(
                length == 3 + score || length + 1 == 3 + score,
                "length {} does not match score {}",
                length,
                score
            );
        }

        // the wall at x = 48 is fatal; the server then closes the line
        client.expect_gameover().await;
        assert_eq!(client.recv().await, None);
    }

    /// A client that joins and immediately disconnects triggers the
    /// departure notice and vanishes from subsequent snapshots.
    #[tokio::test]
    async fn disconnect_broadcasts_departure_notice() {
        let addr = start_server(60).await;
        let mut observer = TestClient::connect(addr).await;
        observer.send("JOIN watcher").await;
        observer.next_state_with("watcher").await;

        let mut alice = TestClient::connect(addr).await;
        alice.send("JOIN alice").await;
        let joined = observer.next_chat_containing("[alice]").await;
        assert!(joined.contains("입장"));

        drop(alice); // gone before any MOVE

        let departed = observer.next_chat_containing("퇴장").await;
        assert!(departed.contains("[alice]"));

        // once the leave is processed, alice stays gone
        let mut absent = false;
        for _ in 0..5 {
            let snapshot = observer.next_state().await;
            if find(&snapshot, "alice").is_none() {
                absent = true;
                break;
            }
        }
        assert!(absent, "alice still present after disconnecting");
        let snapshot = observer.next_state().await;
        assert!(find(&snapshot, "alice").is_none());
    }

    /// A first line that is not JOIN gets the connection dropped without
    /// any registration or reply.
    #[tokio::test]
    async fn bad_handshake_is_closed_silently() {
        let addr = start_server(60).await;
        let mut client = TestClient::connect(addr).await;
        client.send("MOVE UP").await;
        assert_eq!(client.recv().await, None);
    }
}

/// COLLISION TESTS
mod combat_tests {
    use super::*;

    /// Two snakes spawning on the same cell in the same tick meet
    /// head-on one move later and both die.
    #[tokio::test]
    async fn head_on_collision_kills_both_players() {
        let addr = start_server(150).await;

        // the two JOINs race the tick boundary; in the rare case a tick
        // lands between them the later snake dies on the earlier one's
        // body instead, so retry with fresh names
        for attempt in 0..5 {
            let mut a = TestClient::connect(addr).await;
            let mut b = TestClient::connect(addr).await;
            a.send(&format!("JOIN alpha{}", attempt)).await;
            b.send(&format!("JOIN beta{}", attempt)).await;

            if a.gameover_within(4).await {
                b.expect_gameover().await;
                // both are gone from the next snapshot
                let mut observer = TestClient::connect(addr).await;
                observer.send(&format!("JOIN observer{}", attempt)).await;
                let snapshot = observer
                    .next_state_with(&format!("observer{}", attempt))
                    .await;
                assert!(find(&snapshot, &format!("alpha{}", attempt)).is_none());
                assert!(find(&snapshot, &format!("beta{}", attempt)).is_none());
                return;
            }
        }
        panic!("joins never landed in the same tick window");
    }

    /// Running into another snake's body kills the runner and pays the
    /// owner five points and five cells of growth in the same tick.
    #[tokio::test]
    async fn body_collision_rewards_the_survivor() {
        let addr = start_server(150).await;

        let mut killer = TestClient::connect(addr).await;
        killer.send("JOIN killer").await;
        killer.next_state_with("killer").await;

        // joining now puts the victim's spawn inside the killer's wake
        let mut victim = TestClient::connect(addr).await;
        victim.send("JOIN victim").await;
        victim.expect_gameover().await;

        // skip snapshots buffered from before the kill; the settlement
        // broadcast is the first one carrying the reward
        let snapshot = loop {
            let snapshot = killer.next_state_with("killer").await;
            if score_of(&snapshot, "killer") >= 5 {
                break snapshot;
            }
        };
        assert!(find(&snapshot, "victim").is_none());
        let snake = find(&snapshot, "killer").expect("killer survives");
        assert!(
            snake.body.len() >= 8,
            "kill growth not applied, length {}",
            snake.body.len()
        );
    }
}

/// CHAT TESTS
mod chat_tests {
    use super::*;

    /// Chat lines are relayed to every session, prefixed with the
    /// sender's name.
    #[tokio::test]
    async fn chat_is_relayed_to_all_sessions() {
        let addr = start_server(60).await;

        let mut alpha = TestClient::connect(addr).await;
        alpha.send("JOIN alpha").await;

        // let alpha clear the spawn cell so beta cannot collide with it
        loop {
            let snapshot = alpha.next_state_with("alpha").await;
            let snake = find(&snapshot, "alpha").expect("alpha is present");
            if snake.body[0].x >= 14 {
                break;
            }
        }

        let mut beta = TestClient::connect(addr).await;
        beta.send("JOIN beta").await;
        beta.next_state_with("beta").await;

        alpha.send("CHAT hello everyone").await;

        let for_alpha = alpha.next_chat_containing("hello everyone").await;
        assert_eq!(for_alpha, "[alpha]: hello everyone");
        let for_beta = beta.next_chat_containing("hello everyone").await;
        assert_eq!(for_beta, "[alpha]: hello everyone");
    }
}

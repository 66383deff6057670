//! Scripted line-protocol peer for poking a running server by hand:
//! joins, steers a small square, says hello and disconnects.

use shared::{ClientPacket, Direction, ServerPacket};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::sleep;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:5000".to_string());
    let name = std::env::args().nth(2).unwrap_or_else(|| "tester".to_string());

    let stream = TcpStream::connect(&addr).await?;
    println!("connected to {}", addr);
    let (read_half, mut write_half) = stream.into_split();

    // Print everything the server pushes until it closes the connection.
    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(read_half).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match ServerPacket::parse(&line) {
                Some(ServerPacket::State(snapshot)) => {
                    println!(
                        "state: {} snakes, apple at {}",
                        snapshot.snakes.len(),
                        snapshot.apple
                    );
                    for snake in &snapshot.snakes {
                        if let Some(head) = snake.body.first() {
                            println!("  {}: len {} head {}", snake.name, snake.body.len(), head);
                        }
                    }
                }
                Some(ServerPacket::Chat { text }) => println!("chat: {}", text),
                Some(ServerPacket::GameOver) => {
                    println!("game over");
                    break;
                }
                None => println!("unparsed line: {}", line),
            }
        }
    });

    let join = ClientPacket::Join { name: name.clone() };
    write_half
        .write_all(format!("{}\n", join.encode()).as_bytes())
        .await?;
    println!("joined as {}", name);

    // Walk a loose square; every turn is 90 degrees so none is rejected
    // as a reversal.
    let turns = [
        Direction::Down,
        Direction::Left,
        Direction::Up,
        Direction::Right,
    ];
    for direction in turns.iter().cycle().take(8) {
        sleep(Duration::from_secs(1)).await;
        let packet = ClientPacket::Move {
            direction: *direction,
        };
        println!("sending {}", packet.encode());
        write_half
            .write_all(format!("{}\n", packet.encode()).as_bytes())
            .await?;
    }

    let chat = ClientPacket::Chat {
        text: "test client complete".to_string(),
    };
    write_half
        .write_all(format!("{}\n", chat.encode()).as_bytes())
        .await?;
    sleep(Duration::from_secs(1)).await;

    drop(write_half);
    reader.abort();
    println!("test client finished");

    Ok(())
}

//! Wire protocol and game vocabulary shared between the server and any
//! line-protocol peer. Everything in here is pure string/grid code so the
//! protocol can be tested without a socket.

use std::fmt;

pub const BOARD_WIDTH: i32 = 48;
pub const BOARD_HEIGHT: i32 = 38;
/// Grid cells are scaled to pixel units on the wire so clients can draw
/// without knowing the cell size.
pub const CELL_PX: i32 = 20;

/// A single cell on the board grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn in_bounds(&self) -> bool {
        self.x >= 0 && self.x < BOARD_WIDTH && self.y >= 0 && self.y < BOARD_HEIGHT
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One of the four axis-aligned movement directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// The direction a snake would have to reverse into. Used to enforce
    /// the no-180-degree-turn rule.
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Grid offset of one step in this direction. The origin is the top
    /// left corner, so `Up` decreases y.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    pub fn parse(token: &str) -> Option<Direction> {
        match token {
            "UP" => Some(Direction::Up),
            "DOWN" => Some(Direction::Down),
            "LEFT" => Some(Direction::Left),
            "RIGHT" => Some(Direction::Right),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "UP",
            Direction::Down => "DOWN",
            Direction::Left => "LEFT",
            Direction::Right => "RIGHT",
        }
    }
}

/// Display color assigned to a snake when it spawns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Lines a client may send to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientPacket {
    Join { name: String },
    Move { direction: Direction },
    Chat { text: String },
}

impl ClientPacket {
    /// Parses one inbound line. Returns `None` for anything that is not a
    /// well-formed protocol line; the server treats those as no-ops.
    pub fn parse(line: &str) -> Option<ClientPacket> {
        if let Some(rest) = line.strip_prefix("JOIN ") {
            let name = rest.trim();
            if name.is_empty() {
                return None;
            }
            return Some(ClientPacket::Join {
                name: name.to_string(),
            });
        }
        if let Some(rest) = line.strip_prefix("MOVE ") {
            let direction = Direction::parse(rest.trim())?;
            return Some(ClientPacket::Move { direction });
        }
        if let Some(rest) = line.strip_prefix("CHAT ") {
            return Some(ClientPacket::Chat {
                text: rest.to_string(),
            });
        }
        None
    }

    pub fn encode(&self) -> String {
        match self {
            ClientPacket::Join { name } => format!("JOIN {}", name),
            ClientPacket::Move { direction } => format!("MOVE {}", direction.as_str()),
            ClientPacket::Chat { text } => format!("CHAT {}", text),
        }
    }
}

/// Serialized view of one snake inside a [`GameSnapshot`].
#[derive(Debug, Clone, PartialEq)]
pub struct SnakeView {
    pub name: String,
    /// Head first, in grid cells. Scaling to pixels happens at encode time.
    pub body: Vec<Cell>,
    pub alive: bool,
    pub color: Color,
}

/// Full world state broadcast to every session each tick.
#[derive(Debug, Clone, PartialEq)]
pub struct GameSnapshot {
    pub snakes: Vec<SnakeView>,
    pub apple: Cell,
    pub scores: Vec<(String, u32)>,
}

/// Lines the server may push to a client.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerPacket {
    State(GameSnapshot),
    Chat { text: String },
    GameOver,
}

impl ServerPacket {
    pub fn encode(&self) -> String {
        match self {
            ServerPacket::State(snapshot) => encode_state(snapshot),
            ServerPacket::Chat { text } => format!("CHAT {}", text),
            ServerPacket::GameOver => "GAMEOVER".to_string(),
        }
    }

    pub fn parse(line: &str) -> Option<ServerPacket> {
        if line == "GAMEOVER" {
            return Some(ServerPacket::GameOver);
        }
        if let Some(rest) = line.strip_prefix("CHAT ") {
            return Some(ServerPacket::Chat {
                text: rest.to_string(),
            });
        }
        let rest = line.strip_prefix("STATE ")?;
        parse_state(rest).map(ServerPacket::State)
    }
}

// STATE <snake>(;<snake>)*|A:<x>,<y>|S:<name>=<score>(,<name>=<score>)*
// with snake = name:x1,y1,...,xn,yn(A|D)[r,g,b] and pixel coordinates.
fn encode_state(snapshot: &GameSnapshot) -> String {
    let snakes = snapshot
        .snakes
        .iter()
        .map(encode_snake)
        .collect::<Vec<_>>()
        .join(";");

    let scores = snapshot
        .scores
        .iter()
        .map(|(name, score)| format!("{}={}", name, score))
        .collect::<Vec<_>>()
        .join(",");

    format!(
        "STATE {}|A:{},{}|S:{}",
        snakes,
        snapshot.apple.x * CELL_PX,
        snapshot.apple.y * CELL_PX,
        scores
    )
}

fn encode_snake(snake: &SnakeView) -> String {
    let coords = snake
        .body
        .iter()
        .map(|cell| format!("{},{}", cell.x * CELL_PX, cell.y * CELL_PX))
        .collect::<Vec<_>>()
        .join(",");

    format!(
        "{}:{}({})[{},{},{}]",
        snake.name,
        coords,
        if snake.alive { "A" } else { "D" },
        snake.color.r,
        snake.color.g,
        snake.color.b
    )
}

fn parse_state(rest: &str) -> Option<GameSnapshot> {
    let mut sections = rest.split('|');
    let snake_section = sections.next()?;
    let apple_section = sections.next()?;
    let score_section = sections.next()?;
    if sections.next().is_some() {
        return None;
    }

    let snakes = if snake_section.is_empty() {
        Vec::new()
    } else {
        snake_section
            .split(';')
            .map(parse_snake)
            .collect::<Option<Vec<_>>>()?
    };

    let apple = parse_apple(apple_section)?;
    let scores = parse_scores(score_section)?;

    Some(GameSnapshot {
        snakes,
        apple,
        scores,
    })
}

fn parse_snake(field: &str) -> Option<SnakeView> {
    let (name, rest) = field.split_once(':')?;
    let (coords, rest) = rest.split_once('(')?;
    let (flag, rest) = rest.split_once(')')?;

    let alive = match flag {
        "A" => true,
        "D" => false,
        _ => return None,
    };

    let rgb = rest.strip_prefix('[')?.strip_suffix(']')?;
    let mut channels = rgb.split(',');
    let r = channels.next()?.parse().ok()?;
    let g = channels.next()?.parse().ok()?;
    let b = channels.next()?.parse().ok()?;
    if channels.next().is_some() {
        return None;
    }

    let numbers: Vec<i32> = coords
        .split(',')
        .map(|token| token.parse().ok())
        .collect::<Option<Vec<_>>>()?;
    if numbers.is_empty() || numbers.len() % 2 != 0 {
        return None;
    }
    let body = numbers
        .chunks(2)
        .map(|pair| Cell::new(pair[0] / CELL_PX, pair[1] / CELL_PX))
        .collect();

    Some(SnakeView {
        name: name.to_string(),
        body,
        alive,
        color: Color { r, g, b },
    })
}

fn parse_apple(section: &str) -> Option<Cell> {
    let rest = section.strip_prefix("A:")?;
    let (x, y) = rest.split_once(',')?;
    Some(Cell::new(
        x.parse::<i32>().ok()? / CELL_PX,
        y.parse::<i32>().ok()? / CELL_PX,
    ))
}

fn parse_scores(section: &str) -> Option<Vec<(String, u32)>> {
    let rest = section.strip_prefix("S:")?;
    if rest.is_empty() {
        return Some(Vec::new());
    }
    rest.split(',')
        .map(|entry| {
            let (name, score) = entry.split_once('=')?;
            Some((name.to_string(), score.parse().ok()?))
        })
        .collect()
}

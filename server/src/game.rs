//! Authoritative game state and the per-tick simulation rules.
//!
//! The tick loop in `network` owns a single [`GameState`] and is the only
//! code that mutates it; everything else talks to it through commands.
//! One call to [`GameState::update`] performs the full cycle in strict
//! order: move, eat, snake-vs-snake collisions, wall check, self check,
//! removal of the dead.

use log::{debug, info, warn};
use rand::Rng;
use shared::{Cell, Color, Direction, GameSnapshot, SnakeView, BOARD_HEIGHT, BOARD_WIDTH};
use std::collections::{HashMap, VecDeque};

/// Every snake spawns here, tail trailing to the left. There is no
/// collision-avoidance check at spawn.
pub const SPAWN_CELL: Cell = Cell::new(10, 10);
/// Points for eating the apple; growth of one cell is deferred to the
/// next tick's tail drop.
pub const APPLE_SCORE: u32 = 1;
/// Points for killing another snake by body contact.
pub const KILL_SCORE: u32 = 5;
/// Cells of immediate tail growth granted along with [`KILL_SCORE`].
pub const KILL_GROWTH: u32 = 5;
/// Apple placement re-rolls before giving up for this tick. The board
/// has 1824 cells, so exhausting this means it is essentially full.
pub const MAX_APPLE_RETRIES: u32 = 4096;

/// One player's snake: ordered body (head first), movement direction,
/// score and liveness.
#[derive(Debug, Clone)]
pub struct Snake {
    pub name: String,
    pub body: VecDeque<Cell>,
    pub direction: Direction,
    pub alive: bool,
    pub score: u32,
    pub color: Color,
    /// Tail drops still owed from eating. Consumed one per tick.
    pending_growth: u32,
}

impl Snake {
    /// Creates a length-3 snake heading right from the given spawn cell,
    /// with a random display color.
    pub fn new(name: &str, spawn: Cell) -> Self {
        let mut rng = rand::thread_rng();
        let body = VecDeque::from([
            spawn,
            Cell::new(spawn.x - 1, spawn.y),
            Cell::new(spawn.x - 2, spawn.y),
        ]);
        Self {
            name: name.to_string(),
            body,
            direction: Direction::Right,
            alive: true,
            score: 0,
            color: Color {
                r: rng.gen(),
                g: rng.gen(),
                b: rng.gen(),
            },
            pending_growth: 0,
        }
    }

    pub fn head(&self) -> Cell {
        *self.body.front().expect("snake body is never empty")
    }

    /// Overwrites the pending direction unless the request is an exact
    /// reversal of the current one.
    pub fn set_direction(&mut self, direction: Direction) {
        if direction == self.direction.opposite() {
            return;
        }
        self.direction = direction;
    }

    /// Advances one cell in the current direction. The tail is dropped
    /// unless growth from an earlier apple is still pending.
    pub fn advance(&mut self) {
        if !self.alive {
            return;
        }
        let (dx, dy) = self.direction.delta();
        let head = self.head();
        self.body.push_front(Cell::new(head.x + dx, head.y + dy));
        if self.pending_growth > 0 {
            self.pending_growth -= 1;
        } else {
            self.body.pop_back();
        }
    }

    /// Apple consumed: score up, queue one unit of growth.
    pub fn eat_apple(&mut self) {
        self.score += APPLE_SCORE;
        self.pending_growth += 1;
    }

    /// Kill credit: score up and grow immediately by duplicating the
    /// current tail cell, visible in the same tick's broadcast.
    pub fn reward_kill(&mut self) {
        self.score += KILL_SCORE;
        if let Some(tail) = self.body.back().copied() {
            for _ in 0..KILL_GROWTH {
                self.body.push_back(tail);
            }
        }
    }

    /// True if any body cell (head included) sits on `cell`.
    pub fn occupies(&self, cell: Cell) -> bool {
        self.body.iter().any(|c| *c == cell)
    }

    /// True if the head overlaps any other cell of the own body.
    pub fn hits_own_body(&self) -> bool {
        let head = self.head();
        self.body.iter().skip(1).any(|c| *c == head)
    }
}

/// Outcome of the snake-vs-snake pass for one snake. Only the first
/// qualifying interaction per snake per tick is applied.
enum Contact {
    HeadOn(String),
    RanInto(String),
}

/// The world: all living snakes plus the single apple.
pub struct GameState {
    pub snakes: HashMap<String, Snake>,
    pub apple: Cell,
    /// Set when a full board prevented the last apple re-roll; retried
    /// at the start of every following tick.
    apple_respawn_pending: bool,
}

impl GameState {
    pub fn new() -> Self {
        let mut state = Self {
            snakes: HashMap::new(),
            apple: Cell::new(0, 0),
            apple_respawn_pending: false,
        };
        state.respawn_apple();
        state
    }

    /// Registers a new snake at the fixed spawn cell. A duplicate name
    /// silently replaces the earlier snake.
    pub fn add_player(&mut self, name: &str) {
        info!("player {} joined at {}", name, SPAWN_CELL);
        self.snakes.insert(name.to_string(), Snake::new(name, SPAWN_CELL));
    }

    pub fn remove_player(&mut self, name: &str) {
        if self.snakes.remove(name).is_some() {
            info!("player {} removed", name);
        }
    }

    /// Direction intent from a session. Ignored for dead or unknown
    /// players and for exact reversals; last write before the tick wins.
    pub fn set_direction(&mut self, name: &str, direction: Direction) {
        if let Some(snake) = self.snakes.get_mut(name) {
            if snake.alive {
                snake.set_direction(direction);
            }
        }
    }

    /// Runs one full tick and returns the names of the snakes that died,
    /// already removed from the live set. The caller settles them
    /// (GAMEOVER, close) and broadcasts the new snapshot.
    pub fn update(&mut self) -> Vec<String> {
        if self.apple_respawn_pending {
            self.respawn_apple();
        }
        if self.snakes.is_empty() {
            return Vec::new();
        }

        // collision resolution wants a stable order, so sort by name
        let mut order: Vec<String> = self.snakes.keys().cloned().collect();
        order.sort();

        // 1. move every living snake one cell
        for name in &order {
            if let Some(snake) = self.snakes.get_mut(name) {
                snake.advance();
            }
        }

        // 2. apple consumption, re-rolling the apple per eater
        for name in &order {
            let ate = match self.snakes.get_mut(name) {
                Some(snake) if snake.alive && snake.head() == self.apple => {
                    snake.eat_apple();
                    debug!("{} ate the apple at {}", name, self.apple);
                    true
                }
                _ => false,
            };
            if ate {
                self.respawn_apple();
            }
        }

        // 3-5. collisions; a snake marked dead earlier in the pass is
        // excluded from every later check
        let mut dead = Vec::new();
        for name in &order {
            let head = match self.snakes.get(name) {
                Some(snake) if snake.alive => snake.head(),
                _ => continue,
            };

            match self.first_contact(name, head) {
                Some(Contact::HeadOn(other)) => {
                    info!("{} and {} collided head-on", name, other);
                    self.kill(name, &mut dead);
                    self.kill(&other, &mut dead);
                    continue;
                }
                Some(Contact::RanInto(other)) => {
                    info!("{} ran into {}", name, other);
                    self.kill(name, &mut dead);
                    if let Some(killer) = self.snakes.get_mut(&other) {
                        killer.reward_kill();
                    }
                    continue;
                }
                None => {}
            }

            if !head.in_bounds() {
                info!("{} hit the wall at {}", name, head);
                self.kill(name, &mut dead);
                continue;
            }

            let self_hit = self
                .snakes
                .get(name)
                .map(|snake| snake.hits_own_body())
                .unwrap_or(false);
            if self_hit {
                info!("{} ran into its own body", name);
                self.kill(name, &mut dead);
            }
        }

        // 6. the dead leave the world before the snapshot is taken
        for name in &dead {
            self.snakes.remove(name);
        }
        dead
    }

    /// First qualifying interaction of `head` with another living snake,
    /// head-vs-head checked before head-vs-body per opponent.
    fn first_contact(&self, name: &str, head: Cell) -> Option<Contact> {
        let mut order: Vec<&String> = self.snakes.keys().collect();
        order.sort();
        for other in order {
            if other == name {
                continue;
            }
            let opponent = match self.snakes.get(other) {
                Some(snake) if snake.alive => snake,
                _ => continue,
            };
            if head == opponent.head() {
                return Some(Contact::HeadOn(other.clone()));
            }
            if opponent.occupies(head) {
                return Some(Contact::RanInto(other.clone()));
            }
        }
        None
    }

    fn kill(&mut self, name: &str, dead: &mut Vec<String>) {
        if let Some(snake) = self.snakes.get_mut(name) {
            snake.alive = false;
        }
        dead.push(name.to_string());
    }

    /// Re-rolls the apple onto a cell not occupied by any living snake.
    /// Retries are bounded; on a saturated board the re-roll is deferred
    /// to the next tick instead of spinning forever.
    fn respawn_apple(&mut self) {
        let mut rng = rand::thread_rng();
        for _ in 0..MAX_APPLE_RETRIES {
            let cell = Cell::new(
                rng.gen_range(0..BOARD_WIDTH),
                rng.gen_range(0..BOARD_HEIGHT),
            );
            let blocked = self
                .snakes
                .values()
                .any(|snake| snake.alive && snake.occupies(cell));
            if !blocked {
                debug!("apple respawned at {}", cell);
                self.apple = cell;
                self.apple_respawn_pending = false;
                return;
            }
        }
        warn!(
            "no free cell for the apple after {} attempts, retrying next tick",
            MAX_APPLE_RETRIES
        );
        self.apple_respawn_pending = true;
    }

    /// Read-only serialized view of the world, snakes sorted by name.
    pub fn snapshot(&self) -> GameSnapshot {
        let mut order: Vec<&String> = self.snakes.keys().collect();
        order.sort();

        let mut snakes = Vec::with_capacity(order.len());
        let mut scores = Vec::with_capacity(order.len());
        for name in order {
            if let Some(snake) = self.snakes.get(name) {
                snakes.push(SnakeView {
                    name: snake.name.clone(),
                    body: snake.body.iter().copied().collect(),
                    alive: snake.alive,
                    color: snake.color,
                });
                scores.push((snake.name.clone(), snake.score));
            }
        }

        GameSnapshot {
            snakes,
            apple: self.apple,
            scores,
        }
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

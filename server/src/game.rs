use crate::map::{GameMap, Tile};
use crate::physics::{Motion, Player};
use log::info;
use shared::{EndReason, MAX_COORD, NO_WINNER};
use std::fmt;

/// Where every player appears when the round starts: bottom-left corner.
pub const START_X: u16 = 0;
pub const START_Y: u16 = MAX_COORD;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Waiting,
    Running,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub reason: EndReason,
    pub winner: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    CoinCollected { id: u8, score: u16 },
    PlayerDied { id: u8 },
    ReachedEdge { id: u8, score: u16 },
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameEvent::CoinCollected { id, score } => {
                write!(f, "player {} collected a coin (score {})", id, score)
            }
            GameEvent::PlayerDied { id } => write!(f, "player {} touched a laser", id),
            GameEvent::ReachedEdge { id, score } => {
                write!(f, "player {} reached the end (score {})", id, score)
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct TickReport {
    pub events: Vec<GameEvent>,
    /// Set only on the tick the round ends.
    pub outcome: Option<Outcome>,
}

#[derive(Debug)]
pub struct GameState {
    pub tick: u32,
    phase: Phase,
    map: GameMap,
    motion: Motion,
    participants: usize,
    departures: usize,
    outcome: Option<Outcome>,
}

impl GameState {
    pub fn new(map: GameMap) -> Self {
        let motion = Motion::for_map(map.rows(), map.cols());
        Self {
            tick: 0,
            phase: Phase::Waiting,
            map,
            motion,
            participants: 0,
            departures: 0,
            outcome: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn map(&self) -> &GameMap {
        &self.map
    }

    pub fn motion(&self) -> Motion {
        self.motion
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn participants(&self) -> usize {
        self.participants
    }

    /// Puts every player on the start position and begins the round.
    /// Returns the number of participants.
    pub fn start<'a>(&mut self, players: impl IntoIterator<Item = &'a mut Player>) -> usize {
        let mut count = 0;
        for player in players {
            *player = Player::new(player.id, START_X, START_Y);
            count += 1;
        }
        self.participants = count;
        self.phase = Phase::Running;
        info!(
            "Round started with {} players on a {}x{} map ({} coins)",
            count,
            self.map.rows(),
            self.map.cols(),
            self.map.coin_count()
        );
        count
    }

    /// Records that a participant left mid-round.
    pub fn player_left(&mut self, id: u8) {
        if self.phase == Phase::Running {
            self.departures += 1;
            info!("Player {} left the round", id);
        }
    }

    /// Ends the round without simulating, e.g. when nobody is left to play.
    pub fn abort(&mut self, reason: EndReason) -> Option<Outcome> {
        if self.phase != Phase::Running {
            return None;
        }
        let outcome = Outcome {
            reason,
            winner: NO_WINNER,
        };
        self.finish(outcome);
        Some(outcome)
    }

    /// Advances the simulation by one tick. Players must be given in id order.
    pub fn step<'a>(&mut self, players: impl IntoIterator<Item = &'a mut Player>) -> TickReport {
        let mut players: Vec<&mut Player> = players.into_iter().collect();
        let mut report = TickReport::default();

        for player in players.iter_mut() {
            player.collected_coin = false;
        }
        if self.phase != Phase::Running {
            return report;
        }

        let mut someone_died = false;
        for player in players.iter_mut() {
            if !player.alive {
                continue;
            }
            player.advance(&self.motion);
            self.resolve_tile(player, &mut report.events);

            if !player.alive {
                someone_died = true;
            } else if player.reached_edge() {
                report.events.push(GameEvent::ReachedEdge {
                    id: player.id,
                    score: player.score,
                });
            }
        }

        if let Some(outcome) = self.evaluate(&players, someone_died) {
            self.finish(outcome);
            report.outcome = Some(outcome);
        }
        report
    }

    /// Moves to the next tick number. Wraps with the protocol's u32 width.
    pub fn advance_tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
    }

    fn resolve_tile(&mut self, player: &mut Player, events: &mut Vec<GameEvent>) {
        let (row, col) = self.map.cell_at(player.x, player.y);
        match self.map.tile(row, col) {
            Some(Tile::Coin) => {
                if self.map.take_coin(row, col) {
                    player.score = player.score.saturating_add(1);
                    player.collected_coin = true;
                    events.push(GameEvent::CoinCollected {
                        id: player.id,
                        score: player.score,
                    });
                }
            }
            Some(Tile::Electric) => {
                player.alive = false;
                events.push(GameEvent::PlayerDied { id: player.id });
            }
            _ => {}
        }
    }

    fn evaluate(&self, players: &[&mut Player], someone_died: bool) -> Option<Outcome> {
        // Highest score at the finish wins, lowest id breaks ties
        let finisher = players
            .iter()
            .filter(|player| player.alive && player.reached_edge())
            .max_by(|a, b| a.score.cmp(&b.score).then(b.id.cmp(&a.id)));
        if let Some(player) = finisher {
            return Some(Outcome {
                reason: EndReason::MapComplete,
                winner: player.id,
            });
        }

        if self.participants < 2 {
            return None;
        }
        let mut alive = players.iter().filter(|player| player.alive);
        let survivor = alive.next().map(|player| player.id);
        if alive.next().is_some() {
            return None;
        }

        let reason = if !someone_died && self.departures > 0 {
            EndReason::Disconnect
        } else {
            EndReason::PlayerDied
        };
        Some(Outcome {
            reason,
            winner: survivor.unwrap_or(NO_WINNER),
        })
    }

    fn finish(&mut self, outcome: Outcome) {
        self.phase = Phase::Ended;
        self.outcome = Some(outcome);
        info!(
            "Round over at tick {}: {}, winner {}",
            self.tick,
            outcome.reason,
            if outcome.winner == NO_WINNER {
                "none".to_string()
            } else {
                outcome.winner.to_string()
            }
        );
    }
}

use shared::{InputState, PlayerState, MAX_COORD};

/// Per-tick movement in fixed-point units, scaled to the map so that crossing
/// a cell takes about the same number of ticks on any map size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Motion {
    /// Upward movement while the jetpack is engaged.
    pub rise: u16,
    /// Downward movement while it is not.
    pub fall: u16,
    /// Constant rightward movement.
    pub drift: u16,
}

impl Motion {
    pub fn for_map(rows: usize, cols: usize) -> Self {
        let scaled = |numerator: usize, cells: usize| -> u16 {
            // Large maps would otherwise round down to standing still
            (numerator / cells.max(1)).clamp(1, usize::from(MAX_COORD)) as u16
        };
        Motion {
            rise: scaled(500, rows),
            fall: scaled(300, rows),
            drift: scaled(500, cols),
        }
    }
}

///Simulated state of one player. Positions are fixed-point in `[0, 1000)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: u8,
    pub x: u16,
    pub y: u16,
    pub score: u16,
    pub alive: bool,
    pub collected_coin: bool,
    ///Latest controls received from the client.
    pub input: InputState,
}

impl Player {
    pub fn new(id: u8, x: u16, y: u16) -> Self {
        Self {
            id,
            x,
            y,
            score: 0,
            alive: true,
            collected_coin: false,
            input: InputState::default(),
        }
    }

    ///Moves the player one tick according to its input. Dead players never move.
    pub fn advance(&mut self, motion: &Motion) {
        if !self.alive {
            return;
        }

        self.y = if self.input.jetpack {
            self.y.saturating_sub(motion.rise)
        } else {
            clamp_coord(i32::from(self.y) + i32::from(motion.fall))
        };

        let drift = i32::from(motion.drift);
        let mut dx = drift;
        if self.input.right {
            dx += drift;
        }
        if self.input.left {
            dx -= drift;
        }
        self.x = clamp_coord(i32::from(self.x) + dx);
    }

    ///True once the player has crossed the right edge of the map.
    pub fn reached_edge(&self) -> bool {
        self.x >= MAX_COORD
    }

    pub fn state(&self) -> PlayerState {
        PlayerState {
            id: self.id,
            x: self.x,
            y: self.y,
            score: self.score,
            alive: self.alive,
            collected_coin: self.collected_coin,
        }
    }
}

///Clamps a coordinate into `[0, MAX_COORD]`.
pub fn clamp_coord(value: i32) -> u16 {
    value.clamp(0, i32::from(MAX_COORD)) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn motion() -> Motion {
        Motion {
            rise: 50,
            fall: 30,
            drift: 5,
        }
    }

    #[test]
    fn test_motion_scales_with_map() {
        let m = Motion::for_map(10, 100);
        assert_eq!(m.rise, 50);
        assert_eq!(m.fall, 30);
        assert_eq!(m.drift, 5);

        // Huge maps still move
        let m = Motion::for_map(5000, 5000);
        assert_eq!(m.rise, 1);
        assert_eq!(m.fall, 1);
        assert_eq!(m.drift, 1);

        // Tiny maps cannot jump past the whole world in one tick
        let m = Motion::for_map(1, 1);
        assert_eq!(m.rise, 500);
        assert_eq!(m.drift, 500);
    }

    #[test]
    fn test_fall_and_drift() {
        let mut player = Player::new(0, 100, 500);
        player.advance(&motion());
        assert_eq!(player.x, 105);
        assert_eq!(player.y, 530);
    }

    #[test]
    fn test_jetpack_rises_and_stops_at_top() {
        let mut player = Player::new(0, 0, 120);
        player.input.jetpack = true;

        player.advance(&motion());
        assert_eq!(player.y, 70);
        player.advance(&motion());
        assert_eq!(player.y, 20);
        player.advance(&motion());
        assert_eq!(player.y, 0);
        player.advance(&motion());
        assert_eq!(player.y, 0);
    }

    #[test]
    fn test_floor_clamp() {
        let mut player = Player::new(0, 0, 990);
        player.advance(&motion());
        assert_eq!(player.y, MAX_COORD);
    }

    #[test]
    fn test_steering() {
        let mut player = Player::new(0, 100, 0);
        player.input.right = true;
        player.advance(&motion());
        assert_eq!(player.x, 110);

        player.input = InputState {
            left: true,
            ..InputState::default()
        };
        player.advance(&motion());
        assert_eq!(player.x, 110);

        player.input.right = true;
        player.advance(&motion());
        assert_eq!(player.x, 115);
    }

    #[test]
    fn test_right_edge_clamp() {
        let mut player = Player::new(0, 997, 0);
        assert!(!player.reached_edge());
        player.advance(&motion());
        assert_eq!(player.x, MAX_COORD);
        assert!(player.reached_edge());
    }

    #[test]
    fn test_dead_player_does_not_move() {
        let mut player = Player::new(0, 100, 100);
        player.alive = false;
        player.input.jetpack = true;
        player.advance(&motion());
        assert_eq!((player.x, player.y), (100, 100));
    }

    #[test]
    fn test_clamp_coord() {
        assert_eq!(clamp_coord(-5), 0);
        assert_eq!(clamp_coord(0), 0);
        assert_eq!(clamp_coord(999), 999);
        assert_eq!(clamp_coord(1000), 999);
        assert_eq!(clamp_coord(i32::MAX), 999);
    }

    #[test]
    fn test_state_record() {
        let mut player = Player::new(3, 12, 34);
        player.score = 7;
        player.collected_coin = true;
        let state = player.state();
        assert_eq!(state.id, 3);
        assert_eq!((state.x, state.y), (12, 34));
        assert_eq!(state.score, 7);
        assert!(state.alive);
        assert!(state.collected_coin);
    }
}

//! Tile map loaded once at startup
//!
//! The text format is one line per row and one character per tile. Rows
//! shorter than the longest line are padded with empty tiles. The grid never
//! changes shape after loading; the only mutation is a collected coin turning
//! into an empty tile.

use shared::WORLD_SCALE;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// `MAP_CHUNK` frames carry `rows` bytes plus an 8-byte header in a u16 length.
pub const MAX_MAP_ROWS: usize = u16::MAX as usize - 8;
/// Chunk indices and the chunk count are u16 on the wire.
pub const MAX_MAP_COLS: usize = u16::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tile {
    Empty,
    Wall,
    Coin,
    Electric,
}

impl Tile {
    pub fn from_char(c: char) -> Self {
        match c {
            '#' => Tile::Wall,
            'c' => Tile::Coin,
            'e' => Tile::Electric,
            _ => Tile::Empty,
        }
    }

    /// Byte sent to clients in map chunks.
    pub fn as_byte(self) -> u8 {
        match self {
            Tile::Empty => b'_',
            Tile::Wall => b'#',
            Tile::Coin => b'c',
            Tile::Electric => b'e',
        }
    }
}

#[derive(Debug, Error)]
pub enum MapError {
    #[error("failed to read map {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("map has no tiles")]
    Empty,

    #[error("map of {rows}x{cols} tiles does not fit the protocol")]
    TooLarge { rows: usize, cols: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameMap {
    rows: usize,
    cols: usize,
    /// Row-major.
    tiles: Vec<Tile>,
}

impl GameMap {
    pub fn load(path: &Path) -> Result<Self, MapError> {
        let text = fs::read_to_string(path).map_err(|source| MapError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        text.parse()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn tile(&self, row: usize, col: usize) -> Option<Tile> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        Some(self.tiles[row * self.cols + col])
    }

    /// Turns a coin into an empty tile. Returns false if there was no coin.
    pub fn take_coin(&mut self, row: usize, col: usize) -> bool {
        if self.tile(row, col) != Some(Tile::Coin) {
            return false;
        }
        self.tiles[row * self.cols + col] = Tile::Empty;
        true
    }

    /// Grid cell under a fixed-point position.
    pub fn cell_at(&self, x: u16, y: u16) -> (usize, usize) {
        let scale = usize::from(WORLD_SCALE);
        let row = usize::from(y) * self.rows / scale;
        let col = usize::from(x) * self.cols / scale;
        (row.min(self.rows - 1), col.min(self.cols - 1))
    }

    /// Tile bytes of one column, top row first.
    pub fn column(&self, col: usize) -> Vec<u8> {
        (0..self.rows)
            .filter_map(|row| self.tile(row, col))
            .map(Tile::as_byte)
            .collect()
    }

    pub fn coin_count(&self) -> usize {
        self.tiles.iter().filter(|tile| **tile == Tile::Coin).count()
    }
}

impl FromStr for GameMap {
    type Err = MapError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let lines: Vec<&str> = text.lines().collect();
        let rows = lines.len();
        let cols = lines
            .iter()
            .map(|line| line.chars().count())
            .max()
            .unwrap_or(0);

        if rows == 0 || cols == 0 {
            return Err(MapError::Empty);
        }
        if rows > MAX_MAP_ROWS || cols > MAX_MAP_COLS {
            return Err(MapError::TooLarge { rows, cols });
        }

        let mut tiles = Vec::with_capacity(rows * cols);
        for line in &lines {
            let start = tiles.len();
            tiles.extend(line.chars().map(Tile::from_char));
            tiles.resize(start + cols, Tile::Empty);
        }

        Ok(Self { rows, cols, tiles })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dimensions_and_padding() {
        let map: GameMap = "#c\n_e_c\n\n".parse().unwrap();
        assert_eq!(map.rows(), 3);
        assert_eq!(map.cols(), 4);
        assert_eq!(map.tile(0, 0), Some(Tile::Wall));
        assert_eq!(map.tile(0, 1), Some(Tile::Coin));
        assert_eq!(map.tile(0, 3), Some(Tile::Empty));
        assert_eq!(map.tile(1, 1), Some(Tile::Electric));
        assert_eq!(map.tile(2, 2), Some(Tile::Empty));
        assert_eq!(map.tile(3, 0), None);
        assert_eq!(map.tile(0, 4), None);
    }

    #[test]
    fn test_crlf_and_unknown_characters() {
        let map: GameMap = "c x\r\n e#\r\n".parse().unwrap();
        assert_eq!(map.rows(), 2);
        assert_eq!(map.cols(), 3);
        assert_eq!(map.column(1), b"_e".to_vec());
        assert_eq!(map.column(2), b"_#".to_vec());
    }

    #[test]
    fn test_empty_map_rejected() {
        assert!(matches!("".parse::<GameMap>(), Err(MapError::Empty)));
        assert!(matches!("\n\n".parse::<GameMap>(), Err(MapError::Empty)));
    }

    #[test]
    fn test_oversized_map_rejected() {
        let wide = "_".repeat(MAX_MAP_COLS + 1);
        assert!(matches!(
            wide.parse::<GameMap>(),
            Err(MapError::TooLarge { rows: 1, .. })
        ));
    }

    #[test]
    fn test_take_coin_only_once() {
        let mut map: GameMap = "c_e".parse().unwrap();
        assert_eq!(map.coin_count(), 1);
        assert!(map.take_coin(0, 0));
        assert_eq!(map.tile(0, 0), Some(Tile::Empty));
        assert!(!map.take_coin(0, 0));
        assert!(!map.take_coin(0, 2));
        assert_eq!(map.tile(0, 2), Some(Tile::Electric));
        assert_eq!(map.coin_count(), 0);
    }

    #[test]
    fn test_cell_at_scaling() {
        let map: GameMap = "__________\n__________".parse().unwrap();
        assert_eq!(map.cell_at(0, 0), (0, 0));
        assert_eq!(map.cell_at(99, 499), (0, 0));
        assert_eq!(map.cell_at(100, 500), (1, 1));
        assert_eq!(map.cell_at(999, 999), (1, 9));
    }

    #[test]
    fn test_load_missing_file() {
        let result = GameMap::load(Path::new("/definitely/not/a/map.txt"));
        assert!(matches!(result, Err(MapError::Io { .. })));
    }

    #[test]
    fn test_load_from_disk() {
        let path = std::env::temp_dir().join(format!("jetpack-map-{}.txt", std::process::id()));
        fs::write(&path, "__c\n#e_\n").unwrap();
        let map = GameMap::load(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(map.rows(), 2);
        assert_eq!(map.cols(), 3);
        assert_eq!(map.column(2), b"c_".to_vec());
    }
}

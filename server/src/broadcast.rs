//! Encoding of everything the server sends
//!
//! Frames are encoded once into [`Bytes`] and then cloned into each client's
//! outbound queue, so a broadcast costs one serialization regardless of the
//! number of players.

use crate::client_manager::ClientManager;
use crate::game::Outcome;
use crate::map::GameMap;
use crate::utils::hex_dump;
use bytes::Bytes;
use log::{debug, log_enabled, Level};
use shared::{CodecError, Message};

/// Encodes a message into a shareable frame.
pub fn encode(message: &Message) -> Result<Bytes, CodecError> {
    let bytes = Bytes::from(message.encode()?);
    if log_enabled!(Level::Debug) {
        debug!(
            "-> {} ({} bytes) {}",
            message.message_type(),
            bytes.len(),
            hex_dump(&bytes)
        );
    }
    Ok(bytes)
}

pub fn welcome(client_id: u8) -> Result<Bytes, CodecError> {
    encode(&Message::Welcome {
        accepted: true,
        client_id,
    })
}

/// One `MAP_CHUNK` per column, left to right.
pub fn map_chunks(map: &GameMap) -> Result<Vec<Bytes>, CodecError> {
    let count = u16::try_from(map.cols()).map_err(|_| CodecError::InvalidField("chunk count"))?;
    (0..count)
        .map(|index| {
            encode(&Message::MapChunk {
                index,
                count,
                column: map.column(usize::from(index)),
            })
        })
        .collect()
}

pub fn game_start(player_count: usize, start_x: u16, start_y: u16) -> Result<Bytes, CodecError> {
    let player_count =
        u8::try_from(player_count).map_err(|_| CodecError::InvalidField("player count"))?;
    encode(&Message::GameStart {
        player_count,
        start_x,
        start_y,
    })
}

/// `GAME_STATE` for the given tick, players in id order.
pub fn snapshot(tick: u32, clients: &ClientManager) -> Result<Bytes, CodecError> {
    encode(&Message::GameState {
        tick,
        players: clients.player_states(),
    })
}

pub fn game_end(outcome: Outcome) -> Result<Bytes, CodecError> {
    encode(&Message::GameEnd {
        reason: outcome.reason,
        winner: outcome.winner,
    })
}

pub fn debug_info(text: &str) -> Result<Bytes, CodecError> {
    encode(&Message::DebugInfo {
        text: text.to_string(),
    })
}

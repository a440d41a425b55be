//! Typed messages and their payload layouts
//!
//! Fixed-size payload parts are plain structs serialized through the wire
//! options of [`crate::codec`], so each struct's field order is its byte
//! layout. Variable tails (map columns, player records, debug text) are
//! appended after the fixed part.

use bincode::Options;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::codec::{wire, CodecError, Frame};
use crate::{EndReason, MessageType, PlayerState, PLAYER_STATE_LEN};

const WELCOME_LEN: usize = 2;
const MAP_CHUNK_HEADER_LEN: usize = 4;
const GAME_START_LEN: usize = 5;
const INPUT_LEN: usize = 2;
const GAME_STATE_HEADER_LEN: usize = 5;
const GAME_END_LEN: usize = 2;
const DEBUG_INFO_HEADER_LEN: usize = 2;

#[derive(Serialize, Deserialize)]
struct WelcomePayload {
    accept_code: u8,
    client_id: u8,
}

#[derive(Serialize, Deserialize)]
struct MapChunkHeader {
    index: u16,
    count: u16,
}

#[derive(Serialize, Deserialize)]
struct GameStartPayload {
    player_count: u8,
    start_x: u16,
    start_y: u16,
}

#[derive(Serialize, Deserialize)]
struct InputPayload {
    player_id: u8,
    flags: u8,
}

#[derive(Serialize, Deserialize)]
struct GameStateHeader {
    tick: u32,
    player_count: u8,
}

#[derive(Serialize, Deserialize)]
struct GameEndPayload {
    reason: u8,
    winner: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    // Client to server
    Connect,
    Input {
        player_id: u8,
        /// Raw control byte; see [`crate::InputScheme`].
        flags: u8,
    },
    Disconnect,

    // Server to client
    Welcome {
        accepted: bool,
        client_id: u8,
    },
    MapChunk {
        index: u16,
        count: u16,
        /// One tile byte per map row for column `index`.
        column: Vec<u8>,
    },
    GameStart {
        player_count: u8,
        start_x: u16,
        start_y: u16,
    },
    GameState {
        tick: u32,
        players: Vec<PlayerState>,
    },
    GameEnd {
        reason: EndReason,
        winner: u8,
    },

    // Both directions
    DebugInfo {
        text: String,
    },
}

/// Deserializes the fixed-size prefix of a payload.
fn fixed<T: DeserializeOwned>(
    kind: MessageType,
    payload: &[u8],
    need: usize,
) -> Result<T, CodecError> {
    if payload.len() < need {
        return Err(CodecError::Truncated {
            kind,
            need,
            have: payload.len(),
        });
    }
    Ok(wire().deserialize(&payload[..need])?)
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Connect => MessageType::Connect,
            Message::Input { .. } => MessageType::Input,
            Message::Disconnect => MessageType::Disconnect,
            Message::Welcome { .. } => MessageType::Welcome,
            Message::MapChunk { .. } => MessageType::MapChunk,
            Message::GameStart { .. } => MessageType::GameStart,
            Message::GameState { .. } => MessageType::GameState,
            Message::GameEnd { .. } => MessageType::GameEnd,
            Message::DebugInfo { .. } => MessageType::DebugInfo,
        }
    }

    pub fn to_frame(&self) -> Result<Frame, CodecError> {
        let payload = match self {
            Message::Connect | Message::Disconnect => Vec::new(),
            Message::Input { player_id, flags } => wire().serialize(&InputPayload {
                player_id: *player_id,
                flags: *flags,
            })?,
            Message::Welcome {
                accepted,
                client_id,
            } => wire().serialize(&WelcomePayload {
                accept_code: u8::from(*accepted),
                client_id: *client_id,
            })?,
            Message::MapChunk {
                index,
                count,
                column,
            } => {
                let mut payload = wire().serialize(&MapChunkHeader {
                    index: *index,
                    count: *count,
                })?;
                payload.extend_from_slice(column);
                payload
            }
            Message::GameStart {
                player_count,
                start_x,
                start_y,
            } => wire().serialize(&GameStartPayload {
                player_count: *player_count,
                start_x: *start_x,
                start_y: *start_y,
            })?,
            Message::GameState { tick, players } => {
                let player_count = u8::try_from(players.len())
                    .map_err(|_| CodecError::InvalidField("player count"))?;
                let mut payload = Vec::with_capacity(
                    GAME_STATE_HEADER_LEN + players.len() * PLAYER_STATE_LEN,
                );
                payload.extend(wire().serialize(&GameStateHeader {
                    tick: *tick,
                    player_count,
                })?);
                for player in players {
                    payload.extend(wire().serialize(player)?);
                }
                payload
            }
            Message::GameEnd { reason, winner } => wire().serialize(&GameEndPayload {
                reason: *reason as u8,
                winner: *winner,
            })?,
            Message::DebugInfo { text } => {
                let len =
                    u16::try_from(text.len()).map_err(|_| CodecError::TooLarge(text.len()))?;
                let mut payload = wire().serialize(&len)?;
                payload.extend_from_slice(text.as_bytes());
                payload
            }
        };
        Frame::new(self.message_type() as u8, payload)
    }

    /// Encodes the message into ready-to-send frame bytes.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(self.to_frame()?.to_bytes())
    }

    /// Interprets a frame's payload according to its type tag.
    ///
    /// Bytes beyond what a fixed-size message needs are ignored.
    pub fn from_frame(frame: &Frame) -> Result<Self, CodecError> {
        let kind = frame.kind()?;
        let payload = frame.payload();

        let message = match kind {
            MessageType::Connect => Message::Connect,
            MessageType::Disconnect => Message::Disconnect,
            MessageType::Input => {
                let input: InputPayload = fixed(kind, payload, INPUT_LEN)?;
                Message::Input {
                    player_id: input.player_id,
                    flags: input.flags,
                }
            }
            MessageType::Welcome => {
                let welcome: WelcomePayload = fixed(kind, payload, WELCOME_LEN)?;
                Message::Welcome {
                    accepted: welcome.accept_code == 1,
                    client_id: welcome.client_id,
                }
            }
            MessageType::MapChunk => {
                let header: MapChunkHeader = fixed(kind, payload, MAP_CHUNK_HEADER_LEN)?;
                Message::MapChunk {
                    index: header.index,
                    count: header.count,
                    column: payload[MAP_CHUNK_HEADER_LEN..].to_vec(),
                }
            }
            MessageType::GameStart => {
                let start: GameStartPayload = fixed(kind, payload, GAME_START_LEN)?;
                Message::GameStart {
                    player_count: start.player_count,
                    start_x: start.start_x,
                    start_y: start.start_y,
                }
            }
            MessageType::GameState => {
                let header: GameStateHeader = fixed(kind, payload, GAME_STATE_HEADER_LEN)?;
                let need =
                    GAME_STATE_HEADER_LEN + usize::from(header.player_count) * PLAYER_STATE_LEN;
                if payload.len() < need {
                    return Err(CodecError::Truncated {
                        kind,
                        need,
                        have: payload.len(),
                    });
                }
                let players = payload[GAME_STATE_HEADER_LEN..need]
                    .chunks_exact(PLAYER_STATE_LEN)
                    .map(|record| wire().deserialize::<PlayerState>(record))
                    .collect::<Result<Vec<_>, _>>()?;
                Message::GameState {
                    tick: header.tick,
                    players,
                }
            }
            MessageType::GameEnd => {
                let end: GameEndPayload = fixed(kind, payload, GAME_END_LEN)?;
                Message::GameEnd {
                    reason: EndReason::try_from(end.reason)?,
                    winner: end.winner,
                }
            }
            MessageType::DebugInfo => {
                let len: u16 = fixed(kind, payload, DEBUG_INFO_HEADER_LEN)?;
                let need = DEBUG_INFO_HEADER_LEN + usize::from(len);
                if payload.len() < need {
                    return Err(CodecError::Truncated {
                        kind,
                        need,
                        have: payload.len(),
                    });
                }
                Message::DebugInfo {
                    text: String::from_utf8_lossy(&payload[DEBUG_INFO_HEADER_LEN..need])
                        .into_owned(),
                }
            }
        };
        Ok(message)
    }
}

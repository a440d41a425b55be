//! # Jetpack wire protocol
//!
//! Types shared by the authoritative server and anything that talks to it.
//! Every message travels as a frame: a 4-byte header (`magic`, `type`,
//! big-endian total length including the header) followed by a typed payload.
//!
//! - [`codec`] owns the frame layer: header validation, size limits and the
//!   async helpers that read and write whole frames on a stream.
//! - [`message`] turns frames into the [`Message`] sum type and back.
//!
//! Positions are fixed-point: both axes run over `[0, WORLD_SCALE)`, where the
//! full range covers the whole map regardless of its cell resolution.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod codec;
pub mod message;

pub use codec::{read_frame, write_frame, CodecError, Frame, FrameError, Header, HEADER_LEN};
pub use message::Message;

pub const MAGIC_BYTE: u8 = 0xAB;
pub const WORLD_SCALE: u16 = 1000;
pub const MAX_COORD: u16 = WORLD_SCALE - 1;
/// Winner id meaning "nobody won".
pub const NO_WINNER: u8 = 0xFF;
/// Size of one player record inside a `GAME_STATE` payload.
pub const PLAYER_STATE_LEN: usize = 9;

pub const INPUT_LEFT: u8 = 0b0000_0001;
pub const INPUT_RIGHT: u8 = 0b0000_0010;
pub const INPUT_JETPACK: u8 = 0b0000_0100;

/// Numeric tag carried in the second header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Connect = 0x01,
    Welcome = 0x02,
    MapChunk = 0x03,
    GameStart = 0x04,
    Input = 0x05,
    GameState = 0x06,
    GameEnd = 0x07,
    Disconnect = 0x08,
    DebugInfo = 0x09,
}

impl MessageType {
    pub fn name(self) -> &'static str {
        match self {
            MessageType::Connect => "CLIENT_CONNECT",
            MessageType::Welcome => "SERVER_WELCOME",
            MessageType::MapChunk => "MAP_CHUNK",
            MessageType::GameStart => "GAME_START",
            MessageType::Input => "CLIENT_INPUT",
            MessageType::GameState => "GAME_STATE",
            MessageType::GameEnd => "GAME_END",
            MessageType::Disconnect => "CLIENT_DISCONNECT",
            MessageType::DebugInfo => "DEBUG_INFO",
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0x01 => MessageType::Connect,
            0x02 => MessageType::Welcome,
            0x03 => MessageType::MapChunk,
            0x04 => MessageType::GameStart,
            0x05 => MessageType::Input,
            0x06 => MessageType::GameState,
            0x07 => MessageType::GameEnd,
            0x08 => MessageType::Disconnect,
            0x09 => MessageType::DebugInfo,
            other => return Err(CodecError::UnknownType(other)),
        })
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a round finished, as sent in `GAME_END`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EndReason {
    MapComplete = 1,
    PlayerDied = 2,
    Disconnect = 3,
}

impl TryFrom<u8> for EndReason {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(EndReason::MapComplete),
            2 => Ok(EndReason::PlayerDied),
            3 => Ok(EndReason::Disconnect),
            _ => Err(CodecError::InvalidField("end reason")),
        }
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            EndReason::MapComplete => "map complete",
            EndReason::PlayerDied => "player died",
            EndReason::Disconnect => "disconnect",
        };
        f.write_str(text)
    }
}

/// Controls held by a player, as last reported by its client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputState {
    pub left: bool,
    pub right: bool,
    pub jetpack: bool,
}

impl InputState {
    pub fn from_mask(mask: u8) -> Self {
        Self {
            left: mask & INPUT_LEFT != 0,
            right: mask & INPUT_RIGHT != 0,
            jetpack: mask & INPUT_JETPACK != 0,
        }
    }

    pub fn to_mask(self) -> u8 {
        let mut mask = 0;
        if self.left {
            mask |= INPUT_LEFT;
        }
        if self.right {
            mask |= INPUT_RIGHT;
        }
        if self.jetpack {
            mask |= INPUT_JETPACK;
        }
        mask
    }
}

/// How the second byte of an `INPUT` payload is interpreted.
///
/// Clients either send a movement bitmask or, in the single-action variant,
/// a plain jetpack on/off byte. The two cannot be told apart on the wire, so
/// the server picks one scheme for its whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputScheme {
    #[default]
    Bitmask,
    JetpackFlag,
}

impl InputScheme {
    /// Returns `None` for a byte the scheme does not define.
    pub fn decode(self, flags: u8) -> Option<InputState> {
        match self {
            InputScheme::Bitmask => Some(InputState::from_mask(flags)),
            InputScheme::JetpackFlag => match flags {
                0 => Some(InputState::default()),
                1 => Some(InputState {
                    jetpack: true,
                    ..InputState::default()
                }),
                _ => None,
            },
        }
    }

    pub fn encode(self, input: InputState) -> u8 {
        match self {
            InputScheme::Bitmask => input.to_mask(),
            InputScheme::JetpackFlag => u8::from(input.jetpack),
        }
    }
}

/// One player record of a `GAME_STATE` payload.
///
/// Field order is the wire order; the codec serializes it with fixed-width
/// big-endian integers, one byte per flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: u8,
    pub x: u16,
    pub y: u16,
    pub score: u16,
    pub alive: bool,
    pub collected_coin: bool,
}

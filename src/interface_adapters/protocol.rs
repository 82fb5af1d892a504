// Wire protocol DTOs and conversions to and from domain packets.
//
// Every frame is a JSON object `{"Command": ..., "Payload": ...}` where the
// payload shape depends on the command.

use crate::domain::{BulkPayload, Command, EntityId, MoveEntry, Packet, Payload, Position};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PacketDto {
    pub command: String,
    #[serde(default)]
    pub payload: PayloadDto,
}

/// Payload variants, tried in order when decoding.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadDto {
    #[default]
    None,
    Token(String),
    Bulk(BulkPayloadDto),
    // Anything else a client sends; rejected later by input handling.
    Other(Value),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkPayloadDto {
    #[serde(rename = "Move")]
    pub moves: Vec<MoveDto>,
    #[serde(rename = "Kill")]
    pub kills: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MoveDto {
    pub id: u64,
    pub positions: Vec<PositionDto>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PositionDto {
    pub x: i32,
    pub y: i32,
}

impl From<PositionDto> for Position {
    fn from(p: PositionDto) -> Self {
        Position::new(p.x, p.y)
    }
}

impl From<&Position> for PositionDto {
    fn from(p: &Position) -> Self {
        Self { x: p.x, y: p.y }
    }
}

impl From<BulkPayloadDto> for BulkPayload {
    fn from(bulk: BulkPayloadDto) -> Self {
        Self {
            moves: bulk
                .moves
                .into_iter()
                .map(|m| MoveEntry {
                    id: EntityId(m.id),
                    positions: m.positions.into_iter().map(Position::from).collect(),
                })
                .collect(),
            kills: bulk.kills,
        }
    }
}

impl From<&BulkPayload> for BulkPayloadDto {
    fn from(bulk: &BulkPayload) -> Self {
        Self {
            moves: bulk
                .moves
                .iter()
                .map(|m| MoveDto {
                    id: m.id.0,
                    positions: m.positions.iter().map(PositionDto::from).collect(),
                })
                .collect(),
            kills: bulk.kills.clone(),
        }
    }
}

impl From<PacketDto> for Packet {
    fn from(dto: PacketDto) -> Self {
        let payload = match dto.payload {
            PayloadDto::None => Payload::Empty,
            PayloadDto::Token(token) => Payload::Token(token),
            PayloadDto::Bulk(bulk) => Payload::Bulk(Arc::new(bulk.into())),
            PayloadDto::Other(value) => Payload::Opaque(value.to_string()),
        };
        Self {
            command: Command::from(dto.command.as_str()),
            payload,
        }
    }
}

impl From<&Packet> for PacketDto {
    fn from(packet: &Packet) -> Self {
        let payload = match &packet.payload {
            Payload::Empty => PayloadDto::None,
            Payload::Token(token) => PayloadDto::Token(token.clone()),
            Payload::Bulk(bulk) => PayloadDto::Bulk(bulk.as_ref().into()),
            Payload::Opaque(raw) => PayloadDto::Other(
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone())),
            ),
        };
        Self {
            command: packet.command.to_string(),
            payload,
        }
    }
}

/// Decodes one text frame into a domain packet.
pub fn decode_packet(text: &str) -> Result<Packet, serde_json::Error> {
    serde_json::from_str::<PacketDto>(text).map(Packet::from)
}

/// Encodes a domain packet as one text frame.
pub fn encode_packet(packet: &Packet) -> Result<String, serde_json::Error> {
    serde_json::to_string(&PacketDto::from(packet))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn when_decoding_a_move_then_the_direction_token_is_kept() {
        let packet = decode_packet(r#"{"Command":"MOVE","Payload":"LEFT"}"#)
            .expect("expected move packet to decode");

        assert_eq!(packet, Packet::movement("LEFT"));
    }

    #[test]
    fn when_decoding_hello_without_payload_then_payload_is_empty() {
        let packet =
            decode_packet(r#"{"Command":"HELLO"}"#).expect("expected hello packet to decode");

        assert_eq!(packet, Packet::hello());
    }

    #[test]
    fn when_decoding_a_non_string_payload_then_it_is_kept_as_opaque() {
        let packet = decode_packet(r#"{"Command":"MOVE","Payload":{"dir":1}}"#)
            .expect("expected packet to decode");

        assert_eq!(packet.command, Command::Move);
        assert_eq!(packet.payload, Payload::Opaque(r#"{"dir":1}"#.to_string()));
    }

    #[test]
    fn when_decoding_an_unknown_command_then_its_name_is_preserved() {
        let packet = decode_packet(r#"{"Command":"JUMP","Payload":null}"#)
            .expect("expected packet to decode");

        assert_eq!(packet.command, Command::Unknown("JUMP".to_string()));
        assert_eq!(packet.payload, Payload::Empty);
    }

    #[test]
    fn when_frame_is_not_a_packet_then_decoding_fails() {
        assert!(decode_packet("not json").is_err());
        assert!(decode_packet(r#"{"Payload":"UP"}"#).is_err());
    }

    #[test]
    fn when_encoding_a_bulk_then_moves_use_numeric_ids_and_kills_use_strings() {
        let packet = Packet::bulk(BulkPayload {
            moves: vec![MoveEntry {
                id: EntityId(2),
                positions: vec![Position::new(25, 24), Position::new(25, 25)],
            }],
            kills: vec!["1".to_string()],
        });

        let text = encode_packet(&packet).expect("expected bulk to encode");
        let value: Value = serde_json::from_str(&text).expect("expected valid json");

        assert_eq!(
            value,
            json!({
                "Command": "BULK",
                "Payload": {
                    "Move": [
                        {"Id": 2, "Positions": [{"X": 25, "Y": 24}, {"X": 25, "Y": 25}]}
                    ],
                    "Kill": ["1"]
                }
            })
        );
    }

    #[test]
    fn when_a_bulk_frame_is_decoded_then_it_matches_the_encoded_packet() {
        let packet = Packet::bulk(BulkPayload {
            moves: vec![MoveEntry {
                id: EntityId(7),
                positions: vec![Position::new(1, 2)],
            }],
            kills: vec![],
        });

        let text = encode_packet(&packet).expect("expected bulk to encode");

        assert_eq!(decode_packet(&text).expect("expected bulk to decode"), packet);
    }
}

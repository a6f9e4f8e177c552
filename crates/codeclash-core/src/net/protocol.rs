use serde::{Deserialize, Serialize};

use super::messages::{GameDto, GameEndMsg, MessageType, NotificationMsg, RoomDto, ServerMessage};

/// Maximum message payload size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 256 * 1024; // 256 KiB

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    UnknownMessageType(u8),
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::UnknownMessageType(b) => write!(f, "unknown message type: 0x{b:02x}"),
            Self::PayloadTooLarge(size) => {
                write!(f, "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})")
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a serializable payload with a 1-byte type prefix.
pub fn encode_message<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let payload_bytes =
        rmp_serde::to_vec(payload).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    let total = 1 + payload_bytes.len();
    if total > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(total));
    }
    let mut buf = Vec::with_capacity(total);
    buf.push(msg_type as u8);
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

/// Encode a `ServerMessage` to wire format.
pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ServerMessage::RoomSnapshot(m) => encode_message(MessageType::RoomSnapshot, m),
        ServerMessage::GameSnapshot(m) => encode_message(MessageType::GameSnapshot, m),
        ServerMessage::Notification(m) => encode_message(MessageType::Notification, m),
        ServerMessage::GameEnd(m) => encode_message(MessageType::GameEnd, m),
    }
}

/// Extract the message type byte from raw wire data.
pub fn decode_message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    MessageType::from_byte(data[0]).ok_or(ProtocolError::UnknownMessageType(data[0]))
}

/// Decode a MessagePack payload (bytes after the type prefix).
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    rmp_serde::from_slice(&data[1..]).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode raw wire data into a `ServerMessage`.
pub fn decode_server_message(data: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    match msg_type {
        MessageType::RoomSnapshot => Ok(ServerMessage::RoomSnapshot(decode_payload::<RoomDto>(
            data,
        )?)),
        MessageType::GameSnapshot => Ok(ServerMessage::GameSnapshot(Box::new(decode_payload::<
            GameDto,
        >(data)?))),
        MessageType::Notification => Ok(ServerMessage::Notification(decode_payload::<
            NotificationMsg,
        >(data)?)),
        MessageType::GameEnd => Ok(ServerMessage::GameEnd(decode_payload::<GameEndMsg>(data)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{EndCause, GameSession};
    use crate::notification::{GameNotification, NotificationType};
    use crate::problem::{Difficulty, Problem, TestCase};
    use crate::room::{Room, RoomSettings, generate_room_code};
    use crate::user::User;
    use uuid::Uuid;

    fn test_room() -> Room {
        let mut room = Room::new(
            generate_room_code(),
            User::new("Alice"),
            RoomSettings::default(),
        );
        room.add_user(User::new("Bob"));
        room
    }

    fn test_session() -> GameSession {
        let problem = Problem {
            problem_id: Uuid::new_v4(),
            name: "Sum".to_string(),
            description: "Add".to_string(),
            difficulty: Difficulty::Easy,
            test_cases: vec![TestCase {
                input: "1 2".to_string(),
                expected_output: "3".to_string(),
                hidden: false,
            }],
        };
        GameSession::from_room(&test_room(), vec![problem]).unwrap()
    }

    #[test]
    fn roundtrip_room_snapshot() {
        let msg = ServerMessage::RoomSnapshot(super::super::messages::RoomDto::from_room(
            &test_room(),
        ));
        let encoded = encode_server_message(&msg).unwrap();
        let decoded = decode_server_message(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn roundtrip_game_snapshot() {
        let msg = ServerMessage::GameSnapshot(Box::new(GameDto::from_session(&test_session())));
        let encoded = encode_server_message(&msg).unwrap();
        let decoded = decode_server_message(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn roundtrip_notification() {
        let msg = ServerMessage::Notification(NotificationMsg {
            notification: GameNotification::from_player(
                "Alice",
                NotificationType::SubmissionCorrect,
                Some("3/3".to_string()),
            ),
        });
        let encoded = encode_server_message(&msg).unwrap();
        let decoded = decode_server_message(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn roundtrip_game_end() {
        let msg = ServerMessage::GameEnd(GameEndMsg {
            cause: EndCause::AllSolved,
            leaderboard: GameDto::from_session(&test_session()).players,
        });
        let encoded = encode_server_message(&msg).unwrap();
        let decoded = decode_server_message(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn type_byte_prefix_matches_variant() {
        let msg = ServerMessage::GameSnapshot(Box::new(GameDto::from_session(&test_session())));
        let encoded = encode_server_message(&msg).unwrap();
        assert_eq!(encoded[0], MessageType::GameSnapshot as u8);
    }

    #[test]
    fn decode_empty_message_fails() {
        assert!(decode_message_type(&[]).is_err());
    }

    #[test]
    fn decode_unknown_type_fails() {
        assert!(decode_message_type(&[0xFF]).is_err());
    }

    #[test]
    fn message_type_from_byte_exhaustive() {
        let known: Vec<(u8, MessageType)> = vec![
            (0x01, MessageType::RoomSnapshot),
            (0x02, MessageType::GameSnapshot),
            (0x03, MessageType::Notification),
            (0x04, MessageType::GameEnd),
        ];
        for (byte, expected) in &known {
            assert_eq!(MessageType::from_byte(*byte), Some(*expected));
        }
        for byte in 0u8..=255 {
            if known.iter().any(|(b, _)| *b == byte) {
                continue;
            }
            assert!(
                MessageType::from_byte(byte).is_none(),
                "Byte 0x{byte:02x} should not map to any MessageType"
            );
        }
    }

    #[test]
    fn protocol_error_display() {
        assert_eq!(format!("{}", ProtocolError::EmptyMessage), "empty message");
        assert_eq!(
            format!("{}", ProtocolError::UnknownMessageType(0xFF)),
            "unknown message type: 0xff"
        );
        assert!(format!("{}", ProtocolError::PayloadTooLarge(999_999)).contains("999999"));
    }
}

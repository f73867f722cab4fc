//! Conversion logic between DTOs and domain types.

use thiserror::Error;

use crate::{
    domain::{Message, PollReply, PollRequest, PollResponse, SessionId, SessionIdError},
    infrastructure::dto::{
        http::StatsDto,
        poll::{PollRequestDto, PollResponseDto, WireMessage},
    },
    usecase::MultiplexerStats,
};

/// A response body that does not match any of the four reply shapes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseDecodeError {
    #[error("invalid session id: {0}")]
    InvalidId(#[from] SessionIdError),

    #[error("response carries more than one of `close`, `m`, `old`")]
    Ambiguous,
}

// ========================================
// DTO → Domain
// ========================================

impl From<WireMessage> for Message {
    fn from(dto: WireMessage) -> Self {
        Message::new(dto.m, dto.d)
    }
}

impl PollRequestDto {
    /// Convert into a domain request, attaching the client identity header.
    pub fn into_request(self, user_agent: Option<String>) -> PollRequest {
        PollRequest {
            id: self.id,
            close: self.close.unwrap_or(false),
            messages: self
                .m
                .map(|messages| messages.into_iter().map(Message::from).collect()),
            user_agent,
        }
    }
}

impl TryFrom<PollResponseDto> for PollResponse {
    type Error = ResponseDecodeError;

    fn try_from(dto: PollResponseDto) -> Result<Self, Self::Error> {
        let id = SessionId::new(dto.id)?;
        let reply = match (dto.close.unwrap_or(false), dto.m, dto.old.unwrap_or(false)) {
            (true, None, false) => PollReply::Closed,
            (false, Some(messages), false) => {
                PollReply::Messages(messages.into_iter().map(Message::from).collect())
            }
            (false, None, true) => PollReply::Superseded,
            (false, None, false) => PollReply::Ack,
            _ => return Err(ResponseDecodeError::Ambiguous),
        };
        Ok(PollResponse { id, reply })
    }
}

// ========================================
// Domain → DTO
// ========================================

impl From<Message> for WireMessage {
    fn from(model: Message) -> Self {
        Self {
            m: model.name,
            d: model.payload,
        }
    }
}

impl From<PollResponse> for PollResponseDto {
    fn from(model: PollResponse) -> Self {
        let mut dto = Self {
            id: model.id.into_string(),
            close: None,
            m: None,
            old: None,
        };
        match model.reply {
            PollReply::Closed => dto.close = Some(true),
            PollReply::Messages(messages) => {
                dto.m = Some(messages.into_iter().map(WireMessage::from).collect())
            }
            PollReply::Superseded => dto.old = Some(true),
            PollReply::Ack => {}
        }
        dto
    }
}

impl From<MultiplexerStats> for StatsDto {
    fn from(model: MultiplexerStats) -> Self {
        Self {
            connections: model.connections,
            open: model.open,
            holding: model.holding,
        }
    }
}

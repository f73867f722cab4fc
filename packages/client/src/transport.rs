//! HTTP transport for the long-polling envelope.

use kayoi_server::{
    domain::{Message, PollReply, PollResponse, SessionId},
    infrastructure::dto::poll::{PollRequestDto, PollResponseDto, WireMessage},
};

use crate::error::ClientError;

/// One session on a long-polling server.
///
/// Cheap to clone; clones share the HTTP connection pool and the session, so
/// one clone can hold a poll open while another posts messages.
#[derive(Debug, Clone)]
pub struct LongPollClient {
    http: reqwest::Client,
    url: String,
    id: SessionId,
}

impl LongPollClient {
    /// Open a new session at `url`.
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("kayoi-client/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let response = exchange(&http, url, PollRequestDto::default()).await?;
        if response.reply == PollReply::Closed {
            return Err(ClientError::SessionClosed(response.id.into_string()));
        }
        tracing::debug!("Opened session '{}'", response.id);

        Ok(Self {
            http,
            url: url.to_string(),
            id: response.id,
        })
    }

    pub fn session_id(&self) -> &SessionId {
        &self.id
    }

    /// Wait for outbound messages.
    ///
    /// Returns an empty list when the server answered without messages or
    /// when a newer poll on the same session superseded this one.
    pub async fn poll(&self) -> Result<Vec<Message>, ClientError> {
        self.request(PollRequestDto {
            id: Some(self.id.as_str().to_string()),
            ..PollRequestDto::default()
        })
        .await
    }

    /// Post a batch of messages.
    ///
    /// The server answers immediately; any backlog it had queued for this
    /// session comes back with the answer.
    pub async fn send(&self, messages: Vec<Message>) -> Result<Vec<Message>, ClientError> {
        self.request(PollRequestDto {
            id: Some(self.id.as_str().to_string()),
            m: Some(messages.into_iter().map(WireMessage::from).collect()),
            ..PollRequestDto::default()
        })
        .await
    }

    /// Ask the server to close the session.
    pub async fn close(&self) -> Result<(), ClientError> {
        let response = exchange(
            &self.http,
            &self.url,
            PollRequestDto {
                id: Some(self.id.as_str().to_string()),
                close: Some(true),
                ..PollRequestDto::default()
            },
        )
        .await?;
        if response.reply != PollReply::Closed {
            tracing::warn!(
                "Session '{}' did not confirm close: {:?}",
                self.id,
                response.reply
            );
        }
        Ok(())
    }

    async fn request(&self, request: PollRequestDto) -> Result<Vec<Message>, ClientError> {
        let response = exchange(&self.http, &self.url, request).await?;
        match response.reply {
            PollReply::Messages(messages) => Ok(messages),
            PollReply::Ack => Ok(Vec::new()),
            PollReply::Superseded => {
                tracing::debug!("Poll on session '{}' was superseded", self.id);
                Ok(Vec::new())
            }
            PollReply::Closed => Err(ClientError::SessionClosed(self.id.as_str().to_string())),
        }
    }
}

async fn exchange(
    http: &reqwest::Client,
    url: &str,
    request: PollRequestDto,
) -> Result<PollResponse, ClientError> {
    let response = http.post(url).json(&request).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ClientError::Status(status.as_u16()));
    }
    let dto: PollResponseDto = response.json().await?;
    Ok(PollResponse::try_from(dto)?)
}

//! Message-level front end for an RPC layer.

use futures::stream::{BoxStream, StreamExt};
use relay_protocol::{RelayMessage, SyncRequest, SyncResponse};
use relay_store::RecordStore;

use crate::error::{RelayError, RelayResult};
use crate::relay::SessionRelay;

/// Dispatches relay messages to a [`SessionRelay`].
///
/// Transports call [`handle_message`](Self::handle_message) or
/// [`handle_framed`](Self::handle_framed) for unary calls and
/// [`handle_sync`](Self::handle_sync) for the streaming one.
pub struct SessionServer<S: RecordStore> {
    relay: SessionRelay<S>,
}

impl<S: RecordStore> SessionServer<S> {
    /// Creates a server around `relay`.
    pub fn new(relay: SessionRelay<S>) -> Self {
        Self { relay }
    }

    /// The wrapped relay.
    pub fn relay(&self) -> &SessionRelay<S> {
        &self.relay
    }

    /// Handles a unary request, answering [`RelayMessage::Empty`] on success.
    pub async fn handle_message(&self, message: RelayMessage) -> RelayResult<RelayMessage> {
        match message {
            RelayMessage::AddRequest(req) => {
                self.relay.add(&req.session).await?;
                Ok(RelayMessage::Empty)
            }
            RelayMessage::DeleteRequest(req) => {
                self.relay.delete(&req.id).await?;
                Ok(RelayMessage::Empty)
            }
            RelayMessage::SyncRequest(_) => Err(RelayError::UnexpectedMessage(
                "sync is a streaming call".into(),
            )),
            other => Err(RelayError::UnexpectedMessage(format!(
                "message type {} is not a request",
                other.type_code()
            ))),
        }
    }

    /// Opens a sync stream of wire responses.
    pub async fn handle_sync(
        &self,
        request: SyncRequest,
    ) -> RelayResult<BoxStream<'static, RelayResult<SyncResponse>>> {
        let stream = self.relay.sync(request.cursor()).await?;
        Ok(stream
            .map(|item| item.map(SyncResponse::from))
            .boxed())
    }

    /// Decodes a framed unary request, handles it and encodes the answer.
    pub async fn handle_framed(&self, frame: &[u8]) -> RelayResult<Vec<u8>> {
        let request = RelayMessage::decode_framed(frame)?;
        let response = self.handle_message(request).await?;
        Ok(response.encode_framed()?)
    }
}

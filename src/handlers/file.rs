use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::ledger::{FilePatch, FileRepository, LedgerError};
use crate::messaging::messages::FileVisibilityStateResultMessage;
use crate::messaging::{MessageMetadata, RoutingKey};
use crate::models::File;

use super::traits::{decode, HandlerError, MessageHandler};

/// Applies outcomes of visibility changes requested by [`FileService`](crate::files::FileService)
#[derive(Clone)]
pub struct FileMessageHandler {
    files: Arc<dyn FileRepository>,
}

impl FileMessageHandler {
    pub fn new(files: Arc<dyn FileRepository>) -> Self {
        Self { files }
    }

    pub async fn handle_file_visibility_state_result_message(
        &self,
        message: FileVisibilityStateResultMessage,
    ) -> Result<Option<File>, HandlerError> {
        let patch = match (message.error, message.visibility_state) {
            (Some(error), _) => {
                warn!(file_id = %message.file_id, %error, "Visibility change failed");
                FilePatch {
                    state_changing: Some(false),
                    error_message: Some(Some(error)),
                    ..FilePatch::default()
                }
            }
            (None, Some(state)) => FilePatch {
                published: Some(state.published),
                exposed_to_platforms: state.exposed_to_platforms,
                storage: message.storage,
                state_changing: Some(false),
                error_message: Some(None),
                ..FilePatch::default()
            },
            (None, None) => {
                warn!(file_id = %message.file_id, "Visibility result without state dropped");
                return Ok(None);
            }
        };

        match self.files.update(&message.file_id, patch).await {
            Ok(file) => {
                info!(
                    file_id = %file.id,
                    published = file.visibility_state.published,
                    "File visibility state applied"
                );
                Ok(Some(file))
            }
            Err(LedgerError::NotFound { .. }) => {
                warn!(file_id = %message.file_id, "Visibility result for unknown file dropped");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl MessageHandler for FileMessageHandler {
    async fn handle(
        &self,
        routing_key: RoutingKey,
        payload: Value,
        metadata: &MessageMetadata,
    ) -> Result<(), HandlerError> {
        debug!(message_id = %metadata.message_id, %routing_key, "Handling file message");
        match routing_key {
            RoutingKey::FileResultVisibilityState => {
                self.handle_file_visibility_state_result_message(decode(routing_key, payload)?)
                    .await?;
                Ok(())
            }
            other => Err(HandlerError::UnsupportedRoutingKey(other)),
        }
    }
}

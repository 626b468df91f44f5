//! Outbound file requests: visibility changes and deletions
//!
//! The storage side answers visibility requests on `file.result.visibility.state`,
//! handled by [`FileMessageHandler`](crate::handlers::FileMessageHandler).

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::ledger::{FilePatch, FileRepository, LedgerError};
use crate::messaging::messages::{FileDeletionMessage, FileLocation, FileVisibilityStateMessage};
use crate::messaging::{MessageProducer, MessagingError, RoutingKey};
use crate::models::{File, FileId, Platform};

#[derive(Debug, Error)]
pub enum FileError {
    #[error("file not found: {0}")]
    NotFound(FileId),

    #[error("visibility change already in progress for file {0}")]
    StateChanging(FileId),

    #[error("fileIds must not be empty")]
    EmptyRequest,

    #[error("storage error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("messaging error: {0}")]
    Messaging(#[from] MessagingError),
}

pub type Result<T> = std::result::Result<T, FileError>;

#[derive(Clone)]
pub struct FileService {
    files: Arc<dyn FileRepository>,
    producer: MessageProducer,
}

impl FileService {
    pub fn new(files: Arc<dyn FileRepository>, producer: MessageProducer) -> Self {
        Self { files, producer }
    }

    pub async fn find_file_by_id(&self, id: &FileId) -> Result<File> {
        self.files
            .find_by_id(id)
            .await?
            .ok_or_else(|| FileError::NotFound(id.clone()))
    }

    /// Mark the file as changing and ask the storage side to apply the new state
    ///
    /// `platforms` defaults to the platforms the file is already exposed to.
    pub async fn request_visibility_change(
        &self,
        id: &FileId,
        published: bool,
        platforms: Option<Vec<Platform>>,
    ) -> Result<File> {
        let file = self.find_file_by_id(id).await?;
        if file.visibility_state.state_changing {
            return Err(FileError::StateChanging(id.clone()));
        }

        let file = self
            .files
            .update(
                id,
                FilePatch {
                    state_changing: Some(true),
                    error_message: Some(None),
                    ..FilePatch::default()
                },
            )
            .await?;

        let message = FileVisibilityStateMessage {
            file_id: file.id.clone(),
            published,
            exposed_to_platforms: platforms
                .unwrap_or_else(|| file.visibility_state.exposed_to_platforms.clone()),
            storage: file.storage.clone(),
        };
        if let Err(err) = self
            .producer
            .send(RoutingKey::FileStatusVisibilityState, &message)
            .await
        {
            // nobody will ever answer, release the flag
            self.files
                .update(
                    id,
                    FilePatch {
                        state_changing: Some(false),
                        ..FilePatch::default()
                    },
                )
                .await?;
            return Err(err.into());
        }

        info!(file_id = %file.id, published, "Visibility change requested");
        Ok(file)
    }

    /// Announce deletion of the existing files and drop their documents
    pub async fn delete_files(&self, ids: &[FileId]) -> Result<usize> {
        if ids.is_empty() {
            return Err(FileError::EmptyRequest);
        }

        let files = self.files.find_many(ids).await?;
        if files.len() < ids.len() {
            warn!(
                requested = ids.len(),
                found = files.len(),
                "Deleting only the files that exist"
            );
        }
        if files.is_empty() {
            return Ok(0);
        }

        let message = FileDeletionMessage {
            files: files
                .iter()
                .map(|file| FileLocation {
                    file_id: file.id.clone(),
                    bucket: file.storage.bucket.clone(),
                    path: file.storage.path.clone(),
                })
                .collect(),
        };
        self.producer
            .send(RoutingKey::FileStatusDeletion, &message)
            .await?;

        let mut deleted = 0;
        for file in &files {
            if self.files.delete(&file.id).await? {
                deleted += 1;
            }
        }

        info!(deleted, "Files deleted");
        Ok(deleted)
    }
}

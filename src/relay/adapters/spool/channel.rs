//! Outbound side of the spool.

use super::{BODY_EXTENSION, body_file, properties_file, run_blocking};
use crate::relay::{
    domain::OutboundMessage,
    ports::{OutboundChannel, PublishError, PublishResult},
};
use async_trait::async_trait;
use cap_std::fs_utf8::Dir;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Writes each sent message as a new file in a channel directory.
#[derive(Debug, Clone)]
pub struct SpoolChannel {
    name: String,
    dir: Arc<Dir>,
}

impl SpoolChannel {
    pub(super) fn new(name: &str, dir: Arc<Dir>) -> Self {
        Self {
            name: name.to_owned(),
            dir,
        }
    }
}

#[async_trait]
impl OutboundChannel for SpoolChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: OutboundMessage) -> PublishResult<()> {
        let dir = Arc::clone(&self.dir);
        let id = Uuid::now_v7().to_string();
        let file_id = id.clone();
        run_blocking(
            move || write_message(&dir, &file_id, &message),
            PublishError::transport,
        )
        .await?;
        debug!(channel = %self.name, message_id = %id, "message spooled");
        Ok(())
    }
}

fn write_message(dir: &Dir, id: &str, message: &OutboundMessage) -> PublishResult<()> {
    if !message.properties().is_empty() {
        let properties = serde_json::to_string(message.properties())
            .map_err(PublishError::transport)?;
        dir.write(properties_file(id), properties)
            .map_err(PublishError::transport)?;
    }
    let staging = format!(".{id}{BODY_EXTENSION}.tmp");
    dir.write(&staging, message.body())
        .map_err(PublishError::transport)?;
    dir.rename(&staging, dir, body_file(id))
        .map_err(PublishError::transport)
}

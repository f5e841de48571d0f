//! Inbound side of the spool.

use super::{body_file, list_message_ids, properties_file, run_blocking};
use crate::relay::{
    domain::{InboundMessage, MessageMetadata},
    ports::{InboundSource, SourceError, SourceResult},
};
use async_trait::async_trait;
use cap_std::fs_utf8::Dir;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::error;

const REJECTED_SUFFIX: &str = ".rejected";

/// Reads `*.xml` files from a channel directory in file-name order.
///
/// A file stays in place until its message is completed. Messages handed
/// out by this process are not handed out again until they are settled.
/// A body that is not UTF-8 text is renamed to `.<id>.xml.rejected` and
/// skipped; the rest of the channel is still delivered.
#[derive(Debug, Clone)]
pub struct SpoolSource {
    name: String,
    dir: Arc<Dir>,
    state: Arc<Mutex<SourceState>>,
}

#[derive(Debug, Default)]
struct SourceState {
    outstanding: HashSet<String>,
    deliveries: HashMap<String, u32>,
}

impl SpoolSource {
    pub(super) fn new(name: &str, dir: Arc<Dir>) -> Self {
        Self {
            name: name.to_owned(),
            dir,
            state: Arc::default(),
        }
    }

    fn lock(&self) -> SourceResult<MutexGuard<'_, SourceState>> {
        self.state
            .lock()
            .map_err(|err| SourceError::transport(io::Error::other(err.to_string())))
    }

    fn settle(&self, message: &InboundMessage) -> SourceResult<()> {
        let mut state = self.lock()?;
        if state.outstanding.remove(message.message_id()) {
            Ok(())
        } else {
            Err(SourceError::UnknownMessage(message.message_id().to_owned()))
        }
    }
}

#[async_trait]
impl InboundSource for SpoolSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn receive_batch(&self, max: usize) -> SourceResult<Vec<InboundMessage>> {
        let skip = self.lock()?.outstanding.clone();
        let dir = Arc::clone(&self.dir);
        let files = run_blocking(
            move || read_pending(&dir, &skip, max).map_err(SourceError::transport),
            SourceError::transport,
        )
        .await?;

        let mut state = self.lock()?;
        let mut batch = Vec::with_capacity(files.len());
        for file in files {
            if !state.outstanding.insert(file.id.clone()) {
                continue;
            }
            let delivery_count = state.deliveries.get(&file.id).copied().unwrap_or(1);
            let mut metadata = MessageMetadata::new(file.id).with_delivery_count(delivery_count);
            if let Some(enqueued_at) = file.modified {
                metadata = metadata.with_enqueued_at(enqueued_at);
            }
            batch.push(InboundMessage::new(file.body, metadata));
        }
        Ok(batch)
    }

    async fn complete(&self, message: &InboundMessage) -> SourceResult<()> {
        self.settle(message)?;
        self.lock()?.deliveries.remove(message.message_id());
        let dir = Arc::clone(&self.dir);
        let id = message.message_id().to_owned();
        run_blocking(
            move || remove_message(&dir, &id).map_err(SourceError::transport),
            SourceError::transport,
        )
        .await
    }

    async fn abandon(&self, message: &InboundMessage) -> SourceResult<()> {
        self.settle(message)?;
        let mut state = self.lock()?;
        let count = state
            .deliveries
            .entry(message.message_id().to_owned())
            .or_insert(1);
        *count = count.saturating_add(1);
        Ok(())
    }
}

struct SpooledFile {
    id: String,
    body: String,
    modified: Option<DateTime<Utc>>,
}

fn read_pending(dir: &Dir, skip: &HashSet<String>, max: usize) -> io::Result<Vec<SpooledFile>> {
    let mut files = Vec::new();
    for id in list_message_ids(dir)? {
        if files.len() >= max {
            break;
        }
        if skip.contains(&id) {
            continue;
        }
        let name = body_file(&id);
        let body = match dir.read_to_string(&name) {
            Ok(body) => body,
            // Completed by another reader between listing and reading.
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                set_aside(dir, &id, &err)?;
                continue;
            }
            Err(err) => return Err(err),
        };
        let modified = dir
            .metadata(&name)
            .and_then(|metadata| metadata.modified())
            .ok()
            .map(|time| DateTime::<Utc>::from(time.into_std()));
        files.push(SpooledFile { id, body, modified });
    }
    Ok(files)
}

/// Renames an unreadable body to a hidden `.rejected` file so it no longer
/// blocks the channel.
fn set_aside(dir: &Dir, id: &str, cause: &io::Error) -> io::Result<()> {
    let rejected = format!(".{}{REJECTED_SUFFIX}", body_file(id));
    dir.rename(body_file(id), dir, &rejected)?;
    error!(
        message_id = id,
        file = %rejected,
        error = %cause,
        "spooled message is not UTF-8 text; set aside"
    );
    Ok(())
}

fn remove_message(dir: &Dir, id: &str) -> io::Result<()> {
    match dir.remove_file(properties_file(id)) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    dir.remove_file(body_file(id))
}

//! File-backed spool transport.
//!
//! A spool is a directory with one sub-directory per channel. Each message
//! is a `<id>.xml` body file, plus a `<id>.properties.json` file when it
//! carries properties. Ids are UUIDv7, so file-name order is enqueue order.
//! The properties file is written before the body is renamed into place, so
//! a reader never sees a body without its properties.
//!
//! Filesystem calls are blocking and run on [`tokio::task::spawn_blocking`].

mod channel;
mod source;

pub use channel::SpoolChannel;
pub use source::SpoolSource;

use crate::relay::domain::OutboundMessage;
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;
use thiserror::Error;

const BODY_EXTENSION: &str = ".xml";
const PROPERTIES_EXTENSION: &str = ".properties.json";

/// Errors raised while opening or reading a spool directly.
#[derive(Debug, Clone, Error)]
pub enum SpoolError {
    /// A filesystem operation failed.
    #[error("spool I/O error at {path}: {source}")]
    Io {
        /// Path the operation was attempted on.
        path: Utf8PathBuf,
        /// Underlying error.
        source: Arc<io::Error>,
    },

    /// A channel name cannot be used as a directory name.
    #[error("invalid spool channel name: '{0}'")]
    InvalidChannelName(String),

    /// A properties file is not a JSON object of strings.
    #[error("invalid properties file {path}: {reason}")]
    InvalidProperties {
        /// Path of the properties file.
        path: Utf8PathBuf,
        /// Parser message.
        reason: String,
    },
}

impl SpoolError {
    fn io(path: impl Into<Utf8PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }
}

/// Handle on a spool directory.
#[derive(Debug, Clone)]
pub struct SpoolRoot {
    path: Utf8PathBuf,
    dir: Arc<Dir>,
}

impl SpoolRoot {
    /// Opens the spool at `path`, creating the directory when missing.
    ///
    /// # Errors
    ///
    /// Returns [`SpoolError::Io`] when the directory cannot be created or
    /// opened.
    pub fn open(path: &Utf8Path) -> Result<Self, SpoolError> {
        Dir::create_ambient_dir_all(path, ambient_authority())
            .map_err(|err| SpoolError::io(path, err))?;
        let dir = Dir::open_ambient_dir(path, ambient_authority())
            .map_err(|err| SpoolError::io(path, err))?;
        Ok(Self {
            path: path.to_owned(),
            dir: Arc::new(dir),
        })
    }

    /// Returns the spool directory path.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns an outbound handle on channel `name`, creating its directory.
    ///
    /// # Errors
    ///
    /// Returns [`SpoolError::InvalidChannelName`] for names that are not a
    /// single path component, or [`SpoolError::Io`] when the directory
    /// cannot be created.
    pub fn channel(&self, name: &str) -> Result<SpoolChannel, SpoolError> {
        let dir = self.channel_dir(name)?;
        Ok(SpoolChannel::new(name, dir))
    }

    /// Returns an inbound handle on channel `name`, creating its directory.
    ///
    /// # Errors
    ///
    /// As for [`SpoolRoot::channel`].
    pub fn source(&self, name: &str) -> Result<SpoolSource, SpoolError> {
        let dir = self.channel_dir(name)?;
        Ok(SpoolSource::new(name, dir))
    }

    /// Reads every message currently in channel `name`, in enqueue order.
    ///
    /// # Errors
    ///
    /// Returns [`SpoolError`] when the channel cannot be listed or a file
    /// cannot be read.
    pub fn read_channel(&self, name: &str) -> Result<Vec<(String, OutboundMessage)>, SpoolError> {
        let dir = self.channel_dir(name)?;
        let channel_path = self.path.join(name);
        let ids = list_message_ids(&dir).map_err(|err| SpoolError::io(&channel_path, err))?;
        ids.into_iter()
            .map(|id| {
                let body = dir
                    .read_to_string(body_file(&id))
                    .map_err(|err| SpoolError::io(channel_path.join(body_file(&id)), err))?;
                let properties = read_properties(&dir, &channel_path, &id)?;
                let message = properties
                    .into_iter()
                    .fold(OutboundMessage::new(body), |message, (key, value)| {
                        message.with_property(key, value)
                    });
                Ok((id, message))
            })
            .collect()
    }

    fn channel_dir(&self, name: &str) -> Result<Arc<Dir>, SpoolError> {
        if !is_channel_name(name) {
            return Err(SpoolError::InvalidChannelName(name.to_owned()));
        }
        let channel_path = self.path.join(name);
        self.dir
            .create_dir_all(name)
            .map_err(|err| SpoolError::io(&channel_path, err))?;
        let dir = self
            .dir
            .open_dir(name)
            .map_err(|err| SpoolError::io(&channel_path, err))?;
        Ok(Arc::new(dir))
    }
}

fn is_channel_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.starts_with('.')
}

fn body_file(id: &str) -> String {
    format!("{id}{BODY_EXTENSION}")
}

fn properties_file(id: &str) -> String {
    format!("{id}{PROPERTIES_EXTENSION}")
}

/// Lists the ids of complete messages, sorted. Hidden files are in-progress
/// writes and are skipped.
fn list_message_ids(dir: &Dir) -> io::Result<Vec<String>> {
    let mut ids = Vec::new();
    for entry in dir.entries()? {
        let file_name = entry?.file_name()?;
        if file_name.starts_with('.') {
            continue;
        }
        if let Some(id) = file_name.strip_suffix(BODY_EXTENSION) {
            ids.push(id.to_owned());
        }
    }
    ids.sort();
    Ok(ids)
}

fn read_properties(
    dir: &Dir,
    channel_path: &Utf8Path,
    id: &str,
) -> Result<BTreeMap<String, String>, SpoolError> {
    let file = properties_file(id);
    let path = channel_path.join(&file);
    match dir.read_to_string(&file) {
        Ok(text) => serde_json::from_str(&text).map_err(|err| SpoolError::InvalidProperties {
            path,
            reason: err.to_string(),
        }),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(err) => Err(SpoolError::io(path, err)),
    }
}

/// Runs blocking filesystem work off the async executor.
async fn run_blocking<F, T, E, M>(f: F, map_err: M) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
    M: FnOnce(tokio::task::JoinError) -> E,
{
    tokio::task::spawn_blocking(f).await.map_err(map_err)?
}

#[cfg(test)]
mod tests;

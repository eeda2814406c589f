//! JSON file persistence for the incident book.
//!
//! The file holds an [`IncidentList`]. It is rewritten whole after every
//! change the book reports, through a temporary file and a rename.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use shardwatch_core::IncidentBook;
use shardwatch_types::{IncidentList, Timestamp};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed incident file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("stored incident rejected: {0}")]
    Invalid(#[from] shardwatch_core::Error),
}

/// Incident file on disk.
///
/// # Example
///
/// ```no_run
/// use shardwatch::IncidentStore;
///
/// # tokio_test::block_on(async {
/// let store = IncidentStore::new("incidents.json");
/// let book = store.load()?;
/// println!("{} incidents", book.len());
/// store.save(&book).await?;
/// # Ok::<(), shardwatch::StoreError>(())
/// # }).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct IncidentStore {
    path: PathBuf,
}

impl IncidentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Read the stored list. A missing file is an empty list.
    pub fn read(&self) -> Result<IncidentList, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(IncidentList::default());
            }
            Err(e) => return Err(self.io_error(e)),
        };
        serde_json::from_str(&content).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })
    }

    /// Build a book from the stored incidents.
    pub fn load(&self) -> Result<IncidentBook, StoreError> {
        let list = self.read()?;
        let count = list.len();
        let book = IncidentBook::from_incidents(list.incidents.into_values())?;
        info!(path = %self.path.display(), count, "Loaded incidents");
        Ok(book)
    }

    /// Write every incident in the book.
    pub async fn save(&self, book: &IncidentBook) -> Result<(), StoreError> {
        let list = IncidentList::new(Timestamp::now(), book.all());
        let json = serde_json::to_vec_pretty(&list).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        debug!(path = %self.path.display(), count = list.len(), "Saved incidents");
        Ok(())
    }

    /// Spawn a task that saves the book after every change.
    ///
    /// Missed events only mean a save is due, so lag is treated like any
    /// other change. The task ends when the book is dropped.
    pub fn spawn_writer(self, book: Arc<IncidentBook>) -> JoinHandle<()> {
        let mut events = book.subscribe();
        let weak = Arc::downgrade(&book);
        drop(book);

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => debug!(incident = %event.incident_id(), "Incident changed"),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Incident writer fell behind")
                    }
                    Err(RecvError::Closed) => break,
                }

                let Some(book) = weak.upgrade() else { break };
                if let Err(e) = self.save(&book).await {
                    error!(error = %e, "Failed to save incidents");
                }
            }
        })
    }
}

//! Blob transfer between object stores.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::store::{ObjectStore, Result};

/// Copies blobs from a source store to a destination store, skipping
/// anything the destination already holds.
///
/// The known set starts as the destination's blob shas and grows with
/// every upload, so a blob shared by several paths is copied once.
/// Methods take `&self` so a transfer can be shared by the batch worker.
pub struct BlobTransfer<'a, S: ?Sized, D: ?Sized> {
    source: &'a S,
    destination: &'a D,
    known: Mutex<HashSet<String>>,
    transfers: AtomicUsize,
}

impl<'a, S, D> BlobTransfer<'a, S, D>
where
    S: ObjectStore + ?Sized,
    D: ObjectStore + ?Sized,
{
    pub fn new<I>(source: &'a S, destination: &'a D, known_shas: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            source,
            destination,
            known: Mutex::new(known_shas.into_iter().collect()),
            transfers: AtomicUsize::new(0),
        }
    }

    /// Whether the destination is known to hold `sha`.
    #[must_use]
    pub fn is_known(&self, sha: &str) -> bool {
        self.known
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(sha)
    }

    /// Number of blobs uploaded so far.
    #[must_use]
    pub fn transfers(&self) -> usize {
        self.transfers.load(Ordering::Relaxed)
    }

    /// Make sure the destination holds the blob `source_sha` and return its
    /// sha there.
    ///
    /// Known blobs cost no calls. Otherwise the content is read from the
    /// source and written to the destination with the same encoding.
    pub async fn ensure_blob(&self, source_sha: &str, source_path: &str) -> Result<String> {
        if self.is_known(source_sha) {
            return Ok(source_sha.to_string());
        }

        let blob = self.source.get_blob(source_sha).await?;
        let new_sha = self
            .destination
            .create_blob(&blob.content, blob.encoding)
            .await?;

        if new_sha != source_sha {
            tracing::warn!(
                path = source_path,
                source_sha,
                destination_sha = %new_sha,
                "Copied blob got a different sha in the destination"
            );
        }

        tracing::debug!(
            path = source_path,
            sha = %new_sha,
            destination = self.destination.repository(),
            "Copied blob"
        );

        {
            let mut known = self.known.lock().unwrap_or_else(PoisonError::into_inner);
            known.insert(new_sha.clone());
            known.insert(source_sha.to_string());
        }
        self.transfers.fetch_add(1, Ordering::Relaxed);
        Ok(new_sha)
    }
}

//! Progress reporting types for sync operations.
//!
//! Engines emit [`SyncProgress`] events through an optional callback so the
//! caller decides how to render them (log lines, PR comments, nothing).

/// Progress events emitted during sync and rebase operations.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// Reading the recursive tree of a branch.
    ReadingSnapshot {
        repository: String,
        branch: String,
    },

    /// Diff between source and destination is computed.
    PlanReady {
        source: String,
        destination: String,
        added: usize,
        updated: usize,
        deleted: usize,
        /// Blobs that must be copied to the destination store.
        pending_blobs: usize,
    },

    /// Starting to copy blobs to the destination store.
    UploadingBlobs {
        /// Number of blobs to copy.
        count: usize,
    },

    /// Copied one blob.
    BlobUploaded {
        path: String,
        sha: String,
    },

    /// Destination moved to a new commit.
    Committed {
        destination: String,
        sha: String,
    },

    /// Destination already matched the source.
    NoChanges {
        source: String,
        destination: String,
    },

    /// Publishing hit a conflict; asking the store to merge instead.
    FallbackMerge {
        destination: String,
        error: String,
    },

    /// Both publishing and the merge fallback failed.
    Degraded {
        destination: String,
        error: String,
        fallback_error: String,
    },

    /// Branch was moved onto a new base.
    Rebased {
        branch: String,
        onto: String,
        sha: String,
        /// Commits recreated on the new base; zero for a fast-forward.
        commits: usize,
    },

    /// Branch was left alone.
    RebaseSkipped {
        branch: String,
        reason: String,
    },

    /// Warning message (non-fatal).
    Warning {
        /// Warning message.
        message: String,
    },
}

/// Callback for progress updates during sync operations.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
///
/// This is a convenience function to avoid repetitive `if let Some(cb) = ...` patterns.
///
/// # Example
///
/// ```ignore
/// use themesync::sync::{emit, SyncProgress, ProgressCallback};
///
/// fn report(on_progress: Option<&ProgressCallback>) {
///     emit(on_progress, SyncProgress::UploadingBlobs { count: 3 });
/// }
/// ```
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_emit_with_callback() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        let callback: ProgressCallback = Box::new(move |_event| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        emit(Some(&callback), SyncProgress::UploadingBlobs { count: 2 });
        emit(
            Some(&callback),
            SyncProgress::Committed {
                destination: "sgc-production".to_string(),
                sha: "abc123".to_string(),
            },
        );

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_emit_without_callback() {
        // Should not panic when callback is None
        emit(None, SyncProgress::UploadingBlobs { count: 10 });
    }

    #[test]
    fn test_emit_preserves_order() {
        let events = Arc::new(std::sync::Mutex::new(Vec::new()));
        let events_clone = Arc::clone(&events);

        let callback: ProgressCallback = Box::new(move |event| {
            events_clone.lock().unwrap().push(format!("{:?}", event));
        });

        emit(
            Some(&callback),
            SyncProgress::ReadingSnapshot {
                repository: "acme/theme".to_string(),
                branch: "production".to_string(),
            },
        );
        emit(
            Some(&callback),
            SyncProgress::NoChanges {
                source: "production".to_string(),
                destination: "sgc-production".to_string(),
            },
        );

        let recorded = events.lock().unwrap();
        assert_eq!(recorded.len(), 2);
        assert!(recorded[0].contains("ReadingSnapshot"));
        assert!(recorded[1].contains("NoChanges"));
    }
}

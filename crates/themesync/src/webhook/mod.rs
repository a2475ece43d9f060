//! GitHub webhook deliveries.
//!
//! # Module Structure
//!
//! - [`signature`] - `X-Hub-Signature-256` verification
//! - [`event`] - Tagged event model parsed from deliveries
//! - [`router`] - Event routing table: `route_event()`
//!
//! # Example
//!
//! ```ignore
//! use themesync::webhook::{RoutingConfig, WebhookEvent, route_event, verify_signature};
//!
//! verify_signature(secret, &body, signature_header)?;
//! let event = WebhookEvent::parse(event_header, &body)?;
//! for action in route_event(&event, &RoutingConfig::default()) {
//!     // run the action
//! }
//! ```

mod error;
pub mod event;
pub mod router;
mod signature;

// Re-export error types
pub use error::WebhookError;

// Re-export event model
pub use event::{PullRequest, PushEvent, RepositoryRef, WebhookEvent};

// Re-export routing
pub use router::{
    Action, DEFAULT_PREVIEW_LABEL, RoutingConfig, SyncAction, is_sync_commit, route_event,
};

pub use signature::{sign, verify_signature};

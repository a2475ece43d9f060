//! Webhook event model.
//!
//! Deliveries are parsed once, at the boundary, into a small tagged model.
//! Only the fields routing and the handlers need are read.

use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::error::WebhookError;

/// Repository an event belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    pub owner: String,
    pub name: String,
}

impl RepositoryRef {
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEvent {
    pub repository: RepositoryRef,
    pub installation_id: Option<u64>,
    /// Full ref, e.g. `refs/heads/production`.
    pub git_ref: String,
    pub after: String,
    pub deleted: bool,
    pub head_commit_message: Option<String>,
}

impl PushEvent {
    /// Branch name, or `None` for tag pushes.
    #[must_use]
    pub fn branch(&self) -> Option<&str> {
        self.git_ref.strip_prefix("refs/heads/")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub repository: RepositoryRef,
    pub installation_id: Option<u64>,
    pub number: u64,
    pub head_ref: String,
    pub head_sha: String,
    pub labels: Vec<String>,
    pub merged: bool,
}

impl PullRequest {
    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// A validated webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    Push(PushEvent),
    PullRequestLabeled { pull_request: PullRequest, label: String },
    PullRequestClosed(PullRequest),
    Ping,
    /// Any other event or pull request action.
    Ignored { event: String },
}

impl WebhookEvent {
    /// Parse a delivery from its `X-GitHub-Event` header and JSON body.
    pub fn parse(event: &str, body: &[u8]) -> Result<Self, WebhookError> {
        match event {
            "ping" => Ok(WebhookEvent::Ping),
            "push" => {
                let payload: wire::Push = decode(event, body)?;
                Ok(WebhookEvent::Push(payload.into()))
            }
            "pull_request" => {
                let payload: wire::PullRequestPayload = decode(event, body)?;
                let action = payload.action.clone();
                let label = payload.label.as_ref().map(|l| l.name.clone());
                let pull_request = PullRequest::from(payload);
                match (action.as_str(), label) {
                    ("labeled", Some(label)) => Ok(WebhookEvent::PullRequestLabeled {
                        pull_request,
                        label,
                    }),
                    ("labeled", None) => Err(WebhookError::InvalidPayload {
                        event: event.to_string(),
                        message: "labeled action without label".to_string(),
                    }),
                    ("closed", _) => Ok(WebhookEvent::PullRequestClosed(pull_request)),
                    (other, _) => Ok(WebhookEvent::Ignored {
                        event: format!("pull_request.{other}"),
                    }),
                }
            }
            other => Ok(WebhookEvent::Ignored {
                event: other.to_string(),
            }),
        }
    }

    /// Short name for logs.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            WebhookEvent::Push(_) => "push",
            WebhookEvent::PullRequestLabeled { .. } => "pull_request.labeled",
            WebhookEvent::PullRequestClosed(_) => "pull_request.closed",
            WebhookEvent::Ping => "ping",
            WebhookEvent::Ignored { event } => event,
        }
    }

    #[must_use]
    pub fn repository(&self) -> Option<&RepositoryRef> {
        match self {
            WebhookEvent::Push(push) => Some(&push.repository),
            WebhookEvent::PullRequestLabeled { pull_request, .. }
            | WebhookEvent::PullRequestClosed(pull_request) => Some(&pull_request.repository),
            WebhookEvent::Ping | WebhookEvent::Ignored { .. } => None,
        }
    }

    #[must_use]
    pub fn installation_id(&self) -> Option<u64> {
        match self {
            WebhookEvent::Push(push) => push.installation_id,
            WebhookEvent::PullRequestLabeled { pull_request, .. }
            | WebhookEvent::PullRequestClosed(pull_request) => pull_request.installation_id,
            WebhookEvent::Ping | WebhookEvent::Ignored { .. } => None,
        }
    }
}

fn decode<T: DeserializeOwned>(event: &str, body: &[u8]) -> Result<T, WebhookError> {
    serde_json::from_slice(body).map_err(|e| WebhookError::InvalidPayload {
        event: event.to_string(),
        message: e.to_string(),
    })
}

/// Payload shapes as GitHub sends them.
mod wire {
    use super::*;

    #[derive(Deserialize)]
    pub struct Owner {
        pub login: String,
    }

    #[derive(Deserialize)]
    pub struct Repository {
        pub name: String,
        pub owner: Owner,
    }

    impl From<Repository> for RepositoryRef {
        fn from(r: Repository) -> Self {
            RepositoryRef {
                owner: r.owner.login,
                name: r.name,
            }
        }
    }

    #[derive(Deserialize)]
    pub struct Installation {
        pub id: u64,
    }

    #[derive(Deserialize)]
    pub struct HeadCommit {
        pub message: String,
    }

    #[derive(Deserialize)]
    pub struct Push {
        #[serde(rename = "ref")]
        pub git_ref: String,
        pub after: String,
        #[serde(default)]
        pub deleted: bool,
        pub head_commit: Option<HeadCommit>,
        pub repository: Repository,
        pub installation: Option<Installation>,
    }

    impl From<Push> for PushEvent {
        fn from(p: Push) -> Self {
            PushEvent {
                repository: p.repository.into(),
                installation_id: p.installation.map(|i| i.id),
                git_ref: p.git_ref,
                after: p.after,
                deleted: p.deleted,
                head_commit_message: p.head_commit.map(|c| c.message),
            }
        }
    }

    #[derive(Deserialize)]
    pub struct Label {
        pub name: String,
    }

    #[derive(Deserialize)]
    pub struct Head {
        #[serde(rename = "ref")]
        pub git_ref: String,
        pub sha: String,
    }

    #[derive(Deserialize)]
    pub struct PullRequestBody {
        pub number: u64,
        pub head: Head,
        #[serde(default)]
        pub labels: Vec<Label>,
        #[serde(default)]
        pub merged: bool,
    }

    #[derive(Deserialize)]
    pub struct PullRequestPayload {
        pub action: String,
        pub label: Option<Label>,
        pub pull_request: PullRequestBody,
        pub repository: Repository,
        pub installation: Option<Installation>,
    }

    impl From<PullRequestPayload> for PullRequest {
        fn from(p: PullRequestPayload) -> Self {
            PullRequest {
                repository: p.repository.into(),
                installation_id: p.installation.map(|i| i.id),
                number: p.pull_request.number,
                head_ref: p.pull_request.head.git_ref,
                head_sha: p.pull_request.head.sha,
                labels: p.pull_request.labels.into_iter().map(|l| l.name).collect(),
                merged: p.pull_request.merged,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn repository() -> serde_json::Value {
        json!({"name": "theme", "full_name": "acme/theme", "owner": {"login": "acme"}})
    }

    #[test]
    fn push_is_parsed() {
        let body = json!({
            "ref": "refs/heads/production",
            "before": "a",
            "after": "b",
            "deleted": false,
            "head_commit": {"id": "b", "message": "Update header"},
            "repository": repository(),
            "installation": {"id": 77}
        });

        let event = WebhookEvent::parse("push", body.to_string().as_bytes()).unwrap();

        let WebhookEvent::Push(push) = &event else {
            panic!("expected push, got {event:?}");
        };
        assert_eq!(push.branch(), Some("production"));
        assert_eq!(push.head_commit_message.as_deref(), Some("Update header"));
        assert_eq!(event.installation_id(), Some(77));
        assert_eq!(event.repository().unwrap().full_name(), "acme/theme");
    }

    #[test]
    fn branch_deletion_has_no_head_commit() {
        let body = json!({
            "ref": "refs/heads/feature",
            "after": "0000000000000000000000000000000000000000",
            "deleted": true,
            "head_commit": null,
            "repository": repository()
        });

        let event = WebhookEvent::parse("push", body.to_string().as_bytes()).unwrap();
        let WebhookEvent::Push(push) = event else {
            panic!("expected push, got {event:?}");
        };
        assert!(push.deleted);
        assert_eq!(push.head_commit_message, None);
        assert_eq!(push.installation_id, None);
    }

    #[test]
    fn pull_request_actions() {
        let payload = |action: &str| {
            json!({
                "action": action,
                "number": 5,
                "label": {"name": "preview"},
                "pull_request": {
                    "number": 5,
                    "head": {"ref": "feature/header", "sha": "abc"},
                    "labels": [{"name": "preview"}],
                    "merged": true
                },
                "repository": repository()
            })
            .to_string()
        };

        let labeled = WebhookEvent::parse("pull_request", payload("labeled").as_bytes()).unwrap();
        let WebhookEvent::PullRequestLabeled { pull_request, label } = labeled else {
            panic!("expected labeled");
        };
        assert_eq!(label, "preview");
        assert_eq!(pull_request.head_ref, "feature/header");

        let closed = WebhookEvent::parse("pull_request", payload("closed").as_bytes()).unwrap();
        assert!(matches!(
            closed,
            WebhookEvent::PullRequestClosed(ref pr) if pr.merged && pr.has_label("preview")
        ));

        let synced =
            WebhookEvent::parse("pull_request", payload("synchronize").as_bytes()).unwrap();
        assert_eq!(synced.kind(), "pull_request.synchronize");
    }

    #[test]
    fn malformed_payload_is_rejected() {
        let err = WebhookEvent::parse("push", br#"{"ref": 1}"#).expect_err("malformed");
        assert!(matches!(
            err,
            WebhookError::InvalidPayload { ref event, .. } if event == "push"
        ));
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn ping_and_unknown_events() {
        assert_eq!(
            WebhookEvent::parse("ping", b"not json").unwrap(),
            WebhookEvent::Ping
        );
        assert_eq!(
            WebhookEvent::parse("issues", b"{}").unwrap(),
            WebhookEvent::Ignored {
                event: "issues".to_string()
            }
        );
    }
}

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MergeRequestAction {
    Open,
    Update,
    Reopen,
    Other(String),
}

impl MergeRequestAction {
    pub fn parse(s: &str) -> Self {
        match s {
            "open" => MergeRequestAction::Open,
            "update" => MergeRequestAction::Update,
            "reopen" => MergeRequestAction::Reopen,
            other => MergeRequestAction::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MergeRequestAction::Open => "open",
            MergeRequestAction::Update => "update",
            MergeRequestAction::Reopen => "reopen",
            MergeRequestAction::Other(s) => s,
        }
    }

    pub fn is_handled(&self) -> bool {
        !matches!(self, MergeRequestAction::Other(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeRequestEvent {
    pub project_id: i64,
    pub merge_request_iid: i64,
    pub action: MergeRequestAction,
    pub last_commit_id: Option<String>,
    pub source_branch: Option<String>,
}

impl MergeRequestEvent {
    /// Ref to read files at: the last commit when known, else the source branch.
    pub fn source_ref(&self) -> Option<&str> {
        self.last_commit_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.source_branch.as_deref().filter(|s| !s.is_empty()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushEvent {
    pub project_id: i64,
    pub commit_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookEvent {
    MergeRequest(MergeRequestEvent),
    Push(PushEvent),
}

// GitLab payload shapes, reduced to the fields used here.
#[derive(Deserialize)]
struct MergeRequestPayload {
    project: ProjectRef,
    object_attributes: MergeRequestAttributes,
}

#[derive(Deserialize)]
struct ProjectRef {
    id: i64,
}

#[derive(Deserialize)]
struct MergeRequestAttributes {
    iid: i64,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    last_commit: Option<CommitRef>,
    #[serde(default)]
    source_branch: Option<String>,
}

#[derive(Deserialize)]
struct CommitRef {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Deserialize)]
struct PushPayload {
    project_id: i64,
    after: String,
}

#[derive(Deserialize)]
struct ObjectKindOnly {
    #[serde(default)]
    object_kind: Option<String>,
}

impl WebhookEvent {
    /// Decode a GitLab webhook body by its `object_kind`.
    pub fn from_json(body: &str) -> Result<Self> {
        let kind: ObjectKindOnly = serde_json::from_str(body).context("parse webhook payload")?;
        match kind.object_kind.as_deref() {
            Some("merge_request") => {
                let p: MergeRequestPayload =
                    serde_json::from_str(body).context("parse merge_request payload")?;
                Ok(WebhookEvent::MergeRequest(MergeRequestEvent {
                    project_id: p.project.id,
                    merge_request_iid: p.object_attributes.iid,
                    action: MergeRequestAction::parse(
                        p.object_attributes.action.as_deref().unwrap_or(""),
                    ),
                    last_commit_id: p.object_attributes.last_commit.and_then(|c| c.id),
                    source_branch: p.object_attributes.source_branch,
                }))
            }
            Some("push") => {
                let p: PushPayload = serde_json::from_str(body).context("parse push payload")?;
                Ok(WebhookEvent::Push(PushEvent { project_id: p.project_id, commit_id: p.after }))
            }
            other => Err(anyhow!("unsupported object_kind {:?}", other)),
        }
    }
}

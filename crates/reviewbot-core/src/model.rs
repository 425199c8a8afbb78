use serde::{Deserialize, Serialize};

/// Lifecycle of a claim record. Absence of a record is modelled as `Option::None`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Queued,
    Completed,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Queued => "queued",
            ClaimStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(ClaimStatus::Queued),
            "completed" => Some(ClaimStatus::Completed),
            _ => None,
        }
    }
}

/// One changed file as reported by the repository host.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiffChange {
    #[serde(default)]
    pub old_path: Option<String>,
    #[serde(default)]
    pub new_path: Option<String>,
    #[serde(default)]
    pub new_file: bool,
    #[serde(default)]
    pub deleted_file: bool,
    #[serde(default)]
    pub renamed_file: bool,
    #[serde(default)]
    pub diff: String,
}

impl DiffChange {
    /// `N`/`D`/`R` for new, deleted and renamed; `-` in each unset position.
    pub fn flags(&self) -> String {
        let mut s = String::with_capacity(3);
        s.push(if self.new_file { 'N' } else { '-' });
        s.push(if self.deleted_file { 'D' } else { '-' });
        s.push(if self.renamed_file { 'R' } else { '-' });
        s
    }

    /// Path the change lives at after it is applied, falling back to the old path.
    pub fn current_path(&self) -> Option<&str> {
        self.new_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .or_else(|| self.old_path.as_deref().filter(|p| !p.is_empty()))
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// Text returned by the generation collaborator plus usage metadata.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct GeneratedText {
    pub content: String,
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub elapsed_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

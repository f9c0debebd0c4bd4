use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Option Keys
// ============================================================================

/// Typed key into the option store
///
/// Each variant maps to the stable string key used on disk and on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKey {
    WebhookAddress,
    GithubOwner,
    GithubRepo,
    GithubWorkflow,
    GithubAccessToken,
    GithubDeployBranch,
    EnableScheduledBuilds,
    SelectScheduleBuilds,
    SelectTimeBuild,
    EnableOnPostUpdate,
}

impl OptionKey {
    pub const ALL: [OptionKey; 10] = [
        OptionKey::WebhookAddress,
        OptionKey::GithubOwner,
        OptionKey::GithubRepo,
        OptionKey::GithubWorkflow,
        OptionKey::GithubAccessToken,
        OptionKey::GithubDeployBranch,
        OptionKey::EnableScheduledBuilds,
        OptionKey::SelectScheduleBuilds,
        OptionKey::SelectTimeBuild,
        OptionKey::EnableOnPostUpdate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OptionKey::WebhookAddress => "webhook_address",
            OptionKey::GithubOwner => "github_owner",
            OptionKey::GithubRepo => "github_repo",
            OptionKey::GithubWorkflow => "github_workflow",
            OptionKey::GithubAccessToken => "github_access_token",
            OptionKey::GithubDeployBranch => "github_deploy_branch",
            OptionKey::EnableScheduledBuilds => "enable_scheduled_builds",
            OptionKey::SelectScheduleBuilds => "select_schedule_builds",
            OptionKey::SelectTimeBuild => "select_time_build",
            OptionKey::EnableOnPostUpdate => "enable_on_post_update",
        }
    }

    /// Writes to these keys require the recurring job to be rebuilt
    pub fn affects_schedule(&self) -> bool {
        matches!(
            self,
            OptionKey::EnableScheduledBuilds
                | OptionKey::SelectScheduleBuilds
                | OptionKey::SelectTimeBuild
        )
    }

    /// Secret values are never echoed back to callers
    pub fn is_secret(&self) -> bool {
        matches!(self, OptionKey::GithubAccessToken)
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OptionKey::ALL
            .iter()
            .find(|key| key.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown option key: {}", s))
    }
}

/// Interpret a stored checkbox value
///
/// Checkbox options are stored as free-form strings; anything other than an
/// explicit negative counts as checked once the value is non-empty.
pub fn parse_flag(value: Option<&str>) -> bool {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        None => false,
        Some(v) => !matches!(v.as_str(), "" | "0" | "false" | "no" | "off" | "disable"),
    }
}

// ============================================================================
// Deploy Target
// ============================================================================

pub const DEFAULT_DEPLOY_BRANCH: &str = "main";

/// Everything needed to address one remote workflow dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployTarget {
    pub dispatch_url: Option<String>,
    pub token: String,
    pub branch: String,
}

impl DeployTarget {
    /// A target is complete when both the URL and the token are present
    pub fn is_complete(&self) -> bool {
        self.dispatch_url.as_deref().is_some_and(|u| !u.trim().is_empty())
            && !self.token.trim().is_empty()
    }

    /// The endpoint the dispatch POST goes to
    ///
    /// Configured URLs may already carry the `/dispatches` suffix; it is never doubled.
    pub fn dispatches_endpoint(&self) -> Option<String> {
        let base = self.dispatch_url.as_deref()?.trim().trim_end_matches('/');
        if base.is_empty() {
            return None;
        }
        if base.ends_with("/dispatches") {
            Some(base.to_string())
        } else {
            Some(format!("{}/dispatches", base))
        }
    }

    /// Name of the first missing required field, if any
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.dispatch_url.as_deref().map_or(true, |u| u.trim().is_empty()) {
            Some("dispatch_url")
        } else if self.token.trim().is_empty() {
            Some("github_access_token")
        } else {
            None
        }
    }
}

/// Display-safe view of the resolved target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetView {
    pub dispatch_url: Option<String>,
    pub branch: String,
    pub has_token: bool,
    pub url_from_override: bool,
}

// ============================================================================
// Schedule
// ============================================================================

/// Build frequency chosen by the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        }
    }

    pub fn cadence(&self) -> Cadence {
        match self {
            Frequency::Daily => Cadence::Daily,
            Frequency::Weekly => Cadence::Weekly,
            Frequency::Monthly => Cadence::Monthly,
        }
    }

    /// Unset or unrecognised values fall back to weekly
    pub fn from_option(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.parse().ok())
            .unwrap_or(Frequency::Weekly)
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            other => Err(format!("unknown frequency: {}", other)),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recurrence known to the job scheduler
///
/// Hourly, twice-daily and daily are the host's native recurrences; weekly and
/// monthly are registered on top of them. Monthly is a fixed 30.5 days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    Hourly,
    TwiceDaily,
    Daily,
    Weekly,
    Monthly,
}

/// Current schedule settings as read from the option store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub enabled: bool,
    pub frequency: Frequency,
    pub time_of_day: NaiveTime,
}

/// A recurring job owned by the job scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub name: String,
    pub next_run: DateTime<Utc>,
    pub cadence: Cadence,
}

// ============================================================================
// Posts
// ============================================================================

/// Post lifecycle status reported by the host
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PostStatus {
    Publish,
    Future,
    Draft,
    Pending,
    Private,
    Trash,
    AutoDraft,
    Inherit,
    Other(String),
}

impl PostStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PostStatus::Publish => "publish",
            PostStatus::Future => "future",
            PostStatus::Draft => "draft",
            PostStatus::Pending => "pending",
            PostStatus::Private => "private",
            PostStatus::Trash => "trash",
            PostStatus::AutoDraft => "auto-draft",
            PostStatus::Inherit => "inherit",
            PostStatus::Other(s) => s.as_str(),
        }
    }

    pub fn is_publish(&self) -> bool {
        matches!(self, PostStatus::Publish)
    }
}

impl From<&str> for PostStatus {
    fn from(s: &str) -> Self {
        match s {
            "publish" => PostStatus::Publish,
            "future" => PostStatus::Future,
            "draft" => PostStatus::Draft,
            "pending" => PostStatus::Pending,
            "private" => PostStatus::Private,
            "trash" => PostStatus::Trash,
            "auto-draft" => PostStatus::AutoDraft,
            "inherit" => PostStatus::Inherit,
            other => PostStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PostStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PostStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(PostStatus::from(s.as_str()))
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// What caused a deploy to be attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Manual,
    Scheduled,
    PostTransition,
    FuturePost,
}

impl TriggerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerSource::Manual => "manual",
            TriggerSource::Scheduled => "scheduled",
            TriggerSource::PostTransition => "post_transition",
            TriggerSource::FuturePost => "future_post",
        }
    }
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one `fire_deploy` call that did not fail in transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Configuration was incomplete; nothing was sent
    Skipped { reason: String },
    /// The remote endpoint accepted the request
    Dispatched { status: u16 },
}

impl DispatchOutcome {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, DispatchOutcome::Dispatched { .. })
    }
}

use serde::Deserialize;

/// Listing envelope used by every collection endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
}

/// Response for the revision listing endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RevisionListing {
    pub revisions: Page<RevisionEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RevisionEntry {
    pub site: Site,
    pub project_revision: RevisionMeta,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Site {
    /// Build state of the generated site; only `"done"` permits a new run
    pub state: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RevisionMeta {
    pub created_by: UserRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserRef {
    pub id: String,
}

/// Response for the comment and reply listing endpoints (same shape).
#[derive(Debug, Clone, Deserialize)]
pub struct CommentListing {
    pub comments: Page<CommentEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentEntry {
    pub comment: Comment,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author: Author,
    /// Absent on some reply records, so default to empty
    #[serde(default)]
    pub raw_content: String,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub card_data: Option<CardData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Author {
    pub id: String,
    pub username: String,
}

/// Attached card on special comments, e.g. tips.
#[derive(Debug, Clone, Deserialize)]
pub struct CardData {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub credits_spent: Option<u64>,
}

/// Response for the single-project endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectInfo {
    pub project_revision: ProjectVersion,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectVersion {
    pub version: u64,
}

/// Response for revision creation.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedRevision {
    pub project_revision: CreatedRevisionBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedRevisionBody {
    pub id: String,
    pub version: u64,
}

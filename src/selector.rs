use std::future::Future;

use crate::api::Comment;
use crate::error::Result;

/// The one comment chosen to drive a revision run, with the fields the
/// rest of the cycle needs from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    pub raw_content: String,
    pub author_id: String,
    pub author_username: String,
    /// Credits attached when the comment is a tip card
    pub tipped_credits: Option<u64>,
}

impl Candidate {
    fn from_comment(comment: &Comment) -> Self {
        let tipped_credits = comment
            .card_data
            .as_ref()
            .filter(|card| card.kind == "tip_comment")
            .and_then(|card| card.credits_spent);

        Self {
            id: comment.id.clone(),
            raw_content: comment.raw_content.clone(),
            author_id: comment.author.id.clone(),
            author_username: comment.author.username.clone(),
            tipped_credits,
        }
    }
}

/// Result of a selection pass over the comment listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The oldest comment of the unbroken not-yet-answered run counting
    /// back from the newest
    Candidate(Candidate),
    /// Listing empty, or nothing left after skipping pinned comments
    NoneEligible,
    /// The newest eligible comment already carries an auto-reply
    AlreadyAnswered,
}

/// Pick the comment that should trigger a response.
///
/// `comments` is ordered newest first, as the listing endpoint returns it.
/// Pinned comments are skipped outright. For each remaining comment the
/// `already_answered` query (a reply-listing lookup by comment id) decides
/// whether scanning stops: an answered comment ends the run, and whatever
/// unanswered comment was recorded last is the candidate. Query errors
/// propagate and abort the cycle.
pub async fn select_candidate<F, Fut>(comments: &[Comment], mut already_answered: F) -> Result<Selection>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let mut candidate = None;

    for comment in comments {
        if comment.pinned {
            continue;
        }

        if already_answered(comment.id.clone()).await? {
            if candidate.is_none() {
                return Ok(Selection::AlreadyAnswered);
            }
            break;
        }

        candidate = Some(Candidate::from_comment(comment));
    }

    Ok(match candidate {
        Some(candidate) => Selection::Candidate(candidate),
        None => Selection::NoneEligible,
    })
}

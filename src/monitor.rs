use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::api::{ApiClient, Comment};
use crate::config::Config;
use crate::error::{Result, RevWatchError};
use crate::revision::{PublishedRevision, RevisionPipeline};
use crate::selector::{select_candidate, Selection};
use crate::session::Session;

/// Why a cycle ended without running the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Revision listing is empty
    NoRevisions,
    /// Latest revision's site is still building
    SiteBuilding,
    /// Nothing eligible in the comment listing
    NoCandidate,
    /// The comment we would act on already has an auto-reply
    AlreadyAnswered,
    /// The session expired mid-cycle and was refreshed instead
    SessionRenewed,
}

/// Result of one polling cycle. Cycle-local; nothing here survives into
/// the next cycle.
#[derive(Debug)]
pub enum CycleOutcome {
    Skipped(SkipReason),
    Completed(PublishedRevision),
    Failed(RevWatchError),
}

/// The outer scheduling loop.
///
/// Wakes once per interval, walks the read-only checks (revision state,
/// comment selection, reply de-duplication), and when everything lines up
/// runs the revision pipeline and posts a confirmation reply. No cycle
/// failure ever escapes the loop.
pub struct Monitor {
    api: ApiClient,
    session: Arc<Session>,
    project_id: String,
    model_id: String,
    additional_note: String,
    response_prefix: String,
    confirmation: String,
    interval: Duration,
}

impl Monitor {
    pub fn new(api: ApiClient, session: Arc<Session>, config: &Config) -> Self {
        Self {
            api,
            session,
            project_id: config.project_id.clone(),
            model_id: config.model_id.clone(),
            additional_note: config.additional_note.clone(),
            response_prefix: config.auto_response_prefix.clone(),
            confirmation: format!(
                "{}{}",
                config.auto_response_prefix, config.auto_response_create_revision
            ),
            interval: Duration::from_secs(config.interval),
        }
    }

    /// Run cycles until interrupted. The sleep always runs to completion
    /// before the next cycle starts, so cycles never overlap.
    pub async fn run(&self) -> Result<()> {
        info!("Starting automatic monitor for project {}", self.project_id);

        loop {
            let outcome = self.run_cycle().await;
            debug!("Cycle outcome: {outcome:?}");

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received; stopping monitor");
                    break;
                }
            }
        }

        Ok(())
    }

    /// One full pass of the polling state machine. Errors are resolved
    /// here: expiry turns into a refresh plus skip, everything else into
    /// a logged `Failed` outcome.
    pub async fn run_cycle(&self) -> CycleOutcome {
        match self.check_and_respond().await {
            Ok(outcome) => outcome,
            Err(RevWatchError::AuthExpired) => {
                warn!("Session expired mid-cycle; refreshing");
                if let Err(e) = self.session.refresh().await {
                    error!("Session refresh failed: {e}");
                }
                CycleOutcome::Skipped(SkipReason::SessionRenewed)
            }
            Err(e) => {
                error!("Cycle failed: {e}");
                CycleOutcome::Failed(e)
            }
        }
    }

    async fn check_and_respond(&self) -> Result<CycleOutcome> {
        info!("Checking project {}", self.project_id);

        // Latest revision gates the whole cycle: act only on a finished site
        let revisions = self.api.fetch_revisions(&self.project_id).await?;
        let Some(latest) = revisions.revisions.data.first() else {
            info!("No revisions found");
            return Ok(CycleOutcome::Skipped(SkipReason::NoRevisions));
        };

        info!("site.state = {}", latest.site.state);
        if latest.site.state != "done" {
            info!("Site not yet ready. Skipping execution.");
            return Ok(CycleOutcome::Skipped(SkipReason::SiteBuilding));
        }
        let owner_id = latest.project_revision.created_by.id.clone();

        let listing = self.api.fetch_comments(&self.project_id).await?;
        let comments: Vec<Comment> = listing
            .comments
            .data
            .into_iter()
            .map(|entry| entry.comment)
            .collect();
        if comments.is_empty() {
            info!("No comments to process");
            return Ok(CycleOutcome::Skipped(SkipReason::NoCandidate));
        }

        let selection =
            select_candidate(&comments, |comment_id| self.has_auto_reply(&owner_id, comment_id))
                .await?;
        let candidate = match selection {
            Selection::Candidate(candidate) => candidate,
            Selection::NoneEligible => {
                info!("No comments to process");
                return Ok(CycleOutcome::Skipped(SkipReason::NoCandidate));
            }
            Selection::AlreadyAnswered => {
                info!("Found auto reply on the newest comment. Skipping.");
                return Ok(CycleOutcome::Skipped(SkipReason::AlreadyAnswered));
            }
        };

        info!(
            "Selected comment by {}: \"{}\"",
            candidate.author_username, candidate.raw_content
        );
        if let Some(credits) = candidate.tipped_credits {
            info!("Comment carries a tip of {credits} credit(s)");
        }

        // Re-check the candidate's replies right before acting, in case an
        // answer landed between the scan and now
        if self.has_auto_reply(&owner_id, candidate.id.clone()).await? {
            info!("Found auto reply headers. Skipping.");
            return Ok(CycleOutcome::Skipped(SkipReason::AlreadyAnswered));
        }

        info!("Creating new revision...");
        let prompt = format!("{}{}", candidate.raw_content, self.additional_note);
        let published = RevisionPipeline::new(&self.api, &self.project_id)
            .run(&prompt, &self.model_id)
            .await?;
        info!(
            "Revision created: ID={}, version={}",
            published.revision_id, published.version
        );

        // Posted only after full pipeline success; its own failure is not
        // worth re-running the pipeline for
        match self
            .api
            .post_reply(&self.project_id, &candidate.id, &self.confirmation)
            .await
        {
            Ok(()) => info!("Confirmation comment posted."),
            Err(e) => warn!("Failed to post confirmation comment: {e}"),
        }

        Ok(CycleOutcome::Completed(published))
    }

    /// Does this comment already have a reply from the owner that carries
    /// the auto-response marker?
    async fn has_auto_reply(&self, owner_id: &str, comment_id: String) -> Result<bool> {
        let replies = self.api.fetch_replies(&self.project_id, &comment_id).await?;
        Ok(replies.comments.data.iter().any(|entry| {
            entry.comment.author.id == owner_id
                && entry.comment.raw_content.contains(&self.response_prefix)
        }))
    }
}

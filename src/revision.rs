use log::info;
use rand::Rng;
use serde::Serialize;
use serde_json::Value;

use crate::api::ApiClient;
use crate::error::{Result, RevWatchError};

const SITE_ID_LENGTH: usize = 17;
const SITE_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a random alphanumeric site id.
///
/// Fresh draw on every call; there is no shared counter or seed.
pub fn generate_site_id() -> String {
    let mut rng = rand::rng();
    (0..SITE_ID_LENGTH)
        .map(|_| SITE_ID_ALPHABET[rng.random_range(0..SITE_ID_ALPHABET.len())] as char)
        .collect()
}

/// Result of a fully published revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedRevision {
    pub revision_id: String,
    pub version: u64,
    pub site_id: String,
}

/// Payload for the draft-site creation call.
#[derive(Debug, Serialize)]
pub struct SitePayload<'a> {
    pub generate: GenerateSpec<'a>,
    pub project_id: &'a str,
    pub project_version: u64,
    pub project_revision_id: &'a str,
    pub site_id: &'a str,
}

#[derive(Debug, Serialize)]
pub struct GenerateSpec<'a> {
    pub prompt: PromptSpec<'a>,
    pub flags: GenerateFlags,
    pub model: &'a str,
    pub lore: LoreSpec,
}

#[derive(Debug, Serialize)]
pub struct PromptSpec<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: &'a str,
    pub data: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct GenerateFlags {
    pub use_worker_generation: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoreSpec {
    pub version: u32,
    pub attachments: Vec<Value>,
    pub references: Vec<Value>,
    pub enable_database: bool,
    pub enable_api: bool,
    pub enable_multiplayer: bool,
    pub enable_mobile_prompt: bool,
    #[serde(rename = "enableDB")]
    pub enable_db: bool,
    #[serde(rename = "enableLLM")]
    pub enable_llm: bool,
    #[serde(rename = "enableLLM2")]
    pub enable_llm2: bool,
    pub enable_tweaks: bool,
    pub features: LoreFeatures,
}

#[derive(Debug, Serialize)]
pub struct LoreFeatures {
    pub context: bool,
    pub errors: bool,
    pub htmx: bool,
    pub images: bool,
    pub navigation: bool,
}

/// Build the site generation payload for one pipeline run.
///
/// Two feature toggles are read straight out of the prompt text:
/// "multiplayer" turns the multiplayer flag on, "database" or "db" turns
/// the database flag on. Everything else is a fixed default.
pub fn build_site_payload<'a>(
    project_id: &'a str,
    revision_id: &'a str,
    revision_version: u64,
    site_id: &'a str,
    prompt: &'a str,
    model_id: &'a str,
) -> SitePayload<'a> {
    let lowered = prompt.to_lowercase();
    let enable_multiplayer = lowered.contains("multiplayer");
    let enable_db = lowered.contains("database") || lowered.contains("db");

    SitePayload {
        generate: GenerateSpec {
            prompt: PromptSpec {
                kind: "plaintext",
                text: prompt,
                data: None,
            },
            flags: GenerateFlags {
                use_worker_generation: false,
            },
            model: model_id,
            lore: LoreSpec {
                version: 1,
                attachments: Vec::new(),
                references: Vec::new(),
                enable_database: false,
                enable_api: true,
                enable_multiplayer,
                enable_mobile_prompt: true,
                enable_db,
                enable_llm: false,
                enable_llm2: true,
                enable_tweaks: false,
                features: LoreFeatures {
                    context: true,
                    errors: true,
                    htmx: true,
                    images: true,
                    navigation: true,
                },
            },
        },
        project_id,
        project_version: revision_version,
        project_revision_id: revision_id,
        site_id,
    }
}

/// The ordered five-step workflow that creates and promotes a revision.
///
/// Steps run in a fixed order and the first failure aborts the run. There
/// is no rollback: a revision created by step 2 that never reaches step 5
/// stays behind as an unpromoted draft. The confirmation reply is only
/// posted after full success, so the next cycle picks the same comment up
/// again and retries from the top.
pub struct RevisionPipeline<'a> {
    api: &'a ApiClient,
    project_id: &'a str,
}

impl<'a> RevisionPipeline<'a> {
    pub fn new(api: &'a ApiClient, project_id: &'a str) -> Self {
        Self { api, project_id }
    }

    pub async fn run(&self, prompt: &str, model_id: &str) -> Result<PublishedRevision> {
        // 1) Fetch current project info
        let project = self
            .api
            .fetch_project(self.project_id)
            .await
            .map_err(step_error("fetch project info"))?;
        let parent_version = project.project_revision.version;
        info!("Current project version: {parent_version}");

        // 2) Create new revision
        let created = self
            .api
            .create_revision(self.project_id, parent_version)
            .await
            .map_err(step_error("create revision"))?;
        let revision_id = created.project_revision.id;
        let revision_version = created.project_revision.version;
        info!("Created revision ID: {revision_id}, version: {revision_version}");

        // 3) Create draft site
        let site_id = generate_site_id();
        info!("Generated site ID: {site_id}");
        let payload = build_site_payload(
            self.project_id,
            &revision_id,
            revision_version,
            &site_id,
            prompt,
            model_id,
        );
        self.api
            .create_site(&payload)
            .await
            .map_err(step_error("create draft site"))?;
        info!("Created draft site successfully");

        // 4) Confirm draft
        self.api
            .confirm_draft(self.project_id, revision_version)
            .await
            .map_err(step_error("confirm draft"))?;
        info!("Confirmed draft successfully");

        // 5) Update project current version
        self.api
            .promote_version(self.project_id, revision_version)
            .await
            .map_err(step_error("promote version"))?;
        info!("Updated project current version to: {revision_version}");

        Ok(PublishedRevision {
            revision_id,
            version: revision_version,
            site_id,
        })
    }
}

/// Tag an error with the step it happened in. Session expiry stays as-is
/// so the outer cycle handles it through its usual refresh route.
fn step_error(step: &'static str) -> impl FnOnce(RevWatchError) -> RevWatchError {
    move |error| match error {
        RevWatchError::AuthExpired => error,
        other => other.in_step(step),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Session, TokenStore};
    use std::sync::Arc;
    use url::Url;

    struct NullStore;

    impl TokenStore for NullStore {
        fn persist_token(&self, _token: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn client_for(server: &mockito::ServerGuard) -> ApiClient {
        let session = Arc::new(
            Session::new(
                Url::parse(&server.url()).unwrap(),
                "session=test".to_string(),
                Arc::new(NullStore),
            )
            .unwrap(),
        );
        ApiClient::new(&server.url(), session).unwrap()
    }

    #[test]
    fn test_site_id_shape() {
        for _ in 0..50 {
            let id = generate_site_id();
            assert_eq!(id.len(), 17);
            assert!(id.bytes().all(|b| SITE_ID_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_site_ids_are_independent() {
        assert_ne!(generate_site_id(), generate_site_id());
    }

    #[test]
    fn test_payload_feature_flags_from_prompt() {
        let payload = build_site_payload("p1", "r1", 3, "s1", "add MULTIPLAYER mode", "m");
        assert!(payload.generate.lore.enable_multiplayer);
        assert!(!payload.generate.lore.enable_db);

        let payload = build_site_payload("p1", "r1", 3, "s1", "store scores in a Database", "m");
        assert!(!payload.generate.lore.enable_multiplayer);
        assert!(payload.generate.lore.enable_db);

        let payload = build_site_payload("p1", "r1", 3, "s1", "use a db table", "m");
        assert!(payload.generate.lore.enable_db);
    }

    #[test]
    fn test_payload_wire_shape() {
        let payload = build_site_payload("p1", "rev-9", 4, "site-abc", "hello", "gemini-flash");
        let value = serde_json::to_value(&payload).unwrap();

        assert_eq!(value["project_id"], "p1");
        assert_eq!(value["project_version"], 4);
        assert_eq!(value["project_revision_id"], "rev-9");
        assert_eq!(value["site_id"], "site-abc");
        assert_eq!(value["generate"]["prompt"]["type"], "plaintext");
        assert_eq!(value["generate"]["prompt"]["text"], "hello");
        assert!(value["generate"]["prompt"]["data"].is_null());
        assert_eq!(value["generate"]["flags"]["use_worker_generation"], false);
        assert_eq!(value["generate"]["model"], "gemini-flash");

        let lore = &value["generate"]["lore"];
        assert_eq!(lore["version"], 1);
        assert_eq!(lore["attachments"], serde_json::json!([]));
        assert_eq!(lore["enableDatabase"], false);
        assert_eq!(lore["enableApi"], true);
        assert_eq!(lore["enableMobilePrompt"], true);
        assert_eq!(lore["enableDB"], false);
        assert_eq!(lore["enableLLM"], false);
        assert_eq!(lore["enableLLM2"], true);
        assert_eq!(lore["enableTweaks"], false);
        assert_eq!(lore["features"]["htmx"], true);
        assert_eq!(lore["features"]["navigation"], true);
    }

    #[tokio::test]
    async fn test_pipeline_happy_path() {
        let mut server = mockito::Server::new_async().await;
        let project = server
            .mock("GET", "/api/v1/projects/p1")
            .with_status(200)
            .with_body(r#"{"project_revision": {"version": 4}}"#)
            .create_async()
            .await;
        let revision = server
            .mock("POST", "/api/v1/projects/p1/revisions")
            .match_body(mockito::Matcher::Json(serde_json::json!({"parent_version": 4})))
            .with_status(201)
            .with_body(r#"{"project_revision": {"id": "rev-5", "version": 5}}"#)
            .create_async()
            .await;
        let site = server
            .mock("POST", "/api/v1/sites")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "project_id": "p1",
                "project_version": 5,
                "project_revision_id": "rev-5",
            })))
            .with_status(201)
            .with_body("{}")
            .create_async()
            .await;
        let confirm = server
            .mock("PATCH", "/api/v1/projects/p1/revisions/5")
            .match_body(mockito::Matcher::Json(serde_json::json!({"draft": false})))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        let promote = server
            .mock("PATCH", "/api/v1/projects/p1")
            .match_body(mockito::Matcher::Json(serde_json::json!({"current_version": 5})))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let client = client_for(&server);
        let published = RevisionPipeline::new(&client, "p1")
            .run("make a game", "gemini-flash")
            .await
            .unwrap();

        assert_eq!(published.revision_id, "rev-5");
        assert_eq!(published.version, 5);
        assert_eq!(published.site_id.len(), 17);

        project.assert_async().await;
        revision.assert_async().await;
        site.assert_async().await;
        confirm.assert_async().await;
        promote.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_step_stops_the_run() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/projects/p1")
            .with_status(200)
            .with_body(r#"{"project_revision": {"version": 4}}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/api/v1/projects/p1/revisions")
            .with_status(500)
            .with_body("revision store unavailable")
            .create_async()
            .await;
        let site = server
            .mock("POST", "/api/v1/sites")
            .expect(0)
            .create_async()
            .await;
        let confirm = server
            .mock("PATCH", "/api/v1/projects/p1/revisions/5")
            .expect(0)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = RevisionPipeline::new(&client, "p1")
            .run("make a game", "gemini-flash")
            .await
            .unwrap_err();

        match err {
            RevWatchError::Pipeline { step, source } => {
                assert_eq!(step, "create revision");
                assert!(matches!(*source, RevWatchError::Api { status: 500, .. }));
            }
            other => panic!("expected Pipeline error, got {other:?}"),
        }

        site.assert_async().await;
        confirm.assert_async().await;
    }

    #[tokio::test]
    async fn test_first_step_failure_reports_its_step() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/projects/p1")
            .with_status(404)
            .with_body("no such project")
            .create_async()
            .await;
        let revision = server
            .mock("POST", "/api/v1/projects/p1/revisions")
            .expect(0)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = RevisionPipeline::new(&client, "p1")
            .run("make a game", "gemini-flash")
            .await
            .unwrap_err();

        match err {
            RevWatchError::Pipeline { step, .. } => assert_eq!(step, "fetch project info"),
            other => panic!("expected Pipeline error, got {other:?}"),
        }

        revision.assert_async().await;
    }
}

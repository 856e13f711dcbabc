//! Fakes and a wired application for pipeline tests

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use launchpad::app::state::{AppState, Components};
use launchpad::deploy::backend::{BuildBackend, CommandOutcome};
use launchpad::deploy::fsm::DeploymentStatus;
use launchpad::deploy::platform::{HostingPlatform, PublishOutcome, PublishRequest};
use launchpad::deploy::source::SourceFetcher;
use launchpad::errors::PipelineError;
use launchpad::integrations::directory::StaticDirectory;
use launchpad::integrations::notify::Notifier;
use launchpad::models::deployment::{BuildConfiguration, DeploymentRecord, Trigger};
use launchpad::models::project::ProjectType;
use launchpad::models::repository::{DeploymentSettings, Repository, TreeSnapshot};
use launchpad::storage::layout::StorageLayout;
use launchpad::storage::settings::Settings;
use launchpad::store::{DeploymentStore, MemoryStore};
use launchpad_models::{DeploymentEvent, EventKind};
use tempfile::TempDir;

pub const COMMIT: &str = "abc1234def5678";

/// Writes a tiny site into the target instead of cloning
#[derive(Default)]
pub struct FakeSource;

#[async_trait]
impl SourceFetcher for FakeSource {
    async fn fetch(
        &self,
        repository: &Repository,
        commit: &str,
        _branch: &str,
        target: &Path,
    ) -> Result<String, PipelineError> {
        tokio::fs::create_dir_all(target.join("build")).await?;
        tokio::fs::write(target.join("index.html"), "<h1>root</h1>").await?;
        tokio::fs::write(target.join("build/index.html"), "<h1>built</h1>").await?;
        Ok(format!("checked out {} at {}", repository.name, commit))
    }
}

/// Records commands and fails those matching a configured fragment
#[derive(Default)]
pub struct ScriptedBackend {
    commands: Mutex<Vec<String>>,
    failure: Mutex<Option<(String, String)>>,
}

impl ScriptedBackend {
    pub fn fail_on(&self, fragment: &str, log: &str) {
        *self.failure.lock().unwrap() = Some((fragment.to_string(), log.to_string()));
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl BuildBackend for ScriptedBackend {
    async fn run(
        &self,
        command: &str,
        _dir: &Path,
        _env: &BTreeMap<String, String>,
    ) -> Result<CommandOutcome, PipelineError> {
        self.commands.lock().unwrap().push(command.to_string());
        let failure = self.failure.lock().unwrap().clone();
        match failure {
            Some((fragment, log)) if command.contains(&fragment) => Ok(CommandOutcome {
                success: false,
                exit_code: Some(1),
                log,
            }),
            _ => Ok(CommandOutcome {
                success: true,
                exit_code: Some(0),
                log: String::new(),
            }),
        }
    }
}

/// Publishes nowhere and hands back a predictable preview URL
#[derive(Default)]
pub struct FakePlatform {
    failure: Mutex<Option<String>>,
    published: Mutex<Vec<PublishRequest>>,
}

impl FakePlatform {
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn published(&self) -> Vec<PublishRequest> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl HostingPlatform for FakePlatform {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome, PipelineError> {
        self.published.lock().unwrap().push(request.clone());
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(PipelineError::PlatformError(message));
        }
        assert!(request.output_dir.join("index.html").exists());
        Ok(PublishOutcome {
            preview_url: format!("https://{}.preview.test", request.deployment_id),
            log: "published".to_string(),
        })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<DeploymentEvent>>,
}

impl RecordingNotifier {
    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().unwrap().iter().map(|e| e.kind).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: DeploymentEvent) -> Result<(), PipelineError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

pub struct Harness {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub backend: Arc<ScriptedBackend>,
    pub platform: Arc<FakePlatform>,
    pub notifier: Arc<RecordingNotifier>,
    pub layout: StorageLayout,
    _dir: TempDir,
}

impl Harness {
    pub fn new(repositories: Vec<Repository>) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), repositories)
    }

    /// Wire the fakes around an existing store, e.g. one reopened from a
    /// snapshot
    pub fn with_store(store: Arc<MemoryStore>, repositories: Vec<Repository>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path());
        let backend = Arc::new(ScriptedBackend::default());
        let platform = Arc::new(FakePlatform::default());
        let notifier = Arc::new(RecordingNotifier::default());

        let state = AppState::assemble(
            store.clone(),
            Arc::new(StaticDirectory::new(repositories)),
            notifier.clone(),
            Components {
                source: Arc::new(FakeSource),
                backend: backend.clone(),
                platform: platform.clone(),
            },
            &layout,
            &Settings::default(),
        )
        .unwrap();

        Self {
            state,
            store,
            backend,
            platform,
            notifier,
            layout,
            _dir: dir,
        }
    }

    pub async fn wait_idle(&self) {
        self.state.deployments.dispatcher().wait_idle().await;
    }

    pub async fn record(&self, id: &str) -> DeploymentRecord {
        self.store.get(id).await.unwrap().unwrap()
    }
}

/// A create-react-app repository whose tree the detector recognizes
pub fn react_repository() -> Repository {
    Repository {
        id: "repo-react".to_string(),
        project_id: "proj-1".to_string(),
        name: "Marketing Site".to_string(),
        clone_url: "https://github.com/acme/marketing-site.git".to_string(),
        default_branch: "main".to_string(),
        settings: DeploymentSettings::default(),
        tree: TreeSnapshot {
            files: vec![
                "package.json".to_string(),
                "public/index.html".to_string(),
                "src/App.js".to_string(),
            ],
            package_json: Some(
                r#"{"dependencies":{"react":"^18.2.0","react-dom":"^18.2.0","react-scripts":"5.0.1"},"scripts":{"build":"react-scripts build","start":"react-scripts start"}}"#
                    .to_string(),
            ),
            requirements_txt: None,
        },
    }
}

/// A stored record for direct insertion
pub fn record(
    id: &str,
    commit: &str,
    status: DeploymentStatus,
    created_at: DateTime<Utc>,
) -> DeploymentRecord {
    let terminal = status.is_terminal();
    DeploymentRecord {
        id: id.to_string(),
        repository_id: "repo-react".to_string(),
        project_id: "proj-1".to_string(),
        commit_hash: commit.to_string(),
        branch: "main".to_string(),
        trigger: Trigger::Push,
        project_type: ProjectType::React,
        config: BuildConfiguration {
            build_command: Some("npm run build".to_string()),
            install_command: Some("npm install".to_string()),
            output_directory: "build".to_string(),
            env_vars: BTreeMap::from([("NODE_ENV".to_string(), "production".to_string())]),
        },
        status,
        created_at,
        started_at: (status != DeploymentStatus::Pending).then_some(created_at),
        completed_at: terminal.then_some(created_at),
        duration_secs: terminal.then_some(0),
        preview_url: None,
        build_log: String::new(),
        deploy_log: String::new(),
        error_message: (status == DeploymentStatus::Failed).then(|| "deployment failed".to_string()),
        attempt: 1,
        parent_id: None,
    }
}

//! One mirroring run from manifest loading to the final summary

use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::Config;
use crate::error::ConfigError;
use crate::git::{PushTarget, VersionControl};
use crate::manifest::{load_pairs, load_positional, SyncPair};
use crate::notify::{code_span, escape_markdown, Notifier};
use crate::report::{RunReport, RunTimer};
use crate::sync::SyncEngine;

/// Load the work list the configuration points at
pub fn load_work(config: &Config) -> Result<Vec<SyncPair>, ConfigError> {
    match &config.manifests.pairs {
        Some(pairs) => load_pairs(Path::new(pairs)),
        None => load_positional(
            Path::new(&config.manifests.sources),
            Path::new(&config.manifests.destinations),
        ),
    }
}

/// Build the sync engine for this configuration
pub fn build_engine(
    config: &Config,
    vcs: Arc<dyn VersionControl>,
    notifier: Arc<dyn Notifier>,
) -> SyncEngine {
    SyncEngine::new(
        vcs,
        notifier,
        PushTarget {
            host: config.push.host.clone(),
            remote_name: config.push.remote_name.clone(),
            token: config.push.token.clone(),
        },
        config.workspace_root_path(),
        config.redactor(),
    )
}

/// Run the whole batch.
///
/// Only configuration problems come back as errors; repository failures are
/// part of the returned report.
pub async fn execute(
    config: &Config,
    vcs: Arc<dyn VersionControl>,
    notifier: Arc<dyn Notifier>,
) -> Result<RunReport, ConfigError> {
    let title = &config.report.title;
    let heading = escape_markdown(title);
    let offset = config.utc_offset()?;

    notifier.send(&format!("🚀 *{} started*", heading)).await;

    let mut timer = RunTimer::start(offset);
    info!("Start time: {}", timer.start_str());
    notifier
        .send(&format!("🕒 Start Time: {}", code_span(&timer.start_str())))
        .await;

    let pairs = match load_work(config) {
        Ok(pairs) => pairs,
        Err(e) => {
            error!("{}", e);
            notifier
                .send(&format!("❌ *{} aborted*: {}", heading, code_span(&e.to_string())))
                .await;
            return Err(e);
        }
    };

    let engine = build_engine(config, vcs, notifier.clone());
    let reports = engine.run_pairs(&pairs).await;

    timer.finish();
    let report = RunReport::new(title.clone(), timer, reports);

    info!(
        "Run finished in {}: {} pushed, {} failed",
        report.duration_str(),
        report.summary.successful_operations,
        report.summary.failed_operations
    );
    notifier.send(&report.render_message()).await;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::MockVersionControl;
    use crate::notify::MockNotifier;
    use assert_matches::assert_matches;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn recording_notifier() -> (MockNotifier, Arc<Mutex<Vec<String>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let recorded = sent.clone();
        let mut notifier = MockNotifier::new();
        notifier.expect_send().returning(move |message| {
            recorded.lock().unwrap().push(message.to_string());
        });
        (notifier, sent)
    }

    fn config_with_manifests(dir: &Path, sources: &str, destinations: &str) -> Config {
        let source_path = dir.join("clone_repos.txt");
        let destination_path = dir.join("push_repos.txt");
        std::fs::write(&source_path, sources).unwrap();
        std::fs::write(&destination_path, destinations).unwrap();

        let mut config = Config::default();
        config.manifests.sources = source_path.to_string_lossy().into_owned();
        config.manifests.destinations = destination_path.to_string_lossy().into_owned();
        config.workspace_root = Some(dir.join("work").to_string_lossy().into_owned());
        config
    }

    #[tokio::test]
    async fn test_execute_reports_every_pair() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = config_with_manifests(
            temp_dir.path(),
            "https://x/a.git main\nhttps://x/b.git dev\n",
            "org/a main2\norg/b dev2\n",
        );

        let mut vcs = MockVersionControl::new();
        vcs.expect_clone_branch()
            .times(2)
            .returning(|_, _, _| Ok(String::new()));
        vcs.expect_set_remote()
            .times(2)
            .returning(|_, _, _| Ok(String::new()));
        vcs.expect_force_push()
            .times(2)
            .returning(|_, _, _| Ok(String::new()));
        let (notifier, sent) = recording_notifier();

        let report = execute(&config, Arc::new(vcs), Arc::new(notifier))
            .await
            .expect("run should complete");

        assert_eq!(report.summary.total_repositories, 2);
        assert_eq!(report.summary.successful_operations, 2);
        assert!(report.timer.end_time().is_some());

        let sent = sent.lock().unwrap();
        assert_eq!(sent.first().map(String::as_str), Some("🚀 *Repo Mirror started*"));
        assert!(sent[1].starts_with("🕒 Start Time: `"));
        assert!(sent
            .last()
            .is_some_and(|m| m.starts_with("📊 *Repo Mirror Summary:*")));
    }

    #[tokio::test]
    async fn test_execute_aborts_on_mismatch_without_git_calls() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = config_with_manifests(
            temp_dir.path(),
            "https://x/a.git\nhttps://x/b.git dev\n",
            "org/a main2\norg/b dev2\n",
        );

        let mut vcs = MockVersionControl::new();
        vcs.expect_clone_branch().never();
        vcs.expect_set_remote().never();
        vcs.expect_force_push().never();
        let (notifier, sent) = recording_notifier();

        let result = execute(&config, Arc::new(vcs), Arc::new(notifier)).await;

        assert_matches!(result, Err(ConfigError::PairCountMismatch { .. }));
        assert!(!temp_dir.path().join("work").exists());
        assert!(sent
            .lock()
            .unwrap()
            .iter()
            .any(|m| m.starts_with("❌ *Repo Mirror aborted*")));
    }

    #[tokio::test]
    async fn test_execute_missing_manifest() {
        let mut config = Config::default();
        config.manifests.sources = "/nonexistent/clone_repos.txt".to_string();

        let mut vcs = MockVersionControl::new();
        vcs.expect_clone_branch().never();
        let (notifier, _sent) = recording_notifier();

        let result = execute(&config, Arc::new(vcs), Arc::new(notifier)).await;
        assert_matches!(result, Err(ConfigError::ManifestUnreadable { .. }));
    }

    #[test]
    fn test_load_work_prefers_pair_manifest() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let pairs_path = temp_dir.path().join("pairs.txt");
        std::fs::write(&pairs_path, "https://x/a.git main -> org/a main2\n").unwrap();

        let mut config = Config::default();
        config.manifests.sources = "/nonexistent/clone_repos.txt".to_string();
        config.manifests.pairs = Some(pairs_path.to_string_lossy().into_owned());

        let pairs = load_work(&config).expect("pair manifest should load");
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].destination.branch, "main2");
    }
}

/// Common test utilities and helpers for repomirror tests

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Run git in `dir` with a fixed identity, panicking on failure
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args([
            "-c",
            "user.name=Mirror Test",
            "-c",
            "user.email=mirror@test.invalid",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to execute git");

    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A scratch area with source repositories, bare destinations and a workspace
pub struct MirrorFixture {
    pub temp_dir: TempDir,
}

impl MirrorFixture {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn workspace(&self) -> PathBuf {
        self.root().join("work")
    }

    /// Create a non-bare source repository with one commit on `branch`
    pub fn source_repo(&self, name: &str, branch: &str) -> PathBuf {
        let path = self.root().join("sources").join(name);
        std::fs::create_dir_all(&path).expect("Failed to create source dir");

        git(&path, &["init", "-q"]);
        std::fs::write(path.join("README.md"), format!("# {}\n", name))
            .expect("Failed to write README");
        git(&path, &["add", "README.md"]);
        git(&path, &["commit", "-q", "-m", "initial"]);
        git(&path, &["branch", "-M", branch]);
        path
    }

    /// Create an empty bare destination repository
    pub fn destination_repo(&self, name: &str) -> PathBuf {
        let destinations = self.root().join("destinations");
        std::fs::create_dir_all(&destinations).expect("Failed to create destinations dir");
        git(&destinations, &["init", "-q", "--bare", &format!("{}.git", name)]);
        destinations.join(format!("{}.git", name))
    }

    /// Write both manifests and a config file pointing at them
    pub fn write_config(&self, sources: &[String], destinations: &[String]) -> PathBuf {
        let source_manifest = self.root().join("clone_repos.txt");
        let destination_manifest = self.root().join("push_repos.txt");
        std::fs::write(&source_manifest, sources.join("\n")).expect("Failed to write manifest");
        std::fs::write(&destination_manifest, destinations.join("\n"))
            .expect("Failed to write manifest");

        let config_path = self.root().join("config.yml");
        std::fs::write(
            &config_path,
            format!(
                r#"
workspace_root: "{}"
manifests:
  sources: "{}"
  destinations: "{}"
notify:
  enabled: false
git:
  timeout: 120
report:
  title: "Test Mirror"
"#,
                self.workspace().display(),
                source_manifest.display(),
                destination_manifest.display()
            ),
        )
        .expect("Failed to write test config");
        config_path
    }

    /// Run the binary with the given config
    pub fn run(&self, config: &Path, extra: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_repomirror"))
            .arg("--config")
            .arg(config)
            .args(extra)
            .env_remove("GITHUB_TOKEN")
            .env_remove("REPOMIRROR_PUSH_TOKEN")
            .env_remove("TELEGRAM_BOT_TOKEN")
            .env_remove("TELEGRAM_CHAT_ID")
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .current_dir(self.root())
            .output()
            .expect("Failed to execute repomirror")
    }
}

/// Resolve a ref in a bare repository, `None` if it does not exist
pub fn resolve_ref(bare_repo: &Path, reference: &str) -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--verify", "--quiet", reference])
        .current_dir(bare_repo)
        .output()
        .expect("Failed to execute git");

    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
}

pub fn assert_contains_all(text: &str, expected: &[&str]) {
    for item in expected {
        assert!(
            text.contains(item),
            "Expected text to contain '{}', but it didn't. Text: {}",
            item,
            text
        );
    }
}

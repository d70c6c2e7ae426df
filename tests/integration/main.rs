//! Integration tests for treestash

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;

    /// Binary with no ambient action environment leaking in
    pub fn treestash() -> Command {
        let mut cmd = cargo_bin_cmd!("treestash");
        for var in [
            "GITHUB_ACTIONS",
            "GITHUB_OUTPUT",
            "INPUT_S3BUCKET",
            "INPUT_OPERATION",
            "INPUT_REMOVEGITDIR",
            "INPUT_QUIET",
            "INPUT_TREEHASH",
            "TREESTASH_CONFIG",
            "RUST_LOG",
        ] {
            cmd.env_remove(var);
        }
        cmd
    }

    #[test]
    fn help_displays() {
        treestash()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("git source trees in S3"));
    }

    #[test]
    fn version_displays() {
        treestash()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("treestash"));
    }

    #[test]
    fn invalid_operation_fails() {
        treestash()
            .args(["--s3-bucket", "my-bucket", "--operation", "purge"])
            .assert()
            .failure()
            .stderr(predicate::str::contains(
                "Operation: purge is invalid. Should be either cache or fetch",
            ));
    }

    #[test]
    fn invalid_operation_reported_as_workflow_error() {
        treestash()
            .env("GITHUB_ACTIONS", "true")
            .env("INPUT_S3BUCKET", "my-bucket")
            .env("INPUT_OPERATION", "purge")
            .assert()
            .failure()
            .stdout(predicate::str::contains("::error::Operation: purge is invalid"));
    }

    #[test]
    fn fetch_requires_tree_hash() {
        treestash()
            .args(["--s3-bucket", "my-bucket", "--operation", "fetch"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("treeHash"));
    }

    #[test]
    fn bucket_required() {
        treestash()
            .args(["--operation", "cache"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("s3Bucket"));
    }
}

mod local_store_tests {
    use super::cli_tests::treestash;
    use predicates::prelude::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::process::Command as StdCommand;
    use tempfile::TempDir;

    fn git(dir: &Path, args: &[&str]) -> String {
        let output = StdCommand::new("git")
            .args([
                "-c",
                "user.name=treestash",
                "-c",
                "user.email=treestash@example.com",
                "-c",
                "commit.gpgsign=false",
            ])
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap();
        assert!(output.status.success(), "git {:?} failed", args);
        String::from_utf8(output.stdout).unwrap().trim().to_string()
    }

    struct Fixture {
        repo: TempDir,
        store: TempDir,
        scratch: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let repo = TempDir::new().unwrap();
            git(repo.path(), &["init", "-q"]);
            fs::create_dir_all(repo.path().join("src")).unwrap();
            fs::write(repo.path().join("README.md"), "# demo\n").unwrap();
            fs::write(repo.path().join("src/main.rs"), "fn main() {}\n").unwrap();
            git(repo.path(), &["add", "-A"]);
            git(repo.path(), &["commit", "-q", "-m", "initial"]);

            let store = TempDir::new().unwrap();
            let scratch = TempDir::new().unwrap();
            fs::write(
                scratch.path().join("treestash.toml"),
                format!(
                    "[store]\nbackend = \"local\"\nlocal_root = {:?}\n",
                    store.path().display().to_string()
                ),
            )
            .unwrap();

            Self {
                repo,
                store,
                scratch,
            }
        }

        fn config(&self) -> PathBuf {
            self.scratch.path().join("treestash.toml")
        }

        fn output_file(&self) -> PathBuf {
            self.scratch.path().join("github_output")
        }

        fn tree_hash(&self) -> String {
            git(self.repo.path(), &["rev-parse", "HEAD:"])
        }

        fn object(&self, hash: &str) -> PathBuf {
            self.store.path().join("my-bucket").join(format!("{}.zip", hash))
        }

        fn cache(&self) -> assert_cmd::assert::Assert {
            treestash()
                .env("GITHUB_OUTPUT", self.output_file())
                .args(["--s3-bucket", "my-bucket", "--operation", "cache", "--quiet"])
                .arg("--config")
                .arg(self.config())
                .arg("-C")
                .arg(self.repo.path())
                .assert()
        }
    }

    #[test]
    fn cache_uploads_and_sets_output() {
        let fixture = Fixture::new();
        let hash = fixture.tree_hash();

        fixture.cache().success();

        assert!(fixture.object(&hash).is_file());
        let outputs = fs::read_to_string(fixture.output_file()).unwrap();
        assert_eq!(outputs, format!("treeHash={}\n", hash));
    }

    #[test]
    fn second_cache_is_noop() {
        let fixture = Fixture::new();
        let hash = fixture.tree_hash();

        fixture.cache().success();
        let first = fs::metadata(fixture.object(&hash)).unwrap().modified().unwrap();

        fixture
            .cache()
            .success()
            .stdout(predicate::str::contains("has already been cached"));
        let second = fs::metadata(fixture.object(&hash)).unwrap().modified().unwrap();

        assert_eq!(first, second);
        let outputs = fs::read_to_string(fixture.output_file()).unwrap();
        assert_eq!(outputs.lines().count(), 2);
    }

    #[test]
    fn cache_then_fetch_restores_tree() {
        let fixture = Fixture::new();
        let hash = fixture.tree_hash();
        fixture.cache().success();

        let target = TempDir::new().unwrap();
        treestash()
            .args(["--s3-bucket", "my-bucket", "--operation", "fetch"])
            .args(["--tree-hash", hash.as_str()])
            .arg("--config")
            .arg(fixture.config())
            .arg("-C")
            .arg(target.path())
            .assert()
            .success();

        assert_eq!(
            fs::read_to_string(target.path().join("src/main.rs")).unwrap(),
            "fn main() {}\n"
        );
        assert_eq!(
            fs::read_to_string(target.path().join("README.md")).unwrap(),
            "# demo\n"
        );
        assert!(target.path().join(".git").is_dir());
        assert!(!target.path().join(format!("{}.zip", hash)).exists());
    }

    #[test]
    fn remove_git_dir_excludes_metadata() {
        let fixture = Fixture::new();
        let hash = fixture.tree_hash();

        treestash()
            .env("GITHUB_OUTPUT", fixture.output_file())
            .env("INPUT_S3BUCKET", "my-bucket")
            .env("INPUT_OPERATION", "cache")
            .env("INPUT_REMOVEGITDIR", "true")
            .env("INPUT_QUIET", "true")
            .arg("--config")
            .arg(fixture.config())
            .arg("-C")
            .arg(fixture.repo.path())
            .assert()
            .success();

        assert!(!fixture.repo.path().join(".git").exists());

        let target = TempDir::new().unwrap();
        treestash()
            .args(["--s3-bucket", "my-bucket", "--operation", "fetch"])
            .args(["--tree-hash", hash.as_str()])
            .arg("--config")
            .arg(fixture.config())
            .arg("-C")
            .arg(target.path())
            .assert()
            .success();

        assert!(target.path().join("src/main.rs").is_file());
        assert!(!target.path().join(".git").exists());
    }

    #[test]
    fn uppercase_true_keeps_git_dir() {
        let fixture = Fixture::new();

        treestash()
            .env("GITHUB_OUTPUT", fixture.output_file())
            .env("INPUT_S3BUCKET", "my-bucket")
            .env("INPUT_OPERATION", "cache")
            .env("INPUT_REMOVEGITDIR", "TRUE")
            .env("INPUT_QUIET", "true")
            .arg("--config")
            .arg(fixture.config())
            .arg("-C")
            .arg(fixture.repo.path())
            .assert()
            .success();

        assert!(fixture.repo.path().join(".git").is_dir());
    }

    #[test]
    fn fetch_unknown_hash_fails_cleanly() {
        let fixture = Fixture::new();
        let target = TempDir::new().unwrap();

        treestash()
            .args(["--s3-bucket", "my-bucket", "--operation", "fetch"])
            .args(["--tree-hash", "deadbeef"])
            .arg("--config")
            .arg(fixture.config())
            .arg("-C")
            .arg(target.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("NoSuchKey"));

        assert_eq!(fs::read_dir(target.path()).unwrap().count(), 0);
    }

    #[test]
    fn cache_outside_repository_fails() {
        let fixture = Fixture::new();
        let not_a_repo = TempDir::new().unwrap();

        treestash()
            .args(["--s3-bucket", "my-bucket", "--operation", "cache"])
            .arg("--config")
            .arg(fixture.config())
            .arg("-C")
            .arg(not_a_repo.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("git rev-parse failed"));
    }
}

//! S3 object store using the AWS CLI
//!
//! Every operation is one `aws` invocation. Credentials, retries and
//! region resolution are whatever the CLI does on its own.

use crate::config::StoreConfig;
use crate::error::{TreestashError, TreestashResult};
use crate::store::backend::{ObjectStore, Probe};
use async_trait::async_trait;
use serde::Deserialize;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tracing::debug;

/// Object store backed by `aws s3api` / `aws s3 cp`
pub struct AwsCliStore {
    binary: String,
    region: Option<String>,
    profile: Option<String>,
    endpoint_url: Option<String>,
}

impl AwsCliStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            binary: config.aws_cli.clone(),
            region: config.region.clone(),
            profile: config.profile.clone(),
            endpoint_url: config.endpoint_url.clone(),
        }
    }

    /// Build an `aws` command with the configured global options
    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args);

        if let Some(region) = &self.region {
            cmd.args(["--region", region]);
        }

        if let Some(profile) = &self.profile {
            cmd.args(["--profile", profile]);
        }

        if let Some(endpoint) = &self.endpoint_url {
            cmd.args(["--endpoint-url", endpoint]);
        }

        cmd
    }

    fn s3_uri(bucket: &str, key: &str) -> String {
        format!("s3://{}/{}", bucket, key)
    }
}

#[async_trait]
impl ObjectStore for AwsCliStore {
    async fn probe(&self, bucket: &str, key: &str) -> Probe {
        debug!("Executing: {} s3api head-object --bucket {} --key {}", self.binary, bucket, key);

        let output = self
            .command(&["s3api", "head-object", "--bucket", bucket, "--key", key, "--output", "json"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => return Probe::Unknown(format!("failed to run {}: {}", self.binary, e)),
        };

        if output.status.success() {
            match serde_json::from_slice::<HeadObjectResponse>(&output.stdout) {
                Ok(head) => debug!(
                    "head-object: {} bytes, etag {}",
                    head.content_length.unwrap_or_default(),
                    head.etag.as_deref().unwrap_or("-")
                ),
                Err(e) => debug!("Unparsed head-object response: {}", e),
            }
            return Probe::Present;
        }

        classify_head_failure(&String::from_utf8_lossy(&output.stderr))
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> TreestashResult<()> {
        let uri = Self::s3_uri(bucket, key);
        debug!("Executing: {} s3 cp - {} ({} bytes)", self.binary, uri, body.len());

        let upload_error = |reason: String| TreestashError::Upload {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason,
        };

        let mut child = self
            .command(&["s3", "cp", "-", &uri, "--only-show-errors"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TreestashError::command_failed(format!("{} s3 cp - {}", self.binary, uri), e))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| upload_error("stdin not captured".to_string()))?;
        let write_result = stdin.write_all(&body).await;
        // Closing stdin signals end of body
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| TreestashError::command_failed(format!("{} s3 cp - {}", self.binary, uri), e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_credentials_error(&stderr) {
                return Err(TreestashError::AwsNotConfigured);
            }
            return Err(upload_error(failure_reason(output.status, &stderr)));
        }

        write_result.map_err(|e| upload_error(e.to_string()))
    }

    async fn get(
        &self,
        bucket: &str,
        key: &str,
        writer: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> TreestashResult<u64> {
        let uri = Self::s3_uri(bucket, key);
        debug!("Executing: {} s3 cp {} -", self.binary, uri);

        let download_error = |reason: String| TreestashError::Download {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason,
        };

        let mut child = self
            .command(&["s3", "cp", &uri, "-", "--only-show-errors"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TreestashError::command_failed(format!("{} s3 cp {} -", self.binary, uri), e))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| download_error("stdout not captured".to_string()))?;

        // Drained separately so a chatty stderr cannot stall the body stream
        let stderr_task = child.stderr.take().map(|stderr| tokio::spawn(read_stderr(stderr)));

        let copied = tokio::io::copy(&mut stdout, &mut *writer).await;
        if copied.is_err() {
            let _ = child.start_kill();
        }
        drop(stdout);

        let status = child
            .wait()
            .await
            .map_err(|e| TreestashError::command_failed(format!("{} s3 cp {} -", self.binary, uri), e))?;
        let stderr = match stderr_task {
            Some(task) => task
                .await
                .unwrap_or_else(|e| format!("stderr reader failed: {}", e)),
            None => String::new(),
        };

        let copied = copied.map_err(|e| download_error(format!("writing local file: {}", e)))?;

        if !status.success() {
            if is_credentials_error(&stderr) {
                return Err(TreestashError::AwsNotConfigured);
            }
            return Err(download_error(failure_reason(status, &stderr)));
        }

        writer
            .flush()
            .await
            .map_err(|e| download_error(format!("flushing local file: {}", e)))?;

        Ok(copied)
    }

    fn backend_name(&self) -> &'static str {
        "aws-cli"
    }
}

/// Collect a child's stderr, keeping whatever was read before a failure
async fn read_stderr<R: AsyncRead + Unpin>(mut stderr: R) -> String {
    let mut buf = Vec::new();
    let result = stderr.read_to_end(&mut buf).await;
    let mut text = String::from_utf8_lossy(&buf).into_owned();
    if let Err(e) = result {
        text.push_str(&format!("\n(stderr unreadable: {})", e));
    }
    text
}

/// Error reason for a failed `aws` run, never empty
fn failure_reason(status: ExitStatus, stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("aws exited with {} and no output", status)
    } else {
        stderr.to_string()
    }
}

/// Map a failed head-object call to absent or unknown
///
/// Only an explicit not-found counts as absent. Anything else means the
/// store could not answer.
fn classify_head_failure(stderr: &str) -> Probe {
    let stderr = stderr.trim();
    if stderr.contains("(404)") || stderr.contains("Not Found") || stderr.contains("NoSuchKey") {
        Probe::Absent
    } else if stderr.is_empty() {
        Probe::Unknown("head-object failed without output".to_string())
    } else {
        Probe::Unknown(stderr.to_string())
    }
}

fn is_credentials_error(stderr: &str) -> bool {
    stderr.contains("Unable to locate credentials") || stderr.contains("could not be found")
}

#[derive(Deserialize)]
struct HeadObjectResponse {
    #[serde(rename = "ContentLength")]
    content_length: Option<u64>,
    #[serde(rename = "ETag")]
    etag: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_absent() {
        let stderr = "\nAn error occurred (404) when calling the HeadObject operation: Not Found\n";
        assert_eq!(classify_head_failure(stderr), Probe::Absent);
    }

    #[test]
    fn forbidden_is_unknown() {
        let stderr = "An error occurred (403) when calling the HeadObject operation: Forbidden";
        assert!(matches!(classify_head_failure(stderr), Probe::Unknown(reason) if reason.contains("403")));
    }

    #[test]
    fn network_error_is_unknown() {
        let stderr = "Could not connect to the endpoint URL: \"https://my-bucket.s3.amazonaws.com/abc.zip\"";
        assert!(matches!(classify_head_failure(stderr), Probe::Unknown(_)));
        assert!(matches!(classify_head_failure(""), Probe::Unknown(_)));
    }

    /// Yields some bytes, then fails like a broken pipe
    struct FailingReader {
        sent: bool,
    }

    impl AsyncRead for FailingReader {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            if self.sent {
                return std::task::Poll::Ready(Err(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "pipe closed",
                )));
            }
            self.sent = true;
            buf.put_slice(b"partial warning");
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn stderr_read_failure_is_reported() {
        let text = read_stderr(FailingReader { sent: false }).await;
        assert!(text.starts_with("partial warning"));
        assert!(text.contains("stderr unreadable: pipe closed"));
    }

    #[tokio::test]
    async fn stderr_read_collects_output() {
        let text = read_stderr(&b"fatal error: NoSuchKey"[..]).await;
        assert_eq!(text, "fatal error: NoSuchKey");
    }

    #[cfg(unix)]
    #[test]
    fn empty_stderr_reason_names_exit_status() {
        use std::os::unix::process::ExitStatusExt;

        let reason = failure_reason(ExitStatus::from_raw(1 << 8), "  \n");
        assert!(reason.contains("exit status: 1"));
        assert_eq!(failure_reason(ExitStatus::from_raw(1 << 8), "boom\n"), "boom");
    }

    #[test]
    fn credentials_error_detected() {
        assert!(is_credentials_error("Unable to locate credentials. You can configure credentials by running \"aws configure\"."));
        assert!(!is_credentials_error("Forbidden"));
    }

    #[test]
    fn parse_head_object_response() {
        let json = r#"{
            "AcceptRanges": "bytes",
            "LastModified": "2024-01-01T12:00:00+00:00",
            "ContentLength": 2048,
            "ETag": "\"d41d8cd98f00b204e9800998ecf8427e\"",
            "ContentType": "application/zip",
            "Metadata": {}
        }"#;

        let head: HeadObjectResponse = serde_json::from_str(json).unwrap();
        assert_eq!(head.content_length, Some(2048));
        assert!(head.etag.unwrap().contains("d41d8cd9"));
    }

    #[test]
    fn global_options_appended() {
        let config = StoreConfig {
            region: Some("eu-west-1".into()),
            profile: Some("ci".into()),
            endpoint_url: Some("http://localhost:9000".into()),
            ..Default::default()
        };
        let store = AwsCliStore::new(&config);
        let cmd = store.command(&["s3api", "head-object"]);
        let args: Vec<_> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            args,
            [
                "s3api",
                "head-object",
                "--region",
                "eu-west-1",
                "--profile",
                "ci",
                "--endpoint-url",
                "http://localhost:9000"
            ]
        );
    }

    #[tokio::test]
    async fn missing_binary_probe_is_unknown() {
        let config = StoreConfig {
            aws_cli: "treestash-no-such-aws".into(),
            ..Default::default()
        };
        let store = AwsCliStore::new(&config);
        assert!(matches!(store.probe("b", "k.zip").await, Probe::Unknown(_)));
    }

    #[tokio::test]
    async fn missing_binary_put_fails() {
        let config = StoreConfig {
            aws_cli: "treestash-no-such-aws".into(),
            ..Default::default()
        };
        let store = AwsCliStore::new(&config);
        let err = store.put("b", "k.zip", vec![1, 2, 3]).await.unwrap_err();
        assert!(matches!(err, TreestashError::CommandFailed { .. }));
    }
}

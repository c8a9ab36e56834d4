use async_trait::async_trait;
use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::{Duration, Instant},
};
use tokio::{io::AsyncReadExt, process::Command, time::sleep_until};

use crate::table::ResultTable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcaJob {
    pub upload_path: PathBuf,
    /// Output prefix; the routine writes `<base>.csv` and `<base>.html`.
    pub result_base: PathBuf,
}

#[derive(Debug, Clone)]
pub struct PcaOutput {
    /// Whatever the routine reports about its fitted model, kept opaque.
    pub raw_model: String,
    pub table: ResultTable,
}

/// Vectorize an upload and run PCA over it in one opaque step.
#[async_trait]
pub trait PcaRoutine: Send + Sync {
    async fn compute(&self, job: &PcaJob) -> Result<PcaOutput, String>;
}

#[derive(Debug, Clone)]
pub struct CommandPcaConfig {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
    pub output_limit_bytes: u64,
}

/// Runs an external program as `<program> <args..> <upload> <result_base>`
/// and loads the CSV it leaves behind.
pub struct CommandPcaRoutine {
    config: CommandPcaConfig,
}

impl CommandPcaRoutine {
    pub fn new(config: CommandPcaConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PcaRoutine for CommandPcaRoutine {
    async fn compute(&self, job: &PcaJob) -> Result<PcaOutput, String> {
        let csv_path = with_suffix(&job.result_base, ".csv");
        let html_path = with_suffix(&job.result_base, ".html");
        // Artifacts from an earlier run of the same upload must not be reused.
        remove_stale(&csv_path).await?;
        remove_stale(&html_path).await?;

        let stdout = self.run(job).await?;

        let table = ResultTable::load_csv(&csv_path)
            .await
            .map_err(|err| format!("load {}: {err}", csv_path.display()))?;

        if !tokio::fs::try_exists(&html_path).await.unwrap_or(false) {
            tokio::fs::write(&html_path, table.to_html())
                .await
                .map_err(|err| format!("write {}: {err}", html_path.display()))?;
        }

        Ok(PcaOutput {
            raw_model: stdout,
            table,
        })
    }
}

impl CommandPcaRoutine {
    async fn run(&self, job: &PcaJob) -> Result<String, String> {
        let mut command = Command::new(self.config.program.as_str());
        command
            .args(&self.config.args)
            .arg(&job.upload_path)
            .arg(&job.result_base)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let started_at = Instant::now();
        let mut child = command
            .spawn()
            .map_err(|err| format!("spawn {}: {err}", self.config.program))?;
        let stdout = child.stdout.take().ok_or("stdout unavailable")?;
        let stderr = child.stderr.take().ok_or("stderr unavailable")?;

        let limit = self.config.output_limit_bytes;
        let deadline = tokio::time::Instant::now() + self.config.timeout;
        let reading = async {
            tokio::try_join!(read_limited(stdout, limit), read_limited(stderr, limit))
        };
        tokio::pin!(reading);

        let outcome = tokio::select! {
            result = &mut reading => result,
            _ = sleep_until(deadline) => Err(self.timed_out()),
        };
        let (stdout_bytes, stderr_bytes) = match outcome {
            Ok(bytes) => bytes,
            Err(err) => {
                let _ = child.kill().await;
                return Err(err);
            }
        };

        // Output is closed; the process may still linger before exiting.
        let status = tokio::select! {
            result = child.wait() => result.map_err(|err| format!("wait: {err}"))?,
            _ = sleep_until(deadline) => {
                let _ = child.kill().await;
                return Err(self.timed_out());
            }
        };
        let stderr_text = String::from_utf8_lossy(&stderr_bytes).trim().to_string();

        tracing::info!(
            program = self.config.program.as_str(),
            upload = %job.upload_path.display(),
            duration_ms = started_at.elapsed().as_millis() as u64,
            exit_code = ?status.code(),
            "pca routine finished"
        );

        if !status.success() {
            return Err(format!("pca routine exited with {status}: {stderr_text}"));
        }
        Ok(String::from_utf8_lossy(&stdout_bytes).trim().to_string())
    }

    fn timed_out(&self) -> String {
        format!(
            "pca routine timed out after {}s",
            self.config.timeout.as_secs_f32()
        )
    }
}

async fn remove_stale(path: &Path) -> Result<(), String> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(format!("remove {}: {err}", path.display())),
    }
}

async fn read_limited<R: tokio::io::AsyncRead + Unpin>(
    mut reader: R,
    limit_bytes: u64,
) -> Result<Vec<u8>, String> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let read = reader
            .read(&mut chunk)
            .await
            .map_err(|err| format!("read: {err}"))?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
        if buffer.len() as u64 > limit_bytes {
            return Err("output limit exceeded".to_string());
        }
    }
    Ok(buffer)
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut path = base.as_os_str().to_owned();
    path.push(suffix);
    PathBuf::from(path)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell(script: &str, timeout: Duration) -> CommandPcaRoutine {
        shell_with_limit(script, timeout, 1024 * 1024)
    }

    fn shell_with_limit(script: &str, timeout: Duration, limit: u64) -> CommandPcaRoutine {
        CommandPcaRoutine::new(CommandPcaConfig {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string(), "pca".to_string()],
            timeout,
            output_limit_bytes: limit,
        })
    }

    fn job(dir: &Path) -> PcaJob {
        PcaJob {
            upload_path: dir.join("data.txt"),
            result_base: dir.join("data"),
        }
    }

    #[test]
    fn appends_suffix_without_touching_dots() {
        assert_eq!(
            with_suffix(Path::new("results/archive.tar"), ".csv"),
            PathBuf::from("results/archive.tar.csv")
        );
    }

    #[tokio::test]
    async fn loads_table_and_renders_missing_html() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = r#"printf ',PC1,PC2,PC3,PC4,PC5,PC6,PC7,PC8\n0,a,b,c,d,e,f,g,h\n' > "$2.csv"; echo fitted"#;
        let output = shell(script, Duration::from_secs(10))
            .compute(&job(dir.path()))
            .await
            .expect("compute");

        assert_eq!(output.raw_model, "fitted");
        assert_eq!(output.table.columns.len(), 9);
        assert_eq!(output.table.rows, vec![vec!["0", "a", "b", "c", "d", "e", "f", "g", "h"]]);
        let html = std::fs::read_to_string(dir.path().join("data.html")).expect("html");
        assert!(html.contains("<td>h</td>"));
    }

    #[tokio::test]
    async fn keeps_html_written_by_the_routine() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = r#"printf ',PC1\n0,a\n' > "$2.csv"; printf 'custom' > "$2.html""#;
        shell(script, Duration::from_secs(10))
            .compute(&job(dir.path()))
            .await
            .expect("compute");
        let html = std::fs::read_to_string(dir.path().join("data.html")).expect("html");
        assert_eq!(html, "custom");
    }

    #[tokio::test]
    async fn non_zero_exit_reports_stderr() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = shell("echo vectorizer exploded >&2; exit 3", Duration::from_secs(10))
            .compute(&job(dir.path()))
            .await
            .expect_err("failure");
        assert!(err.contains("vectorizer exploded"), "{err}");
    }

    #[tokio::test]
    async fn missing_csv_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = shell("true", Duration::from_secs(10))
            .compute(&job(dir.path()))
            .await
            .expect_err("no csv");
        assert!(err.contains("data.csv"), "{err}");
    }

    #[tokio::test]
    async fn slow_routines_time_out() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = shell("sleep 5", Duration::from_millis(100))
            .compute(&job(dir.path()))
            .await
            .expect_err("timeout");
        assert!(err.contains("timed out"), "{err}");
    }

    #[tokio::test]
    async fn repeat_runs_never_reuse_earlier_artifacts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let job = job(dir.path());
        let timeout = Duration::from_secs(10);

        shell(r#"printf ',PC1\n0,first\n' > "$2.csv""#, timeout)
            .compute(&job)
            .await
            .expect("first run");
        let second = shell(r#"printf ',PC1\n0,second\n' > "$2.csv""#, timeout)
            .compute(&job)
            .await
            .expect("second run");
        assert_eq!(second.table.rows, vec![vec!["0", "second"]]);

        let html = std::fs::read_to_string(dir.path().join("data.html")).expect("html");
        assert!(html.contains("second"));
        assert!(!html.contains("first"));

        let err = shell("true", timeout)
            .compute(&job)
            .await
            .expect_err("nothing written");
        assert!(err.contains("data.csv"), "{err}");
        assert!(!dir.path().join("data.html").exists());
    }

    #[tokio::test]
    async fn oversized_output_stops_the_routine() {
        let dir = tempfile::tempdir().expect("tempdir");
        let started = Instant::now();
        let err = shell_with_limit(
            "head -c 200000 /dev/zero; sleep 30",
            Duration::from_secs(20),
            1024,
        )
        .compute(&job(dir.path()))
        .await
        .expect_err("limit");
        assert!(err.contains("output limit exceeded"), "{err}");
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}

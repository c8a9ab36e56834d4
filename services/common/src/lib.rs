//! Shared start-up plumbing for the explorer binaries: tracing, typed
//! environment lookups, listener binding and shutdown handling.

use std::{
    env, fs,
    net::SocketAddr,
    panic,
    path::{Path, PathBuf},
    str::FromStr,
    thread,
    time::{Duration, SystemTime},
};
use tokio::net::TcpListener;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Keeps the non-blocking file writer alive; drop it only on exit.
pub struct TracingGuards {
    _file_guard: Option<WorkerGuard>,
}

impl TracingGuards {
    pub fn has_file_output(&self) -> bool {
        self._file_guard.is_some()
    }
}

pub fn init_tracing(service_name: &str) -> TracingGuards {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_root = PathBuf::from(env_string("LOG_DIR", "logs")).join(service_name);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let (file_layer, file_guard) = match open_log_writer(&log_root, service_name) {
        Some((writer, guard)) => {
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    if let Some(layer) = file_layer {
        let subscriber = Registry::default()
            .with(filter)
            .with(stdout_layer)
            .with(layer);
        let _ = tracing::subscriber::set_global_default(subscriber);
    } else {
        let subscriber = Registry::default().with(filter).with(stdout_layer);
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    if file_guard.is_some() {
        let retention_days = env_or("LOG_RETENTION_DAYS", 14u64);
        let cleanup_interval = env_or("LOG_CLEANUP_INTERVAL_MINUTES", 360u64);
        spawn_log_cleanup(log_root.clone(), retention_days, cleanup_interval);
        tracing::info!(log_root = %log_root.display(), "file logging enabled");
    }

    TracingGuards {
        _file_guard: file_guard,
    }
}

fn open_log_writer(
    log_root: &Path,
    service_name: &str,
) -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    fs::create_dir_all(log_root).ok()?;
    // The rolling appender panics when the directory is not writable.
    let appender = panic::catch_unwind(|| {
        tracing_appender::rolling::daily(log_root, format!("{service_name}.log"))
    })
    .ok()?;
    Some(tracing_appender::non_blocking(appender))
}

/// Parse a typed environment value, falling back to `default` when the
/// variable is missing or does not parse.
pub fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<T>().ok())
        .unwrap_or(default)
}

pub fn env_string(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Split a list-valued variable on commas and whitespace.
pub fn env_list(key: &str, default: &[&str]) -> Vec<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => split_list(&value),
        _ => default.iter().map(|item| item.to_string()).collect(),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn spawn_log_cleanup(log_root: PathBuf, retention_days: u64, cleanup_interval_minutes: u64) {
    if retention_days == 0 || cleanup_interval_minutes == 0 {
        return;
    }

    let retention = Duration::from_secs(retention_days * 24 * 60 * 60);
    let interval = Duration::from_secs(cleanup_interval_minutes * 60);

    thread::spawn(move || loop {
        if let Some(cutoff) = SystemTime::now().checked_sub(retention) {
            cleanup_old_logs(&log_root, cutoff);
        }
        thread::sleep(interval);
    });
}

fn cleanup_old_logs(root: &Path, cutoff: SystemTime) -> usize {
    let Ok(entries) = fs::read_dir(root) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            removed += cleanup_old_logs(&path, cutoff);
            continue;
        }
        let modified = fs::metadata(&path).and_then(|metadata| metadata.modified());
        if matches!(modified, Ok(modified) if modified < cutoff) && fs::remove_file(&path).is_ok() {
            removed += 1;
        }
    }
    removed
}

pub async fn bind_listener(port: u16) -> TcpListener {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    TcpListener::bind(addr).await.expect("bind listener")
}

pub async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("sigterm handler");
        tokio::select! {
            _ = ctrl_c => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }

    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_lists_on_commas_and_spaces() {
        assert_eq!(split_list("txt, pdf,,png  gif"), vec!["txt", "pdf", "png", "gif"]);
        assert!(split_list(" , ").is_empty());
    }

    #[test]
    fn env_or_falls_back_on_unparsable_values() {
        env::set_var("PCA_EXPLORER_COMMON_TEST_PORT", "not-a-port");
        assert_eq!(env_or("PCA_EXPLORER_COMMON_TEST_PORT", 5000u16), 5000);
        env::set_var("PCA_EXPLORER_COMMON_TEST_PORT", "6000");
        assert_eq!(env_or("PCA_EXPLORER_COMMON_TEST_PORT", 5000u16), 6000);
    }

    #[test]
    fn cleanup_removes_only_files_older_than_cutoff() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("nested");
        fs::create_dir_all(&nested).expect("nested dir");
        fs::write(dir.path().join("a.log"), "a").expect("write a");
        fs::write(nested.join("b.log"), "b").expect("write b");

        let past = SystemTime::now() - Duration::from_secs(3600);
        assert_eq!(cleanup_old_logs(dir.path(), past), 0);
        assert!(dir.path().join("a.log").exists());

        let future = SystemTime::now() + Duration::from_secs(3600);
        assert_eq!(cleanup_old_logs(dir.path(), future), 2);
        assert!(!nested.join("b.log").exists());
    }
}

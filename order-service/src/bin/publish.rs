//! Order Publisher Binary
//!
//! Publishes order JSON files to the order subject.
//!
//! Usage:
//!   order-publish <file.json | directory>
//!
//! A directory is walked recursively and every `*.json` file is published in
//! path order. Channel settings come from the same `ORDER_NATS_*` variables
//! the service reads.

use std::path::{Path, PathBuf};

use order_events::{NatsChannel, Publisher};
use order_service::{nats_from_env, ApiError, ApiResult};

#[tokio::main]
async fn main() -> ApiResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let target = std::env::args_os().nth(1).map(PathBuf::from).ok_or_else(|| {
        ApiError::invalid_input("usage: order-publish <file.json | directory>")
    })?;

    let files = collect_json_files(&target)?;
    if files.is_empty() {
        tracing::warn!(path = %target.display(), "no .json files found");
        return Ok(());
    }

    let channel = NatsChannel::connect(nats_from_env()).await?;

    let mut failed = 0usize;
    for file in &files {
        let payload = match std::fs::read(file) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(file = %file.display(), error = %e, "read failed");
                failed += 1;
                continue;
            }
        };
        match channel.publish(payload).await {
            Ok(sequence) => tracing::info!(file = %file.display(), sequence, "published"),
            Err(e) => {
                tracing::error!(file = %file.display(), error = %e, "publish failed");
                failed += 1;
            }
        }
    }

    channel.flush().await?;

    tracing::info!(published = files.len() - failed, failed, "done");
    if failed > 0 {
        return Err(ApiError::channel_error(format!(
            "{} of {} files were not published",
            failed,
            files.len()
        )));
    }
    Ok(())
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// A single `.json` file, or every `.json` file below a directory, sorted.
fn collect_json_files(target: &Path) -> ApiResult<Vec<PathBuf>> {
    let metadata = std::fs::metadata(target)?;
    if metadata.is_file() {
        if !is_json(target) {
            return Err(ApiError::invalid_input(format!(
                "{} is not a .json file",
                target.display()
            )));
        }
        return Ok(vec![target.to_path_buf()]);
    }

    let mut files = Vec::new();
    let mut dirs = vec![target.to_path_buf()];
    while let Some(dir) = dirs.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                dirs.push(path);
            } else if is_json(&path) {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

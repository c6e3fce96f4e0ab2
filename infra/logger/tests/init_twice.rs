use std::fs;
use std::time::Duration;
use tempfile::tempdir;
use vexil_logger::{LevelFilter, Logger, LoggerError};

#[test]
fn second_install_is_rejected_and_first_keeps_writing() -> Result<(), Box<dyn std::error::Error>> {
    let tmp_dir = tempdir()?;

    let first = Logger::builder()
        .name("vexil-first")
        .console(false)
        .path(tmp_dir.path())
        .env_filter("warn,vexil_engine=debug")
        .init()?;

    let err = Logger::builder().name("vexil-second").level(LevelFilter::TRACE).init().unwrap_err();
    assert!(matches!(err, LoggerError::Subscriber { .. }), "got {err}");

    tracing::debug!(target: "vexil_engine", "selection materialized");
    tracing::info!(target: "vexil_storage", "filtered out");

    std::thread::sleep(Duration::from_millis(30));
    drop(first);

    let contents: String = fs::read_dir(tmp_dir.path())?
        .flatten()
        .filter_map(|entry| fs::read_to_string(entry.path()).ok())
        .collect();
    assert!(contents.contains("selection materialized"));
    assert!(!contents.contains("filtered out"));

    Ok(())
}

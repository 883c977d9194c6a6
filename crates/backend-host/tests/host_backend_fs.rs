use std::path::PathBuf;
use std::time::Duration;

use backend_host::{HostBackend, HostBackendConfig, NO_TOOLKIT_MESSAGE};
use latchkey_protocol::{
    BackendError, BackendInfo, FileAccess, ShellExecutor, StageId, StageRunner,
};

fn host_backend() -> HostBackend {
    HostBackend::new(HostBackendConfig {
        shell: PathBuf::from("/bin/sh"),
        toolkit: None,
        command_timeout: Duration::from_secs(10),
    })
}

fn path_str(path: &std::path::Path) -> String {
    path.to_string_lossy().into_owned()
}

#[tokio::test]
async fn health_check_succeeds_with_a_real_shell() {
    host_backend().health_check().await.expect("health check");
}

#[tokio::test]
async fn health_check_fails_with_a_missing_shell() {
    let backend = HostBackend::new(HostBackendConfig {
        shell: PathBuf::from("/nonexistent/latchkey-shell"),
        toolkit: None,
        command_timeout: Duration::from_secs(2),
    });
    let error = backend.health_check().await.expect_err("must fail");
    assert!(matches!(error, BackendError::Unreachable(_)));
}

#[tokio::test]
async fn execute_line_captures_stdout_and_stderr() {
    let backend = host_backend();
    let output = backend
        .execute_line("echo out; echo err 1>&2")
        .await
        .expect("execute line");
    assert!(output.contains("out"));
    assert!(output.contains("err"));
}

#[tokio::test]
async fn execute_line_with_non_zero_exit_still_returns_output() {
    let backend = host_backend();
    let output = backend
        .execute_line("echo before-failure; false")
        .await
        .expect("execute line");
    assert!(output.contains("before-failure"));
}

#[tokio::test]
async fn run_stage_without_toolkit_reports_skipped_success() {
    let backend = host_backend();
    let report = backend
        .run_stage(&StageId::new("patch-kernel"))
        .await
        .expect("run stage");
    assert!(report.success);
    assert_eq!(report.message, NO_TOOLKIT_MESSAGE);
}

#[tokio::test]
async fn run_stage_uses_the_configured_toolkit_binary() {
    let dir = tempfile::tempdir().expect("tempdir");
    let toolkit = dir.path().join("toolkit.sh");
    std::fs::write(&toolkit, "#!/bin/sh\necho stage $2 done\n").expect("write toolkit");
    let mut permissions = std::fs::metadata(&toolkit).expect("metadata").permissions();
    std::os::unix::fs::PermissionsExt::set_mode(&mut permissions, 0o755);
    std::fs::set_permissions(&toolkit, permissions).expect("chmod toolkit");

    let backend = HostBackend::new(HostBackendConfig {
        shell: PathBuf::from("/bin/sh"),
        toolkit: Some(toolkit),
        command_timeout: Duration::from_secs(10),
    });

    let report = backend
        .run_stage(&StageId::new("bypass-pac"))
        .await
        .expect("run stage");
    assert!(report.success);
    assert_eq!(report.message, "stage bypass-pac done");
}

#[tokio::test]
async fn file_round_trip_and_listing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = host_backend();
    let file = dir.path().join("note.txt");

    backend
        .write_file(&path_str(&file), "hello latchkey")
        .await
        .expect("write file");
    let contents = backend.read_file(&path_str(&file)).await.expect("read file");
    assert_eq!(contents, "hello latchkey");

    let entries = backend
        .list_directory(&path_str(dir.path()))
        .await
        .expect("list directory");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "note.txt");
    assert!(!entries[0].is_directory);
    assert_eq!(entries[0].size, "hello latchkey".len() as i64);
    assert!(entries[0].permissions.starts_with('-'));
}

#[tokio::test]
async fn is_directory_distinguishes_files_and_missing_paths() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = host_backend();
    let file = dir.path().join("plain.txt");
    std::fs::write(&file, "x").expect("write file");

    assert!(backend
        .is_directory(&path_str(dir.path()))
        .await
        .expect("dir check"));
    assert!(!backend
        .is_directory(&path_str(&file))
        .await
        .expect("file check"));
    assert!(!backend
        .is_directory(&path_str(&dir.path().join("missing")))
        .await
        .expect("missing check"));
}

#[tokio::test]
async fn read_of_missing_file_maps_to_not_found() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = host_backend();
    let error = backend
        .read_file(&path_str(&dir.path().join("absent.txt")))
        .await
        .expect_err("must fail");
    assert!(matches!(error, BackendError::NotFound(_)));
}

#[tokio::test]
async fn delete_removes_files_and_directories() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = host_backend();
    let sub = dir.path().join("sub");
    std::fs::create_dir(&sub).expect("mkdir");
    std::fs::write(sub.join("inner.txt"), "x").expect("write");

    backend
        .delete_entry(&path_str(&sub))
        .await
        .expect("delete directory");
    assert!(!sub.exists());
}

#[tokio::test]
async fn move_and_copy_preserve_contents() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = host_backend();
    let original = dir.path().join("a.txt");
    std::fs::write(&original, "payload").expect("write");

    let moved = dir.path().join("b.txt");
    backend
        .move_entry(&path_str(&original), &path_str(&moved))
        .await
        .expect("move");
    assert!(!original.exists());

    let copied = dir.path().join("c.txt");
    backend
        .copy_entry(&path_str(&moved), &path_str(&copied))
        .await
        .expect("copy");
    assert_eq!(std::fs::read_to_string(&copied).expect("read copy"), "payload");
    assert_eq!(std::fs::read_to_string(&moved).expect("read moved"), "payload");
}

#[tokio::test]
async fn set_permissions_applies_the_octal_mode() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = host_backend();
    let file = dir.path().join("script.sh");
    std::fs::write(&file, "#!/bin/sh\n").expect("write");

    backend
        .set_permissions(&path_str(&file), "755")
        .await
        .expect("chmod");
    let mode =
        std::os::unix::fs::PermissionsExt::mode(&std::fs::metadata(&file).expect("meta").permissions());
    assert_eq!(mode & 0o777, 0o755);

    let error = backend
        .set_permissions(&path_str(&file), "not-a-mode")
        .await
        .expect_err("must reject");
    assert!(matches!(error, BackendError::Protocol(_)));
}

#[tokio::test]
async fn search_finds_matching_names_recursively() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = host_backend();
    let nested = dir.path().join("deep");
    std::fs::create_dir(&nested).expect("mkdir");
    std::fs::write(nested.join("target.log"), "x").expect("write");
    std::fs::write(dir.path().join("other.txt"), "x").expect("write");

    let hits = backend
        .search(&path_str(dir.path()), "*.log")
        .await
        .expect("search");
    assert_eq!(hits.len(), 1);
    assert!(hits[0].ends_with("target.log"));
}

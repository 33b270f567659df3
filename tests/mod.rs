//! Main test module for shadowtrail
//!
//! This module includes all test suites:
//! - Integration tests driving a real git binary against temp projects
//! - Property-based tests for project identity invariants

/// Whether a usable git binary is on PATH
pub fn git_available() -> bool {
    std::process::Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Return early from a test when git is missing
macro_rules! require_git {
    () => {
        if !$crate::git_available() {
            eprintln!("git not installed, skipping");
            return;
        }
    };
}

pub mod property;

#[cfg(test)]
mod edge_cases {
    use ::shadowtrail::*;
    use std::fs;
    use tempfile::TempDir;

    fn open(project: &TempDir, global: &TempDir) -> ShadowHistory {
        ShadowHistory::builder()
            .global_root(global.path())
            .build(project.path())
            .unwrap()
    }

    #[tokio::test]
    async fn test_empty_project() {
        require_git!();
        let project = TempDir::new().unwrap();
        let global = TempDir::new().unwrap();
        let history = open(&project, &global);
        history.initialize().await.unwrap();

        let bootstrap = history.current_snapshot_ref().await.unwrap();
        assert!(history.tracked_files(None).await.unwrap().is_empty());

        // Restoring the bootstrap snapshot removes everything added since
        fs::write(project.path().join("file.txt"), "content").unwrap();
        fs::create_dir_all(project.path().join("nested/deeper")).unwrap();
        fs::write(project.path().join("nested/deeper/x.txt"), "x").unwrap();

        history.restore(&bootstrap).await.unwrap();
        assert!(!project.path().join("file.txt").exists());
        assert!(!project.path().join("nested").exists());
    }

    #[tokio::test]
    async fn test_special_filenames() {
        require_git!();
        let project = TempDir::new().unwrap();
        let global = TempDir::new().unwrap();
        let history = open(&project, &global);
        history.initialize().await.unwrap();

        let special_names = vec![
            "file with spaces.txt",
            "file-with-dashes.txt",
            "-leading-dash.txt",
            "file.with.dots.txt",
            "file@with#special$chars.txt",
            "file(with)parens.txt",
            "file[with]brackets.txt",
            "ünïcödé.txt",
        ];

        let mut written = Vec::new();
        for name in &special_names {
            if fs::write(project.path().join(name), format!("Content of {}", name)).is_ok() {
                written.push(*name);
            }
        }

        let reference = history.snapshot("special names").await.unwrap();
        for name in &written {
            fs::remove_file(project.path().join(name)).unwrap();
        }

        history.restore(&reference).await.unwrap();
        for name in &written {
            let content = fs::read_to_string(project.path().join(name)).unwrap();
            assert_eq!(content, format!("Content of {}", name));
        }
    }

    #[tokio::test]
    async fn test_snapshot_records_deletions() {
        require_git!();
        let project = TempDir::new().unwrap();
        let global = TempDir::new().unwrap();
        let history = open(&project, &global);
        history.initialize().await.unwrap();

        fs::write(project.path().join("keep.txt"), "keep").unwrap();
        fs::write(project.path().join("gone.txt"), "gone").unwrap();
        history.snapshot("both").await.unwrap();

        fs::remove_file(project.path().join("gone.txt")).unwrap();
        let reference = history.snapshot("one").await.unwrap();

        let files = history.tracked_files(Some(&reference)).await.unwrap();
        assert_eq!(files, vec![std::path::PathBuf::from("keep.txt")]);
    }

    #[tokio::test]
    async fn test_invalid_reference_is_restore_failure() {
        require_git!();
        let project = TempDir::new().unwrap();
        let global = TempDir::new().unwrap();
        let history = open(&project, &global);
        history.initialize().await.unwrap();
        fs::write(project.path().join("a.txt"), "a").unwrap();

        let err = history.restore("--hard").await.unwrap_err();
        assert!(matches!(err, ShadowError::RestoreFailed { .. }));

        let err = history.restore("0000000000000000000000000000000000000000").await.unwrap_err();
        assert!(matches!(err, ShadowError::RestoreFailed { .. }));
        assert!(!err.is_fatal_to_checkpointing());

        // Nothing was touched by the failed restores
        assert_eq!(fs::read_to_string(project.path().join("a.txt")).unwrap(), "a");
    }
}

//! Property-based testing for shadowtrail
//!
//! Uses proptest to check project identity invariants across randomly
//! generated paths and directory layouts.

use ::shadowtrail::*;
use proptest::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Strategy for absolute paths with a few plain components
fn absolute_path_strategy() -> impl Strategy<Value = PathBuf> {
    prop::collection::vec("[a-zA-Z0-9_][a-zA-Z0-9_.-]{0,11}", 1..6).prop_map(|components| {
        let mut path = PathBuf::from("/");
        for component in components {
            path.push(component);
        }
        path
    })
}

/// Strategy for relative directory names safe to create on disk
fn dir_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,10}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_fingerprint_is_stable_hex(path in absolute_path_strategy()) {
        let first = fingerprint(&path);
        let second = fingerprint(&path);

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.len(), 64);
        prop_assert!(first.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn prop_distinct_paths_get_distinct_stores(
        paths in prop::collection::hash_set(absolute_path_strategy(), 2..40)
    ) {
        let resolver = PathResolver::new("/shadowtrail-global-root");
        let mut history_dirs = HashSet::new();
        let mut temp_dirs = HashSet::new();

        for path in &paths {
            let identity = ProjectIdentity {
                root_path: path.clone(),
                fingerprint: fingerprint(path),
            };
            let layout = resolver.layout(&identity);
            prop_assert!(layout.history_dir.starts_with(resolver.history_root()));
            prop_assert!(!layout.history_dir.starts_with(path));
            history_dirs.insert(layout.history_dir);
            temp_dirs.insert(resolver.tmp_root().join(&identity.fingerprint));
        }

        prop_assert_eq!(history_dirs.len(), paths.len());
        prop_assert_eq!(temp_dirs.len(), paths.len());
    }

    #[test]
    fn prop_equivalent_spellings_share_an_identity(
        nested in prop::collection::vec(dir_name_strategy(), 1..4),
        detour in dir_name_strategy(),
    ) {
        let global = TempDir::new().unwrap();
        let base = TempDir::new().unwrap();
        let project = nested.iter().fold(base.path().to_path_buf(), |p, c| p.join(c));
        fs::create_dir_all(&project).unwrap();
        fs::create_dir_all(base.path().join(&detour)).unwrap();

        // `<base>/<detour>/../<nested...>` names the same directory
        let roundabout = nested
            .iter()
            .fold(base.path().join(&detour).join(".."), |p, c| p.join(c));

        let resolver = PathResolver::new(global.path());
        let direct = resolver.identity(&project).unwrap();
        let indirect = resolver.identity(&roundabout).unwrap();

        prop_assert_eq!(&direct, &indirect);
        prop_assert_eq!(
            resolver.history_dir(&project).unwrap(),
            resolver.history_dir(&roundabout).unwrap()
        );
        prop_assert!(direct.root_path.is_absolute());
        prop_assert_eq!(direct.fingerprint.clone(), fingerprint(&direct.root_path));
    }
}

#[test]
fn test_large_sample_has_no_collisions() {
    let resolver = PathResolver::new("/srv/shadowtrail");
    let mut seen = HashSet::new();
    for i in 0..10_000 {
        let path = Path::new("/home/dev/projects").join(format!("app-{}", i));
        let identity = ProjectIdentity {
            fingerprint: fingerprint(&path),
            root_path: path,
        };
        assert!(seen.insert(resolver.layout(&identity).history_dir));
    }
}

//! Choosing which NAN test files the harness receives.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::RunnerError;

/// Tests that never run, whatever `--only` says.
pub const DISABLED_TESTS: &[&str] = &["nannew-test.js"];

const TEST_SUFFIX: &str = "-test.js";
const EXTENSION: &str = ".js";

/// Parse a comma-separated `--only` value. Blank entries are dropped.
pub fn parse_only(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `.js` files directly inside `dir`, sorted by name.
pub fn list_test_files(dir: &Path) -> Result<Vec<String>, RunnerError> {
    let entries = fs::read_dir(dir).map_err(|source| RunnerError::ListTests {
        dir: dir.to_path_buf(),
        source,
    })?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| RunnerError::ListTests {
            dir: dir.to_path_buf(),
            source,
        })?;
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        let file_name = entry.file_name();
        match file_name.to_str() {
            Some(name) if name.ends_with(EXTENSION) => names.push(name.to_string()),
            Some(_) => {}
            None => warn!("skipping test file with non UTF-8 name {:?}", entry.path()),
        }
    }
    names.sort();
    Ok(names)
}

/// True if `entry` names `file` as `a-test.js`, `a-test` or `a`.
fn matches_entry(file: &str, entry: &str) -> bool {
    file == entry
        || file.strip_suffix(EXTENSION) == Some(entry)
        || file.strip_suffix(TEST_SUFFIX) == Some(entry)
}

/// Drop disabled tests and, when an allow-list is given, everything it does
/// not name. Order of `files` is preserved.
pub fn select(files: &[String], only: Option<&[String]>) -> Vec<String> {
    files
        .iter()
        .filter(|file| {
            if DISABLED_TESTS.contains(&file.as_str()) {
                debug!("skipping disabled test {}", file);
                return false;
            }
            match only {
                Some(entries) => entries.iter().any(|e| matches_entry(file, e)),
                None => true,
            }
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn without_allow_list_everything_but_disabled_runs() {
        let files = names(&["a-test.js", "nannew-test.js", "b-test.js"]);
        assert_eq!(select(&files, None), names(&["a-test.js", "b-test.js"]));
    }

    #[test]
    fn allow_list_matches_by_suffixless_name() {
        let files = names(&["a-test.js", "nannew-test.js", "b-test.js"]);
        let only = parse_only("a");
        assert_eq!(select(&files, Some(only.as_slice())), names(&["a-test.js"]));
    }

    #[test]
    fn allow_list_accepts_each_name_form() {
        let files = names(&["a-test.js", "b-test.js", "c-test.js", "d-test.js"]);
        let only = parse_only("a-test.js,b-test,c");
        assert_eq!(
            select(&files, Some(only.as_slice())),
            names(&["a-test.js", "b-test.js", "c-test.js"])
        );
    }

    #[test]
    fn disabled_test_cannot_be_selected() {
        let files = names(&["nannew-test.js", "a-test.js"]);
        for raw in ["nannew", "nannew-test", "nannew-test.js", "nannew,a"] {
            let only = parse_only(raw);
            let selected = select(&files, Some(only.as_slice()));
            assert!(!selected.iter().any(|f| f == "nannew-test.js"), "selected with --only={raw}");
        }
    }

    #[test]
    fn unmatched_entries_select_nothing() {
        let files = names(&["a-test.js", "b-test.js"]);
        let only = parse_only("zzz,test,.js");
        assert!(select(&files, Some(only.as_slice())).is_empty());
    }

    #[test]
    fn partial_names_do_not_match() {
        let files = names(&["asyncworker-test.js", "async-test.js"]);
        let only = parse_only("async");
        assert_eq!(select(&files, Some(only.as_slice())), names(&["async-test.js"]));
    }

    #[test]
    fn parse_only_drops_blank_entries() {
        assert_eq!(parse_only("a,, b ,"), names(&["a", "b"]));
        assert!(parse_only("").is_empty());
    }

    #[test]
    fn listing_is_sorted_and_js_only() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b-test.js", "a-test.js", "README.md", "helper.json"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("fixtures.js")).unwrap();
        assert_eq!(list_test_files(dir.path()).unwrap(), names(&["a-test.js", "b-test.js"]));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_names_are_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a-test.js"), "").unwrap();
        fs::write(dir.path().join(OsStr::from_bytes(b"bad-\xff-test.js")), "").unwrap();
        assert_eq!(list_test_files(dir.path()).unwrap(), names(&["a-test.js"]));
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = list_test_files(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, RunnerError::ListTests { .. }));
    }
}

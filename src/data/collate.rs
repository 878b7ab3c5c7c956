use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::DiscoveryError;

/// RELION names every output of a job `run_...`.
pub const DEFAULT_RUN_PREFIX: &str = "run";

/// A resumed run writes `run_ct<N>_it<NNN>...`.
const CONTINUATION_MARKER: &str = "_ct";

// ---------------------------------------------------------------------------
// Filename keys
// ---------------------------------------------------------------------------

/// Logical iteration number of a file.
///
/// The three digits after the `_it` marker give the base number. Files from a
/// continuation run (`run_ct24_it025_...`) count one higher, because the first
/// iteration a continuation writes repeats the one it resumed from.
///
/// Two nested continuations each add only one, so the second resumed run can
/// collide with the first. This is a known limitation of the naming scheme.
pub fn iteration_key(file_name: &str, run_prefix: &str) -> Option<u32> {
    let (marker, digits) = find_iteration_marker(file_name)?;
    let base: u32 = digits.parse().ok()?;

    let head = &file_name[..marker];
    let designator = head.strip_prefix(run_prefix).unwrap_or(head);
    if designator.starts_with(CONTINUATION_MARKER) {
        Some(base + 1)
    } else {
        Some(base)
    }
}

/// Class number from `..._class<NNN>...`.
pub fn class_key(file_name: &str) -> Option<u32> {
    file_name
        .match_indices("class")
        .find_map(|(pos, m)| three_digits(&file_name[pos + m.len()..]))
        .and_then(|d| d.parse().ok())
}

/// Byte offset of the marker and its three digits. `_it` wins over a bare
/// `it` so names like `split_it003` or `edit_run_it003` resolve correctly.
fn find_iteration_marker(file_name: &str) -> Option<(usize, &str)> {
    let scan = |marker: &str| {
        file_name.match_indices(marker).find_map(|(pos, m)| {
            three_digits(&file_name[pos + m.len()..]).map(|d| (pos, d))
        })
    };
    scan("_it").or_else(|| scan("it"))
}

fn three_digits(s: &str) -> Option<&str> {
    let digits = s.get(..3)?;
    digits.bytes().all(|b| b.is_ascii_digit()).then_some(digits)
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// A discovered file with its logical iteration number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollatedFile {
    pub path: PathBuf,
    pub iteration: u32,
}

/// All per-class volumes written at one iteration, in class order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationVolumes {
    pub iteration: u32,
    pub volumes: Vec<PathBuf>,
}

/// Find the files in `dir` (non-recursive) matching `pattern` and return them
/// in iteration order. Files without an iteration marker, such as the final
/// `run_model.star`, are skipped.
pub fn collate_files(
    dir: &Path,
    pattern: &str,
    run_prefix: &str,
) -> Result<Vec<CollatedFile>, DiscoveryError> {
    let mut files: Vec<CollatedFile> = list_matching(dir, pattern)?
        .into_iter()
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?;
            match iteration_key(name, run_prefix) {
                Some(iteration) => Some(CollatedFile {
                    iteration,
                    path: path.clone(),
                }),
                None => {
                    log::warn!("skipping {name}: no iteration number");
                    None
                }
            }
        })
        .collect();

    if files.is_empty() {
        return Err(DiscoveryError::NoMatchingFiles {
            dir: dir.to_path_buf(),
            pattern: pattern.to_string(),
        });
    }

    sort_by_iteration(&mut files);
    log::info!(
        "found {} files matching {pattern} (iterations {}..={})",
        files.len(),
        files[0].iteration,
        files[files.len() - 1].iteration
    );
    Ok(files)
}

/// Stable sort; ties keep enumeration order.
pub fn sort_by_iteration(files: &mut [CollatedFile]) {
    files.sort_by_key(|f| f.iteration);
}

/// Group the `.mrc` class volumes of a job by iteration, classes ascending
/// inside each group.
pub fn collate_volumes(
    dir: &Path,
    run_prefix: &str,
) -> Result<Vec<IterationVolumes>, DiscoveryError> {
    let pattern = "*.mrc";
    let mut groups: BTreeMap<u32, Vec<(u32, PathBuf)>> = BTreeMap::new();

    for path in list_matching(dir, pattern)? {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let (Some(iteration), Some(class)) = (iteration_key(name, run_prefix), class_key(name))
        else {
            log::debug!("skipping volume {name}: no iteration or class number");
            continue;
        };
        groups.entry(iteration).or_default().push((class, path));
    }

    if groups.is_empty() {
        return Err(DiscoveryError::NoMatchingFiles {
            dir: dir.to_path_buf(),
            pattern: pattern.to_string(),
        });
    }

    Ok(groups
        .into_iter()
        .map(|(iteration, mut volumes)| {
            volumes.sort_by_key(|(class, _)| *class);
            IterationVolumes {
                iteration,
                volumes: volumes.into_iter().map(|(_, p)| p).collect(),
            }
        })
        .collect())
}

/// Non-recursive glob inside `dir`. The glob crate yields paths in
/// alphabetical order, which is the enumeration order ties fall back to.
pub(crate) fn list_matching(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let full = format!("{escaped}/{pattern}");
    let entries = glob::glob(&full).map_err(|source| DiscoveryError::BadPattern {
        pattern: pattern.to_string(),
        source,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => paths.push(path),
            Ok(_) => {}
            Err(e) => log::warn!("error accessing {}: {e}", e.path().display()),
        }
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, names: &[&str]) {
        for name in names {
            std::fs::write(dir.join(name), "").unwrap();
        }
    }

    #[test]
    fn plain_iteration_numbers() {
        assert_eq!(iteration_key("run_it000_model.star", "run"), Some(0));
        assert_eq!(iteration_key("run_it025_half1_model.star", "run"), Some(25));
        assert_eq!(iteration_key("run_it025_class003.mrc", "run"), Some(25));
    }

    #[test]
    fn continuation_adds_one() {
        assert_eq!(iteration_key("run_ct005_it003_model.star", "run"), Some(4));
        assert_eq!(iteration_key("run_ct24_it024_model.star", "run"), Some(25));
        assert_eq!(
            iteration_key("run_ct24_it024_model.star", "run"),
            iteration_key("run_it024_model.star", "run").map(|k| k + 1)
        );
    }

    #[test]
    fn nested_continuation_only_adds_one() {
        // Known limitation: a continuation of a continuation is not offset twice.
        assert_eq!(iteration_key("run_ct24_ct26_it026_model.star", "run"), Some(27));
    }

    #[test]
    fn monotonic_within_continuation_status() {
        let fresh: Vec<u32> = (0..40)
            .map(|i| iteration_key(&format!("run_it{i:03}_model.star"), "run").unwrap())
            .collect();
        assert!(fresh.windows(2).all(|w| w[0] < w[1]));

        let resumed: Vec<u32> = (0..40)
            .map(|i| iteration_key(&format!("run_ct3_it{i:03}_model.star"), "run").unwrap())
            .collect();
        assert!(resumed.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn no_marker() {
        assert_eq!(iteration_key("run_model.star", "run"), None);
        assert_eq!(iteration_key("run_it1_model.star", "run"), None);
    }

    #[test]
    fn underscore_marker_preferred() {
        assert_eq!(iteration_key("split123_it004_model.star", "split123"), Some(4));
    }

    #[test]
    fn class_numbers() {
        assert_eq!(class_key("run_it025_class003.mrc"), Some(3));
        assert_eq!(class_key("run_it025_class12.mrc"), None);
        assert_eq!(class_key("run_it025_model.star"), None);
    }

    #[test]
    fn spec_example_ordering() {
        let dir = tempfile::tempdir().unwrap();
        touch(
            dir.path(),
            &[
                "run_ct005_it003_model.star",
                "run_it002_model.star",
                "run_it001_model.star",
            ],
        );
        let files = collate_files(dir.path(), "*model.star", "run").unwrap();
        let keys: Vec<u32> = files.iter().map(|f| f.iteration).collect();
        assert_eq!(keys, vec![1, 2, 4]);
        assert!(files[2].path.ends_with("run_ct005_it003_model.star"));
    }

    #[test]
    fn sorting_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        touch(
            dir.path(),
            &[
                "run_it010_model.star",
                "run_ct9_it009_model.star",
                "run_it009_model.star",
                "run_it001_model.star",
                "run_model.star",
            ],
        );
        let files = collate_files(dir.path(), "*model.star", "run").unwrap();
        let mut again = files.clone();
        sort_by_iteration(&mut again);
        assert_eq!(files, again);
        // run_model.star has no iteration and is dropped.
        assert_eq!(files.len(), 4);
        // Tie at 10: alphabetical enumeration order is kept.
        assert!(files[2].path.ends_with("run_ct9_it009_model.star"));
        assert!(files[3].path.ends_with("run_it010_model.star"));
    }

    #[test]
    fn empty_discovery_fails() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &["run_it001_data.star"]);
        let err = collate_files(dir.path(), "*model.star", "run").unwrap_err();
        assert!(matches!(err, DiscoveryError::NoMatchingFiles { .. }));
    }

    #[test]
    fn volumes_grouped_by_iteration_then_class() {
        let dir = tempfile::tempdir().unwrap();
        touch(
            dir.path(),
            &[
                "run_it002_class002.mrc",
                "run_it002_class010.mrc",
                "run_it001_class003.mrc",
                "run_it002_class001.mrc",
                "run_it001_class001.mrc",
                "run_it001_model.star",
            ],
        );
        let groups = collate_volumes(dir.path(), "run").unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].iteration, 1);
        let names: Vec<&str> = groups[1]
            .volumes
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                "run_it002_class001.mrc",
                "run_it002_class002.mrc",
                "run_it002_class010.mrc"
            ]
        );
    }
}

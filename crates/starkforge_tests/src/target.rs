//! Target expressions of the form `path-or-glob[::case-name-glob]` and their
//! resolution into test suite files.

use std::{
    collections::{BTreeMap, btree_map::Entry},
    ffi::OsStr,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use regex::Regex;
use walkdir::WalkDir;

use crate::TestRunnerError;

static TEST_SUITE_FILE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:.*_test|test_.*)\.[^.]+$").expect("test suite pattern is valid")
});

const CASE_SEPARATOR: &str = "::";

const GLOB_META_CHARS: [char; 4] = ['*', '?', '[', '{'];

/// Returns whether `file_name` names a test suite: `*_test.<ext>` or
/// `test_*.<ext>`.
pub fn is_test_suite(file_name: &str) -> bool {
    TEST_SUITE_FILE_NAME.is_match(file_name)
}

/// A parsed target expression.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TargetExpr {
    /// Path or glob of suite files. `None` for the bare `::case` form.
    pub path_glob: Option<String>,
    /// Glob of case names within the matched suites.
    pub case_glob: Option<String>,
}

impl TargetExpr {
    pub fn parse(expr: &str) -> Self {
        let (path, case) = match expr.split_once(CASE_SEPARATOR) {
            Some((path, case)) => (path, Some(case)),
            None => (expr, None),
        };
        Self {
            path_glob: Some(path).filter(|path| !path.is_empty()).map(str::to_string),
            case_glob: case.filter(|case| !case.is_empty()).map(str::to_string),
        }
    }
}

impl From<&str> for TargetExpr {
    fn from(expr: &str) -> Self {
        Self::parse(expr)
    }
}

/// Cases of a suite selected by the targets naming it.
#[derive(Clone, Debug, Default)]
pub enum CaseFilter {
    #[default]
    All,
    Matching(GlobSet),
}

impl CaseFilter {
    pub fn matches(&self, case_name: &str) -> bool {
        match self {
            CaseFilter::All => true,
            CaseFilter::Matching(globs) => globs.is_match(case_name),
        }
    }
}

/// A resolved test suite file with its case selection.
#[derive(Clone, Debug)]
pub struct TestTarget {
    pub path: PathBuf,
    pub cases: CaseFilter,
    pub ignored_cases: Option<GlobSet>,
}

impl TestTarget {
    /// Returns whether the case named `case_name` should be collected.
    pub fn includes(&self, case_name: &str) -> bool {
        self.cases.matches(case_name)
            && !self
                .ignored_cases
                .as_ref()
                .is_some_and(|ignored| ignored.is_match(case_name))
    }
}

/// Case globs accumulated for one file; `None` selects every case.
type Selection = Option<Vec<Glob>>;

/// Resolves `targets` into one [`TestTarget`] per suite file, sorted by path.
///
/// Unqualified targets select every case of a file and take precedence over
/// qualified ones. Ignored targets without a case glob drop the whole file.
/// Expressions without a path apply to `default_suite_glob`, or the project
/// root when there is none.
pub fn resolve(
    targets: &[TargetExpr],
    ignored_targets: &[TargetExpr],
    default_suite_glob: Option<&str>,
    project_root: &Path,
) -> Result<Vec<TestTarget>, TestRunnerError> {
    let selected = select(targets, default_suite_glob, project_root)?;
    let ignored = select(ignored_targets, default_suite_glob, project_root)?;

    let mut resolved = Vec::with_capacity(selected.len());
    for (path, selection) in selected {
        let ignored_cases = match ignored.get(&path) {
            Some(None) => {
                trace!(path = %path.display(), "suite ignored");
                continue;
            }
            Some(Some(globs)) => Some(glob_set(globs)?),
            None => None,
        };
        let cases = match selection {
            None => CaseFilter::All,
            Some(globs) => CaseFilter::Matching(glob_set(&globs)?),
        };
        resolved.push(TestTarget {
            path,
            cases,
            ignored_cases,
        });
    }
    Ok(resolved)
}

fn select(
    targets: &[TargetExpr],
    default_suite_glob: Option<&str>,
    project_root: &Path,
) -> Result<BTreeMap<PathBuf, Selection>, TestRunnerError> {
    let mut selections = BTreeMap::new();
    for target in targets {
        let case = target.case_glob.as_deref().map(case_glob).transpose()?;
        let pattern = target
            .path_glob
            .as_deref()
            .or(default_suite_glob)
            .unwrap_or(".");

        for path in expand(pattern, project_root)? {
            match (selections.entry(path), &case) {
                (Entry::Vacant(entry), case) => {
                    entry.insert(case.clone().map(|glob| vec![glob]));
                }
                (Entry::Occupied(mut entry), Some(glob)) => {
                    if let Some(globs) = entry.get_mut() {
                        globs.push(glob.clone());
                    }
                }
                (Entry::Occupied(mut entry), None) => {
                    entry.insert(None);
                }
            }
        }
    }
    Ok(selections)
}

/// Expands a path or glob into the test suite files it names.
fn expand(pattern: &str, project_root: &Path) -> Result<Vec<PathBuf>, TestRunnerError> {
    let full_pattern = project_root.join(pattern);

    let candidates = if full_pattern.exists() {
        files_under(&full_pattern)?
    } else {
        let pattern_str = full_pattern.to_string_lossy();
        let matcher = GlobBuilder::new(&pattern_str)
            .literal_separator(true)
            .build()
            .map_err(|source| TestRunnerError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?
            .compile_matcher();

        let base = static_prefix(&full_pattern);
        let mut candidates = Vec::new();
        if base.exists() {
            for entry in WalkDir::new(&base) {
                let entry = entry.map_err(|source| TestRunnerError::Walk {
                    path: base.clone(),
                    source,
                })?;
                if matcher.is_match(entry.path()) {
                    candidates.extend(files_under(entry.path())?);
                }
            }
        }
        candidates
    };

    let mut files: Vec<_> = candidates
        .into_iter()
        .filter(|path| {
            path.file_name()
                .and_then(OsStr::to_str)
                .is_some_and(is_test_suite)
        })
        .map(|path| dunce::canonicalize(&path).unwrap_or(path))
        .collect();
    files.sort();
    files.dedup();
    Ok(files)
}

/// Every file at or beneath `path`.
fn files_under(path: &Path) -> Result<Vec<PathBuf>, TestRunnerError> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path) {
        let entry = entry.map_err(|source| TestRunnerError::Walk {
            path: path.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// The leading components of `pattern` free of glob syntax.
fn static_prefix(pattern: &Path) -> PathBuf {
    pattern
        .components()
        .take_while(|component| {
            !component
                .as_os_str()
                .to_string_lossy()
                .contains(GLOB_META_CHARS)
        })
        .collect()
}

fn case_glob(pattern: &str) -> Result<Glob, TestRunnerError> {
    Glob::new(pattern).map_err(|source| TestRunnerError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

fn glob_set(globs: &[Glob]) -> Result<GlobSet, TestRunnerError> {
    let mut builder = GlobSetBuilder::new();
    for glob in globs {
        builder.add(glob.clone());
    }
    builder
        .build()
        .map_err(|source| TestRunnerError::InvalidPattern {
            pattern: globs.iter().map(Glob::glob).collect::<Vec<_>>().join(", "),
            source,
        })
}

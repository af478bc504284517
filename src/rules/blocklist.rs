//! De-duplication of target domain lists against existing blocklists
//!
//! Architectural Principle: Service Layer - BlocklistIndex owns the set of already-known domains
//! - Every regular file in the blocklists directory contributes to one index
//! - Targets are diffed against the index and written back as sorted lists
//! - The combined list carries a filter-list header so it can be published as is

use crate::domain::{CheckerError, CheckerResult};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File name of the combined output list
pub const COMBINED_FILE_NAME: &str = "all_filters.txt";

/// Header written at the top of the combined list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(default)]
pub struct FilterListHeader {
    pub title: String,
    pub description: String,
    pub homepage: String,
}

impl Default for FilterListHeader {
    fn default() -> Self {
        Self {
            title: "Japan Youth Restricted Filter".to_string(),
            description: "It contains a blacklist of content considered inappropriate for young people in Japan; restricts inappropriate content on LINE and Yahoo searches.".to_string(),
            homepage: "https://github.com/matsuhiro/AdGuardFilters".to_string(),
        }
    }
}

impl FilterListHeader {
    /// Render the `!` comment header with the given modification stamp
    pub fn render(&self, last_modified: &str) -> String {
        format!(
            "! Title: {}\n! Description: {}\n! Homepage: {}\n! Last modified: {}\n",
            self.title, self.description, self.homepage, last_modified
        )
    }
}

/// Read a domain list: one entry per line, blank lines and `#` comments ignored
pub fn read_domain_set<P: AsRef<Path>>(path: P) -> CheckerResult<BTreeSet<String>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| CheckerError::file_read(path.display().to_string(), e))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Write domains one per line in sorted order
pub fn write_domain_list<P: AsRef<Path>>(path: P, domains: &BTreeSet<String>) -> CheckerResult<()> {
    let mut content = String::new();
    for domain in domains {
        content.push_str(domain);
        content.push('\n');
    }
    fs::write(path.as_ref(), content)?;
    Ok(())
}

/// All domains already present in the existing blocklists
#[derive(Debug, Clone, Default)]
pub struct BlocklistIndex {
    domains: BTreeSet<String>,
    files_loaded: usize,
}

impl BlocklistIndex {
    /// Load every regular file directly inside `dir`.
    ///
    /// Unreadable files are logged and skipped; a missing or empty directory yields an
    /// empty index.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        let mut index = Self::default();

        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .follow_links(true)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect();
        files.sort();

        if files.is_empty() {
            tracing::warn!("No blocklist files found in {}", dir.display());
        }

        for path in files {
            match read_domain_set(&path) {
                Ok(domains) => {
                    index.domains.extend(domains);
                    index.files_loaded += 1;
                }
                Err(e) => tracing::warn!("Skipping blocklist {}: {}", path.display(), e),
            }
        }

        index
    }

    /// Build an index from in-memory domains
    pub fn from_domains<I: IntoIterator<Item = String>>(domains: I) -> Self {
        Self { domains: domains.into_iter().collect(), files_loaded: 0 }
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn files_loaded(&self) -> usize {
        self.files_loaded
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.domains.contains(domain)
    }

    /// Domains of `target` not already known
    pub fn new_domains(&self, target: &BTreeSet<String>) -> BTreeSet<String> {
        target.difference(&self.domains).cloned().collect()
    }
}

/// Result of diffing one target list
#[derive(Debug, Clone)]
pub struct TargetDiff {
    pub target: PathBuf,
    /// Entries read from the target
    pub imported: usize,
    pub new_domains: BTreeSet<String>,
    /// Where the per-target list was written
    pub output_path: PathBuf,
}

/// Outcome of a whole de-duplication run
#[derive(Debug, Clone, Default)]
pub struct FilterRun {
    pub known_domains: usize,
    pub targets: Vec<TargetDiff>,
    pub combined: BTreeSet<String>,
    pub combined_path: PathBuf,
}

/// Expand target arguments that are glob patterns; plain paths pass through untouched
pub fn expand_targets(patterns: &[String]) -> CheckerResult<Vec<PathBuf>> {
    let mut targets = Vec::new();

    for pattern in patterns {
        if !pattern.contains(['*', '?', '[']) {
            targets.push(PathBuf::from(pattern));
            continue;
        }

        let matches = glob::glob(pattern)
            .map_err(|e| CheckerError::config(format!("Invalid target pattern '{pattern}': {e}")))?;
        let before = targets.len();
        for entry in matches {
            match entry {
                Ok(path) if path.is_file() => targets.push(path),
                Ok(_) => {}
                Err(e) => tracing::warn!("Skipping unreadable match for '{}': {}", pattern, e),
            }
        }
        if targets.len() == before {
            tracing::warn!("Target pattern '{}' matched no files", pattern);
        }
    }

    Ok(targets)
}

/// Diff every target against `index` and write the per-target and combined lists
pub fn filter_targets(
    index: &BlocklistIndex,
    targets: &[PathBuf],
    output_dir: &Path,
    header: &FilterListHeader,
) -> CheckerResult<FilterRun> {
    fs::create_dir_all(output_dir)?;

    let mut run = FilterRun { known_domains: index.len(), ..Default::default() };

    for target in targets {
        let domains = match read_domain_set(target) {
            Ok(domains) => domains,
            Err(e) => {
                tracing::warn!("{}", e);
                BTreeSet::new()
            }
        };
        let new_domains = index.new_domains(&domains);

        let stem = target
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "target".to_string());
        let output_path = output_dir.join(format!("{stem}_filters.txt"));
        write_domain_list(&output_path, &new_domains)?;

        tracing::info!(
            "{}: {} imported, {} new",
            target.display(),
            domains.len(),
            new_domains.len()
        );

        run.combined.extend(new_domains.iter().cloned());
        run.targets.push(TargetDiff {
            target: target.clone(),
            imported: domains.len(),
            new_domains,
            output_path,
        });
    }

    run.combined_path = output_dir.join(COMBINED_FILE_NAME);
    let last_modified = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let mut content = header.render(&last_modified);
    content.push('\n');
    for domain in &run.combined {
        content.push_str(domain);
        content.push('\n');
    }
    fs::write(&run.combined_path, content)?;

    Ok(run)
}

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use tempfile::NamedTempFile;

use super::urls::normalize_url;

pub const JOBS_FILE: &str = "jobs.txt";
pub const SEARCH_SPECS_FILE: &str = "search_specs.json";
pub const VALIDATED_FILE: &str = "jobs_validated.txt";
pub const REPORT_FILE: &str = "jobs_report.txt";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlList {
    pub urls: Vec<String>,
    /// Non-blank, non-comment lines the normalizer rejected.
    pub skipped: usize,
    pub total_lines: usize,
}

pub fn parse_url_list(text: &str) -> UrlList {
    let mut list = UrlList::default();
    for raw in text.lines() {
        list.total_lines += 1;
        match normalize_url(raw) {
            Some(url) => list.urls.push(url),
            None => {
                let trimmed = raw.trim();
                if !trimmed.is_empty() && !trimmed.starts_with('#') {
                    list.skipped += 1;
                }
            }
        }
    }
    list
}

/// Reads and normalizes a job list. A missing or unreadable file yields an
/// empty list.
pub fn read_urls(path: &Path) -> UrlList {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return UrlList::default(),
        Err(err) => {
            warn!("could not read {}: {err}", path.display());
            return UrlList::default();
        }
    };
    parse_url_list(&String::from_utf8_lossy(&bytes))
}

#[derive(Debug, Clone)]
pub struct Profile {
    pub name: String,
    pub dir: PathBuf,
    pub jobs_file: PathBuf,
    pub search_specs: Option<PathBuf>,
    pub urls: Vec<String>,
}

impl Profile {
    pub fn from_directory(dir: &Path) -> Option<Self> {
        let jobs_file = dir.join(JOBS_FILE);
        if !jobs_file.is_file() {
            return None;
        }
        let search_specs = Some(dir.join(SEARCH_SPECS_FILE)).filter(|path| path.is_file());
        let name = dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string());

        let mut profile = Self {
            name,
            dir: dir.to_path_buf(),
            jobs_file,
            search_specs,
            urls: Vec::new(),
        };
        profile.reload();
        Some(profile)
    }

    /// Re-parses the job list and swaps the URL sequence in one assignment.
    /// Returns the skipped line count.
    pub fn reload(&mut self) -> usize {
        let list = read_urls(&self.jobs_file);
        if list.skipped > 0 {
            debug!(
                "profile '{}': skipped {} malformed lines of {}",
                self.name, list.skipped, list.total_lines
            );
        }
        self.urls = list.urls;
        list.skipped
    }

    pub fn url_count(&self) -> usize {
        self.urls.len()
    }

    pub fn has_search_specs(&self) -> bool {
        self.search_specs.is_some()
    }

    pub fn validated_path(&self) -> PathBuf {
        self.dir.join(VALIDATED_FILE)
    }

    pub fn report_path(&self) -> PathBuf {
        self.dir.join(REPORT_FILE)
    }
}

pub fn load_profiles(dir: &Path) -> Vec<Profile> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!("cannot scan profiles directory {}: {err}", dir.display());
            return Vec::new();
        }
    };

    let mut dirs = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect::<Vec<_>>();
    dirs.sort();

    dirs.iter()
        .filter_map(|path| Profile::from_directory(path))
        .collect()
}

pub fn render_validated(validated: &[String]) -> String {
    let mut out = String::new();
    for url in validated {
        out.push_str(url);
        out.push('\n');
    }
    out
}

pub fn render_report(validated: &[String], failed: &[String]) -> String {
    let mut lines = vec![
        format!("Validated: {}", validated.len()),
        format!("Failed: {}", failed.len()),
        String::new(),
        "Failed URLs:".to_string(),
    ];
    lines.extend(failed.iter().cloned());
    let mut report = lines.join("\n");
    report.push('\n');
    report
}

/// Both bodies are staged next to their targets before either is renamed into
/// place. If the second rename fails the report is put back the way it was, so
/// a failed write leaves both artifacts as they were before the run.
pub fn write_validation_artifacts(
    dir: &Path,
    validated: &[String],
    failed: &[String],
) -> io::Result<()> {
    let validated_path = dir.join(VALIDATED_FILE);
    let report_path = dir.join(REPORT_FILE);

    let staged_validated = stage(dir, render_validated(validated).as_bytes())?;
    let staged_report = stage(dir, render_report(validated, failed).as_bytes())?;
    let previous_report = fs::read(&report_path).ok();

    staged_report
        .persist(&report_path)
        .map_err(|err| err.error)?;
    if let Err(err) = staged_validated.persist(&validated_path) {
        restore_report(dir, &report_path, previous_report.as_deref());
        return Err(err.error);
    }
    Ok(())
}

fn stage(dir: &Path, body: &[u8]) -> io::Result<NamedTempFile> {
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(body)?;
    file.flush()?;
    Ok(file)
}

fn restore_report(dir: &Path, report_path: &Path, previous: Option<&[u8]>) {
    let restored = match previous {
        Some(bytes) => stage(dir, bytes)
            .and_then(|file| file.persist(report_path).map_err(|err| err.error))
            .map(|_| ()),
        None => fs::remove_file(report_path),
    };
    if let Err(err) = restored {
        warn!("could not roll back {}: {err}", report_path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_without_failures_ends_at_header() {
        let report = render_report(&["https://a.com".to_string()], &[]);
        assert_eq!(report, "Validated: 1\nFailed: 0\n\nFailed URLs:\n");
    }

    #[test]
    fn crlf_lines_are_normalized() {
        let list = parse_url_list("https://a.com/1\r\nb.com\r\n");
        assert_eq!(list.urls, vec!["https://a.com/1", "https://b.com"]);
        assert_eq!(list.total_lines, 2);
    }
}

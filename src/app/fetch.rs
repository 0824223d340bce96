use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};
use serde::Deserialize;
use thiserror::Error;

use super::data_io::JOBS_FILE;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);
const PROVIDER_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("No search_specs.json in profile")]
    NoSearchSpecs,
    #[error("config not found: {path}")]
    ConfigMissing { path: PathBuf },
    #[error("cannot read {path}: {source}")]
    ConfigRead { path: PathBuf, source: io::Error },
    #[error("invalid JSON in {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("No sources configured.")]
    NoSources,
    #[error("No URLs found.")]
    NoResults,
    #[error("cannot write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("Fetch timed out after {0}s")]
    TimedOut(u64),
    #[error("HTTP client setup failed: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchSpecs {
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceSpec {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub max_results: Option<usize>,
}

impl SearchSpecs {
    pub fn load(path: &Path) -> Result<Self, FetchError> {
        let text = fs::read_to_string(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                FetchError::ConfigMissing {
                    path: path.to_path_buf(),
                }
            } else {
                FetchError::ConfigRead {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        serde_json::from_str(&text).map_err(|source| FetchError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn keywords(&self) -> Vec<String> {
        unique_preserve_order(self.sources.iter().flat_map(|s| s.keywords.iter().cloned()))
    }

    pub fn locations(&self) -> Vec<String> {
        unique_preserve_order(self.sources.iter().flat_map(|s| s.locations.iter().cloned()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Provider {
    Greenhouse,
    Lever,
    GoogleJobs,
}

impl Provider {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "greenhouse" => Some(Provider::Greenhouse),
            "lever" => Some(Provider::Lever),
            "google_jobs" => Some(Provider::GoogleJobs),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchEndpoints {
    pub greenhouse: String,
    pub lever: String,
}

impl Default for FetchEndpoints {
    fn default() -> Self {
        Self {
            greenhouse: "https://boards-api.greenhouse.io".to_string(),
            lever: "https://api.lever.co".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub timeout: Duration,
    pub endpoints: FetchEndpoints,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT,
            endpoints: FetchEndpoints::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSummary {
    pub written: usize,
    pub output: PathBuf,
    pub warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GreenhouseBoard {
    #[serde(default)]
    jobs: Vec<GreenhouseJob>,
}

#[derive(Debug, Deserialize)]
struct GreenhouseJob {
    #[serde(default)]
    title: String,
    #[serde(default)]
    location: Option<GreenhouseLocation>,
    #[serde(default)]
    absolute_url: String,
}

#[derive(Debug, Deserialize)]
struct GreenhouseLocation {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct LeverPosting {
    #[serde(default)]
    text: String,
    #[serde(default)]
    categories: LeverCategories,
    #[serde(default, rename = "hostedUrl")]
    hosted_url: String,
}

#[derive(Debug, Default, Deserialize)]
struct LeverCategories {
    #[serde(default)]
    location: String,
}

struct Posting {
    title: String,
    location: String,
    url: String,
}

/// Synchronous fetch seam used by the session; blocks the caller.
pub trait JobFetcher {
    fn fetch(&self, search_specs: &Path, profile_dir: &Path) -> Result<FetchSummary, FetchError>;
}

pub struct HttpJobFetcher {
    runtime: tokio::runtime::Handle,
    client: reqwest::Client,
    settings: FetchSettings,
}

impl HttpJobFetcher {
    pub fn new(
        runtime: tokio::runtime::Handle,
        settings: FetchSettings,
    ) -> Result<Self, FetchError> {
        Ok(Self {
            runtime,
            client: build_client()?,
            settings,
        })
    }
}

impl JobFetcher for HttpJobFetcher {
    fn fetch(&self, search_specs: &Path, profile_dir: &Path) -> Result<FetchSummary, FetchError> {
        let timeout = self.settings.timeout;
        self.runtime.block_on(async {
            tokio::time::timeout(
                timeout,
                fetch_jobs(
                    &self.client,
                    &self.settings.endpoints,
                    search_specs,
                    profile_dir,
                ),
            )
            .await
            .map_err(|_| FetchError::TimedOut(timeout.as_secs()))?
        })
    }
}

pub fn build_client() -> Result<reqwest::Client, FetchError> {
    Ok(reqwest::Client::builder()
        .user_agent(concat!("jobflare-fetcher/", env!("CARGO_PKG_VERSION")))
        .timeout(PROVIDER_REQUEST_TIMEOUT)
        .build()?)
}

/// Collects posting URLs for every configured source and writes them to
/// `<profile_dir>/jobs.txt`. Per-source failures become warnings.
pub async fn fetch_jobs(
    client: &reqwest::Client,
    endpoints: &FetchEndpoints,
    search_specs: &Path,
    profile_dir: &Path,
) -> Result<FetchSummary, FetchError> {
    let specs = SearchSpecs::load(search_specs)?;
    if specs.sources.is_empty() {
        return Err(FetchError::NoSources);
    }

    let mut warnings = Vec::new();
    let mut all_urls = Vec::new();
    for source in &specs.sources {
        match collect_source(client, endpoints, source).await {
            Ok(urls) => all_urls.extend(urls),
            Err(warning) => {
                warn!("{warning}");
                warnings.push(warning);
            }
        }
    }

    let urls = unique_preserve_order(all_urls);
    if urls.is_empty() {
        return Err(FetchError::NoResults);
    }

    let output = profile_dir.join(JOBS_FILE);
    let mut body = urls.join("\n");
    body.push('\n');
    fs::write(&output, body).map_err(|source| FetchError::Write {
        path: output.clone(),
        source,
    })?;
    info!("wrote {} URLs to {}", urls.len(), output.display());

    Ok(FetchSummary {
        written: urls.len(),
        output,
        warnings,
    })
}

async fn collect_source(
    client: &reqwest::Client,
    endpoints: &FetchEndpoints,
    source: &SourceSpec,
) -> Result<Vec<String>, String> {
    let Some(provider) = Provider::parse(&source.provider) else {
        return Err(format!("unknown provider: {}", source.provider.trim()));
    };
    let keywords = normalize_terms(&source.keywords);
    let locations = normalize_terms(&source.locations);

    let postings = match provider {
        Provider::GoogleJobs => {
            let query = source
                .query
                .as_deref()
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .ok_or_else(|| "google_jobs source missing query".to_string())?;
            return Ok(vec![build_google_jobs_url(query)]);
        }
        Provider::Greenhouse => {
            let company = required_company(source, "greenhouse")?;
            let url = format!("{}/v1/boards/{company}/jobs", endpoints.greenhouse);
            let board: GreenhouseBoard = get_json(client, &url)
                .await
                .map_err(|err| format!("greenhouse fetch failed for {company}: {err}"))?;
            board
                .jobs
                .into_iter()
                .map(|job| Posting {
                    title: job.title,
                    location: job.location.map(|l| l.name).unwrap_or_default(),
                    url: job.absolute_url,
                })
                .collect::<Vec<_>>()
        }
        Provider::Lever => {
            let company = required_company(source, "lever")?;
            let url = format!("{}/v0/postings/{company}?mode=json", endpoints.lever);
            let postings: Vec<LeverPosting> = get_json(client, &url)
                .await
                .map_err(|err| format!("lever fetch failed for {company}: {err}"))?;
            postings
                .into_iter()
                .map(|posting| Posting {
                    title: posting.text,
                    location: posting.categories.location,
                    url: posting.hosted_url,
                })
                .collect::<Vec<_>>()
        }
    };

    Ok(filter_postings(
        postings,
        &keywords,
        &locations,
        source.max_results,
    ))
}

fn required_company<'a>(source: &'a SourceSpec, provider: &str) -> Result<&'a str, String> {
    source
        .company
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| format!("{provider} source missing company"))
}

async fn get_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> Result<T, String> {
    let response = client.get(url).send().await.map_err(|e| e.to_string())?;
    let status = response.status();
    if !status.is_success() {
        return Err(format!("http {}", status.as_u16()));
    }
    let bytes = response.bytes().await.map_err(|e| e.to_string())?;
    serde_json::from_slice(&bytes).map_err(|e| e.to_string())
}

fn filter_postings(
    postings: Vec<Posting>,
    keywords: &[String],
    locations: &[String],
    max_results: Option<usize>,
) -> Vec<String> {
    let mut out = Vec::new();
    for posting in postings {
        if posting.url.is_empty() {
            continue;
        }
        if matches_job(&posting.title, &posting.location, keywords, locations) {
            out.push(posting.url);
        }
        if max_results.is_some_and(|max| max > 0 && out.len() >= max) {
            break;
        }
    }
    out
}

pub fn normalize_terms(terms: &[String]) -> Vec<String> {
    terms
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn matches_terms(text: &str, terms: &[String]) -> bool {
    if terms.is_empty() {
        return true;
    }
    let lower = text.to_lowercase();
    terms.iter().any(|term| lower.contains(term.as_str()))
}

/// Keywords may hit the title or the location; locations only the location.
pub fn matches_job(title: &str, location: &str, keywords: &[String], locations: &[String]) -> bool {
    if !keywords.is_empty()
        && !(matches_terms(title, keywords) || matches_terms(location, keywords))
    {
        return false;
    }
    matches_terms(location, locations)
}

pub fn build_google_jobs_url(query: &str) -> String {
    let encoded = url::form_urlencoded::byte_serialize(query.as_bytes()).collect::<String>();
    format!("https://www.google.com/search?q={encoded}&ibp=htl;jobs")
}

pub fn unique_preserve_order(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(raw: &[&str]) -> Vec<String> {
        normalize_terms(&raw.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn keywords_match_title_or_location() {
        let kw = terms(&["Security"]);
        assert!(matches_job("Security Engineer", "Denver", &kw, &[]));
        assert!(matches_job("Engineer", "Security Campus", &kw, &[]));
        assert!(!matches_job("Engineer", "Denver", &kw, &[]));
    }

    #[test]
    fn locations_only_match_location() {
        let loc = terms(&[" remote "]);
        assert!(matches_job("Remote-first engineer", "Remote - US", &[], &loc));
        assert!(!matches_job("Remote-first engineer", "Austin", &[], &loc));
    }

    #[test]
    fn google_query_is_form_encoded() {
        assert_eq!(
            build_google_jobs_url("cyber security & intel"),
            "https://www.google.com/search?q=cyber+security+%26+intel&ibp=htl;jobs"
        );
    }

    #[test]
    fn max_results_caps_matches() {
        let postings = (0..5)
            .map(|i| Posting {
                title: format!("Engineer {i}"),
                location: String::new(),
                url: format!("https://x.test/{i}"),
            })
            .collect();
        let urls = filter_postings(postings, &[], &[], Some(2));
        assert_eq!(urls, vec!["https://x.test/0", "https://x.test/1"]);
    }

    #[test]
    fn provider_names_are_case_insensitive() {
        assert_eq!(Provider::parse(" Lever "), Some(Provider::Lever));
        assert_eq!(Provider::parse("GOOGLE_JOBS"), Some(Provider::GoogleJobs));
        assert_eq!(Provider::parse("workday"), None);
    }
}

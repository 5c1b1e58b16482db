//! Working out where a wiki keeps its articles and whether it has an API.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use reqwest::Url;
use serde::Serialize;

use crate::api::MediaWikiApi;
use crate::config::WikiConfig;
use crate::error::{Error, Result};
use crate::html::{Anchor, WikiDocument};
use crate::http::{FetchedPage, PageFetcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    Api,
    Scrape,
}

/// Strategies for finding the root segment, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RootSegmentSource {
    /// First path segment of the URL the caller gave.
    InputPath,
    /// First path segment of the landing page after redirects.
    LandingRedirect,
    /// A landing-page link mentioning "Main".
    MainPageLink,
    /// Most common first segment among `/segment/Page` links.
    LinkFrequency,
}

impl RootSegmentSource {
    pub const ORDER: [Self; 4] = [
        Self::InputPath,
        Self::LandingRedirect,
        Self::MainPageLink,
        Self::LinkFrequency,
    ];

    fn discover(self, context: &DiscoveryContext<'_>) -> Option<String> {
        match self {
            Self::InputPath => first_path_segment(context.input.path()),
            Self::LandingRedirect => Url::parse(&context.landing.final_url)
                .ok()
                .and_then(|url| first_path_segment(url.path())),
            Self::MainPageLink => context
                .anchors
                .iter()
                .filter_map(|anchor| anchor.href.as_deref())
                .filter(|href| href.contains("Main"))
                .filter_map(|href| context.resolve_same_host(href))
                .find_map(|url| first_path_segment(url.path())),
            Self::LinkFrequency => most_common_segment(&context.anchors),
        }
    }
}

impl fmt::Display for RootSegmentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InputPath => "input path",
            Self::LandingRedirect => "landing redirect",
            Self::MainPageLink => "main page link",
            Self::LinkFrequency => "link frequency",
        };
        f.write_str(label)
    }
}

/// Where a wiki lives and how it can be queried. Fixed after construction.
#[derive(Debug, Clone, Serialize)]
pub struct WikiIdentity {
    pub base_url: String,
    pub root_segment: String,
    pub root_source: RootSegmentSource,
    pub api_endpoint: Option<String>,
    pub mode: AccessMode,
}

impl WikiIdentity {
    pub fn has_api(&self) -> bool {
        self.mode == AccessMode::Api
    }
}

pub struct ResolvedWiki {
    pub identity: WikiIdentity,
    pub api: Option<MediaWikiApi>,
}

struct DiscoveryContext<'a> {
    input: &'a Url,
    landing: &'a FetchedPage,
    anchors: Vec<Anchor>,
}

impl DiscoveryContext<'_> {
    fn resolve_same_host(&self, href: &str) -> Option<Url> {
        let base = Url::parse(&self.landing.final_url).ok()?;
        let url = base.join(href).ok()?;
        (url.host_str() == base.host_str()).then_some(url)
    }
}

/// Resolve `input` (host, URL or any page URL) into a [`WikiIdentity`].
pub fn resolve(
    input: &str,
    fetcher: Arc<dyn PageFetcher>,
    config: &WikiConfig,
) -> Result<ResolvedWiki> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("empty wiki url".to_string()));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    let input_url = Url::parse(&with_scheme)
        .map_err(|_| Error::InvalidInput(format!("invalid url: {trimmed}")))?;
    let host = input_url
        .host_str()
        .filter(|host| host.contains('.'))
        .ok_or_else(|| Error::InvalidInput(format!("invalid url: {trimmed}")))?;
    let base_url = match input_url.port() {
        Some(port) => format!("{}://{host}:{port}", input_url.scheme()),
        None => format!("{}://{host}", input_url.scheme()),
    };

    let landing = fetcher
        .fetch(&base_url)
        .map_err(|error| Error::ConnectionFailed {
            url: base_url.clone(),
            reason: format!("{error:#}"),
        })?;
    if !landing.is_ok() {
        return Err(Error::ConnectionFailed {
            url: base_url,
            reason: format!("HTTP {}", landing.status),
        });
    }

    let context = DiscoveryContext {
        input: &input_url,
        anchors: WikiDocument::parse(&landing.body).anchors(),
        landing: &landing,
    };
    let (root_segment, root_source) = RootSegmentSource::ORDER
        .into_iter()
        .find_map(|source| {
            let found = source.discover(&context);
            tracing::debug!(%source, found = ?found, "root segment strategy");
            found.map(|segment| (segment, source))
        })
        .ok_or_else(|| Error::PageNameNotFound {
            url: base_url.clone(),
        })?;

    let mut api = None;
    for candidate in api_candidates(&input_url, &base_url, &root_segment, config) {
        match MediaWikiApi::connect(Arc::clone(&fetcher), &candidate) {
            Ok(client) => {
                api = Some(client);
                break;
            }
            Err(error) => tracing::debug!(endpoint = %candidate, error = %error, "not an API endpoint"),
        }
    }
    if api.is_none() {
        tracing::warn!(%base_url, "could not find API, web scraping will be used");
    }

    let identity = WikiIdentity {
        base_url,
        root_segment,
        root_source,
        api_endpoint: api.as_ref().map(|client| client.endpoint().to_string()),
        mode: if api.is_some() {
            AccessMode::Api
        } else {
            AccessMode::Scrape
        },
    };
    tracing::info!(
        base_url = %identity.base_url,
        root = %identity.root_segment,
        source = %identity.root_source,
        mode = ?identity.mode,
        "resolved wiki"
    );
    Ok(ResolvedWiki { identity, api })
}

fn api_candidates(
    input: &Url,
    base_url: &str,
    root_segment: &str,
    config: &WikiConfig,
) -> Vec<String> {
    let mut candidates = Vec::new();
    if let Some(api_url) = config.api_url_owned() {
        candidates.push(api_url);
    }
    if config.probe_api() {
        if input.path().ends_with("api.php") {
            let mut endpoint = input.clone();
            endpoint.set_query(None);
            endpoint.set_fragment(None);
            candidates.push(endpoint.to_string());
        }
        candidates.push(format!("{base_url}/wiki/api.php"));
        candidates.push(format!("{base_url}/api.php"));
        candidates.push(format!("{base_url}/w/api.php"));
        candidates.push(format!("{base_url}/{root_segment}/api.php"));
    }
    dedupe(candidates)
}

/// First segment of a path, only when something follows it
/// (`/wiki/Page` → `wiki`, `/wiki` → none). Script paths are skipped.
fn first_path_segment(path: &str) -> Option<String> {
    let (first, rest) = path.strip_prefix('/')?.split_once('/')?;
    if first.is_empty() || rest.ends_with(".php") {
        return None;
    }
    Some(first.to_string())
}

fn most_common_segment(anchors: &[Anchor]) -> Option<String> {
    let mut counts = BTreeMap::<String, usize>::new();
    for href in anchors.iter().filter_map(|anchor| anchor.href.as_deref()) {
        let parts = href.split('/').collect::<Vec<_>>();
        if parts.len() == 3 && parts[0].is_empty() && !parts[1].is_empty() {
            *counts.entry(parts[1].to_string()).or_default() += 1;
        }
    }
    // Ties go to the lexicographically smallest segment.
    counts
        .into_iter()
        .max_by(|left, right| left.1.cmp(&right.1).then_with(|| right.0.cmp(&left.0)))
        .map(|(segment, _)| segment)
}

fn dedupe(values: Vec<String>) -> Vec<String> {
    let mut output = Vec::new();
    let mut seen = HashSet::new();
    for value in values {
        if seen.insert(value.clone()) {
            output.push(value);
        }
    }
    output
}

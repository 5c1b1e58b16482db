//! Page titles, namespaces and the URLs that point at them.

use std::fmt;

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use reqwest::Url;

use crate::error::{Error, Result};

pub const CATEGORY_NAMESPACE: &str = "Category";
pub const USER_NAMESPACE: &str = "User";
pub const FILE_NAMESPACE: &str = "File";

const KNOWN_NAMESPACES: &[&str] = &[
    "Talk",
    "User",
    "User talk",
    "Project",
    "Project talk",
    "File",
    "File talk",
    "MediaWiki",
    "MediaWiki talk",
    "Template",
    "Template talk",
    "Help",
    "Help talk",
    "Category",
    "Category talk",
    "Special",
    "Media",
    "Portal",
    "Portal talk",
    "Wikipedia",
    "Draft",
    "Module",
];

// Same reserved set MediaWiki leaves encoded in article URLs.
const TITLE_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Canonical (namespace, name) reference to a category or page.
///
/// The main namespace is the empty string. Names never contain underscores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CategoryRef {
    namespace: String,
    name: String,
}

impl CategoryRef {
    pub fn category(name: &str) -> Self {
        Self {
            namespace: CATEGORY_NAMESPACE.to_string(),
            name: normalize_name(name),
        }
    }

    /// A main-namespace page such as a list article.
    pub fn page(name: &str) -> Self {
        Self {
            namespace: String::new(),
            name: normalize_name(name),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_category(&self) -> bool {
        self.namespace == CATEGORY_NAMESPACE
    }

    /// Full title, e.g. "Category:Countries in Asia". Also the traversal key.
    pub fn title(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}:{}", self.namespace, self.name)
        }
    }
}

impl fmt::Display for CategoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title())
    }
}

/// Where articles live on one wiki: `{base_url}/{root_segment}/{Title}`.
#[derive(Debug, Clone)]
pub struct SiteLayout {
    base_url: String,
    root_segment: String,
    extra_namespaces: Vec<String>,
}

impl SiteLayout {
    pub fn new(base_url: &str, root_segment: &str, extra_namespaces: &[String]) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            root_segment: root_segment.trim_matches('/').to_string(),
            extra_namespaces: extra_namespaces
                .iter()
                .map(|namespace| normalize_spaces(namespace))
                .filter(|namespace| !namespace.is_empty())
                .collect(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn root_segment(&self) -> &str {
        &self.root_segment
    }

    pub fn page_base_url(&self) -> String {
        format!("{}/{}/", self.base_url, self.root_segment)
    }

    pub fn article_url(&self, title: &str) -> String {
        format!("{}{}", self.page_base_url(), encode_title(title))
    }

    pub fn reference_url(&self, reference: &CategoryRef) -> String {
        self.article_url(&reference.title())
    }

    /// Resolve a (possibly relative) href against the wiki origin.
    pub fn resolve_href(&self, href: &str) -> Option<Url> {
        Url::parse(&self.page_base_url()).ok()?.join(href).ok()
    }

    /// Title of an article-path URL on this wiki (`/{root}/Title`), decoded.
    pub fn article_title(&self, url: &Url) -> Option<String> {
        if !self.same_host(url) {
            return None;
        }
        let prefix = format!("/{}/", self.root_segment);
        let raw = url.path().strip_prefix(&prefix)?;
        let title = decode_title(raw);
        if title.is_empty() { None } else { Some(title) }
    }

    /// Like [`article_title`](Self::article_title), also accepting `index.php?title=`.
    pub fn title_from_url(&self, url: &Url) -> Option<String> {
        if let Some(title) = self.article_title(url) {
            return Some(title);
        }
        if !url.path().ends_with("index.php") {
            return None;
        }
        url.query_pairs()
            .find(|(key, _)| key == "title")
            .map(|(_, value)| normalize_spaces(&value.replace('_', " ")))
            .filter(|title| !title.is_empty())
    }

    /// Normalize user input into a reference.
    ///
    /// Bare names are categories; URLs keep the namespace they point at, so a
    /// URL to an article yields a main-namespace page.
    pub fn parse_reference(&self, input: &str) -> Result<CategoryRef> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("empty category reference".to_string()));
        }

        if let Some(url) = self.as_url(trimmed) {
            let title = self.title_from_url(&url).ok_or_else(|| {
                Error::InvalidInput(format!("not an article URL on this wiki: {trimmed}"))
            })?;
            return Ok(self.page_reference(&title));
        }

        let (namespace, name) = self.split_namespace(trimmed);
        if name.is_empty() {
            return Err(Error::InvalidInput(format!("invalid input: {trimmed}")));
        }
        Ok(CategoryRef {
            namespace: namespace.unwrap_or_else(|| CATEGORY_NAMESPACE.to_string()),
            name,
        })
    }

    /// Reference for a title read from the wiki itself (no category default).
    pub fn page_reference(&self, title: &str) -> CategoryRef {
        let (namespace, name) = self.split_namespace(title);
        CategoryRef {
            namespace: namespace.unwrap_or_default(),
            name,
        }
    }

    pub fn split_namespace(&self, title: &str) -> (Option<String>, String) {
        if let Some((prefix, rest)) = title.split_once(':')
            && let Some(namespace) = self.canonical_namespace(prefix)
            && !rest.trim().is_empty()
        {
            return (Some(namespace), normalize_name(rest));
        }
        (None, normalize_name(title))
    }

    fn canonical_namespace(&self, prefix: &str) -> Option<String> {
        let prefix = normalize_spaces(&prefix.replace('_', " "));
        if prefix.eq_ignore_ascii_case("Image") {
            return Some(FILE_NAMESPACE.to_string());
        }
        KNOWN_NAMESPACES
            .iter()
            .map(|namespace| (*namespace).to_string())
            .chain(self.extra_namespaces.iter().cloned())
            .find(|namespace| namespace.eq_ignore_ascii_case(&prefix))
    }

    fn as_url(&self, input: &str) -> Option<Url> {
        if input.contains("://") {
            return Url::parse(input).ok();
        }
        let host = Url::parse(&self.base_url).ok()?.host_str()?.to_string();
        if input.starts_with(&format!("{host}/")) {
            return Url::parse(&format!("http://{input}")).ok();
        }
        None
    }

    fn same_host(&self, url: &Url) -> bool {
        match Url::parse(&self.base_url) {
            Ok(base) => base.host_str() == url.host_str(),
            Err(_) => false,
        }
    }
}

/// `Countries_in_Asia` → `Countries in Asia`, percent-decoded.
pub fn decode_title(raw: &str) -> String {
    let decoded = percent_decode_str(raw).decode_utf8_lossy();
    normalize_spaces(&decoded.replace('_', " "))
}

pub fn encode_title(title: &str) -> String {
    let underscored = normalize_spaces(title).replace(' ', "_");
    utf8_percent_encode(&underscored, TITLE_ENCODE_SET).to_string()
}

/// Display form used as a nested-result key: the name without its namespace.
pub fn display_name(title: &str) -> String {
    let title = normalize_spaces(&title.replace('_', " "));
    match title.split_once(':') {
        Some((prefix, rest)) if prefix.eq_ignore_ascii_case(CATEGORY_NAMESPACE) => {
            rest.trim().to_string()
        }
        _ => title,
    }
}

fn normalize_name(name: &str) -> String {
    let spaced = normalize_spaces(&name.replace('_', " "));
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn normalize_spaces(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

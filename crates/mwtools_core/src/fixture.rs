//! In-memory wiki served through [`PageFetcher`] for tests.
//!
//! One model backs both views: MediaWiki API JSON and rendered category HTML,
//! so API and scrape expansions can be compared against the same data.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use anyhow::{Result, bail};
use reqwest::Url;
use serde_json::{Value, json};

use crate::http::{FetchedPage, PageFetcher};
use crate::title::{decode_title, encode_title};

#[derive(Debug, Clone, Default)]
struct FixtureCategory {
    members: Vec<String>,
    subcategories: Vec<String>,
}

#[derive(Debug, Clone)]
enum Landing {
    /// `/` redirects to `/{root}/Main_Page`.
    Redirect,
    /// `/` answers directly with this body.
    Direct(String),
    /// `/` answers with this status.
    Status(u16),
}

pub struct FixtureWiki {
    origin: String,
    root: String,
    api_path: Option<String>,
    api_page_size: usize,
    html_page_size: usize,
    landing: Landing,
    categories: BTreeMap<String, FixtureCategory>,
    pages: BTreeMap<String, String>,
    failing_titles: BTreeSet<String>,
    failing_api_categories: BTreeSet<String>,
    requests: Mutex<Vec<String>>,
}

impl FixtureWiki {
    pub fn new(origin: &str) -> Self {
        Self {
            origin: origin.trim_end_matches('/').to_string(),
            root: "wiki".to_string(),
            api_path: None,
            api_page_size: 500,
            html_page_size: 200,
            landing: Landing::Redirect,
            categories: BTreeMap::new(),
            pages: BTreeMap::new(),
            failing_titles: BTreeSet::new(),
            failing_api_categories: BTreeSet::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_root(mut self, root: &str) -> Self {
        self.root = root.to_string();
        self
    }

    pub fn with_api(mut self, path: &str) -> Self {
        self.api_path = Some(path.to_string());
        self
    }

    pub fn with_api_page_size(mut self, size: usize) -> Self {
        self.api_page_size = size.max(1);
        self
    }

    pub fn with_html_page_size(mut self, size: usize) -> Self {
        self.html_page_size = size.max(1);
        self
    }

    pub fn with_landing_body(mut self, body: &str) -> Self {
        self.landing = Landing::Direct(body.to_string());
        self
    }

    pub fn with_landing_status(mut self, status: u16) -> Self {
        self.landing = Landing::Status(status);
        self
    }

    pub fn category(mut self, name: &str, members: &[&str], subcategories: &[&str]) -> Self {
        self.categories.insert(
            name.to_string(),
            FixtureCategory {
                members: members.iter().map(ToString::to_string).collect(),
                subcategories: subcategories.iter().map(ToString::to_string).collect(),
            },
        );
        self
    }

    /// A list article whose body links to `links`.
    pub fn list_page(mut self, title: &str, links: &[&str]) -> Self {
        let mut items = String::new();
        for link in links {
            items.push_str(&format!(
                "<li><a href=\"/{}/{}\" title=\"{link}\">{link}</a></li>\n",
                self.root,
                encode_title(link)
            ));
        }
        let body = format!(
            "<html><body><h1 id=\"firstHeading\">{title}</h1>\n<div id=\"mw-content-text\">\n\
             <p>See also <a class=\"external text\" href=\"https://example.org\">elsewhere</a>.</p>\n\
             <ul>\n{items}</ul>\n<a href=\"/{root}/File:Map.png\">File:Map.png</a>\n</div></body></html>",
            root = self.root
        );
        self.pages.insert(title.to_string(), body);
        self
    }

    pub fn user_page(mut self, title: &str, work_in_progress: bool) -> Self {
        let notice = if work_in_progress {
            "<table class=\"plainlinks ombox ombox-notice\"><tr><td class=\"mbox-text\">\
             This page is a work-in-progress draft.</td></tr></table>"
        } else {
            ""
        };
        let body = format!(
            "<html><body><h1 id=\"firstHeading\">{title}</h1><div id=\"mw-content-text\">{notice}<p>Hello.</p></div></body></html>"
        );
        self.pages.insert(title.to_string(), body);
        self
    }

    pub fn failing_title(mut self, title: &str) -> Self {
        self.failing_titles.insert(title.to_string());
        self
    }

    pub fn failing_api_category(mut self, name: &str) -> Self {
        self.failing_api_categories.insert(name.to_string());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn serve(&self, url: &Url) -> Result<FetchedPage> {
        let path = url.path();
        if self.api_path.as_deref() == Some(path) {
            return Ok(self.serve_api(url));
        }
        if path == "/" || path.is_empty() {
            return Ok(self.serve_landing());
        }
        let article_prefix = format!("/{}/", self.root);
        if let Some(raw) = path.strip_prefix(&article_prefix) {
            let title = decode_title(raw);
            return Ok(self.serve_title(url, &title, 0, 0));
        }
        if path.ends_with("/index.php") {
            let query = url.query_pairs().into_owned().collect::<BTreeMap<_, _>>();
            let title = query
                .get("title")
                .map(|title| title.replace('_', " "))
                .unwrap_or_default();
            let offset = |key: &str| {
                query
                    .get(key)
                    .and_then(|value| value.parse::<usize>().ok())
                    .unwrap_or(0)
            };
            return Ok(self.serve_title(url, &title, offset("pagefrom"), offset("subcatfrom")));
        }
        Ok(self.respond(url.as_str(), 404, "<html><body>Not Found</body></html>".to_string()))
    }

    fn serve_landing(&self) -> FetchedPage {
        match &self.landing {
            Landing::Redirect => {
                let final_url = format!("{}/{}/Main_Page", self.origin, self.root);
                let body = self.main_page_body();
                self.respond(&final_url, 200, body)
            }
            Landing::Direct(body) => self.respond(&format!("{}/", self.origin), 200, body.clone()),
            Landing::Status(status) => {
                self.respond(&format!("{}/", self.origin), *status, String::new())
            }
        }
    }

    fn main_page_body(&self) -> String {
        format!(
            "<html><body><h1 id=\"firstHeading\">Main Page</h1><div id=\"mw-content-text\">\
             <a href=\"/{root}/Main_Page\">Main Page</a></div></body></html>",
            root = self.root
        )
    }

    fn serve_title(&self, url: &Url, title: &str, page_from: usize, subcat_from: usize) -> FetchedPage {
        if self.failing_titles.contains(title) {
            return self.respond(url.as_str(), 500, String::new());
        }
        if let Some(name) = title.strip_prefix("Category:")
            && let Some(category) = self.categories.get(name)
        {
            let body = self.render_category(name, category, page_from, subcat_from);
            return self.respond(url.as_str(), 200, body);
        }
        if title == "Main Page" {
            return self.respond(url.as_str(), 200, self.main_page_body());
        }
        match self.pages.get(title) {
            Some(body) => self.respond(url.as_str(), 200, body.clone()),
            None => self.respond(url.as_str(), 404, String::new()),
        }
    }

    fn render_category(
        &self,
        name: &str,
        category: &FixtureCategory,
        page_from: usize,
        subcat_from: usize,
    ) -> String {
        let category_title = encode_title(&format!("Category:{name}"));
        let mut body = format!(
            "<html><body><h1 id=\"firstHeading\" class=\"firstHeading\">\
             <span class=\"mw-page-title-namespace\">Category</span>:<span>{name}</span></h1>\n\
             <div id=\"mw-content-text\"><p>Intro with a <a href=\"/{root}/Help:Categories\">help link</a>.</p></div>\n",
            root = self.root
        );

        if !category.subcategories.is_empty() {
            let (items, nav) = self.render_block(
                &category.subcategories,
                subcat_from,
                &category_title,
                "subcatfrom",
                "mw-subcategories",
                |subcategory| {
                    format!(
                        "<li><div class=\"CategoryTreeItem\"><a href=\"/{}/{}\" title=\"Category:{subcategory}\">{subcategory}</a></div></li>",
                        self.root,
                        encode_title(&format!("Category:{subcategory}"))
                    )
                },
            );
            body.push_str(&format!(
                "<div id=\"mw-subcategories\"><h2>Subcategories</h2>{nav}<ul>{items}</ul>{nav}</div>\n"
            ));
        }

        if !category.members.is_empty() {
            let (items, nav) = self.render_block(
                &category.members,
                page_from,
                &category_title,
                "pagefrom",
                "mw-pages",
                |member| {
                    format!(
                        "<li><a href=\"/{}/{}\" title=\"{member}\">{member}</a></li>",
                        self.root,
                        encode_title(member)
                    )
                },
            );
            body.push_str(&format!(
                "<div id=\"mw-pages\"><h2>Pages in category \"{name}\"</h2>{nav}\
                 <div class=\"mw-content-ltr\"><ul>{items}</ul></div>{nav}</div>\n"
            ));
        }

        body.push_str(&format!(
            "<div id=\"catlinks\"><a href=\"/{}/Special:Categories\">Categories</a></div></body></html>",
            self.root
        ));
        body
    }

    fn render_block(
        &self,
        entries: &[String],
        from: usize,
        category_title: &str,
        cursor_key: &str,
        anchor: &str,
        render: impl Fn(&str) -> String,
    ) -> (String, String) {
        let end = (from + self.html_page_size).min(entries.len());
        let start = from.min(end);
        let items = entries[start..end]
            .iter()
            .map(|entry| render(entry))
            .collect::<String>();

        let previous = if start > 0 {
            let back = start.saturating_sub(self.html_page_size);
            format!(
                "(<a href=\"/w/index.php?title={category_title}&amp;{cursor_key}={back}#{anchor}\">previous page</a>)"
            )
        } else {
            "(previous page)".to_string()
        };
        let next = if end < entries.len() {
            format!(
                "(<a href=\"/w/index.php?title={category_title}&amp;{cursor_key}={end}#{anchor}\">next page</a>)"
            )
        } else {
            "(next page)".to_string()
        };
        (items, format!("{previous} {next}"))
    }

    fn serve_api(&self, url: &Url) -> FetchedPage {
        let query = url.query_pairs().into_owned().collect::<BTreeMap<_, _>>();
        let payload = if query.get("meta").map(String::as_str) == Some("siteinfo") {
            json!({
                "batchcomplete": true,
                "query": {"general": {"sitename": "Fixture Wiki", "mainpage": "Main Page"}}
            })
        } else if query.get("list").map(String::as_str) == Some("categorymembers") {
            self.api_category_members(&query)
        } else {
            json!({"error": {"code": "badvalue", "info": "Unrecognized request."}})
        };
        self.respond(url.as_str(), 200, payload.to_string())
    }

    fn api_category_members(&self, query: &BTreeMap<String, String>) -> Value {
        let name = query
            .get("cmtitle")
            .and_then(|title| title.strip_prefix("Category:"))
            .unwrap_or_default()
            .replace('_', " ");
        if self.failing_api_categories.contains(&name) {
            return json!({"error": {"code": "internal_api_error", "info": "Database query error."}});
        }

        let mut entries = Vec::new();
        if let Some(category) = self.categories.get(&name) {
            for subcategory in &category.subcategories {
                entries.push(json!({"ns": 14, "title": format!("Category:{subcategory}"), "type": "subcat"}));
            }
            for member in &category.members {
                let (ns, kind) = if member.starts_with("File:") {
                    (6, "file")
                } else if member.starts_with("User:") {
                    (2, "page")
                } else {
                    (0, "page")
                };
                entries.push(json!({"ns": ns, "title": member, "type": kind}));
            }
        }

        let from = query
            .get("cmcontinue")
            .and_then(|token| token.parse::<usize>().ok())
            .unwrap_or(0)
            .min(entries.len());
        let end = (from + self.api_page_size).min(entries.len());
        let batch = entries[from..end].to_vec();
        if end < entries.len() {
            json!({
                "continue": {"cmcontinue": end.to_string(), "continue": "-||"},
                "query": {"categorymembers": batch}
            })
        } else {
            json!({"batchcomplete": true, "query": {"categorymembers": batch}})
        }
    }

    fn respond(&self, final_url: &str, status: u16, body: String) -> FetchedPage {
        FetchedPage {
            status,
            final_url: final_url.to_string(),
            body,
        }
    }
}

impl PageFetcher for FixtureWiki {
    fn fetch(&self, url: &str) -> Result<FetchedPage> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }
        let parsed = Url::parse(url)?;
        let origin = Url::parse(&self.origin)?;
        if parsed.host_str() != origin.host_str() {
            bail!("dns error: failed to lookup address information for {url}");
        }
        self.serve(&parsed)
    }
}

/// Two overlapping country categories (41 distinct countries) with files, lists
/// and a subcategory, paginated small enough to exercise every cursor.
pub fn countries_wiki() -> FixtureWiki {
    FixtureWiki::new("https://wiki.example.org")
        .with_api("/w/api.php")
        .with_api_page_size(7)
        .with_html_page_size(10)
        .category(
            "Countries in Asia",
            &[
                "List of countries in Asia",
                "Afghanistan",
                "Azerbaijan",
                "Bangladesh",
                "Bhutan",
                "Cambodia",
                "China",
                "Cyprus",
                "File:Asia map.svg",
                "Georgia (country)",
                "India",
                "Indonesia",
                "Iran",
                "Japan",
                "Kazakhstan",
                "Laos",
                "Malaysia",
                "Mongolia",
                "Nepal",
                "Pakistan",
                "Philippines",
                "Russia",
                "Singapore",
                "Thailand",
                "Turkey",
                "Vietnam",
            ],
            &["Landlocked countries in Asia"],
        )
        .category(
            "Countries in Europe",
            &[
                "List of sovereign states in Europe",
                "Albania",
                "Austria",
                "Azerbaijan",
                "Belgium",
                "Cyprus",
                "Denmark",
                "Estonia",
                "File:Europe.png",
                "Finland",
                "France",
                "Georgia (country)",
                "Germany",
                "Greece",
                "Iceland",
                "Ireland",
                "Italy",
                "Kazakhstan",
                "Norway",
                "Poland",
                "Portugal",
                "Russia",
                "Spain",
                "Sweden",
                "Turkey",
            ],
            &[],
        )
        .category(
            "Landlocked countries in Asia",
            &["Afghanistan", "Bhutan", "Kazakhstan", "Kyrgyzstan", "Laos", "Mongolia", "Nepal"],
            &[],
        )
        .list_page("List of island nations", &["Japan", "Iceland", "Cyprus", "Singapore"])
}

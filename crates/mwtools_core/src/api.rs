use std::sync::Arc;

use anyhow::{Context, Result, bail};
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use crate::http::PageFetcher;
use crate::title::display_name;

pub const NS_CATEGORY: i32 = 14;

const CATEGORY_MEMBERS_LIMIT: &str = "500";

/// One level of category membership as reported by the API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryMembers {
    pub pages: Vec<String>,
    /// Subcategory names without the `Category:` prefix.
    pub subcategories: Vec<String>,
}

impl CategoryMembers {
    fn extend(&mut self, other: CategoryMembers) {
        self.pages.extend(other.pages);
        self.subcategories.extend(other.subcategories);
    }
}

/// Read-only MediaWiki Action API client that shares the crate's transport.
pub struct MediaWikiApi {
    fetcher: Arc<dyn PageFetcher>,
    endpoint: String,
    site_name: Option<String>,
}

impl MediaWikiApi {
    /// Handshake with `endpoint`; fails unless it answers a siteinfo query.
    pub fn connect(fetcher: Arc<dyn PageFetcher>, endpoint: &str) -> Result<Self> {
        let payload = request_json(
            fetcher.as_ref(),
            endpoint,
            &[
                ("action", "query".to_string()),
                ("meta", "siteinfo".to_string()),
                ("siprop", "general".to_string()),
            ],
        )?;
        let parsed: QueryResponse =
            serde_json::from_value(payload).context("failed to decode siteinfo API response")?;
        let general = parsed
            .query
            .general
            .ok_or_else(|| anyhow::anyhow!("{endpoint} did not return siteinfo"))?;

        Ok(Self {
            fetcher,
            endpoint: endpoint.to_string(),
            site_name: general.sitename,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn site_name(&self) -> Option<&str> {
        self.site_name.as_deref()
    }

    /// All members of `category`, following `cmcontinue` until exhausted.
    pub fn category_members(&self, category: &str) -> Result<CategoryMembers> {
        let mut members = CategoryMembers::default();
        let mut continue_token: Option<String> = None;

        loop {
            let (batch, next) = self.category_members_page(category, continue_token.as_deref())?;
            members.extend(batch);
            continue_token = next;
            if continue_token.is_none() {
                break;
            }
        }

        Ok(members)
    }

    /// One API batch plus the cursor for the next one.
    pub fn category_members_page(
        &self,
        category: &str,
        cursor: Option<&str>,
    ) -> Result<(CategoryMembers, Option<String>)> {
        let category_title = if category.starts_with("Category:") {
            category.to_string()
        } else {
            format!("Category:{category}")
        };

        let mut params = vec![
            ("action", "query".to_string()),
            ("list", "categorymembers".to_string()),
            ("cmtitle", category_title),
            ("cmprop", "title|type".to_string()),
            ("cmtype", "page|subcat|file".to_string()),
            ("cmlimit", CATEGORY_MEMBERS_LIMIT.to_string()),
        ];
        if let Some(token) = cursor {
            params.push(("cmcontinue", token.to_string()));
        }

        let payload = request_json(self.fetcher.as_ref(), &self.endpoint, &params)?;
        let parsed: QueryResponse = serde_json::from_value(payload)
            .context("failed to decode categorymembers API response")?;

        let mut members = CategoryMembers::default();
        for item in parsed.query.categorymembers {
            if item.ns == NS_CATEGORY {
                members.subcategories.push(display_name(&item.title));
            } else {
                members.pages.push(item.title);
            }
        }
        let next = parsed.continuation.and_then(|cont| cont.cmcontinue);
        Ok((members, next))
    }
}

fn request_json(
    fetcher: &dyn PageFetcher,
    endpoint: &str,
    params: &[(&str, String)],
) -> Result<Value> {
    let mut pairs = Vec::with_capacity(params.len() + 2);
    pairs.push(("format".to_string(), "json".to_string()));
    pairs.push(("formatversion".to_string(), "2".to_string()));
    for (key, value) in params {
        if !value.is_empty() {
            pairs.push(((*key).to_string(), value.clone()));
        }
    }
    let url = Url::parse_with_params(endpoint, &pairs)
        .with_context(|| format!("invalid API endpoint: {endpoint}"))?;

    let response = fetcher.fetch(url.as_str())?;
    if !response.is_ok() {
        bail!("MediaWiki API request failed with HTTP {}", response.status);
    }

    let payload: Value = serde_json::from_str(&response.body)
        .context("failed to decode MediaWiki API JSON response")?;
    if let Some(error) = payload.get("error") {
        let code = error
            .get("code")
            .and_then(Value::as_str)
            .unwrap_or("unknown_error");
        let info = error
            .get("info")
            .and_then(Value::as_str)
            .unwrap_or("unknown info");
        bail!("MediaWiki API error [{code}]: {info}");
    }
    Ok(payload)
}

#[derive(Debug, Deserialize, Default)]
struct QueryResponse {
    #[serde(default)]
    query: QueryPayload,
    #[serde(default, rename = "continue")]
    continuation: Option<ContinuationPayload>,
}

#[derive(Debug, Deserialize, Default)]
struct QueryPayload {
    #[serde(default)]
    categorymembers: Vec<MemberQueryItem>,
    general: Option<GeneralInfo>,
}

#[derive(Debug, Deserialize, Default)]
struct ContinuationPayload {
    cmcontinue: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MemberQueryItem {
    title: String,
    #[serde(default)]
    ns: i32,
}

#[derive(Debug, Deserialize)]
struct GeneralInfo {
    sitename: Option<String>,
}

//! Category expansion over the API or over rendered category pages.
//!
//! Both strategies reduce one category to a [`CategoryLevel`]. Expansion
//! fetches every reachable level once on the rayon pool and then assembles the
//! [`PageCollection`] from them.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use anyhow::bail;
use rayon::ThreadPool;
use rayon::prelude::*;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::api::MediaWikiApi;
use crate::collection::{PageCollection, SELF_KEY};
use crate::error::{Error, Result};
use crate::filter::{ListMode, PageFilter, WIP_MARKER, WipProbe, is_navigation_label};
use crate::html::{Anchor, WikiDocument};
use crate::http::{FetchedPage, PageFetcher};
use crate::title::{CategoryRef, SiteLayout, display_name, encode_title};

const CATEGORY_MARKER: &str = "Category:";
const SUBCATEGORIES_ID: &str = "mw-subcategories";
const PAGES_ID: &str = "mw-pages";
const CONTENT_ID: &str = "mw-content-text";
const NEXT_PAGE_LABEL: &str = "next page";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandOptions {
    /// Also collect the first level of subcategories.
    pub include_subcats: bool,
    /// Key results by subcategory instead of flattening them.
    pub nested: bool,
    /// Keep list pages alongside ordinary pages.
    pub include_lists: bool,
    /// Walk the whole subcategory tree.
    pub recursive: bool,
    /// Keep only list pages.
    pub lists_only: bool,
    /// Use the API when the wiki has one.
    pub prefer_api: bool,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self {
            include_subcats: false,
            nested: false,
            include_lists: false,
            recursive: false,
            lists_only: false,
            prefer_api: true,
        }
    }
}

impl ExpandOptions {
    pub fn list_mode(&self) -> ListMode {
        ListMode::from_flags(self.include_lists, self.lists_only)
    }

    fn descends(&self) -> bool {
        self.include_subcats || self.recursive
    }

    /// Options passed to each subcategory of a level expanded with `self`.
    fn for_subcategories(&self) -> Self {
        Self {
            include_subcats: self.recursive,
            nested: self.recursive && self.nested,
            ..*self
        }
    }
}

/// One category level: filtered member names and its subcategories keyed by
/// display name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryLevel {
    pub members: BTreeSet<String>,
    pub subcategories: BTreeMap<String, CategoryRef>,
}

/// Borrowed view of a [`Wiki`](crate::wiki::Wiki) that performs expansions.
pub struct Expander<'a> {
    site: &'a SiteLayout,
    fetcher: &'a dyn PageFetcher,
    api: Option<&'a MediaWikiApi>,
    denylist: &'a [String],
    pool: &'a ThreadPool,
}

impl<'a> Expander<'a> {
    pub fn new(
        site: &'a SiteLayout,
        fetcher: &'a dyn PageFetcher,
        api: Option<&'a MediaWikiApi>,
        denylist: &'a [String],
        pool: &'a ThreadPool,
    ) -> Self {
        Self {
            site,
            fetcher,
            api,
            denylist,
            pool,
        }
    }

    pub fn site(&self) -> &SiteLayout {
        self.site
    }

    pub fn expand(&self, reference: &CategoryRef, options: &ExpandOptions) -> Result<PageCollection> {
        tracing::debug!(
            reference = %reference,
            api = self.uses_api(reference, options),
            "expanding"
        );
        let levels = self
            .pool
            .install(|| self.collect_levels(reference, options))?;

        let collection = if options.nested {
            assemble(reference, &levels, options, &BTreeSet::new())
        } else {
            PageCollection::Flat(
                levels
                    .values()
                    .flat_map(|level| level.members.iter().cloned())
                    .collect(),
            )
        };

        if options.recursive && options.nested {
            return Ok(PageCollection::Nested(BTreeMap::from([(
                display_name(&reference.title()),
                collection,
            )])));
        }
        Ok(collection)
    }

    /// A single level, without recursion.
    pub fn level(&self, reference: &CategoryRef, options: &ExpandOptions) -> Result<CategoryLevel> {
        match self.api {
            Some(api) if self.uses_api(reference, options) => {
                self.api_level(api, reference, options)
            }
            _ => self.scrape_level(reference, options),
        }
    }

    fn uses_api(&self, reference: &CategoryRef, options: &ExpandOptions) -> bool {
        options.prefer_api && self.api.is_some() && reference.is_category()
    }

    /// Every category reachable from `root` under `options`, keyed by title.
    ///
    /// Walks breadth first; each frontier is fetched on the pool and a title is
    /// fetched at most once per call, however many parents link to it.
    fn collect_levels(
        &self,
        root: &CategoryRef,
        options: &ExpandOptions,
    ) -> Result<HashMap<String, CategoryLevel>> {
        let root_level = self.level(root, options)?;
        let mut frontier: Vec<CategoryRef> = if options.descends() {
            root_level.subcategories.values().cloned().collect()
        } else {
            Vec::new()
        };
        let mut levels = HashMap::from([(root.title(), root_level)]);

        let child_options = options.for_subcategories();
        loop {
            let mut pending = BTreeMap::new();
            for subcategory in frontier {
                let key = subcategory.title();
                if levels.contains_key(&key) {
                    tracing::debug!(category = %key, "already expanded");
                } else {
                    pending.insert(key, subcategory);
                }
            }
            if pending.is_empty() {
                break;
            }

            let fetched = pending
                .into_iter()
                .collect::<Vec<_>>()
                .into_par_iter()
                .map(|(key, subcategory)| {
                    self.level(&subcategory, &child_options)
                        .map(|level| (key, level))
                })
                .collect::<Result<Vec<_>>>()?;

            frontier = Vec::new();
            for (key, level) in fetched {
                if child_options.descends() {
                    frontier.extend(level.subcategories.values().cloned());
                }
                levels.insert(key, level);
            }
        }
        Ok(levels)
    }

    fn api_level(
        &self,
        api: &MediaWikiApi,
        reference: &CategoryRef,
        options: &ExpandOptions,
    ) -> Result<CategoryLevel> {
        let members = api.category_members(reference.name()).map_err(|error| {
            let url = format!("{}?cmtitle={}", api.endpoint(), encode_title(&reference.title()));
            Error::fetch(url, &error)
        })?;

        let filter = PageFilter::new(self);
        Ok(CategoryLevel {
            members: filter
                .retain(members.pages, options.list_mode())
                .into_iter()
                .collect(),
            subcategories: members
                .subcategories
                .into_iter()
                .map(|name| {
                    let subcategory = CategoryRef::category(&name);
                    (name, subcategory)
                })
                .collect(),
        })
    }

    fn scrape_level(&self, reference: &CategoryRef, options: &ExpandOptions) -> Result<CategoryLevel> {
        self.ensure_scrapable()?;
        let page = self.fetch_reference(reference)?;
        let is_category = WikiDocument::parse(&page.body)
            .title()
            .is_some_and(|title| title.contains(CATEGORY_MARKER));

        if is_category {
            self.scrape_category(page, options)
        } else {
            self.scrape_list(&page, options)
        }
    }

    fn ensure_scrapable(&self) -> Result<()> {
        let base_url = self.site.base_url();
        if self.denylist.iter().any(|entry| base_url.contains(entry.as_str())) {
            let host = Url::parse(base_url)
                .ok()
                .and_then(|url| url.host_str().map(ToString::to_string))
                .unwrap_or_else(|| base_url.to_string());
            return Err(Error::UnsupportedPlatform { host });
        }
        Ok(())
    }

    /// Category references fall back to the main-namespace page of the same name.
    fn fetch_reference(&self, reference: &CategoryRef) -> Result<FetchedPage> {
        let mut attempts = vec![self.site.reference_url(reference)];
        if reference.is_category() {
            attempts.push(self.site.article_url(reference.name()));
        }

        let mut last_failure = None;
        for url in attempts {
            let page = self.fetch_ok(&url);
            match page {
                Ok(page) => return Ok(page),
                Err(error) => {
                    tracing::debug!(%url, error = %error, "page fetch failed");
                    last_failure = Some(error);
                }
            }
        }
        Err(last_failure.unwrap_or_else(|| Error::status(reference.title(), 404)))
    }

    fn fetch_ok(&self, url: &str) -> Result<FetchedPage> {
        let page = self
            .fetcher
            .fetch(url)
            .map_err(|error| Error::fetch(url, &error))?;
        if !page.is_ok() {
            return Err(Error::status(url, page.status));
        }
        Ok(page)
    }

    fn scrape_category(&self, first: FetchedPage, options: &ExpandOptions) -> Result<CategoryLevel> {
        let subcategories = if options.descends() {
            self.collect_block(&first, SUBCATEGORIES_ID, true)?
                .into_iter()
                .filter_map(|anchor| {
                    let title = self.article_link(&anchor)?;
                    let subcategory = self.site.page_reference(&title);
                    subcategory
                        .is_category()
                        .then(|| (anchor.text.clone(), subcategory))
                })
                .collect()
        } else {
            BTreeMap::new()
        };

        // Lists are assumed to sort onto the first page of a category.
        let anchors = self.collect_block(&first, PAGES_ID, !options.lists_only)?;
        let names = anchors
            .into_iter()
            .filter(|anchor| self.article_link(anchor).is_some())
            .map(|anchor| anchor.text);
        let filter = PageFilter::new(self);
        Ok(CategoryLevel {
            members: filter.retain(names, options.list_mode()).into_iter().collect(),
            subcategories,
        })
    }

    fn scrape_list(&self, page: &FetchedPage, options: &ExpandOptions) -> Result<CategoryLevel> {
        let anchors = WikiDocument::parse(&page.body)
            .anchors_in(CONTENT_ID)
            .unwrap_or_default();
        let names = anchors
            .into_iter()
            .filter(|anchor| anchor.is_plain() && self.article_link(anchor).is_some())
            .map(|anchor| anchor.text);
        let filter = PageFilter::new(self);
        Ok(CategoryLevel {
            members: filter.retain(names, options.list_mode()).into_iter().collect(),
            subcategories: BTreeMap::new(),
        })
    }

    /// Anchors inside the block with `id`, across its "next page" chain when
    /// `follow` is set.
    fn collect_block(&self, first: &FetchedPage, id: &str, follow: bool) -> Result<Vec<Anchor>> {
        let mut collected = Vec::new();
        let mut visited = HashSet::new();
        visited.insert(without_fragment(&first.final_url));

        let mut current_url = first.final_url.clone();
        let mut next_page: Option<FetchedPage> = None;
        loop {
            let page = next_page.as_ref().unwrap_or(first);
            let Some(anchors) = WikiDocument::parse(&page.body).anchors_in(id) else {
                break;
            };

            let mut next_url = None;
            for anchor in anchors {
                if anchor.text.trim().eq_ignore_ascii_case(NEXT_PAGE_LABEL) {
                    if next_url.is_none() {
                        next_url = anchor
                            .href
                            .as_deref()
                            .and_then(|href| join_url(&current_url, href));
                    }
                } else {
                    collected.push(anchor);
                }
            }

            let Some(next_url) = next_url.filter(|_| follow) else {
                break;
            };
            if !visited.insert(without_fragment(&next_url)) {
                tracing::debug!(url = %next_url, "pagination loop; stopping");
                break;
            }
            tracing::debug!(url = %next_url, block = id, "following next page");
            let fetched = self.fetch_ok(&next_url)?;
            current_url = fetched.final_url.clone();
            next_page = Some(fetched);
        }
        Ok(collected)
    }

    /// Article title an anchor points at, when it is a member-style link.
    fn article_link(&self, anchor: &Anchor) -> Option<String> {
        if anchor.text.trim().is_empty() || is_navigation_label(&anchor.text) {
            return None;
        }
        let url = self.site.resolve_href(anchor.href.as_deref()?)?;
        self.site.article_title(&url)
    }
}

impl WipProbe for Expander<'_> {
    fn is_work_in_progress(&self, title: &str) -> anyhow::Result<bool> {
        let url = self.site.article_url(title);
        let page = self.fetcher.fetch(&url)?;
        if !page.is_ok() {
            bail!("HTTP {} for {url}", page.status);
        }
        Ok(WikiDocument::parse(&page.body)
            .nested_class_text("ombox-notice", "mbox-text")
            .is_some_and(|text| text.contains(WIP_MARKER)))
    }
}

/// Nested view of `reference` built from already fetched levels. A category
/// that is its own ancestor yields an empty collection.
fn assemble(
    reference: &CategoryRef,
    levels: &HashMap<String, CategoryLevel>,
    options: &ExpandOptions,
    ancestors: &BTreeSet<String>,
) -> PageCollection {
    let key = reference.title();
    if ancestors.contains(&key) {
        tracing::warn!(category = %key, "category cycle; already collecting this category");
        return PageCollection::default();
    }
    let Some(level) = levels.get(&key) else {
        return PageCollection::default();
    };

    let mut children = Vec::new();
    if options.descends() {
        let mut lineage = ancestors.clone();
        lineage.insert(key);
        let child_options = options.for_subcategories();
        for (name, subcategory) in &level.subcategories {
            children.push((
                name.clone(),
                assemble(subcategory, levels, &child_options, &lineage),
            ));
        }
    }

    if options.nested {
        let mut keyed = BTreeMap::new();
        keyed.insert(SELF_KEY.to_string(), PageCollection::Flat(level.members.clone()));
        keyed.extend(children);
        PageCollection::Nested(keyed)
    } else {
        let mut pages = level.members.clone();
        for (_, child) in children {
            pages.extend(child.into_flat());
        }
        PageCollection::Flat(pages)
    }
}

fn join_url(base: &str, href: &str) -> Option<String> {
    Url::parse(base)
        .ok()?
        .join(href)
        .ok()
        .map(|url| url.to_string())
}

fn without_fragment(url: &str) -> String {
    match url.split_once('#') {
        Some((head, _)) => head.to_string(),
        None => url.to_string(),
    }
}

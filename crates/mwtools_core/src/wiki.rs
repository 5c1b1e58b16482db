use std::collections::BTreeSet;
use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;

use crate::api::MediaWikiApi;
use crate::collection::PageCollection;
use crate::combine::{self, CombineOptions, OperationPlan};
use crate::config::WikiConfig;
use crate::error::{Error, Result};
use crate::expand::{CategoryLevel, ExpandOptions, Expander};
use crate::http::{HttpClient, PageFetcher};
use crate::identity::{self, AccessMode, WikiIdentity};
use crate::title::{CategoryRef, SiteLayout};

/// A resolved wiki with its transport, optional API client and worker pool.
pub struct Wiki {
    identity: WikiIdentity,
    site: SiteLayout,
    fetcher: Arc<dyn PageFetcher>,
    api: Option<MediaWikiApi>,
    denylist: Vec<String>,
    pool: ThreadPool,
}

/// Pages seen by only one strategy for the same expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StrategyComparison {
    pub api_only: BTreeSet<String>,
    pub scrape_only: BTreeSet<String>,
    pub shared: usize,
}

impl StrategyComparison {
    pub fn is_equivalent(&self) -> bool {
        self.api_only.is_empty() && self.scrape_only.is_empty()
    }
}

impl Wiki {
    /// Resolve `input` over HTTP using the configured user agent and timeout.
    pub fn connect(input: &str, config: &WikiConfig) -> Result<Self> {
        let client = HttpClient::from_config(config).map_err(|error| Error::ConnectionFailed {
            url: input.trim().to_string(),
            reason: format!("{error:#}"),
        })?;
        Self::with_fetcher(input, Arc::new(client), config)
    }

    pub fn with_fetcher(
        input: &str,
        fetcher: Arc<dyn PageFetcher>,
        config: &WikiConfig,
    ) -> Result<Self> {
        let resolved = identity::resolve(input, Arc::clone(&fetcher), config)?;
        let site = SiteLayout::new(
            &resolved.identity.base_url,
            &resolved.identity.root_segment,
            config.extra_namespaces(),
        );
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.max_workers())
            .thread_name(|index| format!("mwtools-worker-{index}"))
            .build()
            .map_err(|error| Error::Config(format!("failed to start worker pool: {error}")))?;

        Ok(Self {
            identity: resolved.identity,
            site,
            fetcher,
            api: resolved.api,
            denylist: config.scrape_denylist(),
            pool,
        })
    }

    pub fn identity(&self) -> &WikiIdentity {
        &self.identity
    }

    pub fn site(&self) -> &SiteLayout {
        &self.site
    }

    pub fn site_name(&self) -> Option<&str> {
        self.api.as_ref().and_then(MediaWikiApi::site_name)
    }

    pub fn reference(&self, input: &str) -> Result<CategoryRef> {
        self.site.parse_reference(input)
    }

    pub fn expand(&self, input: &str, options: &ExpandOptions) -> Result<PageCollection> {
        let reference = self.reference(input)?;
        self.expand_reference(&reference, options)
    }

    pub fn expand_reference(
        &self,
        reference: &CategoryRef,
        options: &ExpandOptions,
    ) -> Result<PageCollection> {
        self.expander().expand(reference, options)
    }

    /// One level of `input`: filtered members and subcategory links.
    pub fn level(&self, input: &str, options: &ExpandOptions) -> Result<CategoryLevel> {
        let reference = self.reference(input)?;
        self.expander().level(&reference, options)
    }

    pub fn combine(&self, plan: &OperationPlan, options: &CombineOptions) -> Result<BTreeSet<String>> {
        combine::combine(&self.expander(), plan, options)
    }

    /// Expand `input` through both strategies and report where they disagree.
    pub fn compare_strategies(
        &self,
        input: &str,
        options: &ExpandOptions,
    ) -> Result<StrategyComparison> {
        if self.identity.mode != AccessMode::Api {
            return Err(Error::ApiUnavailable);
        }
        let reference = self.reference(input)?;
        let api = self
            .expand_reference(
                &reference,
                &ExpandOptions {
                    prefer_api: true,
                    ..*options
                },
            )?
            .into_flat();
        let scraped = self
            .expand_reference(
                &reference,
                &ExpandOptions {
                    prefer_api: false,
                    ..*options
                },
            )?
            .into_flat();

        let comparison = StrategyComparison {
            api_only: api.difference(&scraped).cloned().collect(),
            scrape_only: scraped.difference(&api).cloned().collect(),
            shared: api.intersection(&scraped).count(),
        };
        if !comparison.is_equivalent() {
            tracing::info!(
                reference = %reference,
                api_only = comparison.api_only.len(),
                scrape_only = comparison.scrape_only.len(),
                "strategies disagree"
            );
        }
        Ok(comparison)
    }

    fn expander(&self) -> Expander<'_> {
        Expander::new(
            &self.site,
            self.fetcher.as_ref(),
            self.api.as_ref(),
            &self.denylist,
            &self.pool,
        )
    }
}

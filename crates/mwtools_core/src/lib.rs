//! Category membership discovery and set algebra for MediaWiki sites.
//!
//! [`Wiki`] resolves a site once, then expands categories through the Action
//! API when one answers and through rendered category pages otherwise.

pub mod api;
pub mod collection;
pub mod combine;
pub mod config;
pub mod error;
pub mod expand;
pub mod filter;
pub mod html;
pub mod http;
pub mod identity;
pub mod title;
pub mod wiki;

#[cfg(test)]
mod fixture;

pub use collection::PageCollection;
pub use combine::{CombineOptions, OperationPlan, SetOperator, SetTerm};
pub use error::{Error, Result};
pub use expand::ExpandOptions;
pub use identity::{AccessMode, WikiIdentity};
pub use title::CategoryRef;
pub use wiki::{StrategyComparison, Wiki};

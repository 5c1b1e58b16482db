use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

/// Key holding a category's own members inside a nested result.
pub const SELF_KEY: &str = "self";

/// Result of expanding a category.
///
/// `Nested` maps subcategory display names to their own collections, with the
/// queried category's direct members under [`SELF_KEY`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PageCollection {
    Flat(BTreeSet<String>),
    Nested(BTreeMap<String, PageCollection>),
}

impl Default for PageCollection {
    fn default() -> Self {
        Self::Flat(BTreeSet::new())
    }
}

impl PageCollection {
    pub fn flat<I>(names: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self::Flat(names.into_iter().collect())
    }

    pub fn get(&self, key: &str) -> Option<&PageCollection> {
        match self {
            Self::Flat(_) => None,
            Self::Nested(children) => children.get(key),
        }
    }

    /// Members of the queried category itself, without descendants.
    pub fn direct_members(&self) -> Option<&BTreeSet<String>> {
        match self {
            Self::Flat(names) => Some(names),
            Self::Nested(children) => match children.get(SELF_KEY) {
                Some(Self::Flat(names)) => Some(names),
                Some(nested) => nested.direct_members(),
                None => None,
            },
        }
    }

    /// Every page name at any depth.
    pub fn flatten(&self) -> BTreeSet<String> {
        let mut output = BTreeSet::new();
        self.collect_into(&mut output);
        output
    }

    pub fn into_flat(self) -> BTreeSet<String> {
        match self {
            Self::Flat(names) => names,
            nested => nested.flatten(),
        }
    }

    /// Subcategory keys at any depth, excluding [`SELF_KEY`].
    pub fn category_keys(&self) -> BTreeSet<String> {
        let mut output = BTreeSet::new();
        if let Self::Nested(children) = self {
            for (key, child) in children {
                if key != SELF_KEY {
                    output.insert(key.clone());
                }
                output.extend(child.category_keys());
            }
        }
        output
    }

    fn collect_into(&self, output: &mut BTreeSet<String>) {
        match self {
            Self::Flat(names) => output.extend(names.iter().cloned()),
            Self::Nested(children) => {
                for child in children.values() {
                    child.collect_into(output);
                }
            }
        }
    }
}

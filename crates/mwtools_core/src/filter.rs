//! Inclusion rules shared by the API and scrape strategies.
//!
//! The list classification is a substring test on the title ("List "). It is
//! wiki-specific and knowingly approximate: "Listeria" is a page,
//! "Schindler's List (film)" is not a list, and a list titled "Index of ..."
//! is missed.

use anyhow::Result;

pub const FILE_MARKER: &str = "File:";
pub const USER_MARKER: &str = "User:";
pub const LIST_MARKER: &str = "List ";
pub const WIP_MARKER: &str = "work-in-progress";

const NAVIGATION_LABELS: &[&str] = &["next page", "previous page", "learn more"];

/// A candidate member name with its derived classifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEntry {
    name: String,
    is_list: bool,
    is_file: bool,
}

impl PageEntry {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_list: name.contains(LIST_MARKER),
            is_file: name.contains(FILE_MARKER),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn into_name(self) -> String {
        self.name
    }

    pub fn is_list(&self) -> bool {
        self.is_list
    }

    pub fn is_file(&self) -> bool {
        self.is_file
    }

    pub fn is_user_page(&self) -> bool {
        self.name.trim_start().starts_with(USER_MARKER)
    }
}

/// Which of pages and lists a query wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListMode {
    /// Pages only; lists are dropped.
    #[default]
    Exclude,
    /// Pages and lists.
    Include,
    /// Lists only.
    Only,
}

impl ListMode {
    pub fn from_flags(get_lists: bool, list_only: bool) -> Self {
        if list_only {
            Self::Only
        } else if get_lists {
            Self::Include
        } else {
            Self::Exclude
        }
    }
}

/// Looks up whether a user page carries a work-in-progress notice.
pub trait WipProbe: Sync {
    fn is_work_in_progress(&self, title: &str) -> Result<bool>;
}

pub struct PageFilter<'a> {
    probe: &'a dyn WipProbe,
}

impl<'a> PageFilter<'a> {
    pub fn new(probe: &'a dyn WipProbe) -> Self {
        Self { probe }
    }

    pub fn should_include(&self, candidate: &PageEntry, mode: ListMode) -> bool {
        if candidate.is_file() {
            return false;
        }
        if candidate.is_user_page() && self.is_work_in_progress(candidate.name()) {
            return false;
        }
        match mode {
            ListMode::Include => true,
            ListMode::Only => candidate.is_list(),
            ListMode::Exclude => !candidate.is_list(),
        }
    }

    /// Filter `names`, keeping their order.
    pub fn retain<I>(&self, names: I, mode: ListMode) -> Vec<String>
    where
        I: IntoIterator<Item = String>,
    {
        names
            .into_iter()
            .map(|name| PageEntry::new(&name))
            .filter(|entry| self.should_include(entry, mode))
            .map(PageEntry::into_name)
            .collect()
    }

    fn is_work_in_progress(&self, title: &str) -> bool {
        match self.probe.is_work_in_progress(title) {
            Ok(flagged) => flagged,
            Err(error) => {
                tracing::debug!(%title, error = %error, "work-in-progress check failed; excluding");
                true
            }
        }
    }
}

/// Pager and notice links that appear inside member listings.
pub fn is_navigation_label(text: &str) -> bool {
    let text = text.trim();
    NAVIGATION_LABELS
        .iter()
        .any(|label| text.eq_ignore_ascii_case(label))
}

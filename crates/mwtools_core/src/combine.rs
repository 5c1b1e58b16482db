use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::expand::{ExpandOptions, Expander};
use crate::title::CategoryRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetOperator {
    Union,
    Intersect,
    Difference,
}

impl SetOperator {
    /// Fold `term` into `accumulator`. Difference keeps `accumulator - term`.
    pub fn apply(self, accumulator: &mut BTreeSet<String>, term: &BTreeSet<String>) {
        match self {
            Self::Union => accumulator.extend(term.iter().cloned()),
            Self::Intersect => accumulator.retain(|name| term.contains(name)),
            Self::Difference => accumulator.retain(|name| !term.contains(name)),
        }
    }
}

impl FromStr for SetOperator {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "union" | "u" | "or" | "|" => Ok(Self::Union),
            "intersection" | "intersect" | "i" | "and" | "&" => Ok(Self::Intersect),
            "difference" | "not" | "-" => Ok(Self::Difference),
            other => Err(Error::InvalidInput(format!(
                "unknown set operation '{other}' (expected union, intersection or difference)"
            ))),
        }
    }
}

impl fmt::Display for SetOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Union => "union",
            Self::Intersect => "intersection",
            Self::Difference => "difference",
        };
        f.write_str(name)
    }
}

/// One operand of a combination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetTerm {
    Category(CategoryRef),
    Pages(BTreeSet<String>),
}

impl From<CategoryRef> for SetTerm {
    fn from(reference: CategoryRef) -> Self {
        Self::Category(reference)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombineOptions {
    /// Expand the first level of subcategories of every category term.
    pub include_subcats: bool,
    pub prefer_api: bool,
}

impl Default for CombineOptions {
    fn default() -> Self {
        Self {
            include_subcats: false,
            prefer_api: true,
        }
    }
}

impl CombineOptions {
    fn term_options(&self) -> ExpandOptions {
        ExpandOptions {
            include_subcats: self.include_subcats,
            prefer_api: self.prefer_api,
            ..ExpandOptions::default()
        }
    }
}

/// Validated pairing of terms and operators, applied left to right.
///
/// The first operator is treated as union since it seeds the accumulator. A
/// trailing page list takes the last operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationPlan {
    steps: Vec<(SetTerm, SetOperator)>,
    trailing: Option<(BTreeSet<String>, SetOperator)>,
}

impl OperationPlan {
    pub fn new(
        terms: Vec<SetTerm>,
        operators: Vec<SetOperator>,
        trailing: Option<BTreeSet<String>>,
    ) -> Result<Self> {
        if terms.is_empty() {
            return Err(Error::InvalidArgument("no categories to combine".to_string()));
        }
        let expected = terms.len() + usize::from(trailing.is_some());
        if operators.len() != expected {
            return Err(Error::InvalidOperation(format!(
                "{} operations given for {expected} operands",
                operators.len()
            )));
        }

        let mut operators = operators.into_iter();
        let steps = terms
            .into_iter()
            .zip(operators.by_ref())
            .collect::<Vec<_>>();
        let trailing = trailing.zip(operators.next());
        Ok(Self { steps, trailing })
    }

    /// Same operator between every operand.
    pub fn uniform(
        terms: Vec<SetTerm>,
        operator: SetOperator,
        trailing: Option<BTreeSet<String>>,
    ) -> Result<Self> {
        let count = terms.len() + usize::from(trailing.is_some());
        let operators = std::iter::once(SetOperator::Union)
            .chain(std::iter::repeat_n(operator, count.saturating_sub(1)))
            .collect();
        Self::new(terms, operators, trailing)
    }

    pub fn operators(&self) -> Vec<SetOperator> {
        self.steps
            .iter()
            .map(|(_, operator)| *operator)
            .chain(self.trailing.iter().map(|(_, operator)| *operator))
            .collect()
    }
}

/// Left fold of the plan over each term's flattened members.
pub fn combine(
    expander: &Expander<'_>,
    plan: &OperationPlan,
    options: &CombineOptions,
) -> Result<BTreeSet<String>> {
    let mut accumulator: Option<BTreeSet<String>> = None;
    for (term, operator) in &plan.steps {
        let pages = match term {
            SetTerm::Category(reference) => expander
                .expand(reference, &options.term_options())?
                .into_flat(),
            SetTerm::Pages(pages) => pages.clone(),
        };
        match accumulator.as_mut() {
            Some(accumulator) => operator.apply(accumulator, &pages),
            None => accumulator = Some(pages),
        }
    }

    let mut result = accumulator.unwrap_or_default();
    if let Some((pages, operator)) = &plan.trailing {
        operator.apply(&mut result, pages);
    }
    Ok(result)
}

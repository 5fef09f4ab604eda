//! Template selection: which templates of a catalog apply to a variable set.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::core::catalog::{Template, TemplateCatalog};
use crate::core::expr::check_conditions;
use crate::schema::variables::Variables;

/// Which templates a section draws from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criterion {
    /// Every template in the catalog.
    All,
    /// Every template whose topic equals the label.
    Topic(String),
    /// Exactly these keys, in this order. Unknown keys are skipped.
    Keys(Vec<String>),
}

impl Criterion {
    pub fn topic(label: impl Into<String>) -> Self {
        Self::Topic(label.into())
    }

    pub fn keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Keys(keys.into_iter().map(Into::into).collect())
    }
}

/// Select the eligible templates for `criterion`, preserving catalog order
/// (or key-list order for [`Criterion::Keys`]). A template is eligible when
/// all of its conditions hold; failing or erroring conditions exclude it
/// silently.
pub fn select<'a>(
    catalog: &'a TemplateCatalog,
    criterion: &Criterion,
    vars: &Variables,
) -> Vec<&'a Template> {
    let candidates: Vec<&Template> = match criterion {
        Criterion::All => catalog.iter().collect(),
        Criterion::Topic(label) => catalog
            .iter()
            .filter(|t| t.topic.as_deref() == Some(label.as_str()))
            .collect(),
        Criterion::Keys(keys) => keys.iter().filter_map(|k| catalog.get(k)).collect(),
    };

    candidates
        .into_iter()
        .filter(|template| {
            let eligible = check_conditions(&template.conditions, vars);
            if !eligible {
                trace!(template = %template.key, "template excluded by its conditions");
            }
            eligible
        })
        .collect()
}

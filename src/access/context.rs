//! Identity facts of the principal a rule is evaluated against.

use std::collections::BTreeSet;

/// The authenticated principal, supplied fresh for every access decision.
///
/// The evaluator only ever borrows it.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EvaluationContext {
    pub user: String,
    #[serde(default)]
    pub primary_group: Option<String>,
    #[serde(default)]
    pub secondary_groups: BTreeSet<String>,
    #[serde(default)]
    pub class: Option<String>,
}

impl EvaluationContext {
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into(), ..Default::default() }
    }

    pub fn with_primary_group(mut self, group: impl Into<String>) -> Self {
        self.primary_group = Some(group.into());
        self
    }

    pub fn with_secondary_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.secondary_groups.extend(groups.into_iter().map(Into::into));
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }
}

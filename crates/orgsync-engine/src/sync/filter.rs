//! Scope filter.
//!
//! Decides from an enriched event and a configuration snapshot whether the
//! object belongs in the registry. Evaluation has no side effects. Objects
//! that fail it are sent to the registry as deletions.

use orgsync_core::EntityKind;
use orgsync_directory::ad;
use serde::{Deserialize, Serialize};

use super::event::DomainEvent;

/// Filter settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Only objects at or below this DN are in scope.
    pub root_dn: Option<String>,
    /// Subtrees whose objects are out of scope.
    pub excluded_subtrees: Vec<String>,
    pub required_orgunit_attributes: Vec<String>,
    pub required_user_attributes: Vec<String>,
    /// Treat disabled accounts as out of scope.
    pub skip_disabled_users: bool,
    /// Objects carrying a non-empty value in this attribute are out of scope.
    pub exclude_marker_attribute: Option<String>,
}

/// Why an event was excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionReason {
    OutsideRoot,
    ExcludedSubtree(String),
    Marked(String),
    MissingAttribute(String),
    Disabled,
}

impl std::fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExclusionReason::OutsideRoot => write!(f, "outside root"),
            ExclusionReason::ExcludedSubtree(dn) => write!(f, "in excluded subtree '{dn}'"),
            ExclusionReason::Marked(attr) => write!(f, "marked by '{attr}'"),
            ExclusionReason::MissingAttribute(attr) => write!(f, "missing attribute '{attr}'"),
            ExclusionReason::Disabled => write!(f, "account disabled"),
        }
    }
}

/// Filter outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    Include,
    Exclude(ExclusionReason),
}

impl FilterDecision {
    #[must_use]
    pub fn is_included(&self) -> bool {
        matches!(self, FilterDecision::Include)
    }
}

/// Scope filter over enriched events.
#[derive(Debug, Clone)]
pub struct Filter {
    config: FilterConfig,
}

impl Filter {
    #[must_use]
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Evaluate an event against the configuration.
    #[must_use]
    pub fn evaluate(&self, event: &DomainEvent) -> FilterDecision {
        let dn = event.dn();

        if let Some(root) = &self.config.root_dn {
            if !ad::is_within(dn, root) {
                return FilterDecision::Exclude(ExclusionReason::OutsideRoot);
            }
        }

        if let Some(subtree) = self
            .config
            .excluded_subtrees
            .iter()
            .find(|subtree| ad::is_within(dn, subtree))
        {
            return FilterDecision::Exclude(ExclusionReason::ExcludedSubtree(subtree.clone()));
        }

        if let Some(marker) = &self.config.exclude_marker_attribute {
            if event.attributes().get_string(marker).is_some() {
                return FilterDecision::Exclude(ExclusionReason::Marked(marker.clone()));
            }
        }

        let required = match event.kind() {
            EntityKind::OrgUnit => &self.config.required_orgunit_attributes,
            EntityKind::User => &self.config.required_user_attributes,
        };
        if let Some(missing) = required
            .iter()
            .find(|attr| event.attributes().get(attr).map_or(true, |v| v.is_empty()))
        {
            return FilterDecision::Exclude(ExclusionReason::MissingAttribute(missing.clone()));
        }

        if self.config.skip_disabled_users && event.is_disabled() {
            return FilterDecision::Exclude(ExclusionReason::Disabled);
        }

        FilterDecision::Include
    }
}

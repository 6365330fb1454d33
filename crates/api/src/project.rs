use crate::error::AllocationError;
use fundalloc_core::math::Scalar;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A candidate funding project. Its position in the project list is the
/// stable handle constraints refer to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    /// Predicted impact; may be negative.
    pub impact: Scalar,
    /// Requested cost; finite and non-negative.
    pub cost: Scalar,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    /// Overrides the global fractional default for this project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fractional: Option<bool>,
}

impl Project {
    pub fn new(id: impl Into<String>, impact: Scalar, cost: Scalar) -> Self {
        Self {
            id: id.into(),
            impact,
            cost,
            groups: Vec::new(),
            fractional: None,
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    pub fn with_fractional(mut self, fractional: bool) -> Self {
        self.fractional = Some(fractional);
        self
    }
}

/// Checks ids are present and unique, then delegates the numeric checks to
/// [`validate_inputs`].
pub fn validate_projects(projects: &[Project]) -> Result<(), AllocationError> {
    let mut seen = HashSet::with_capacity(projects.len());
    for (index, project) in projects.iter().enumerate() {
        if project.id.trim().is_empty() {
            return Err(AllocationError::InvalidInput(format!(
                "project {index} has an empty id"
            )));
        }
        if !seen.insert(project.id.as_str()) {
            return Err(AllocationError::InvalidInput(format!(
                "duplicate project id '{}'",
                project.id
            )));
        }
    }
    let impacts = projects.iter().map(|p| p.impact).collect::<Vec<_>>();
    let costs = projects.iter().map(|p| p.cost).collect::<Vec<_>>();
    validate_inputs(&impacts, &costs, 0.0)
}

pub fn validate_inputs(
    impacts: &[Scalar],
    costs: &[Scalar],
    budget: Scalar,
) -> Result<(), AllocationError> {
    if impacts.len() != costs.len() {
        return Err(AllocationError::InvalidInput(format!(
            "{} impacts but {} costs",
            impacts.len(),
            costs.len()
        )));
    }
    if let Some(index) = impacts.iter().position(|v| !v.is_finite()) {
        return Err(AllocationError::InvalidInput(format!(
            "impact of project {index} is not finite"
        )));
    }
    if let Some(index) = costs.iter().position(|v| !(v.is_finite() && *v >= 0.0)) {
        return Err(AllocationError::InvalidInput(format!(
            "cost of project {index} must be finite and non-negative, got {}",
            costs[index]
        )));
    }
    if !(budget.is_finite() && budget >= 0.0) {
        return Err(AllocationError::InvalidInput(format!(
            "budget must be finite and non-negative, got {budget}"
        )));
    }
    Ok(())
}

/// Group name to member indices, in order of first appearance.
pub(crate) fn tagged_groups(projects: &[Project]) -> IndexMap<String, Vec<usize>> {
    let mut groups: IndexMap<String, Vec<usize>> = IndexMap::new();
    for (index, project) in projects.iter().enumerate() {
        for group in &project.groups {
            groups.entry(group.clone()).or_default().push(index);
        }
    }
    groups
}

use crate::error::AllocationError;
use fundalloc_core::math::Scalar;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Quantity a group cap limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    /// Σ decision·cost over the group.
    Cost,
    /// Σ decision over the group.
    Count,
}

/// Projects targeted by a fractional allowance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    Projects(Vec<usize>),
    Group(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Constraint {
    GroupCap {
        group: String,
        measure: Measure,
        #[serde(default)]
        min: Option<Scalar>,
        #[serde(default)]
        max: Option<Scalar>,
    },
    /// At most one of the listed projects.
    MutualExclusion { projects: Vec<usize> },
    /// Selecting `project` requires selecting `requires`, at least to the same degree.
    Dependency { project: usize, requires: usize },
    Cardinality {
        #[serde(default)]
        min: Option<usize>,
        #[serde(default)]
        max: Option<usize>,
    },
    /// Bounds on the funded share of one project's requested cost.
    FundingLimit {
        project: usize,
        #[serde(default)]
        min_share: Option<Scalar>,
        #[serde(default)]
        max_share: Option<Scalar>,
    },
    FractionalAllowance { selector: Selector, allowed: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedConstraint {
    pub name: String,
    pub constraint: Constraint,
}

/// Declarative constraint set applied on top of the budget row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintSpec {
    pub groups: IndexMap<String, Vec<usize>>,
    /// Global default: `false` means all-or-nothing.
    pub allow_fractional: bool,
    pub constraints: Vec<NamedConstraint>,
}

impl ConstraintSpec {
    /// Only the budget applies.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group<I>(mut self, name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        self.groups
            .entry(name.into())
            .or_default()
            .extend(members);
        self
    }

    pub fn allow_fractional(mut self, allowed: bool) -> Self {
        self.allow_fractional = allowed;
        self
    }

    pub fn with(mut self, name: impl Into<String>, constraint: Constraint) -> Self {
        self.constraints.push(NamedConstraint {
            name: name.into(),
            constraint,
        });
        self
    }

    pub fn group_cap(
        self,
        name: impl Into<String>,
        group: impl Into<String>,
        measure: Measure,
        min: Option<Scalar>,
        max: Option<Scalar>,
    ) -> Self {
        self.with(
            name,
            Constraint::GroupCap {
                group: group.into(),
                measure,
                min,
                max,
            },
        )
    }

    pub fn mutual_exclusion<I>(self, name: impl Into<String>, projects: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        self.with(
            name,
            Constraint::MutualExclusion {
                projects: projects.into_iter().collect(),
            },
        )
    }

    pub fn dependency(self, name: impl Into<String>, project: usize, requires: usize) -> Self {
        self.with(name, Constraint::Dependency { project, requires })
    }

    pub fn cardinality(
        self,
        name: impl Into<String>,
        min: Option<usize>,
        max: Option<usize>,
    ) -> Self {
        self.with(name, Constraint::Cardinality { min, max })
    }

    pub fn funding_limit(
        self,
        name: impl Into<String>,
        project: usize,
        min_share: Option<Scalar>,
        max_share: Option<Scalar>,
    ) -> Self {
        self.with(
            name,
            Constraint::FundingLimit {
                project,
                min_share,
                max_share,
            },
        )
    }

    pub fn fractional(self, name: impl Into<String>, selector: Selector, allowed: bool) -> Self {
        self.with(name, Constraint::FractionalAllowance { selector, allowed })
    }

    pub fn validate(&self, nprojects: usize) -> Result<(), AllocationError> {
        for (group, members) in &self.groups {
            if let Some(&index) = members.iter().find(|&&index| index >= nprojects) {
                return Err(invalid(format!(
                    "group '{group}' references project {index}, but there are {nprojects} projects"
                )));
            }
        }

        let mut names = HashSet::with_capacity(self.constraints.len());
        for NamedConstraint { name, constraint } in &self.constraints {
            if name.trim().is_empty() {
                return Err(invalid("constraint with an empty name".to_string()));
            }
            if !names.insert(name.as_str()) {
                return Err(invalid(format!("duplicate constraint name '{name}'")));
            }
            let index_check = |index: usize| {
                if index < nprojects {
                    Ok(())
                } else {
                    Err(invalid(format!(
                        "'{name}' references project {index}, but there are {nprojects} projects"
                    )))
                }
            };
            let group_check = |group: &str| {
                if self.groups.contains_key(group) {
                    Ok(())
                } else {
                    Err(invalid(format!("'{name}' references undefined group '{group}'")))
                }
            };
            match constraint {
                Constraint::GroupCap { group, min, max, .. } => {
                    group_check(group.as_str())?;
                    check_range(name, *min, *max)?;
                }
                Constraint::MutualExclusion { projects } => {
                    projects.iter().try_for_each(|&index| index_check(index))?;
                }
                Constraint::Dependency { project, requires } => {
                    index_check(*project)?;
                    index_check(*requires)?;
                }
                Constraint::Cardinality { min, max } => {
                    if let (Some(lo), Some(hi)) = (min, max) {
                        if lo > hi {
                            return Err(invalid(format!("'{name}' has min {lo} above max {hi}")));
                        }
                    }
                }
                Constraint::FundingLimit {
                    project,
                    min_share,
                    max_share,
                } => {
                    index_check(*project)?;
                    for share in [min_share, max_share].into_iter().flatten() {
                        if !(share.is_finite() && (0.0..=1.0).contains(share)) {
                            return Err(invalid(format!(
                                "'{name}' share {share} is outside [0, 1]"
                            )));
                        }
                    }
                    check_range(name, *min_share, *max_share)?;
                }
                Constraint::FractionalAllowance { selector, .. } => match selector {
                    Selector::Projects(projects) => {
                        projects.iter().try_for_each(|&index| index_check(index))?;
                    }
                    Selector::Group(group) => group_check(group.as_str())?,
                },
            }
        }
        Ok(())
    }

    /// Resolves which projects may be funded fractionally. Project-level
    /// defaults override the global flag; allowance constraints apply on top
    /// in declaration order.
    pub fn fractional_flags(&self, nprojects: usize, defaults: &[Option<bool>]) -> Vec<bool> {
        let mut flags = (0..nprojects)
            .map(|i| {
                defaults
                    .get(i)
                    .copied()
                    .flatten()
                    .unwrap_or(self.allow_fractional)
            })
            .collect::<Vec<_>>();
        for named in &self.constraints {
            let Constraint::FractionalAllowance { selector, allowed } = &named.constraint else {
                continue;
            };
            let members: &[usize] = match selector {
                Selector::Projects(projects) => projects,
                Selector::Group(group) => self.groups.get(group).map_or(&[][..], Vec::as_slice),
            };
            for &index in members {
                if let Some(flag) = flags.get_mut(index) {
                    *flag = *allowed;
                }
            }
        }
        flags
    }

    /// Adds tag-derived group members to this spec's group table.
    pub(crate) fn merge_groups(&mut self, tagged: impl IntoIterator<Item = (String, Vec<usize>)>) {
        for (group, members) in tagged {
            let entry = self.groups.entry(group).or_default();
            for index in members {
                if !entry.contains(&index) {
                    entry.push(index);
                }
            }
        }
    }
}

fn invalid(message: String) -> AllocationError {
    AllocationError::InvalidConstraint(message)
}

fn check_range(name: &str, min: Option<Scalar>, max: Option<Scalar>) -> Result<(), AllocationError> {
    for value in [min, max].into_iter().flatten() {
        if !value.is_finite() {
            return Err(invalid(format!("'{name}' has a non-finite bound {value}")));
        }
    }
    if let (Some(lo), Some(hi)) = (min, max) {
        if lo > hi {
            return Err(invalid(format!("'{name}' has min {lo} above max {hi}")));
        }
    }
    Ok(())
}

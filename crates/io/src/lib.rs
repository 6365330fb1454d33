#![forbid(unsafe_code)]

use anyhow::{anyhow, bail, Context, Result};
use fundalloc_api::{
    validate_projects, AllocationResult, AllocationStatus, ConstraintSpec, OptimizerConfig,
    Project, ProjectAllocation, Scalar, SolveSummary,
};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

/// Project identifier as it appears in upstream exports: text or an integer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Text(String),
    Number(i64),
}

impl RecordId {
    fn into_string(self) -> String {
        match self {
            RecordId::Text(text) => text,
            RecordId::Number(number) => number.to_string(),
        }
    }
}

/// A number that may arrive as a JSON string (`"1_250_000"`, `" 3.5 "`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordValue {
    Number(f64),
    Text(String),
}

impl RecordValue {
    fn to_scalar(&self, field: &str, id: &str) -> Result<Scalar> {
        match self {
            RecordValue::Number(value) => Ok(*value as Scalar),
            RecordValue::Text(text) => text
                .trim()
                .replace('_', "")
                .parse::<Scalar>()
                .with_context(|| format!("project '{id}': {field} {text:?} is not a number")),
        }
    }
}

/// Loosely typed project row, converted once into a validated [`Project`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: RecordId,
    #[serde(alias = "predicted_impact")]
    pub impact: RecordValue,
    #[serde(alias = "requested_amount")]
    pub cost: RecordValue,
    #[serde(default)]
    pub groups: Vec<String>,
    /// Shorthand for a single group tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fractional: Option<bool>,
}

impl TryFrom<ProjectRecord> for Project {
    type Error = anyhow::Error;

    fn try_from(record: ProjectRecord) -> Result<Self> {
        let id = record.id.into_string();
        let impact = record.impact.to_scalar("impact", &id)?;
        let cost = record.cost.to_scalar("cost", &id)?;
        let mut groups = record.groups;
        if let Some(sector) = record.sector {
            if !groups.contains(&sector) {
                groups.push(sector);
            }
        }
        Ok(Project {
            id,
            impact,
            cost,
            groups,
            fractional: record.fractional,
        })
    }
}

/// On-disk scenario layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioFile {
    pub budget: RecordValue,
    pub projects: Vec<ProjectRecord>,
    #[serde(default)]
    pub constraints: ConstraintSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<OptimizerConfig>,
}

/// A validated scenario ready for the optimizer.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub budget: Scalar,
    pub projects: Vec<Project>,
    pub constraints: ConstraintSpec,
    pub config: OptimizerConfig,
}

impl TryFrom<ScenarioFile> for Scenario {
    type Error = anyhow::Error;

    fn try_from(file: ScenarioFile) -> Result<Self> {
        let budget = file.budget.to_scalar("budget", "<scenario>")?;
        let projects = file
            .projects
            .into_iter()
            .enumerate()
            .map(|(index, record)| {
                Project::try_from(record).with_context(|| format!("invalid project record {index}"))
            })
            .collect::<Result<Vec<_>>>()?;
        validate_projects(&projects)?;
        let mut groups_seen = file.constraints.clone();
        for (index, project) in projects.iter().enumerate() {
            for group in &project.groups {
                groups_seen.groups.entry(group.clone()).or_default().push(index);
            }
        }
        groups_seen
            .validate(projects.len())
            .context("invalid constraint specification")?;
        Ok(Scenario {
            budget,
            projects,
            constraints: file.constraints,
            config: file.config.unwrap_or_default(),
        })
    }
}

pub fn parse_scenario(contents: &str) -> Result<Scenario> {
    match serde_json::from_str::<ScenarioFile>(contents) {
        Ok(file) => Scenario::try_from(file),
        Err(parse_err) => {
            if serde_json::from_str::<AllocationResult>(contents).is_ok() {
                Err(anyhow!(
                    "JSON file contains an allocation result, but a scenario (with 'budget' and 'projects') was expected."
                ))
            } else {
                Err(parse_err).context("failed to parse scenario")
            }
        }
    }
}

pub fn read_scenario<P: AsRef<Path>>(path: P) -> Result<Scenario> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("failed to open {:?}", path))?;
    let mut reader = BufReader::new(file);
    let mut contents = String::new();
    reader
        .read_to_string(&mut contents)
        .with_context(|| format!("failed to read {:?}", path))?;
    let scenario = parse_scenario(&contents).with_context(|| format!("in {:?}", path))?;
    debug!(
        path = %path.display(),
        projects = scenario.projects.len(),
        constraints = scenario.constraints.constraints.len(),
        "loaded scenario"
    );
    Ok(scenario)
}

/// Human-facing view of a result, keyed by project id.
#[derive(Debug, Serialize)]
pub struct AllocationReport<'a> {
    pub status: AllocationStatus,
    pub suboptimal: bool,
    pub total_cost: Scalar,
    pub total_impact: Scalar,
    pub allocations: Vec<ProjectAllocation<'a>>,
    pub summary: &'a SolveSummary,
}

impl<'a> AllocationReport<'a> {
    pub fn new(projects: &'a [Project], result: &'a AllocationResult) -> Result<Self> {
        if projects.len() != result.decisions.len() {
            bail!(
                "result has {} decisions for {} projects",
                result.decisions.len(),
                projects.len()
            );
        }
        Ok(Self {
            status: result.status,
            suboptimal: result.suboptimal,
            total_cost: result.total_cost,
            total_impact: result.total_impact,
            allocations: result.allocations(projects),
            summary: &result.summary,
        })
    }
}

pub fn write_result<P: AsRef<Path>>(path: P, result: &AllocationResult) -> Result<()> {
    write_json(path.as_ref(), result)
}

pub fn write_report<P: AsRef<Path>>(path: P, report: &AllocationReport<'_>) -> Result<()> {
    write_json(path.as_ref(), report)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create parent directory {:?}", parent))?;
        }
    }

    let file = File::create(path).with_context(|| format!("failed to create {:?}", path))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).context("failed to serialise output")?;
    writer
        .flush()
        .with_context(|| format!("failed to write output into {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fundalloc_api::AllocationOptimizer;

    const SCENARIO: &str = r#"{
        "budget": "10_000",
        "projects": [
            {"id": 1, "predicted_impact": 10.0, "requested_amount": 5000, "sector": "health"},
            {"id": "p-2", "impact": "6", "cost": 5000, "groups": ["health"]},
            {"id": "p-3", "impact": 5.0, "cost": 5000.0, "fractional": true}
        ],
        "constraints": {
            "constraints": [
                {"name": "one_health", "constraint": {"kind": "group_cap", "group": "health", "measure": "count", "max": 1}}
            ]
        },
        "config": {"time_limit_secs": 2.0}
    }"#;

    #[test]
    fn loose_records_become_projects() {
        let scenario = parse_scenario(SCENARIO).unwrap();
        assert_eq!(scenario.budget, 10_000.0);
        assert_eq!(scenario.projects[0].id, "1");
        assert_eq!(scenario.projects[0].groups, vec!["health".to_string()]);
        assert_eq!(scenario.projects[1].impact, 6.0);
        assert_eq!(scenario.projects[2].fractional, Some(true));
        assert_eq!(scenario.config.time_limit.as_secs(), 2);
    }

    #[test]
    fn scenario_solves_with_tag_groups() {
        let scenario = parse_scenario(SCENARIO).unwrap();
        let result = AllocationOptimizer::new(scenario.config.clone())
            .optimize_projects(&scenario.projects, scenario.budget, &scenario.constraints)
            .unwrap();
        assert_eq!(result.decisions[0], 1.0);
        assert_eq!(result.decisions[1], 0.0);
        assert!((result.decisions[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn bad_numbers_name_the_project() {
        let text = r#"{"budget": 1, "projects": [{"id": "x", "impact": "lots", "cost": 1}]}"#;
        let err = parse_scenario(text).unwrap_err();
        assert!(format!("{err:#}").contains("project 'x'"));
    }

    #[test]
    fn undefined_group_is_reported() {
        let text = r#"{"budget": 1, "projects": [{"id": "x", "impact": 1, "cost": 1}],
            "constraints": {"constraints": [{"name": "cap", "constraint": {"kind": "group_cap", "group": "edu", "measure": "cost", "max": 1}}]}}"#;
        let err = parse_scenario(text).unwrap_err();
        assert!(format!("{err:#}").contains("edu"));
    }

    #[test]
    fn result_files_are_recognised() {
        let scenario = parse_scenario(SCENARIO).unwrap();
        let result = AllocationOptimizer::default()
            .optimize_projects(&scenario.projects, scenario.budget, &scenario.constraints)
            .unwrap();
        let text = serde_json::to_string(&result).unwrap();
        let err = parse_scenario(&text).unwrap_err();
        assert!(err.to_string().contains("allocation result"));
    }

    #[test]
    fn report_is_written_to_nested_directory() {
        let scenario = parse_scenario(SCENARIO).unwrap();
        let result = AllocationOptimizer::default()
            .optimize_projects(&scenario.projects, scenario.budget, &scenario.constraints)
            .unwrap();
        let dir = std::env::temp_dir().join(format!("fundalloc-io-{}", std::process::id()));
        let path = dir.join("out").join("report.json");
        let report = AllocationReport::new(&scenario.projects, &result).unwrap();
        write_report(&path, &report).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["allocations"][0]["id"], "1");
        assert_eq!(written["status"], "optimal");
        fs::remove_dir_all(dir).unwrap();
    }
}

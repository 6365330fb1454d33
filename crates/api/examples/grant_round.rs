use anyhow::Result;
use fundalloc_api::{AllocationOptimizer, ConstraintSpec, Measure, OptimizerConfig, Project};
use std::time::Duration;

fn main() -> Result<()> {
    let projects = vec![
        Project::new("rural-clinics", 42.0, 1_800_000.0).with_group("health"),
        Project::new("mobile-vaccination", 35.0, 1_200_000.0).with_group("health"),
        Project::new("school-meals", 28.0, 900_000.0).with_group("education"),
        Project::new("teacher-training", 19.0, 650_000.0).with_group("education"),
        Project::new("borehole-wells", 31.0, 1_500_000.0)
            .with_group("water")
            .with_fractional(true),
        Project::new("sanitation-pilot", 12.0, 400_000.0).with_group("water"),
    ];
    let budget = 4_000_000.0;

    let constraints = ConstraintSpec::new()
        .group_cap("health_share", "health", Measure::Cost, None, Some(0.5 * budget))
        .mutual_exclusion("one_vaccination_partner", [0, 1])
        .dependency("wells_need_sanitation", 4, 5)
        .cardinality("reviewable", None, Some(4));

    let optimizer =
        AllocationOptimizer::new(OptimizerConfig::default().with_time_limit(Duration::from_secs(2)));
    let result = optimizer.optimize_projects(&projects, budget, &constraints)?;

    println!("status: {}", result.status);
    for row in result.allocations(&projects) {
        if row.decision > 0.0 {
            println!("{:<20} share {:.2}  funded {:>12.2}", row.id, row.decision, row.funded);
        }
    }
    println!("impact: {:.3}  cost: {:.2}", result.total_impact, result.total_cost);
    Ok(())
}

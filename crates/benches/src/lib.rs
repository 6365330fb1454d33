#![forbid(unsafe_code)]

//! Random allocation instances shared by the benchmarks.

use fundalloc_api::{ConstraintSpec, Measure, Scalar};
use rand::{rngs::SmallRng, Rng};

pub struct Instance {
    pub impacts: Vec<Scalar>,
    pub costs: Vec<Scalar>,
    pub budget: Scalar,
    pub constraints: ConstraintSpec,
}

/// `n` projects split into four sectors, each capped at a third of the
/// budget, with one exclusion pair and one dependency per sector.
pub fn random_instance(n: usize, rng: &mut SmallRng) -> Instance {
    let impacts = (0..n)
        .map(|_| rng.gen_range(0.0..100.0))
        .collect::<Vec<Scalar>>();
    let costs = (0..n)
        .map(|_| rng.gen_range(10_000.0..250_000.0))
        .collect::<Vec<Scalar>>();
    let budget = costs.iter().sum::<Scalar>() * 0.35;

    let mut constraints = ConstraintSpec::new();
    for sector in 0..4 {
        let members = (sector..n).step_by(4).collect::<Vec<_>>();
        let name = format!("sector_{sector}");
        constraints = constraints.with_group(name.clone(), members.iter().copied());
        constraints = constraints.group_cap(
            format!("{name}_cap"),
            name.clone(),
            Measure::Cost,
            None,
            Some(budget / 3.0),
        );
        if let [first, second, third, ..] = members[..] {
            constraints = constraints
                .mutual_exclusion(format!("{name}_exclusive"), [first, second])
                .dependency(format!("{name}_depends"), third, first);
        }
    }
    Instance {
        impacts,
        costs,
        budget,
        constraints,
    }
}

//! Sampling planner: fixed-size uniform position sampling per repository.
//!
//! The population size is known upfront from the count query even though the
//! items themselves arrive paginated, so the planner draws the full set of
//! retained positions once, before streaming begins. Positions are drawn
//! without replacement from `[0, population)` with Floyd's algorithm, which
//! never materialises the population.

use std::collections::BTreeSet;

use rand::Rng;

/// Positions selected for retention in one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplePlan {
    /// Distinct 0-based ranks to retain, all in `[0, population)`.
    pub positions: BTreeSet<u64>,
    /// Number of issues to retain: `round(percent% × population)`.
    pub target: u64,
}

/// Draws a sampling plan with a fresh, non-seeded random source.
#[must_use]
pub fn plan(population: u64, percent: u8) -> SamplePlan {
    plan_with_rng(&mut rand::rng(), population, percent)
}

/// Draws a sampling plan with the supplied random source.
///
/// Threading an explicit RNG makes plans reproducible in tests; production
/// callers go through [`plan`].
pub fn plan_with_rng<R>(rng: &mut R, population: u64, percent: u8) -> SamplePlan
where
    R: Rng + ?Sized,
{
    let target = sample_target(population, percent);

    // Floyd's algorithm: k distinct draws without materialising [0, n).
    let mut positions = BTreeSet::new();
    for upper in (population - target)..population {
        let candidate = rng.random_range(0..=upper);
        if !positions.insert(candidate) {
            positions.insert(upper);
        }
    }

    SamplePlan { positions, target }
}

/// Rounds `percent% × population` to the nearest whole count.
fn sample_target(population: u64, percent: u8) -> u64 {
    let percent_clamped = u128::from(percent.min(100));
    #[expect(
        clippy::integer_division,
        reason = "round-to-nearest of percent * population / 100; +50 carries the half up"
    )]
    let target = (u128::from(population) * percent_clamped + 50) / 100;
    u64::try_from(target).unwrap_or(population)
}

//! Per-loan fan-out for portfolio aggregation. Large books are assessed on
//! the rayon pool when the `parallel` feature is enabled; small books and
//! builds without the feature stay on the calling thread.

use super::config::AggregationConfig;

/// Assess every loan, keeping the result for loan `i` at index `i`.
pub(crate) fn assess_each<L, A, F>(loans: &[L], config: &AggregationConfig, assess: F) -> Vec<A>
where
    L: Sync,
    A: Send,
    F: Fn(&L) -> A + Sync + Send,
{
    if config.should_parallelize(loans.len()) {
        return pool::assess_each(loans, assess);
    }
    loans.iter().map(assess).collect()
}

/// Fold per-loan assessments into one tally.
///
/// `add` folds a loan into a partial tally and `merge` joins two partial
/// tallies. Both must be commutative: the pool splits the book arbitrarily.
pub(crate) fn tally<A, T, F, M>(
    assessed: &[A],
    config: &AggregationConfig,
    empty: T,
    add: F,
    merge: M,
) -> T
where
    A: Sync,
    T: Send + Sync + Clone,
    F: Fn(T, &A) -> T + Sync + Send,
    M: Fn(T, T) -> T + Sync + Send,
{
    if config.should_parallelize(assessed.len()) {
        return pool::tally(assessed, empty, add, merge);
    }
    assessed.iter().fold(empty, add)
}

#[cfg(feature = "parallel")]
mod pool {
    use rayon::prelude::*;

    pub(super) fn assess_each<L, A, F>(loans: &[L], assess: F) -> Vec<A>
    where
        L: Sync,
        A: Send,
        F: Fn(&L) -> A + Sync + Send,
    {
        loans.par_iter().map(assess).collect()
    }

    pub(super) fn tally<A, T, F, M>(assessed: &[A], empty: T, add: F, merge: M) -> T
    where
        A: Sync,
        T: Send + Sync + Clone,
        F: Fn(T, &A) -> T + Sync + Send,
        M: Fn(T, T) -> T + Sync + Send,
    {
        assessed
            .par_iter()
            .fold(|| empty.clone(), &add)
            .reduce(|| empty.clone(), merge)
    }
}

// `should_parallelize` is always false without the feature; these keep the
// call sites free of cfg gates.
#[cfg(not(feature = "parallel"))]
mod pool {
    pub(super) fn assess_each<L, A, F: Fn(&L) -> A>(loans: &[L], assess: F) -> Vec<A> {
        loans.iter().map(assess).collect()
    }

    pub(super) fn tally<A, T, F, M>(assessed: &[A], empty: T, add: F, _merge: M) -> T
    where
        F: Fn(T, &A) -> T,
    {
        assessed.iter().fold(empty, add)
    }
}

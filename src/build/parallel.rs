//! Pipeline execution strategies.
//!
//! Pipelines share nothing but the output directory, so they can run side by
//! side. With one job they run in declaration order and stop at the first
//! failure; with more they run on a rayon pool and every pipeline finishes.
//!
//! # Example
//!
//! ```ignore
//! use assetpipe::build::parallel::run_all;
//!
//! let outcomes = run_all(&pipelines, 2, |p| p.run(&reporter));
//! ```

use rayon::prelude::*;

/// Default number of parallel jobs (uses available parallelism).
pub fn default_jobs() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Run `f` over `items`, returning outcomes in input order.
///
/// With `jobs <= 1` execution is sequential and stops after the first `Err`,
/// so the returned vector may be shorter than `items`.
pub fn run_all<T, R, E, F>(items: &[T], jobs: usize, f: F) -> Vec<Result<R, E>>
where
    T: Sync,
    R: Send,
    E: Send,
    F: Fn(&T) -> Result<R, E> + Sync,
{
    if jobs <= 1 || items.len() <= 1 {
        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            let outcome = f(item);
            let failed = outcome.is_err();
            outcomes.push(outcome);
            if failed {
                break;
            }
        }
        return outcomes;
    }

    match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
        Ok(pool) => pool.install(|| items.par_iter().map(&f).collect()),
        Err(err) => {
            tracing::warn!(%err, "could not start worker pool, using the global pool");
            items.par_iter().map(&f).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_sequential_stops_at_first_error() {
        let calls = AtomicUsize::new(0);
        let outcomes = run_all(&[1, 2, 3], 1, |n| {
            calls.fetch_add(1, Ordering::SeqCst);
            if *n == 2 {
                Err("boom")
            } else {
                Ok(*n)
            }
        });

        assert_eq!(outcomes, vec![Ok(1), Err("boom")]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_parallel_runs_everything_in_order() {
        let outcomes = run_all(&[1, 2, 3, 4], 4, |n| if *n == 2 { Err(*n) } else { Ok(*n * 10) });
        assert_eq!(outcomes, vec![Ok(10), Err(2), Ok(30), Ok(40)]);
    }

    #[test]
    fn test_default_jobs_positive() {
        assert!(default_jobs() >= 1);
    }
}

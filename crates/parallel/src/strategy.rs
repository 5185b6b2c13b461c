//! Parallel processing strategies

use rayon::prelude::*;
use std::fmt;
use std::str::FromStr;

/// Processing mode for batch work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    /// Single-threaded processing
    Sequential,
    /// Parallel processing using all available cores
    #[default]
    Parallel,
    /// Parallel with specified number of threads
    ParallelWith(usize),
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingMode::Sequential => f.write_str("sequential"),
            ProcessingMode::Parallel => f.write_str("parallel"),
            ProcessingMode::ParallelWith(n) => write!(f, "{}", n),
        }
    }
}

impl FromStr for ProcessingMode {
    type Err = String;

    /// Accepts `sequential`, `parallel`, or a thread count
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" | "seq" | "1" => Ok(ProcessingMode::Sequential),
            "parallel" | "par" | "auto" => Ok(ProcessingMode::Parallel),
            other => other
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .map(ProcessingMode::ParallelWith)
                .ok_or_else(|| format!("invalid processing mode '{}'", s)),
        }
    }
}

/// Strategy for executing independent work items
pub trait ParallelStrategy {
    /// Map a function over indices and collect results in index order
    fn par_map<T, F>(&self, range: std::ops::Range<usize>, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send;

    /// Map a function over a slice and collect results in input order
    fn map_items<I, T, F>(&self, items: &[I], f: F) -> Vec<T>
    where
        I: Sync,
        T: Send,
        F: Fn(&I) -> T + Sync + Send,
    {
        self.par_map(0..items.len(), |i| f(&items[i]))
    }
}

impl ParallelStrategy for ProcessingMode {
    fn par_map<T, F>(&self, range: std::ops::Range<usize>, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        match self {
            ProcessingMode::Sequential => range.map(f).collect(),
            ProcessingMode::Parallel => range.into_par_iter().map(f).collect(),
            ProcessingMode::ParallelWith(threads) => {
                match rayon::ThreadPoolBuilder::new().num_threads(*threads).build() {
                    Ok(pool) => pool.install(|| range.into_par_iter().map(f).collect()),
                    Err(e) => {
                        tracing::warn!("thread pool with {} threads unavailable ({}), using global pool", threads, e);
                        range.into_par_iter().map(f).collect()
                    }
                }
            }
        }
    }
}

/// Get the number of available CPU cores
pub fn num_cpus() -> usize {
    rayon::current_num_threads()
}

//! Re-runnable comparisons where only the most recent request matters.
//!
//! Each [`ComparisonSession::request`] bumps a shared generation counter. A
//! [`ComparisonRequest`] whose generation is no longer the latest is stale:
//! [`ComparisonSession::run`] checks before every table and abandons the work
//! as soon as a newer request arrives.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use log::debug;

use crate::{
    aggregate::SummarySet,
    compare::{self, ComparisonSet},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComparisonRequest {
    generation: u64,
    pub threshold: f64,
}

impl ComparisonRequest {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone)]
pub struct ComparisonSession {
    left: Arc<SummarySet>,
    right: Arc<SummarySet>,
    latest: Arc<AtomicU64>,
}

impl ComparisonSession {
    pub fn new(left: SummarySet, right: SummarySet) -> Self {
        Self {
            left: Arc::new(left),
            right: Arc::new(right),
            latest: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Registers a new threshold; every earlier request becomes stale.
    pub fn request(&self, threshold: f64) -> ComparisonRequest {
        let generation = self.latest.fetch_add(1, Ordering::AcqRel) + 1;
        ComparisonRequest {
            generation,
            threshold,
        }
    }

    pub fn is_current(&self, request: &ComparisonRequest) -> bool {
        self.latest.load(Ordering::Acquire) == request.generation
    }

    /// Runs the comparison, returning `None` if superseded before completion.
    pub fn run(&self, request: &ComparisonRequest) -> Option<ComparisonSet> {
        let names = compare::comparable_table_names(&self.left, &self.right);
        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            if !self.is_current(request) {
                debug!(
                    "Comparison generation {} superseded before table '{name}'",
                    request.generation
                );
                return None;
            }
            tables.extend(compare::compare_named(
                name,
                &self.left,
                &self.right,
                request.threshold,
            ));
        }
        self.is_current(request)
            .then(|| ComparisonSet::new(request.threshold, tables))
    }
}

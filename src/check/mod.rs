// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Ordered battery of checks along the resolved route
//!
//! Checks are registered once with a unique priority and run in ascending
//! priority order. A check can pass, fail, fail and stop the run (nothing after
//! it can proceed), or abort the run because the probe apparatus broke.

mod builtin;

pub use builtin::{PodListeningCheck, PodStatusCheck, RouteExistsCheck};

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::error::CheckError;
use crate::probe::PodProber;
use crate::progress::{ProgressHandle, create_progress_handle};
use crate::route::ResolvedRoute;
use crate::target::Target;
use crate::topology::TopologyIndex;

/// State shared by the checks of one run
pub struct CheckContext<'a> {
    pub target: &'a Target,
    pub topology: &'a TopologyIndex,
    /// Set by the route check once resolution succeeds
    pub route: Option<ResolvedRoute>,
}

impl<'a> CheckContext<'a> {
    pub fn new(target: &'a Target, topology: &'a TopologyIndex) -> Self {
        Self {
            target,
            topology,
            route: None,
        }
    }

    /// Pods of the resolved route, empty if there is none
    pub fn pods(&self) -> &[crate::topology::PodPortEntry] {
        self.route.as_ref().map(|r| r.pods.as_slice()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Passed,
    Failed(String),
    /// Failed, and the remaining checks cannot proceed
    Halt(String),
    /// Failed because the diagnostic machinery broke; the run stops
    Abort(String),
}

#[async_trait]
pub trait Check: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self, ctx: &mut CheckContext<'_>) -> CheckOutcome;
}

struct Registered {
    priority: u32,
    check: Box<dyn Check>,
}

/// Checks sorted by priority, unique in both priority and name
#[derive(Default)]
pub struct CheckRegistry {
    entries: Vec<Registered>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in battery: route existence, pod status, pod listening
    pub fn builtin(prober: Arc<dyn PodProber>) -> Result<Self, CheckError> {
        let mut registry = Self::new();
        registry.register(0, Box::new(RouteExistsCheck))?;
        registry.register(1, Box::new(PodStatusCheck))?;
        registry.register(2, Box::new(PodListeningCheck::new(prober)))?;
        Ok(registry)
    }

    pub fn register(&mut self, priority: u32, check: Box<dyn Check>) -> Result<(), CheckError> {
        if self.entries.iter().any(|e| e.check.name() == check.name()) {
            return Err(CheckError::DuplicateName(check.name().to_string()));
        }

        match self.entries.binary_search_by_key(&priority, |e| e.priority) {
            Ok(existing) => Err(CheckError::DuplicatePriority {
                priority,
                existing: self.entries[existing].check.name().to_string(),
                name: check.name().to_string(),
            }),
            Err(position) => {
                self.entries.insert(position, Registered { priority, check });
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check names in execution order
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.check.name()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckResult {
    Passed { name: String },
    Failed { name: String, reason: String },
}

impl CheckResult {
    pub fn name(&self) -> &str {
        match self {
            CheckResult::Passed { name } | CheckResult::Failed { name, .. } => name,
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, CheckResult::Passed { .. })
    }
}

/// Everything one run produced
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub target: Target,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<ResolvedRoute>,
    pub results: Vec<CheckResult>,
    /// Checks that never ran because an earlier one stopped the run
    pub skipped: Vec<String>,
    /// Set when a probe failure aborted the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
    pub total: usize,
}

impl CheckReport {
    fn new(target: &Target, total: usize) -> Self {
        Self {
            target: target.clone(),
            route: None,
            results: Vec::with_capacity(total),
            skipped: Vec::new(),
            aborted: None,
            total,
        }
    }

    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.is_passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.passed()
    }

    pub fn passed_names(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| r.is_passed())
            .map(CheckResult::name)
            .collect()
    }

    pub fn failed_names(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| !r.is_passed())
            .map(CheckResult::name)
            .collect()
    }

    /// Every registered check ran and passed
    pub fn is_healthy(&self) -> bool {
        self.passed() == self.total
    }
}

pub struct CheckEngine {
    registry: CheckRegistry,
    progress: ProgressHandle,
}

impl CheckEngine {
    pub fn new(registry: CheckRegistry) -> Self {
        Self {
            registry,
            progress: create_progress_handle(),
        }
    }

    /// Progress reporter for this engine's runs
    pub fn progress(&self) -> &ProgressHandle {
        &self.progress
    }

    pub async fn run(&self, target: &Target, topology: &TopologyIndex) -> CheckReport {
        let mut ctx = CheckContext::new(target, topology);
        let mut report = CheckReport::new(target, self.registry.len());
        self.progress.start_run(self.registry.len());

        for (idx, entry) in self.registry.entries.iter().enumerate() {
            let name = entry.check.name().to_string();
            info!(check = %name, priority = entry.priority, "Running check");
            self.progress.check_started(&name);
            let started = Instant::now();

            let outcome = entry.check.run(&mut ctx).await;
            self.progress.check_complete(
                &name,
                outcome == CheckOutcome::Passed,
                started.elapsed().as_millis() as u64,
            );

            let stop = match outcome {
                CheckOutcome::Passed => {
                    info!(check = %name, "Check passed");
                    report.results.push(CheckResult::Passed { name });
                    false
                }
                CheckOutcome::Failed(reason) => {
                    warn!(check = %name, reason = %reason, "Check failed");
                    report.results.push(CheckResult::Failed { name, reason });
                    false
                }
                CheckOutcome::Halt(reason) => {
                    warn!(check = %name, reason = %reason, "Check failed, skipping remaining checks");
                    report.results.push(CheckResult::Failed { name, reason });
                    true
                }
                CheckOutcome::Abort(reason) => {
                    error!(check = %name, reason = %reason, "Probe failure, aborting run");
                    report.aborted = Some(reason.clone());
                    report.results.push(CheckResult::Failed { name, reason });
                    true
                }
            };

            if stop {
                report.skipped = self.registry.entries[idx + 1..]
                    .iter()
                    .map(|e| e.check.name().to_string())
                    .collect();
                break;
            }
        }

        report.route = ctx.route;
        info!(
            passed = report.passed(),
            failed = report.failed(),
            skipped = report.skipped.len(),
            total = report.total,
            "Checks complete"
        );
        report
    }
}

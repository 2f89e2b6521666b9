// src/engine/scheduler.rs

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::plan::ExecutionPlan;
use crate::runtime::PythonVersion;
use crate::types::JobName;

/// One schedulable unit: a planned job on a concrete version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pair {
    pub job: JobName,
    pub version: PythonVersion,
}

/// Per-run state of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PairState {
    /// Waiting on dependencies.
    Pending,
    /// Dispatched to a job runner.
    Running,
    /// Completed with every step successful.
    Passed,
    /// Completed with a failure, or its version failed to provision.
    Failed,
    /// Skipped because a required job failed on this version.
    Blocked,
}

/// Tracks the (job, version) matrix of one run and decides launch order.
///
/// The scheduler holds the immutable plan plus mutable per-pair state. A
/// pair becomes ready once every required job has passed on the same
/// version; a `once` job has a single pair on the highest selected version,
/// and that pair stands in for the job on every version, both as a
/// dependency and when it fails.
///
/// All methods are synchronous; the orchestrator owns the scheduler and
/// serializes access from its dispatch loop.
pub struct PairScheduler {
    plan: ExecutionPlan,
    versions: Vec<PythonVersion>,
    highest: PythonVersion,
    once: HashMap<JobName, bool>,
    states: HashMap<Pair, PairState>,
}

impl PairScheduler {
    /// Lay out the full matrix as pending pairs.
    ///
    /// `versions` must be sorted highest first and non-empty; the first
    /// entry is where `once` jobs run.
    pub fn new(plan: ExecutionPlan, versions: Vec<PythonVersion>) -> Self {
        let highest = versions[0].clone();
        let once: HashMap<JobName, bool> = plan
            .jobs()
            .iter()
            .map(|job| (job.name.clone(), job.once))
            .collect();

        let mut states = HashMap::new();
        for job in plan.jobs() {
            if job.once {
                states.insert(
                    Pair {
                        job: job.name.clone(),
                        version: highest.clone(),
                    },
                    PairState::Pending,
                );
            } else {
                for version in &versions {
                    states.insert(
                        Pair {
                            job: job.name.clone(),
                            version: version.clone(),
                        },
                        PairState::Pending,
                    );
                }
            }
        }

        Self {
            plan,
            versions,
            highest,
            once,
            states,
        }
    }

    /// Pending pairs whose dependencies are all satisfied. Each returned
    /// pair is marked running; calling again without intervening completions
    /// returns nothing new.
    pub fn take_ready(&mut self) -> Vec<Pair> {
        let candidates: Vec<Pair> = self
            .states
            .iter()
            .filter(|(pair, state)| {
                **state == PairState::Pending && self.deps_satisfied(pair)
            })
            .map(|(pair, _)| pair.clone())
            .collect();

        let mut ready = candidates;
        // Plan order keeps launch order deterministic for unrelated pairs.
        ready.sort_by_key(|pair| {
            (
                self.plan
                    .jobs()
                    .iter()
                    .position(|j| j.name == pair.job)
                    .unwrap_or(usize::MAX),
                std::cmp::Reverse(pair.version.clone()),
            )
        });

        for pair in &ready {
            debug!(job = %pair.job, version = %pair.version, "pair ready");
            self.states.insert(pair.clone(), PairState::Running);
        }
        ready
    }

    /// Record a terminal outcome for a pair.
    ///
    /// On failure, every pair that transitively requires this job on the
    /// affected versions is marked blocked; the newly blocked pairs are
    /// returned so the orchestrator can report them.
    pub fn record_completion(&mut self, pair: &Pair, success: bool) -> Vec<Pair> {
        let state = if success {
            PairState::Passed
        } else {
            PairState::Failed
        };
        if self.states.insert(pair.clone(), state).is_none() {
            warn!(job = %pair.job, version = %pair.version, "completion for unknown pair");
        }

        if success {
            Vec::new()
        } else {
            self.propagate_blocked(pair)
        }
    }

    /// Mark every pair on `version` as failed, used when its environment
    /// could not be provisioned. Returns the failed pairs and the pairs
    /// blocked as a consequence (which can span other versions when a
    /// `once` job was among the casualties).
    pub fn fail_version(&mut self, version: &PythonVersion) -> (Vec<Pair>, Vec<Pair>) {
        let failed: Vec<Pair> = self
            .states
            .iter()
            .filter(|(pair, state)| pair.version == *version && **state == PairState::Pending)
            .map(|(pair, _)| pair.clone())
            .collect();

        let mut blocked = Vec::new();
        for pair in &failed {
            self.states.insert(pair.clone(), PairState::Failed);
        }
        for pair in &failed {
            blocked.extend(self.propagate_blocked(pair));
        }
        (failed, blocked)
    }

    /// True when no pair is pending or running.
    pub fn is_done(&self) -> bool {
        !self
            .states
            .values()
            .any(|s| matches!(s, PairState::Pending | PairState::Running))
    }

    /// Where a dependency edge of `pair` points: a `once` dependency is
    /// satisfied by its single pair on the highest version.
    fn dep_pair(&self, dep: &JobName, version: &PythonVersion) -> Pair {
        let dep_version = if self.once.get(dep).copied().unwrap_or(false) {
            self.highest.clone()
        } else {
            version.clone()
        };
        Pair {
            job: dep.clone(),
            version: dep_version,
        }
    }

    fn deps_satisfied(&self, pair: &Pair) -> bool {
        self.plan.dependencies_of(&pair.job).iter().all(|dep| {
            matches!(
                self.states.get(&self.dep_pair(dep, &pair.version)),
                Some(PairState::Passed)
            )
        })
    }

    /// Transitively mark pending dependents of a failed or blocked pair as
    /// blocked.
    fn propagate_blocked(&mut self, from: &Pair) -> Vec<Pair> {
        let mut blocked = Vec::new();
        let mut stack = vec![from.clone()];

        while let Some(current) = stack.pop() {
            for dependent in self.dependent_pairs(&current) {
                if self.states.get(&dependent) == Some(&PairState::Pending) {
                    debug!(
                        job = %dependent.job,
                        version = %dependent.version,
                        upstream = %current.job,
                        "blocking dependent pair"
                    );
                    self.states.insert(dependent.clone(), PairState::Blocked);
                    blocked.push(dependent.clone());
                    stack.push(dependent);
                }
            }
        }

        blocked
    }

    /// Existing pairs whose dependency edges resolve to exactly `pair`.
    fn dependent_pairs(&self, pair: &Pair) -> Vec<Pair> {
        let mut pairs = Vec::new();
        for dependent in self.plan.dependents_of(&pair.job) {
            let candidates: Vec<Pair> =
                if self.once.get(dependent).copied().unwrap_or(false) {
                    vec![Pair {
                        job: dependent.clone(),
                        version: self.highest.clone(),
                    }]
                } else {
                    self.versions
                        .iter()
                        .map(|v| Pair {
                            job: dependent.clone(),
                            version: v.clone(),
                        })
                        .collect()
                };

            for candidate in candidates {
                if self.states.contains_key(&candidate)
                    && self.dep_pair(&pair.job, &candidate.version) == *pair
                {
                    pairs.push(candidate);
                }
            }
        }
        pairs
    }
}

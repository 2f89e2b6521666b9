// src/plan/graph.rs

use std::collections::{BTreeMap, HashMap};

use crate::errors::ConfigError;
use crate::types::{Job, JobName};

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone)]
struct PlanNode {
    /// Direct dependencies: jobs that must pass before this one can run.
    deps: Vec<JobName>,
    /// Direct dependents: jobs that require this one.
    dependents: Vec<JobName>,
}

/// The ordered, dependency-expanded set of jobs for one run.
///
/// Built from the requested job names by recursively following `requires`
/// edges. The resulting order puts every job strictly after all of its
/// transitive requirements while preserving the requested relative order
/// among jobs not constrained by a dependency relationship. Each job
/// appears exactly once, even when requested or required several times.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    jobs: Vec<Job>,
    nodes: HashMap<JobName, PlanNode>,
}

enum Visit {
    InProgress,
    Done,
}

impl ExecutionPlan {
    /// Expand `requested` against the job definitions.
    ///
    /// Fails with [`ConfigError::UnknownJob`] when any requested or required
    /// name is undefined, and with [`ConfigError::CyclicDependency`] when the
    /// requires graph has a cycle, naming the members in order. Either error
    /// means nothing executes.
    pub fn build(
        requested: &[JobName],
        definitions: &BTreeMap<JobName, Job>,
    ) -> Result<Self, ConfigError> {
        let mut order: Vec<Job> = Vec::new();
        let mut state: HashMap<JobName, Visit> = HashMap::new();
        let mut stack: Vec<JobName> = Vec::new();

        for name in requested {
            visit(name, definitions, &mut state, &mut stack, &mut order)?;
        }

        // Adjacency restricted to the jobs actually planned.
        let mut nodes: HashMap<JobName, PlanNode> = order
            .iter()
            .map(|job| {
                (
                    job.name.clone(),
                    PlanNode {
                        deps: job.requires.clone(),
                        dependents: Vec::new(),
                    },
                )
            })
            .collect();

        for job in &order {
            for dep in &job.requires {
                if let Some(dep_node) = nodes.get_mut(dep) {
                    dep_node.dependents.push(job.name.clone());
                }
            }
        }

        Ok(Self { jobs: order, nodes })
    }

    /// Planned jobs in execution order.
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// True when every planned job is a `once` job.
    pub fn all_once(&self) -> bool {
        !self.jobs.is_empty() && self.jobs.iter().all(|j| j.once)
    }

    /// Immediate dependencies of a planned job.
    pub fn dependencies_of(&self, name: &str) -> &[JobName] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a planned job.
    pub fn dependents_of(&self, name: &str) -> &[JobName] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }
}

/// Depth-first post-order visit: dependencies land in the plan before the
/// jobs that require them.
fn visit(
    name: &str,
    definitions: &BTreeMap<JobName, Job>,
    state: &mut HashMap<JobName, Visit>,
    stack: &mut Vec<JobName>,
    order: &mut Vec<Job>,
) -> Result<(), ConfigError> {
    match state.get(name) {
        Some(Visit::Done) => return Ok(()),
        Some(Visit::InProgress) => {
            let start = stack.iter().position(|n| n == name).unwrap_or(0);
            return Err(ConfigError::CyclicDependency(stack[start..].to_vec()));
        }
        None => {}
    }

    let job = definitions
        .get(name)
        .ok_or_else(|| ConfigError::UnknownJob(name.to_string()))?;

    state.insert(name.to_string(), Visit::InProgress);
    stack.push(name.to_string());

    for dep in &job.requires {
        visit(dep, definitions, state, stack, order)?;
    }

    stack.pop();
    state.insert(name.to_string(), Visit::Done);
    order.push(job.clone());
    Ok(())
}

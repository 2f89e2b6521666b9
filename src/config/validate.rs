// src/config/validate.rs

use anyhow::{anyhow, Result};
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::Config;
use crate::runtime::VersionSpec;

/// Run semantic validation against a normalized configuration.
///
/// This checks:
/// - every name in `default` refers to a defined job
/// - every `requires` entry refers to a defined job
/// - the requires graph has no cycles
/// - every job has at least one command
/// - every `python_versions` entry parses as a version specifier
///
/// It does **not** render command templates; missing values surface when a
/// run actually uses them.
pub fn validate_config(cfg: &Config) -> Result<()> {
    validate_defaults(cfg)?;
    validate_job_requires(cfg)?;
    validate_dag(cfg)?;
    validate_versions(cfg)?;
    Ok(())
}

fn validate_defaults(cfg: &Config) -> Result<()> {
    for name in &cfg.default {
        if !cfg.jobs.contains_key(name) {
            return Err(anyhow!("option 'default': undefined job '{}'", name));
        }
    }
    Ok(())
}

fn validate_job_requires(cfg: &Config) -> Result<()> {
    for (name, job) in cfg.jobs.iter() {
        if job.run.is_empty() {
            return Err(anyhow!("job '{}' has no commands to run", name));
        }
        for dep in job.requires.iter() {
            if !cfg.jobs.contains_key(dep) {
                return Err(anyhow!(
                    "job '{}' requires undefined job '{}'",
                    name,
                    dep
                ));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &Config) -> Result<()> {
    // Edge direction: dep -> job. For
    //   [jobs]
    //   test = { requires = ["lint"] }
    // we add edge lint -> test.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.jobs.keys() {
        graph.add_node(name.as_str());
    }

    for (name, job) in cfg.jobs.iter() {
        for dep in job.requires.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    // A topological sort fails iff there is a cycle.
    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(anyhow!(
            "cycle detected in job requires involving '{}'",
            cycle.node_id()
        )),
    }
}

fn validate_versions(cfg: &Config) -> Result<()> {
    for raw in &cfg.versions {
        raw.parse::<VersionSpec>()
            .map_err(|e| anyhow!("invalid python_versions entry '{}': {}", raw, e))?;
    }
    Ok(())
}

use std::collections::BTreeMap;
use std::error::Error;

use jobx::errors::ConfigError;
use jobx::plan::ExecutionPlan;
use jobx::types::Job;

type TestResult = Result<(), Box<dyn Error>>;

fn job(name: &str, requires: &[&str]) -> Job {
    let mut job = Job::new(name, vec![format!("echo {name}")]);
    job.requires = requires.iter().map(|r| r.to_string()).collect();
    job
}

fn definitions(jobs: Vec<Job>) -> BTreeMap<String, Job> {
    jobs.into_iter().map(|j| (j.name.clone(), j)).collect()
}

fn position(plan: &ExecutionPlan, name: &str) -> usize {
    plan.jobs()
        .iter()
        .position(|j| j.name == name)
        .unwrap_or_else(|| panic!("job '{name}' missing from plan"))
}

#[test]
fn every_job_follows_its_transitive_requirements() -> TestResult {
    let defs = definitions(vec![
        job("a", &[]),
        job("b", &["a"]),
        job("c", &["a"]),
        job("d", &["b", "c"]),
    ]);

    let plan = ExecutionPlan::build(&["d".into()], &defs)?;

    assert_eq!(plan.len(), 4);
    assert!(position(&plan, "a") < position(&plan, "b"));
    assert!(position(&plan, "a") < position(&plan, "c"));
    assert!(position(&plan, "b") < position(&plan, "d"));
    assert!(position(&plan, "c") < position(&plan, "d"));

    Ok(())
}

#[test]
fn requested_relative_order_is_preserved_without_dependencies() -> TestResult {
    let defs = definitions(vec![job("x", &[]), job("y", &[]), job("z", &[])]);

    let plan = ExecutionPlan::build(&["z".into(), "x".into(), "y".into()], &defs)?;

    let names: Vec<&str> = plan.jobs().iter().map(|j| j.name.as_str()).collect();
    assert_eq!(names, ["z", "x", "y"]);

    Ok(())
}

#[test]
fn duplicate_requests_collapse_to_first_occurrence() -> TestResult {
    let defs = definitions(vec![job("a", &[]), job("b", &["a"])]);

    let plan = ExecutionPlan::build(&["b".into(), "a".into(), "b".into()], &defs)?;

    let names: Vec<&str> = plan.jobs().iter().map(|j| j.name.as_str()).collect();
    assert_eq!(names, ["a", "b"]);

    Ok(())
}

#[test]
fn unknown_job_is_named_in_the_error() {
    let defs = definitions(vec![job("a", &[])]);

    let err = ExecutionPlan::build(&["missing".into()], &defs).unwrap_err();
    match err {
        ConfigError::UnknownJob(name) => assert_eq!(name, "missing"),
        other => panic!("expected UnknownJob, got {other:?}"),
    }
}

#[test]
fn unknown_required_job_is_named_in_the_error() {
    let defs = definitions(vec![job("a", &["ghost"])]);

    let err = ExecutionPlan::build(&["a".into()], &defs).unwrap_err();
    match err {
        ConfigError::UnknownJob(name) => assert_eq!(name, "ghost"),
        other => panic!("expected UnknownJob, got {other:?}"),
    }
}

#[test]
fn two_cycle_names_both_members_in_order() {
    let defs = definitions(vec![job("a", &["b"]), job("b", &["a"])]);

    let err = ExecutionPlan::build(&["a".into()], &defs).unwrap_err();
    match err {
        ConfigError::CyclicDependency(members) => {
            assert_eq!(members, vec!["a".to_string(), "b".to_string()]);
        }
        other => panic!("expected CyclicDependency, got {other:?}"),
    }
}

#[test]
fn self_cycle_is_rejected() {
    let defs = definitions(vec![job("a", &["a"])]);

    let err = ExecutionPlan::build(&["a".into()], &defs).unwrap_err();
    match err {
        ConfigError::CyclicDependency(members) => {
            assert_eq!(members, vec!["a".to_string()]);
        }
        other => panic!("expected CyclicDependency, got {other:?}"),
    }
}

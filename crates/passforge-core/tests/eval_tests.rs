mod common;

use common::*;
use passforge_core::candidate::{Candidate, Pipeline};
use passforge_core::eval::{FailureReason, MAX_ELAPSED};
use std::time::{Duration, Instant};

const PASSES: &str = "gvn sccp licm adce";

fn tuned(passes: Vec<usize>) -> Candidate {
    Candidate::Tuned(Pipeline {
        passes,
        inline_threshold: 325,
    })
}

#[test]
fn a_clean_pipeline_yields_a_finite_elapsed() {
    let fx = Fixture::new();
    let opt = fx.script("opt", OPT_OK);
    let make = fx.script("make", &make_trivial());
    let evaluator = fx.evaluator(&opt, &make, PASSES, 1);

    let elapsed = evaluator.evaluate(&tuned(vec![0, 1, 2]), None).unwrap();
    assert!(elapsed < MAX_ELAPSED);
    assert_eq!(fx.err_log(), "");
}

#[test]
fn the_baseline_flows_through_the_same_pipeline() {
    let fx = Fixture::new();
    let opt = fx.script("opt", OPT_OK);
    let make = fx.script("make", &make_trivial());
    let evaluator = fx.evaluator(&opt, &make, PASSES, 1);

    let elapsed = evaluator.evaluate(&Candidate::Baseline, None).unwrap();
    assert!(elapsed < MAX_ELAPSED);
}

#[test]
fn an_optimizer_crash_is_classified_and_collapsed() {
    let fx = Fixture::new();
    let opt = fx.script("opt", &opt_poisoned("-gvn"));
    let make = fx.script("make", &make_trivial());
    let evaluator = fx.evaluator(&opt, &make, PASSES, 1);

    let err = evaluator.evaluate(&tuned(vec![0]), None).unwrap_err();
    assert_eq!(err.reason, FailureReason::OptError);
    assert!(err.detail.contains("unknown pass"));

    assert_eq!(evaluator.measure(&tuned(vec![0]), None), MAX_ELAPSED);
    let log = fx.err_log();
    assert!(log.contains("opt crash"), "error log was: {log}");
    assert!(log.contains("================================"));
}

#[test]
fn a_link_failure_is_a_codegen_error() {
    let fx = Fixture::new();
    let opt = fx.script("opt", OPT_OK);
    let make = fx.script(
        "make",
        &make_stub("echo cannot link >&2; exit 1", "echo true", ":"),
    );
    let evaluator = fx.evaluator(&opt, &make, PASSES, 1);

    let err = evaluator.evaluate(&tuned(vec![1]), None).unwrap_err();
    assert_eq!(err.reason, FailureReason::CodegenError);
    assert!(err.detail.contains("cannot link"));
}

#[test]
fn a_failing_run_rule_is_a_build_error() {
    let fx = Fixture::new();
    let opt = fx.script("opt", OPT_OK);
    let make = fx.script("make", &make_stub(":", "exit 1", ":"));
    let evaluator = fx.evaluator(&opt, &make, PASSES, 1);

    let err = evaluator.evaluate(&tuned(vec![1]), None).unwrap_err();
    assert_eq!(err.reason, FailureReason::BuildError);
}

#[test]
fn an_empty_run_command_is_a_build_error() {
    let fx = Fixture::new();
    let opt = fx.script("opt", OPT_OK);
    let make = fx.script("make", &make_stub(":", ":", ":"));
    let evaluator = fx.evaluator(&opt, &make, PASSES, 1);

    let err = evaluator.evaluate(&tuned(vec![1]), None).unwrap_err();
    assert_eq!(err.reason, FailureReason::BuildError);
    assert!(err.detail.contains("printed no command"));
}

#[test]
fn a_crashing_program_is_incorrect_code() {
    let fx = Fixture::new();
    let opt = fx.script("opt", OPT_OK);
    let make = fx.script("make", &make_stub(":", "echo false", ":"));
    let evaluator = fx.evaluator(&opt, &make, PASSES, 1);

    let err = evaluator.evaluate(&tuned(vec![2]), None).unwrap_err();
    assert_eq!(err.reason, FailureReason::IncorrectCode);
}

#[test]
fn a_verification_failure_is_incorrect_code() {
    let fx = Fixture::new();
    let opt = fx.script("opt", OPT_OK);
    let make = fx.script("make", &make_stub(":", "echo true", "exit 1"));
    let evaluator = fx.evaluator(&opt, &make, PASSES, 1);

    let err = evaluator.evaluate(&tuned(vec![3]), None).unwrap_err();
    assert_eq!(err.reason, FailureReason::IncorrectCode);
}

#[test]
fn the_verify_rule_sees_the_captured_stdout() {
    let fx = Fixture::new();
    let opt = fx.script("opt", OPT_OK);
    // the program prints "hello"; verification greps for it in $STDOUT
    let make = fx.script(
        "make",
        &make_stub(":", "echo echo hello", r#"grep -q hello "$STDOUT""#),
    );
    let evaluator = fx.evaluator(&opt, &make, PASSES, 1);

    assert!(evaluator.evaluate(&tuned(vec![0, 3]), None).is_ok());
}

#[test]
fn a_hung_program_is_killed_at_the_deadline() {
    let fx = Fixture::new();
    let opt = fx.script("opt", OPT_OK);
    let make = fx.script("make", &make_stub(":", "echo sleep 30", ":"));
    let evaluator = fx.evaluator(&opt, &make, PASSES, 1);

    let start = Instant::now();
    let elapsed = evaluator.measure(&tuned(vec![0]), Some(Duration::from_millis(200)));
    let wall = start.elapsed();

    assert_eq!(elapsed, MAX_ELAPSED);
    assert!(wall < Duration::from_secs(10), "kill took {wall:?}");
    assert!(fx.err_log().contains("timeout"));
}

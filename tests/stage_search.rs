//! Stage-count bisection over a wide bracket
//!
//! Uses a poorly volatile VOC so that the target is reached only after a
//! dozen stages and the search has real work to do.

use degasser::solvers::SolverParams;
use degasser::{find_stages, solve, EngineSession};

mod common;
use common::{weak_voc_database, weak_voc_design};

#[test]
fn test_bisection_finds_minimal_stage_count() {
    let params = SolverParams::default();
    let mut session = EngineSession::with_database(weak_voc_database());

    // Place the target between the outlets at 11 and 12 stages
    let (probe, chemistry) = weak_voc_design(1e-3);
    let outlet_11 = solve(&mut session, &probe, &chemistry, 11, &params)
        .unwrap()
        .outlet_concentration();
    let outlet_12 = solve(&mut session, &probe, &chemistry, 12, &params)
        .unwrap()
        .outlet_concentration();
    assert!(outlet_12 < outlet_11);
    let target = (outlet_11 * outlet_12).sqrt();

    let (request, chemistry) = weak_voc_design(target);
    let outcome = find_stages(&mut session, &request, &chemistry, target, 5, 100, &params).unwrap();

    println!(
        "N* = {} after {} bisection steps ({} solves)",
        outcome.optimal_stages, outcome.bisection_steps, outcome.evaluations
    );
    assert_eq!(outcome.optimal_stages, 12);
    assert!(outcome.bisection_steps <= 7);
    assert_eq!(outcome.evaluations, outcome.bisection_steps + 2);
    assert!(outcome.result.outlet_concentration() <= target);
    assert_eq!(outcome.result.n_stages(), 12);

    // Minimality: one stage fewer misses the target
    let below = solve(&mut session, &request, &chemistry, outcome.optimal_stages - 1, &params)
        .unwrap();
    assert!(below.outlet_concentration() > target);
    assert_eq!(session.constructions(), 1);
}

#[test]
fn test_search_reports_achievable_outlet() {
    let params = SolverParams::default();
    let mut session = EngineSession::with_database(weak_voc_database());
    let (request, chemistry) = weak_voc_design(1e-6);

    let err = find_stages(&mut session, &request, &chemistry, 1e-6, 2, 6, &params).unwrap_err();

    let message = err.to_string();
    assert!(message.contains("not reachable with 6 stages"), "{message}");
}

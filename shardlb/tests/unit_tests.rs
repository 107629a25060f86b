//! Unit tests entrypoint for the routing core

#[path = "unit/proptest_tests.rs"]
mod proptest_tests;

#[path = "unit/routing_scenario_test.rs"]
mod routing_scenario_test;

// Tests are defined inside the modules; this harness ensures they are built
// and executed when running `cargo test`.

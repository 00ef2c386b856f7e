//! Unit tests for mock resolution, grouped by surface

mod pattern_tests;
mod store_tests;

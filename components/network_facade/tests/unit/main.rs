//! Unit tests for the network facades, grouped by surface

mod emitter_tests;
mod facade_tests;

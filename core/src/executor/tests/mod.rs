//! Tests for the executor
//!
//! Organized by feature area

mod helpers;

mod if_tests;

//! Integration tests for blc
//!
//! These tests use wiremock to serve small sites and drive full crawl
//! sessions against them.

mod control_tests;
mod report_tests;
mod support;

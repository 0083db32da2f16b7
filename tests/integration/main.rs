//! Integration tests for Review-Sweep
//!
//! Full runs go through the orchestrator with the in-memory scripted
//! browser, a SQLite file and a backup ledger in a temporary directory.

mod crawl_tests;

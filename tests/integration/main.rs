//! Integration tests for Listing-Harvester
//!
//! These tests use wiremock to serve listing pages and the remote sink, and drive
//! full runs through the session host end-to-end.

mod session_tests;

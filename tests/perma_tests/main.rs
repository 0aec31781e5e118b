//! Integration tests for the public map handles

mod writable_tests;

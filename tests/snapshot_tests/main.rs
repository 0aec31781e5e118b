//! Integration tests for the snapshot lifecycle

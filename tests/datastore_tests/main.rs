//! Integration tests for the map file format

mod map_data_tests;

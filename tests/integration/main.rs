//! Integration tests for the droplet-proxy binary.

mod cli_tests;

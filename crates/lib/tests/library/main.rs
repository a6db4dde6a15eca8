mod common;

mod cache_tests;
mod isolation_tests;
mod project_tests;
mod roundtrip_tests;

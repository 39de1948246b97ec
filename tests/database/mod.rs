mod snapshot_tests;
mod store_tests;

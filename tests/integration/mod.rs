mod processing_tests;
mod scenario_tests;
mod symmetry_tests;

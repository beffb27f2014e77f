mod common;
mod config_tests;
mod driver_tests;
mod scenario_tests;

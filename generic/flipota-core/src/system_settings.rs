pub mod log_toggles;

// List the different tasks here
pub mod experiments;
pub mod naming;
pub mod plot;
pub mod remote;
pub mod results;
pub mod run_id;
pub mod runner;
pub mod series;
pub mod sweep;

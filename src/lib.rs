pub mod algebra;
pub mod bfield;
pub mod constants;
pub mod fit_config;
pub mod hit_update;
pub mod kinfit_errors;

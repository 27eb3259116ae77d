pub mod infra;
pub mod runtime;

pub mod config;
pub mod coverage;
pub mod errors;
pub mod features;
pub mod gbdt;
pub mod metrics;
pub mod report;
pub mod schema;
pub mod source;
pub mod split;
pub mod table;
pub mod train;
pub mod validate;

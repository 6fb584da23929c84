pub mod cost;
pub mod error;
pub mod providers;
pub mod review;
pub mod rules;
pub mod sanitize;
pub mod translate;

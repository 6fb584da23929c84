pub mod batch;
pub mod error;
pub mod fk;
pub mod package;
pub mod sequence;
pub mod tokens;
pub mod trigger;

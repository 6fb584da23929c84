pub mod source;
pub mod target;

pub use source::MockSource;
pub use target::MockTarget;

pub mod category;
pub mod fk;
pub mod object;
pub mod package;
pub mod selection;
pub mod sequence;

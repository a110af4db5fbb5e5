pub mod item;
pub mod kind;
pub mod schedule;
pub mod status;

pub mod participant;
pub mod template;
pub mod timestamp;

pub mod certificates;
pub mod email;
pub mod health;
pub mod multipart;
pub mod participants;
pub mod render;
pub mod templates;

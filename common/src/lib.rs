//! Data model shared between the certificate service and its clients.

pub mod jobs;
pub mod model;
pub mod requests;

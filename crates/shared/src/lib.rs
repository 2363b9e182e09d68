pub mod domain;
pub mod metadata;

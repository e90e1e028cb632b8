pub mod metadata;
pub mod records;
pub mod sources;

pub mod delivery;
pub mod extractors;
pub mod harvest;
pub mod photos;
pub mod recorder;
pub mod upload;
pub mod variants;

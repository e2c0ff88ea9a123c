pub mod delivery;
pub mod harvest;
pub mod pagination;
pub mod photo;
pub mod photo_metadata;

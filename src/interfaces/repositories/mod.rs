pub mod harvest;
pub mod memory;
pub mod photo;
pub mod sqlx_repo;

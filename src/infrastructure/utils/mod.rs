pub mod client_ip;
pub mod clock;
pub mod filename;
pub mod text;
pub mod valid_uuid;

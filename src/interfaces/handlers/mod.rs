pub mod harvests;
pub mod home;
pub mod photos;
pub mod system;

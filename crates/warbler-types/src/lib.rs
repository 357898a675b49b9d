pub mod api;
pub mod models;

pub use models::{Message, Profile, ProfileStats, User};

pub mod applications;
pub mod auth;
pub mod gamification;
pub mod jobs;
pub mod users;

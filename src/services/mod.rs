//! Service layer modules.
//!
//! Contains the Redis caching client and the gamification orchestrator.

pub mod cache;
pub mod gamification;

pub use cache::RedisCache;
pub use gamification::GamificationService;

pub mod auth;
pub mod cache;
pub mod config;
pub mod handlers;
pub mod import;
pub mod metrics;
pub mod middleware;
pub mod observability;
pub mod recommendations;
pub mod server;
pub mod service;

pub use cache::{CacheGateway, CacheLookup, CacheStatus, DynCacheGateway, LocalCache, RedisCache};
pub use config::{AppConfig, AuthConfig, CacheConfig, RedisConfig, ServerConfig};
pub use observability::init_tracing;
pub use server::{AppState, CoursecatServer, ServerBuilder, build_app, build_router, build_state};
pub use service::{Cached, CourseService, ServiceError};

// Cache module: distributed store with local fallback
//
// `ResilientCache` fronts a `CacheStore` (Redis in production) and keeps a
// `MemoryStore` hot standby. `CacheRegistry` owns the single instance.

pub mod error;
pub mod memory;
pub mod models;
pub mod reconnect;
pub mod redis;
pub mod registry;
pub mod resilient;
pub mod stats;
pub mod store;

pub use error::{CacheError, CacheResult};
pub use memory::MemoryStore;
pub use models::{CacheStats, ConnectionState, ConnectionStatus};
pub use reconnect::{ConnectionSupervisor, ReconnectPolicy};
pub use registry::CacheRegistry;
pub use resilient::ResilientCache;
pub use self::redis::RedisStore;
pub use store::CacheStore;

//! Storage backends
//!
//! [`GraphStore`](orchestrator_domain::GraphStore) 的两个实现：
//! Redis（生产）与内存（内嵌部署、测试）。复合写操作在 Redis 侧
//! 以服务端脚本执行，在内存侧以单把互斥锁执行，两边都保证
//! 依赖递减与条件入队是一个线性化点。

pub mod factory;
pub mod memory;
pub mod redis_store;

pub use factory::create_store;
pub use memory::InMemoryGraphStore;
pub use redis_store::RedisGraphStore;

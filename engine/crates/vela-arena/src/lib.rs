//! Arena/Handle 存储
//!
//! 场景中的所有实体（node、mesh、material、texture、light）都存放在各自的 [`Arena`] 中，
//! 实体之间只通过 [`Handle`] 互相引用，Arena 是唯一的所有者。
//! 这样 parent/child 之间不会出现所有权环。

pub mod arena;
pub mod handle;
pub mod hash;

pub use arena::Arena;
pub use handle::{ArenaId, Handle};
pub use hash::CacheKey;

//! 缓存 key 相关的哈希工具
//!
//! 渲染资源缓存用 64 位 key 区分资源记录：几何数据按内容 hash，
//! 单实体资源按 handle 的 index，组合资源按子 key 依次混合。

use std::fmt::{Debug, Formatter};

use xxhash_rust::xxh3::xxh3_64;

use crate::handle::Handle;

/// 将 `value` 混合进 `seed`，结果与混合顺序相关
///
/// 两者按小端拼成 16 字节再做一次 xxh3，输入的每一位都会影响整个结果
#[inline]
pub fn hash_combine(seed: u64, value: u64) -> u64 {
    let mut bytes = [0u8; 16];
    bytes[..8].copy_from_slice(&seed.to_le_bytes());
    bytes[8..].copy_from_slice(&value.to_le_bytes());
    xxh3_64(&bytes)
}

/// 字节内容的 xxh3-64
#[inline]
pub fn content_hash(bytes: &[u8]) -> u64 {
    xxh3_64(bytes)
}

/// 资源缓存使用的 key
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CacheKey(u64);

// new & init
impl CacheKey {
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// 单实体资源：直接使用 handle 的 index
    #[inline]
    pub fn from_handle<T>(handle: Handle<T>) -> Self {
        Self(handle.raw_key())
    }

    /// 任意 Pod 数据的内容 hash
    #[inline]
    pub fn from_content<P: bytemuck::Pod>(data: &[P]) -> Self {
        Self(content_hash(bytemuck::cast_slice(data)))
    }

    /// 固定的标签 key，例如 "没有材质"
    #[inline]
    pub fn tagged(tag: &str) -> Self {
        Self(content_hash(tag.as_bytes()))
    }
}
// getters
impl CacheKey {
    #[inline]
    pub fn raw(&self) -> u64 {
        self.0
    }
}
// tools
impl CacheKey {
    /// 有序组合：`a.combine(b) != b.combine(a)`
    #[inline]
    #[must_use]
    pub fn combine(self, other: impl Into<CacheKey>) -> Self {
        Self(hash_combine(self.0, other.into().0))
    }
}

impl From<u64> for CacheKey {
    #[inline]
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Debug for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "CacheKey({:#018x})", self.0)
    }
}

use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

/// Arena 的身份标识，进程内唯一
///
/// 0 被保留给无效的 Handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArenaId(u32);

impl ArenaId {
    pub const INVALID: ArenaId = ArenaId(0);

    pub(crate) fn next() -> Self {
        static NEXT_ARENA_ID: AtomicU32 = AtomicU32::new(1);
        let id = NEXT_ARENA_ID.fetch_add(1, AtomicOrdering::Relaxed);
        assert_ne!(id, u32::MAX, "too many arenas");
        ArenaId(id)
    }

    #[inline]
    pub fn raw(&self) -> u32 {
        self.0
    }
}

/// 指向 [`crate::Arena`] 中某个元素的非所有权引用
///
/// - 相等性是结构化的：同一个 arena，同一个 index
/// - hash 只使用 index
/// - `Handle::default()` 是显式的无效 handle，解引用前需要检查
///
/// 对 `T` 没有任何 trait 要求，因此 Clone/Copy/Eq/Hash 都是手动实现的
pub struct Handle<T> {
    arena: ArenaId,
    index: u32,
    _phantom: PhantomData<fn() -> T>,
}

// new & init
impl<T> Handle<T> {
    pub const INVALID_INDEX: u32 = u32::MAX;

    #[inline]
    pub(crate) fn new(arena: ArenaId, index: u32) -> Self {
        Self {
            arena,
            index,
            _phantom: PhantomData,
        }
    }

    #[inline]
    pub const fn invalid() -> Self {
        Self {
            arena: ArenaId::INVALID,
            index: Self::INVALID_INDEX,
            _phantom: PhantomData,
        }
    }
}
// getters
impl<T> Handle<T> {
    #[inline]
    pub fn arena_id(&self) -> ArenaId {
        self.arena
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index as usize
    }

    /// 是否是 `Handle::default()` 产生的无效 handle
    ///
    /// 注意：返回 true 并不代表一定可以解引用，还需要 arena 的长度检查
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.arena != ArenaId::INVALID && self.index != Self::INVALID_INDEX
    }

    /// 作为缓存 key 使用的原始 index
    #[inline]
    pub fn raw_key(&self) -> u64 {
        self.index as u64
    }
}

impl<T> Default for Handle<T> {
    #[inline]
    fn default() -> Self {
        Self::invalid()
    }
}

impl<T> Clone for Handle<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.arena == other.arena && self.index == other.index
    }
}
impl<T> Eq for Handle<T> {}

impl<T> PartialOrd for Handle<T> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<T> Ord for Handle<T> {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        (self.arena, self.index).cmp(&(other.arena, other.index))
    }
}

impl<T> Hash for Handle<T> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> Debug for Handle<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let type_name = std::any::type_name::<T>().rsplit("::").next().unwrap_or("?");
        if self.is_valid() {
            write!(f, "Handle<{}>({}@{})", type_name, self.index, self.arena.0)
        } else {
            write!(f, "Handle<{}>(invalid)", type_name)
        }
    }
}

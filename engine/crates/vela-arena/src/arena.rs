use std::ops::{Index, IndexMut};

use crate::handle::{ArenaId, Handle};

/// 只追加的稳定存储
///
/// 元素一旦放入就不会被移动或压缩，已经发出的 Handle 在 arena 的整个生命周期内都有效。
/// 不支持删除：场景文档加载完成后结构是固定的。
pub struct Arena<T> {
    id: ArenaId,
    items: Vec<T>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

// new & init
impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            id: ArenaId::next(),
            items: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            id: ArenaId::next(),
            items: Vec::with_capacity(capacity),
        }
    }
}
// getters
impl<T> Arena<T> {
    #[inline]
    pub fn id(&self) -> ArenaId {
        self.id
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// handle 是否可以在当前 arena 上解引用
    #[inline]
    pub fn contains(&self, handle: Handle<T>) -> bool {
        handle.is_valid() && handle.arena_id() == self.id && handle.index() < self.items.len()
    }

    #[inline]
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        if handle.arena_id() != self.id {
            return None;
        }
        self.items.get(handle.index())
    }

    #[inline]
    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        if handle.arena_id() != self.id {
            return None;
        }
        self.items.get_mut(handle.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        let id = self.id;
        self.items.iter().enumerate().map(move |(index, item)| (Handle::new(id, index as u32), item))
    }

    pub fn handles(&self) -> impl Iterator<Item = Handle<T>> + use<T> {
        let id = self.id;
        (0..self.items.len() as u32).map(move |index| Handle::new(id, index))
    }
}
// update
impl<T> Arena<T> {
    /// 追加一个元素，返回指向它的 handle
    pub fn push(&mut self, value: T) -> Handle<T> {
        let index = self.items.len();
        assert!(index < Handle::<T>::INVALID_INDEX as usize, "arena is full");
        self.items.push(value);
        Handle::new(self.id, index as u32)
    }

    /// 通过原始 index 重建 handle
    ///
    /// 用于解析外部文档中的整数引用（例如 glTF 的 node children）。
    /// 这里不检查 index 是否越界：文档中的引用可能指向尚未 push 的元素，解引用时才会检查。
    #[inline]
    pub fn find(&self, index: usize) -> Handle<T> {
        assert!(index < Handle::<T>::INVALID_INDEX as usize, "index {index} can not be a handle");
        Handle::new(self.id, index as u32)
    }
}

impl<T> Index<Handle<T>> for Arena<T> {
    type Output = T;

    /// 无效的 handle 是场景构建的 bug，直接 panic
    #[inline]
    fn index(&self, handle: Handle<T>) -> &Self::Output {
        assert!(
            self.contains(handle),
            "invalid handle {:?} for arena {:?} (len {})",
            handle,
            self.id,
            self.items.len()
        );
        &self.items[handle.index()]
    }
}

impl<T> IndexMut<Handle<T>> for Arena<T> {
    #[inline]
    fn index_mut(&mut self, handle: Handle<T>) -> &mut Self::Output {
        assert!(
            self.contains(handle),
            "invalid handle {:?} for arena {:?} (len {})",
            handle,
            self.id,
            self.items.len()
        );
        &mut self.items[handle.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Node {
        name: &'static str,
        parent: Option<Handle<Node>>,
        children: Vec<Handle<Node>>,
    }

    fn node(name: &'static str) -> Node {
        Node {
            name,
            parent: None,
            children: vec![],
        }
    }

    #[test]
    fn test_push_returns_stable_handles() {
        let mut arena = Arena::new();
        let a = arena.push(node("a"));
        let b = arena.push(node("b"));

        // 大量追加之后旧 handle 依然有效
        for _ in 0..1000 {
            arena.push(node("filler"));
        }

        assert_eq!(arena[a].name, "a");
        assert_eq!(arena[b].name, "b");
        assert_eq!(arena.len(), 1002);
    }

    #[test]
    fn test_parent_child_by_handle() {
        let mut arena = Arena::new();
        let parent = arena.push(node("parent"));
        let child = arena.push(node("child"));

        arena[parent].children.push(child);
        arena[child].parent = Some(parent);

        assert_eq!(arena[arena[child].parent.unwrap()].name, "parent");
        assert_eq!(arena[parent].children, vec![child]);
    }

    #[test]
    fn test_find_rebuilds_handle() {
        let mut arena = Arena::new();
        let first = arena.push(node("first"));
        let second = arena.push(node("second"));

        assert_eq!(arena.find(0), first);
        assert_eq!(arena.find(1), second);
        assert_eq!(arena[arena.find(1)].name, "second");

        // 越界的 find 不会失败，但无法解引用
        let dangling = arena.find(7);
        assert!(arena.get(dangling).is_none());
    }

    #[test]
    fn test_get_rejects_foreign_handles() {
        let mut arena_a = Arena::new();
        let mut arena_b = Arena::new();
        let a = arena_a.push(node("a"));
        let _ = arena_b.push(node("b"));

        assert!(arena_b.get(a).is_none());
        assert!(!arena_b.contains(a));
        assert!(arena_a.get(Handle::default()).is_none());
    }

    #[test]
    #[should_panic(expected = "invalid handle")]
    fn test_index_invalid_handle_panics() {
        let mut arena = Arena::new();
        arena.push(node("a"));
        let _ = &arena[Handle::default()];
    }

    #[test]
    #[should_panic(expected = "invalid handle")]
    fn test_index_foreign_handle_panics() {
        let mut arena_a = Arena::new();
        let arena_b: Arena<Node> = Arena::new();
        let a = arena_a.push(node("a"));
        let _ = &arena_b[a];
    }

    #[test]
    fn test_iter_yields_handles_in_order() {
        let mut arena = Arena::new();
        let handles = ["x", "y", "z"].map(|name| arena.push(node(name)));

        let collected: Vec<_> = arena.iter().map(|(handle, n)| (handle, n.name)).collect();
        assert_eq!(collected, vec![(handles[0], "x"), (handles[1], "y"), (handles[2], "z")]);
        assert_eq!(arena.handles().collect::<Vec<_>>(), handles.to_vec());
    }
}

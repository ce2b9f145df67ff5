//! 资源注册表
//!
//! 记录一次图构建中声明的全部资源。条目只增不删，句柄 id 即 `index + 1`。

use crate::frame_graph::resource_handle::next_graph_generation;
use crate::frame_graph::{
    RgResourceCreation, RgResourceEntry, RgResourceFlags, RgResourceHandle, RgResourceKind, RgResourceOrigin,
};

pub struct RgResourceRegistry {
    generation: u32,
    entries: Vec<RgResourceEntry>,
}

impl Default for RgResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// new & init
impl RgResourceRegistry {
    pub fn new() -> Self {
        Self {
            generation: next_graph_generation(),
            entries: Vec::new(),
        }
    }
}

// register
impl RgResourceRegistry {
    /// 追加一个条目并分配新句柄
    pub(crate) fn register(
        &mut self,
        name: impl Into<String>,
        kind: RgResourceKind,
        origin: RgResourceOrigin,
        creation: RgResourceCreation,
        flags: RgResourceFlags,
    ) -> RgResourceHandle {
        let id = u32::try_from(self.entries.len() + 1)
            .unwrap_or_else(|_| panic!("RenderGraph: resource id space exhausted"));
        let handle = RgResourceHandle::new(self.generation, id, kind);
        let name = name.into();

        log::debug!("RenderGraph: register {:?} '{}' ({:?})", handle, name, origin);

        self.entries.push(RgResourceEntry {
            name,
            handle,
            origin,
            creation,
            flags,
        });
        handle
    }
}

// getters
impl RgResourceRegistry {
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 句柄属于本次构建时返回条目
    pub fn get(&self, handle: RgResourceHandle) -> Option<&RgResourceEntry> {
        if handle.generation != self.generation || handle.id == 0 {
            return None;
        }
        self.entries
            .get(handle.id as usize - 1)
            .filter(|entry| entry.handle.kind == handle.kind)
    }

    /// 获取条目，句柄无效属于使用错误，直接 panic
    pub fn entry(&self, handle: RgResourceHandle) -> &RgResourceEntry {
        self.get(handle).unwrap_or_else(|| {
            panic!(
                "RenderGraph: invalid resource handle {:?}, it does not belong to this graph build (generation {})",
                handle, self.generation
            )
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &RgResourceEntry> {
        self.entries.iter()
    }

    pub(crate) fn into_entries(self) -> Vec<RgResourceEntry> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use ash::vk;

    use super::*;
    use crate::frame_graph::RgBufferDesc;

    fn buffer_creation() -> RgResourceCreation {
        RgResourceCreation::Buffer(RgBufferDesc::new(256, vk::BufferUsageFlags::STORAGE_BUFFER))
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut registry = RgResourceRegistry::new();
        let a = registry.register(
            "a",
            RgResourceKind::Buffer,
            RgResourceOrigin::TransientPerFrame,
            buffer_creation(),
            RgResourceFlags::default(),
        );
        let b = registry.register(
            "b",
            RgResourceKind::Buffer,
            RgResourceOrigin::TransientPerFrame,
            buffer_creation(),
            RgResourceFlags::default(),
        );

        assert_eq!(a.id(), 1);
        assert_eq!(b.id(), 2);
        assert_eq!(registry.entry(b).name, "b");
    }

    #[test]
    fn test_foreign_handle_is_rejected() {
        let mut first = RgResourceRegistry::new();
        let second = RgResourceRegistry::new();
        let handle = first.register(
            "a",
            RgResourceKind::Buffer,
            RgResourceOrigin::Persistent,
            buffer_creation(),
            RgResourceFlags::default(),
        );

        assert!(first.get(handle).is_some());
        assert!(second.get(handle).is_none());
    }

    #[test]
    #[should_panic(expected = "invalid resource handle")]
    fn test_entry_panics_on_foreign_handle() {
        let mut first = RgResourceRegistry::new();
        let second = RgResourceRegistry::new();
        let handle = first.register(
            "a",
            RgResourceKind::Buffer,
            RgResourceOrigin::Persistent,
            buffer_creation(),
            RgResourceFlags::default(),
        );
        let _ = second.entry(handle);
    }
}

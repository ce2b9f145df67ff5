//! 帧图资源句柄
//!
//! 句柄是一次图构建内部的虚拟引用，与设备层的物理资源分离。
//! `generation` 标识所属的构建，不同构建的句柄永远不会相等。

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_GRAPH_GENERATION: AtomicU32 = AtomicU32::new(1);

/// 为新的图构建分配一个全局唯一的代号
pub(crate) fn next_graph_generation() -> u32 {
    NEXT_GRAPH_GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// 资源种类
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RgResourceKind {
    Buffer,
    Image,
    /// 从窗口系统导入的 swapchain 表面
    RenderSurface,
}

/// 无类型的资源句柄
///
/// 依赖分析和执行计划只使用这一种句柄；带类型的句柄可以通过 `From` 转换得到。
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RgResourceHandle {
    /// 所属图构建的代号
    pub(crate) generation: u32,
    /// 构建内单调递增的 id，从 1 开始
    pub(crate) id: u32,
    pub(crate) kind: RgResourceKind,
}

impl RgResourceHandle {
    #[inline]
    pub(crate) fn new(generation: u32, id: u32, kind: RgResourceKind) -> Self {
        Self { generation, id, kind }
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    #[inline]
    pub fn kind(&self) -> RgResourceKind {
        self.kind
    }
}

impl fmt::Debug for RgResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            RgResourceKind::Buffer => "RgBuffer",
            RgResourceKind::Image => "RgImage",
            RgResourceKind::RenderSurface => "RgSurface",
        };
        write!(f, "{}(g{}#{})", prefix, self.generation, self.id)
    }
}

macro_rules! typed_handle {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub(crate) RgResourceHandle);

        impl $name {
            #[inline]
            pub(crate) fn from_untyped(handle: RgResourceHandle) -> Self {
                debug_assert_eq!(handle.kind, $kind);
                Self(handle)
            }

            #[inline]
            pub fn untyped(&self) -> RgResourceHandle {
                self.0
            }
        }

        impl From<$name> for RgResourceHandle {
            #[inline]
            fn from(handle: $name) -> Self {
                handle.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(&self.0, f)
            }
        }
    };
}

typed_handle!(
    /// 帧图内的 Buffer 句柄
    RgBufferHandle,
    RgResourceKind::Buffer
);
typed_handle!(
    /// 帧图内的 Image 句柄
    RgImageHandle,
    RgResourceKind::Image
);
typed_handle!(
    /// 导入的呈现表面句柄，可以像 color image 一样作为渲染目标
    RgSurfaceHandle,
    RgResourceKind::RenderSurface
);

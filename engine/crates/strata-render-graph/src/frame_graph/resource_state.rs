//! 资源访问与状态推导
//!
//! Pass 声明的访问记录中，stage/access 可以显式给出，也可以留作 `Infer`，
//! 在编译时根据资源种类、访问方向和 Pass 的工作类型推导出具体值。

use ash::vk;

use crate::frame_graph::{RgResourceEntry, RgResourceHandle, RgResourceKind, RgWorkType};

/// 访问方向
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RgAccessDirection {
    Read,
    Write,
    ReadWrite,
}

impl RgAccessDirection {
    #[inline]
    pub fn has_write(&self) -> bool {
        !matches!(self, RgAccessDirection::Read)
    }

    #[inline]
    pub fn has_read(&self) -> bool {
        !matches!(self, RgAccessDirection::Write)
    }
}

/// 同步范围：显式给出，或者在编译时推导
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RgSyncMask<T> {
    Infer,
    Exact(T),
}

impl<T: Copy> RgSyncMask<T> {
    #[inline]
    pub fn resolve(self, inferred: T) -> T {
        match self {
            RgSyncMask::Infer => inferred,
            RgSyncMask::Exact(value) => value,
        }
    }
}

impl<T> From<T> for RgSyncMask<T> {
    #[inline]
    fn from(value: T) -> Self {
        RgSyncMask::Exact(value)
    }
}

/// Pass 在 setup 阶段声明的一次资源访问
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgAccessRecord {
    pub resource: RgResourceHandle,
    pub direction: RgAccessDirection,
    pub stages: RgSyncMask<vk::PipelineStageFlags2>,
    pub accesses: RgSyncMask<vk::AccessFlags2>,
}

impl RgAccessRecord {
    #[inline]
    pub fn new(
        resource: RgResourceHandle,
        direction: RgAccessDirection,
        stages: RgSyncMask<vk::PipelineStageFlags2>,
        accesses: RgSyncMask<vk::AccessFlags2>,
    ) -> Self {
        Self {
            resource,
            direction,
            stages,
            accesses,
        }
    }

    #[inline]
    pub fn inferred(resource: RgResourceHandle, direction: RgAccessDirection) -> Self {
        Self {
            resource,
            direction,
            stages: RgSyncMask::Infer,
            accesses: RgSyncMask::Infer,
        }
    }

    /// 把 `Infer` 替换为具体值
    ///
    /// `work_type` 是 Pass 声明时的工作类型，即使 Pass 被折叠到 graphics 队列也不变。
    pub fn resolve(&self, entry: &RgResourceEntry, work_type: RgWorkType) -> RgResolvedAccess {
        debug_assert_eq!(entry.handle, self.resource);

        let inferred =
            RgResourceState::infer(entry.handle.kind(), entry.is_depth_stencil(), self.direction, work_type);
        RgResolvedAccess {
            resource: self.resource,
            direction: self.direction,
            state: RgResourceState {
                stage: self.stages.resolve(inferred.stage),
                access: self.accesses.resolve(inferred.access),
                layout: inferred.layout,
            },
        }
    }
}

/// 推导完成的访问
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgResolvedAccess {
    pub resource: RgResourceHandle,
    pub direction: RgAccessDirection,
    pub state: RgResourceState,
}

/// 资源在某个 Pass 中的状态
///
/// buffer 没有 layout，`layout` 为 `None`。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RgResourceState {
    pub stage: vk::PipelineStageFlags2,
    pub access: vk::AccessFlags2,
    pub layout: Option<vk::ImageLayout>,
}

const fn stages(a: vk::PipelineStageFlags2, b: vk::PipelineStageFlags2) -> vk::PipelineStageFlags2 {
    vk::PipelineStageFlags2::from_raw(a.as_raw() | b.as_raw())
}

const fn access(a: vk::AccessFlags2, b: vk::AccessFlags2) -> vk::AccessFlags2 {
    vk::AccessFlags2::from_raw(a.as_raw() | b.as_raw())
}

const FRAGMENT_TESTS: vk::PipelineStageFlags2 =
    stages(vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS, vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS);

// new & 常量定义
impl RgResourceState {
    #[inline]
    pub const fn image(stage: vk::PipelineStageFlags2, access: vk::AccessFlags2, layout: vk::ImageLayout) -> Self {
        Self {
            stage,
            access,
            layout: Some(layout),
        }
    }

    #[inline]
    pub const fn buffer(stage: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
        Self {
            stage,
            access,
            layout: None,
        }
    }

    // ============ image ============

    pub const COLOR_ATTACHMENT_WRITE: Self = Self::image(
        vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    );

    /// 颜色附件读写（如 blend）
    pub const COLOR_ATTACHMENT_READ_WRITE: Self = Self::image(
        vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        access(vk::AccessFlags2::COLOR_ATTACHMENT_READ, vk::AccessFlags2::COLOR_ATTACHMENT_WRITE),
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    );

    pub const DEPTH_ATTACHMENT_WRITE: Self = Self::image(
        FRAGMENT_TESTS,
        vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    );

    pub const DEPTH_ATTACHMENT_READ_WRITE: Self = Self::image(
        FRAGMENT_TESTS,
        access(vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ, vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE),
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    );

    /// 只读深度：既可以做深度测试也可以在片段着色器中采样
    pub const DEPTH_READ_ONLY: Self = Self::image(
        stages(FRAGMENT_TESTS, vk::PipelineStageFlags2::FRAGMENT_SHADER),
        access(vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ, vk::AccessFlags2::SHADER_SAMPLED_READ),
        vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
    );

    pub const SHADER_READ_FRAGMENT: Self = Self::image(
        vk::PipelineStageFlags2::FRAGMENT_SHADER,
        vk::AccessFlags2::SHADER_SAMPLED_READ,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    );

    pub const SHADER_READ_COMPUTE: Self = Self::image(
        vk::PipelineStageFlags2::COMPUTE_SHADER,
        vk::AccessFlags2::SHADER_SAMPLED_READ,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    );

    pub const DEPTH_READ_COMPUTE: Self = Self::image(
        vk::PipelineStageFlags2::COMPUTE_SHADER,
        vk::AccessFlags2::SHADER_SAMPLED_READ,
        vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
    );

    pub const STORAGE_WRITE_COMPUTE: Self = Self::image(
        vk::PipelineStageFlags2::COMPUTE_SHADER,
        vk::AccessFlags2::SHADER_STORAGE_WRITE,
        vk::ImageLayout::GENERAL,
    );

    pub const STORAGE_READ_WRITE_COMPUTE: Self = Self::image(
        vk::PipelineStageFlags2::COMPUTE_SHADER,
        access(vk::AccessFlags2::SHADER_STORAGE_READ, vk::AccessFlags2::SHADER_STORAGE_WRITE),
        vk::ImageLayout::GENERAL,
    );

    pub const TRANSFER_SRC: Self = Self::image(
        vk::PipelineStageFlags2::TRANSFER,
        vk::AccessFlags2::TRANSFER_READ,
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
    );

    pub const TRANSFER_DST: Self = Self::image(
        vk::PipelineStageFlags2::TRANSFER,
        vk::AccessFlags2::TRANSFER_WRITE,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    );

    pub const TRANSFER_READ_WRITE: Self = Self::image(
        vk::PipelineStageFlags2::TRANSFER,
        access(vk::AccessFlags2::TRANSFER_READ, vk::AccessFlags2::TRANSFER_WRITE),
        vk::ImageLayout::GENERAL,
    );

    // ============ buffer ============

    pub const BUFFER_SHADER_READ_GRAPHICS: Self = Self::buffer(
        stages(vk::PipelineStageFlags2::VERTEX_SHADER, vk::PipelineStageFlags2::FRAGMENT_SHADER),
        vk::AccessFlags2::SHADER_READ,
    );

    pub const BUFFER_STORAGE_WRITE_GRAPHICS: Self =
        Self::buffer(vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::SHADER_STORAGE_WRITE);

    pub const BUFFER_STORAGE_READ_WRITE_GRAPHICS: Self = Self::buffer(
        stages(vk::PipelineStageFlags2::VERTEX_SHADER, vk::PipelineStageFlags2::FRAGMENT_SHADER),
        access(vk::AccessFlags2::SHADER_READ, vk::AccessFlags2::SHADER_STORAGE_WRITE),
    );

    pub const BUFFER_STORAGE_READ_COMPUTE: Self =
        Self::buffer(vk::PipelineStageFlags2::COMPUTE_SHADER, vk::AccessFlags2::SHADER_STORAGE_READ);

    pub const BUFFER_STORAGE_WRITE_COMPUTE: Self =
        Self::buffer(vk::PipelineStageFlags2::COMPUTE_SHADER, vk::AccessFlags2::SHADER_STORAGE_WRITE);

    pub const BUFFER_STORAGE_READ_WRITE_COMPUTE: Self = Self::buffer(
        vk::PipelineStageFlags2::COMPUTE_SHADER,
        access(vk::AccessFlags2::SHADER_STORAGE_READ, vk::AccessFlags2::SHADER_STORAGE_WRITE),
    );

    pub const BUFFER_TRANSFER_SRC: Self =
        Self::buffer(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_READ);

    pub const BUFFER_TRANSFER_DST: Self =
        Self::buffer(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE);

    pub const BUFFER_TRANSFER_READ_WRITE: Self = Self::buffer(
        vk::PipelineStageFlags2::TRANSFER,
        access(vk::AccessFlags2::TRANSFER_READ, vk::AccessFlags2::TRANSFER_WRITE),
    );
}

// tools
impl RgResourceState {
    /// 根据使用角色推导默认状态
    ///
    /// - graphics 中写入 image 视为 attachment，读取视为采样
    /// - compute 中写入 image 视为 storage image
    /// - render surface 按 color image 处理
    pub fn infer(
        kind: RgResourceKind,
        depth_stencil: bool,
        direction: RgAccessDirection,
        work_type: RgWorkType,
    ) -> Self {
        use RgAccessDirection::{Read, ReadWrite, Write};

        match kind {
            RgResourceKind::Image | RgResourceKind::RenderSurface => match (work_type, direction) {
                (RgWorkType::Graphics, Read) if depth_stencil => Self::DEPTH_READ_ONLY,
                (RgWorkType::Graphics, Write) if depth_stencil => Self::DEPTH_ATTACHMENT_WRITE,
                (RgWorkType::Graphics, ReadWrite) if depth_stencil => Self::DEPTH_ATTACHMENT_READ_WRITE,
                (RgWorkType::Graphics, Read) => Self::SHADER_READ_FRAGMENT,
                (RgWorkType::Graphics, Write) => Self::COLOR_ATTACHMENT_WRITE,
                (RgWorkType::Graphics, ReadWrite) => Self::COLOR_ATTACHMENT_READ_WRITE,

                (RgWorkType::Compute, Read) if depth_stencil => Self::DEPTH_READ_COMPUTE,
                (RgWorkType::Compute, Read) => Self::SHADER_READ_COMPUTE,
                (RgWorkType::Compute, Write) => Self::STORAGE_WRITE_COMPUTE,
                (RgWorkType::Compute, ReadWrite) => Self::STORAGE_READ_WRITE_COMPUTE,

                (RgWorkType::Transfer, Read) => Self::TRANSFER_SRC,
                (RgWorkType::Transfer, Write) => Self::TRANSFER_DST,
                (RgWorkType::Transfer, ReadWrite) => Self::TRANSFER_READ_WRITE,
            },
            RgResourceKind::Buffer => match (work_type, direction) {
                (RgWorkType::Graphics, Read) => Self::BUFFER_SHADER_READ_GRAPHICS,
                (RgWorkType::Graphics, Write) => Self::BUFFER_STORAGE_WRITE_GRAPHICS,
                (RgWorkType::Graphics, ReadWrite) => Self::BUFFER_STORAGE_READ_WRITE_GRAPHICS,

                (RgWorkType::Compute, Read) => Self::BUFFER_STORAGE_READ_COMPUTE,
                (RgWorkType::Compute, Write) => Self::BUFFER_STORAGE_WRITE_COMPUTE,
                (RgWorkType::Compute, ReadWrite) => Self::BUFFER_STORAGE_READ_WRITE_COMPUTE,

                (RgWorkType::Transfer, Read) => Self::BUFFER_TRANSFER_SRC,
                (RgWorkType::Transfer, Write) => Self::BUFFER_TRANSFER_DST,
                (RgWorkType::Transfer, ReadWrite) => Self::BUFFER_TRANSFER_READ_WRITE,
            },
        }
    }

    const WRITE_ACCESS: vk::AccessFlags2 = vk::AccessFlags2::from_raw(
        vk::AccessFlags2::SHADER_WRITE.as_raw()
            | vk::AccessFlags2::SHADER_STORAGE_WRITE.as_raw()
            | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE.as_raw()
            | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE.as_raw()
            | vk::AccessFlags2::TRANSFER_WRITE.as_raw()
            | vk::AccessFlags2::MEMORY_WRITE.as_raw(),
    );

    #[inline]
    pub fn is_write(&self) -> bool {
        self.access.intersects(Self::WRITE_ACCESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_attachment_write_inference() {
        let state = RgResourceState::infer(RgResourceKind::Image, false, RgAccessDirection::Write, RgWorkType::Graphics);
        assert_eq!(state.stage, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(state.access, vk::AccessFlags2::COLOR_ATTACHMENT_WRITE);
        assert_eq!(state.layout, Some(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL));
        assert!(state.is_write());
    }

    #[test]
    fn test_sampled_read_inference() {
        let state = RgResourceState::infer(RgResourceKind::Image, false, RgAccessDirection::Read, RgWorkType::Graphics);
        assert_eq!(state, RgResourceState::SHADER_READ_FRAGMENT);
        assert!(!state.is_write());

        let depth = RgResourceState::infer(RgResourceKind::Image, true, RgAccessDirection::Read, RgWorkType::Compute);
        assert_eq!(depth.layout, Some(vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL));
    }

    #[test]
    fn test_buffer_has_no_layout() {
        let state =
            RgResourceState::infer(RgResourceKind::Buffer, false, RgAccessDirection::ReadWrite, RgWorkType::Compute);
        assert_eq!(state.layout, None);
        assert!(state.access.contains(vk::AccessFlags2::SHADER_STORAGE_READ));
        assert!(state.access.contains(vk::AccessFlags2::SHADER_STORAGE_WRITE));
    }

    #[test]
    fn test_explicit_mask_overrides_inference() {
        let mask = RgSyncMask::Exact(vk::PipelineStageFlags2::VERTEX_SHADER);
        assert_eq!(mask.resolve(vk::PipelineStageFlags2::FRAGMENT_SHADER), vk::PipelineStageFlags2::VERTEX_SHADER);
        assert_eq!(
            RgSyncMask::Infer.resolve(vk::PipelineStageFlags2::FRAGMENT_SHADER),
            vk::PipelineStageFlags2::FRAGMENT_SHADER
        );
        assert_eq!(RgSyncMask::from(vk::AccessFlags2::SHADER_READ), RgSyncMask::Exact(vk::AccessFlags2::SHADER_READ));
    }

    #[test]
    fn test_access_direction_read_write() {
        assert!(RgAccessDirection::Read.has_read() && !RgAccessDirection::Read.has_write());
        assert!(!RgAccessDirection::Write.has_read() && RgAccessDirection::Write.has_write());
        assert!(RgAccessDirection::ReadWrite.has_read() && RgAccessDirection::ReadWrite.has_write());
    }
}

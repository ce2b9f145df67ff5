//! 资源条目定义
//!
//! 每个通过 import/create 得到的句柄都对应一个 [`RgResourceEntry`]，
//! 编译后原样移交给执行计划，由设备层据此创建或绑定物理资源。

use ash::vk;

use crate::frame_graph::{RgBufferDesc, RgImageDesc, RgResourceHandle};

/// 资源的来源，决定生命周期
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RgResourceOrigin {
    /// 外部导入，没有创建开销
    Imported,
    /// 每帧重新创建
    TransientPerFrame,
    /// 跨帧保留，例如 history buffer
    TransientTemporal,
    /// 只创建一次并长期保留，没有 history 语义
    Persistent,
    /// 渲染目标，隐含 color/depth attachment 用途
    RenderTarget,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RgResourceFlags {
    pub render_target: bool,
    /// 可以被呈现到窗口
    pub presentable: bool,
}

/// 设备层提供的外部句柄
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RgExternalResource {
    Buffer(vk::Buffer),
    Image { image: vk::Image, view: vk::ImageView },
    RenderSurface(vk::SwapchainKHR),
}

impl RgExternalResource {
    /// 设备句柄是否有效（非 null）
    pub fn is_valid(&self) -> bool {
        match *self {
            RgExternalResource::Buffer(buffer) => buffer != vk::Buffer::null(),
            RgExternalResource::Image { image, .. } => image != vk::Image::null(),
            RgExternalResource::RenderSurface(swapchain) => swapchain != vk::SwapchainKHR::null(),
        }
    }
}

/// 资源的创建方式
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RgResourceCreation {
    External(RgExternalResource),
    Buffer(RgBufferDesc),
    Image(RgImageDesc),
}

impl RgResourceCreation {
    /// 深度/模板格式的图像；导入的图像和表面一律视为 color
    pub fn is_depth_stencil(&self) -> bool {
        match self {
            RgResourceCreation::Image(desc) => desc.is_depth_stencil(),
            _ => false,
        }
    }
}

/// 注册表中的一个资源条目
#[derive(Clone, Debug)]
pub struct RgResourceEntry {
    /// 调试名称
    pub name: String,
    pub handle: RgResourceHandle,
    pub origin: RgResourceOrigin,
    pub creation: RgResourceCreation,
    pub flags: RgResourceFlags,
}

// getters
impl RgResourceEntry {
    #[inline]
    pub fn is_imported(&self) -> bool {
        self.origin == RgResourceOrigin::Imported
    }

    #[inline]
    pub fn is_per_frame(&self) -> bool {
        self.origin == RgResourceOrigin::TransientPerFrame
    }

    #[inline]
    pub fn is_temporal(&self) -> bool {
        self.origin == RgResourceOrigin::TransientTemporal
    }

    #[inline]
    pub fn is_depth_stencil(&self) -> bool {
        self.creation.is_depth_stencil()
    }
}

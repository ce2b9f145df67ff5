//! Pass 录制上下文
//!
//! 录制回调不捕获任何设备或资源引用，所需的一切都通过上下文在录制时传入。

use std::collections::HashMap;
use std::ops::Deref;

use ash::vk;

use crate::frame_graph::{
    RgAccessDirection, RgBufferHandle, RgFrameInfo, RgImageHandle, RgQueueId, RgResolvedAccess, RgResourceHandle,
    RgResourceState, RgSurfaceHandle, RgWorkType,
};

/// 设备层为帧图资源提供的物理资源
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RgPhysicalResource {
    Buffer(vk::Buffer),
    /// image 或当前帧的 swapchain image
    Image { image: vk::Image, view: vk::ImageView },
}

/// 帧图句柄到物理资源的查询表，由设备层在录制前填充
#[derive(Clone, Debug, Default)]
pub struct RgPhysicalResources {
    resources: HashMap<RgResourceHandle, RgPhysicalResource>,
}

impl RgPhysicalResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_buffer(&mut self, handle: RgBufferHandle, buffer: vk::Buffer) -> &mut Self {
        self.resources.insert(handle.untyped(), RgPhysicalResource::Buffer(buffer));
        self
    }

    pub fn insert_image(&mut self, handle: RgImageHandle, image: vk::Image, view: vk::ImageView) -> &mut Self {
        self.resources.insert(handle.untyped(), RgPhysicalResource::Image { image, view });
        self
    }

    /// 绑定本帧获取到的 swapchain image
    pub fn insert_surface_image(&mut self, handle: RgSurfaceHandle, image: vk::Image, view: vk::ImageView) -> &mut Self {
        self.resources.insert(handle.untyped(), RgPhysicalResource::Image { image, view });
        self
    }

    pub(crate) fn insert(&mut self, handle: RgResourceHandle, resource: RgPhysicalResource) {
        self.resources.insert(handle, resource);
    }

    #[inline]
    pub fn get(&self, handle: impl Into<RgResourceHandle>) -> Option<RgPhysicalResource> {
        self.resources.get(&handle.into()).copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// 所有工作类型共享的录制上下文
pub struct RgPassContext<'a> {
    pub pass_name: &'a str,
    /// 实际执行的队列
    pub queue: RgQueueId,
    /// 声明时的工作类型
    pub work_type: RgWorkType,
    pub frame: RgFrameInfo,
    pub cmd: vk::CommandBuffer,

    pub(crate) resources: &'a RgPhysicalResources,
    pub(crate) accesses: &'a [RgResolvedAccess],
}

// getters
impl<'a> RgPassContext<'a> {
    fn physical(&self, handle: RgResourceHandle) -> RgPhysicalResource {
        self.resources.get(handle).unwrap_or_else(|| {
            panic!("RenderGraph: pass '{}' has no physical resource bound for {:?}", self.pass_name, handle)
        })
    }

    pub fn buffer(&self, handle: RgBufferHandle) -> vk::Buffer {
        match self.physical(handle.untyped()) {
            RgPhysicalResource::Buffer(buffer) => buffer,
            other => panic!("RenderGraph: {:?} is bound to {:?}, expected a buffer", handle, other),
        }
    }

    pub fn image(&self, handle: RgImageHandle) -> (vk::Image, vk::ImageView) {
        self.image_of(handle.untyped())
    }

    pub fn surface(&self, handle: RgSurfaceHandle) -> (vk::Image, vk::ImageView) {
        self.image_of(handle.untyped())
    }

    fn image_of(&self, handle: RgResourceHandle) -> (vk::Image, vk::ImageView) {
        match self.physical(handle) {
            RgPhysicalResource::Image { image, view } => (image, view),
            other => panic!("RenderGraph: {:?} is bound to {:?}, expected an image", handle, other),
        }
    }

    /// 本 Pass 对资源的访问状态
    pub fn state_of(&self, handle: impl Into<RgResourceHandle>) -> Option<RgResourceState> {
        let handle = handle.into();
        self.accesses.iter().find(|access| access.resource == handle).map(|access| access.state)
    }

    #[inline]
    pub fn accesses(&self) -> &'a [RgResolvedAccess] {
        self.accesses
    }

    fn image_views_in_layout(
        &self,
        layout: vk::ImageLayout,
    ) -> impl Iterator<Item = (RgResourceHandle, vk::ImageView)> + '_ {
        self.accesses
            .iter()
            .filter(move |access| access.state.layout == Some(layout))
            .filter_map(move |access| match self.resources.get(access.resource) {
                Some(RgPhysicalResource::Image { view, .. }) => Some((access.resource, view)),
                _ => None,
            })
    }
}

pub struct RgGraphicsContext<'a> {
    base: RgPassContext<'a>,
}

impl<'a> RgGraphicsContext<'a> {
    pub(crate) fn new(base: RgPassContext<'a>) -> Self {
        Self { base }
    }

    /// 以 color attachment 状态访问的图像视图，按声明顺序
    pub fn color_attachments(&self) -> Vec<(RgResourceHandle, vk::ImageView)> {
        self.base.image_views_in_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL).collect()
    }

    pub fn depth_attachment(&self) -> Option<(RgResourceHandle, vk::ImageView)> {
        self.base
            .image_views_in_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .chain(self.base.image_views_in_layout(vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL))
            .next()
    }
}

impl<'a> Deref for RgGraphicsContext<'a> {
    type Target = RgPassContext<'a>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

pub struct RgComputeContext<'a> {
    base: RgPassContext<'a>,
}

impl<'a> RgComputeContext<'a> {
    pub(crate) fn new(base: RgPassContext<'a>) -> Self {
        Self { base }
    }

    /// 是否运行在专用 compute 队列上
    #[inline]
    pub fn is_async(&self) -> bool {
        self.base.queue.work_type != RgWorkType::Graphics
    }
}

impl<'a> Deref for RgComputeContext<'a> {
    type Target = RgPassContext<'a>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

pub struct RgTransferContext<'a> {
    base: RgPassContext<'a>,
}

impl<'a> RgTransferContext<'a> {
    pub(crate) fn new(base: RgPassContext<'a>) -> Self {
        Self { base }
    }

    #[inline]
    pub fn is_async(&self) -> bool {
        self.base.queue.work_type != RgWorkType::Graphics
    }

    /// 拷贝源：只读访问的资源
    pub fn sources(&self) -> impl Iterator<Item = RgResourceHandle> + '_ {
        self.base
            .accesses
            .iter()
            .filter(|access| access.direction == RgAccessDirection::Read)
            .map(|access| access.resource)
    }

    /// 拷贝目标：带写入的资源
    pub fn destinations(&self) -> impl Iterator<Item = RgResourceHandle> + '_ {
        self.base
            .accesses
            .iter()
            .filter(|access| access.direction.has_write())
            .map(|access| access.resource)
    }
}

impl<'a> Deref for RgTransferContext<'a> {
    type Target = RgPassContext<'a>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

use ash::vk;
use itertools::Itertools;

use crate::frame_graph::pass::{RgPassCallback, RgTaskBuilderKind};
use crate::frame_graph::{
    RgBufferDesc, RgBufferHandle, RgComputeContext, RgComputeTaskBuilder, RgDependencyAnalyzer, RgExecutionPlan,
    RgExternalResource, RgGraphicsContext, RgGraphicsTaskBuilder, RgImageDesc, RgImageHandle, RgPassEntry,
    RgQueueConfig, RgResourceCreation, RgResourceFlags, RgResourceHandle, RgResourceKind, RgResourceOrigin,
    RgResourceRegistry, RgScheduler, RgSurfaceHandle, RgSynchronizer, RgTransferContext, RgTransferTaskBuilder,
};

/// 帧图构建器
///
/// 每帧创建一个，注册资源、声明 Pass，最后调用 [`Self::compile`] 得到执行计划。
/// 编译会消耗构建器，执行计划不引用构建器的任何状态。
///
/// # 使用示例
///
/// ```ignore
/// let mut builder = RgGraphBuilder::new();
/// let color = builder.create_render_target("color", RgImageDesc::new_2d(w, h, vk::Format::R16G16B16A16_SFLOAT, vk::ImageUsageFlags::SAMPLED));
///
/// builder.create_graphics_pass(
///     "opaque",
///     |task| {
///         task.write(color);
///     },
///     move |ctx| {
///         let (_, view) = ctx.image(color);
///         // begin rendering, draw...
///     },
/// );
///
/// let plan = builder.compile(RgQueueConfig::new(1, 1, 0));
/// ```
pub struct RgGraphBuilder {
    resources: RgResourceRegistry,
    /// 按声明顺序
    passes: Vec<RgPassEntry>,
}

impl Default for RgGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// new & init
impl RgGraphBuilder {
    pub fn new() -> Self {
        Self {
            resources: RgResourceRegistry::new(),
            passes: Vec::new(),
        }
    }
}

// getters
impl RgGraphBuilder {
    #[inline]
    pub fn resources(&self) -> &RgResourceRegistry {
        &self.resources
    }

    #[inline]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }
}

// import
impl RgGraphBuilder {
    pub fn import_buffer(&mut self, name: impl Into<String>, buffer: vk::Buffer) -> RgBufferHandle {
        RgBufferHandle::from_untyped(self.import(name.into(), RgResourceKind::Buffer, RgExternalResource::Buffer(buffer)))
    }

    pub fn import_image(&mut self, name: impl Into<String>, image: vk::Image, view: vk::ImageView) -> RgImageHandle {
        RgImageHandle::from_untyped(self.import(
            name.into(),
            RgResourceKind::Image,
            RgExternalResource::Image { image, view },
        ))
    }

    /// 导入呈现表面，视为可呈现的渲染目标
    pub fn import_render_surface(&mut self, name: impl Into<String>, swapchain: vk::SwapchainKHR) -> RgSurfaceHandle {
        RgSurfaceHandle::from_untyped(self.import(
            name.into(),
            RgResourceKind::RenderSurface,
            RgExternalResource::RenderSurface(swapchain),
        ))
    }

    fn import(&mut self, name: String, kind: RgResourceKind, external: RgExternalResource) -> RgResourceHandle {
        if !external.is_valid() {
            panic!("RenderGraph: imported resource '{}' has a null device handle: {:?}", name, external);
        }

        let flags = match kind {
            RgResourceKind::RenderSurface => RgResourceFlags {
                render_target: true,
                presentable: true,
            },
            _ => RgResourceFlags::default(),
        };
        self.resources.register(name, kind, RgResourceOrigin::Imported, RgResourceCreation::External(external), flags)
    }
}

// create
impl RgGraphBuilder {
    /// 每帧重新创建的 buffer
    pub fn create_per_frame_buffer(&mut self, name: impl Into<String>, desc: RgBufferDesc) -> RgBufferHandle {
        self.create_buffer_with(name.into(), desc, RgResourceOrigin::TransientPerFrame)
    }

    /// 每帧重新创建的 image
    pub fn create_per_frame_image(&mut self, name: impl Into<String>, desc: RgImageDesc) -> RgImageHandle {
        self.create_image_with(name.into(), desc, RgResourceOrigin::TransientPerFrame, RgResourceFlags::default())
    }

    /// 跨帧保留的 buffer，例如 history
    pub fn create_temporal_buffer(&mut self, name: impl Into<String>, desc: RgBufferDesc) -> RgBufferHandle {
        self.create_buffer_with(name.into(), desc, RgResourceOrigin::TransientTemporal)
    }

    /// 跨帧保留的 image，例如 TAA history
    pub fn create_temporal_image(&mut self, name: impl Into<String>, desc: RgImageDesc) -> RgImageHandle {
        self.create_image_with(name.into(), desc, RgResourceOrigin::TransientTemporal, RgResourceFlags::default())
    }

    /// 长期存在的 buffer
    pub fn create_buffer(&mut self, name: impl Into<String>, desc: RgBufferDesc) -> RgBufferHandle {
        self.create_buffer_with(name.into(), desc, RgResourceOrigin::Persistent)
    }

    /// 长期存在的 image
    pub fn create_image(&mut self, name: impl Into<String>, desc: RgImageDesc) -> RgImageHandle {
        self.create_image_with(name.into(), desc, RgResourceOrigin::Persistent, RgResourceFlags::default())
    }

    /// 渲染目标，根据格式自动加上 color 或 depth/stencil attachment 用途
    pub fn create_render_target(&mut self, name: impl Into<String>, desc: RgImageDesc) -> RgImageHandle {
        let usage = desc.usage | desc.attachment_usage();
        self.create_image_with(
            name.into(),
            desc.with_usage(usage),
            RgResourceOrigin::RenderTarget,
            RgResourceFlags {
                render_target: true,
                presentable: false,
            },
        )
    }

    fn create_buffer_with(&mut self, name: String, desc: RgBufferDesc, origin: RgResourceOrigin) -> RgBufferHandle {
        if let Err(reason) = desc.validate() {
            panic!("RenderGraph: malformed buffer descriptor for '{}': {}", name, reason);
        }
        let handle =
            self.resources.register(name, RgResourceKind::Buffer, origin, RgResourceCreation::Buffer(desc), RgResourceFlags::default());
        RgBufferHandle::from_untyped(handle)
    }

    fn create_image_with(
        &mut self,
        name: String,
        desc: RgImageDesc,
        origin: RgResourceOrigin,
        flags: RgResourceFlags,
    ) -> RgImageHandle {
        if let Err(reason) = desc.validate() {
            panic!("RenderGraph: malformed image descriptor for '{}': {}", name, reason);
        }
        let handle = self.resources.register(name, RgResourceKind::Image, origin, RgResourceCreation::Image(desc), flags);
        RgImageHandle::from_untyped(handle)
    }
}

// passes
impl RgGraphBuilder {
    /// 声明 graphics Pass
    ///
    /// `setup` 立即执行；`record` 在执行计划录制时才会被调用。
    pub fn create_graphics_pass(
        &mut self,
        name: impl Into<String>,
        setup: impl FnOnce(&mut RgGraphicsTaskBuilder),
        record: impl Fn(&RgGraphicsContext<'_>) + Send + Sync + 'static,
    ) -> &mut Self {
        let mut builder = RgGraphicsTaskBuilder::default();
        setup(&mut builder);
        self.add_pass(name.into(), RgTaskBuilderKind::Graphics(builder), RgPassCallback::Graphics(Box::new(record)))
    }

    /// 声明 compute Pass，可以通过 `prefer_async` 请求专用 compute 队列
    pub fn create_compute_pass(
        &mut self,
        name: impl Into<String>,
        setup: impl FnOnce(&mut RgComputeTaskBuilder),
        record: impl Fn(&RgComputeContext<'_>) + Send + Sync + 'static,
    ) -> &mut Self {
        let mut builder = RgComputeTaskBuilder::default();
        setup(&mut builder);
        self.add_pass(name.into(), RgTaskBuilderKind::Compute(builder), RgPassCallback::Compute(Box::new(record)))
    }

    /// 声明 transfer Pass，可以通过 `prefer_async` 请求专用 transfer 队列
    pub fn create_transfer_pass(
        &mut self,
        name: impl Into<String>,
        setup: impl FnOnce(&mut RgTransferTaskBuilder),
        record: impl Fn(&RgTransferContext<'_>) + Send + Sync + 'static,
    ) -> &mut Self {
        let mut builder = RgTransferTaskBuilder::default();
        setup(&mut builder);
        self.add_pass(name.into(), RgTaskBuilderKind::Transfer(builder), RgPassCallback::Transfer(Box::new(record)))
    }

    fn add_pass(&mut self, name: String, builder: RgTaskBuilderKind, callback: RgPassCallback) -> &mut Self {
        let declaration_index = u32::try_from(self.passes.len())
            .unwrap_or_else(|_| panic!("RenderGraph: too many passes declared"));
        let entry = RgPassEntry::freeze(name, declaration_index, builder, callback);

        for access in &entry.accesses {
            if self.resources.get(access.resource).is_none() {
                panic!(
                    "RenderGraph: pass '{}' accesses {:?}, which is not registered in this graph build",
                    entry.name, access.resource
                );
            }
        }
        for dependency in &entry.explicit_dependencies {
            if !self.passes.iter().any(|pass| &pass.name == dependency) {
                panic!("RenderGraph: pass '{}' depends on '{}', which is not declared before it", entry.name, dependency);
            }
        }

        log::debug!(
            "RenderGraph: pass #{} '{}' ({}{}{}) with {} accesses",
            entry.declaration_index,
            entry.name,
            entry.work_type,
            if entry.prefer_async { ", async" } else { "" },
            if entry.has_execute_condition() { ", conditional" } else { "" },
            entry.accesses.len()
        );

        self.passes.push(entry);
        self
    }
}

// compile
impl RgGraphBuilder {
    /// 编译帧图
    ///
    /// 推导访问状态、依赖分析、拓扑排序、队列分配、批次划分、跨队列同步。
    ///
    /// # Panics
    /// `config` 中没有 graphics 队列
    pub fn compile(self, config: RgQueueConfig) -> RgExecutionPlan {
        #[cfg(feature = "profiling")]
        let _span = tracy_client::span!("RgGraphBuilder::compile");

        let Self { resources, mut passes } = self;
        passes.sort_by_key(|pass| pass.declaration_index);

        let resolved = passes
            .iter()
            .map(|pass| {
                pass.accesses
                    .iter()
                    .map(|access| access.resolve(resources.entry(access.resource), pass.work_type))
                    .collect_vec()
            })
            .collect_vec();

        let graph = RgDependencyAnalyzer::analyze(&passes, &resolved);
        let schedule = RgScheduler::schedule(&passes, &graph, &config);
        let syncs = RgSynchronizer::synchronize(&graph, &schedule, &resolved);

        log::debug!(
            "RenderGraph: compiled {} resources, {} passes, {} edges into {} submissions",
            resources.len(),
            passes.len(),
            graph.edges().len(),
            schedule.batches.len()
        );

        RgExecutionPlan::assemble(resources.into_entries(), passes, resolved, schedule, syncs, config)
    }
}

#[cfg(test)]
mod tests {
    use ash::vk::Handle;

    use super::*;
    use crate::frame_graph::RgTaskBuilder;

    fn color_desc() -> RgImageDesc {
        RgImageDesc::new_2d(128, 128, vk::Format::R8G8B8A8_UNORM, vk::ImageUsageFlags::SAMPLED)
    }

    #[test]
    fn test_render_target_implies_attachment_usage() {
        let mut builder = RgGraphBuilder::new();
        let color = builder.create_render_target("color", color_desc());
        let depth = builder.create_render_target(
            "depth",
            RgImageDesc::new_2d(128, 128, vk::Format::D32_SFLOAT, vk::ImageUsageFlags::SAMPLED),
        );

        let usage_of = |handle: RgImageHandle| match &builder.resources().entry(handle.untyped()).creation {
            RgResourceCreation::Image(desc) => desc.usage,
            other => panic!("unexpected creation {:?}", other),
        };
        assert!(usage_of(color).contains(vk::ImageUsageFlags::COLOR_ATTACHMENT));
        assert!(usage_of(depth).contains(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT));
        assert!(builder.resources().entry(color.untyped()).flags.render_target);
    }

    #[test]
    #[should_panic(expected = "malformed buffer descriptor")]
    fn test_zero_sized_buffer() {
        let mut builder = RgGraphBuilder::new();
        builder.create_per_frame_buffer("empty", RgBufferDesc::new(0, vk::BufferUsageFlags::STORAGE_BUFFER));
    }

    #[test]
    #[should_panic(expected = "null device handle")]
    fn test_null_import() {
        let mut builder = RgGraphBuilder::new();
        builder.import_buffer("null", vk::Buffer::null());
    }

    #[test]
    #[should_panic(expected = "not registered in this graph build")]
    fn test_foreign_handle_in_pass() {
        let mut other = RgGraphBuilder::new();
        let foreign = other.create_per_frame_image("foreign", color_desc());

        let mut builder = RgGraphBuilder::new();
        builder.create_graphics_pass(
            "draw",
            |task| {
                task.read(foreign);
            },
            |_| {},
        );
    }

    #[test]
    fn test_import_keeps_device_handle() {
        let mut builder = RgGraphBuilder::new();
        let buffer = builder.import_buffer("scene", vk::Buffer::from_raw(42));

        let entry = builder.resources().entry(buffer.untyped());
        assert!(entry.is_imported());
        assert_eq!(entry.creation, RgResourceCreation::External(RgExternalResource::Buffer(vk::Buffer::from_raw(42))));
    }
}

use ash::vk;
use strata_render_graph::frame_graph::{
    RgBufferDesc, RgFrameInfo, RgGraphBuilder, RgImageDesc, RgTaskBuilder,
};

use crate::config::FrameSection;

/// 示例帧需要从外部导入的资源
#[derive(Clone, Copy, Debug)]
pub struct SampleFrameImports {
    pub swapchain: vk::SwapchainKHR,
    /// 每帧上传的 instance 数据所在的 staging buffer
    pub staging: vk::Buffer,
}

/// 每隔多少帧刷新一次 debug overlay
const OVERLAY_INTERVAL: u64 = 4;

/// 构建示例帧
///
/// ```text
/// Upload Instances ─┐
/// Z Pre Pass ──┬────┼──────────────── Opaque Pass ── OIT Pass ── Tonemap ── Debug Overlay
///              └─ SSAO ── SSAO Blur ──┘
/// Shadow Pass ────────────────────────┘
/// ```
pub fn build_sample_frame(frame: &FrameSection, imports: SampleFrameImports) -> RgGraphBuilder {
    let mut builder = RgGraphBuilder::new();
    let (width, height) = (frame.width, frame.height);
    let async_compute = frame.async_compute;

    let swapchain = builder.import_render_surface("swapchain", imports.swapchain);
    let staging = builder.import_buffer("instance staging", imports.staging);

    let instances = builder.create_buffer(
        "instances",
        RgBufferDesc::new(
            64 * 1024,
            vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
        ),
    );
    let depth = builder.create_render_target(
        "depth",
        RgImageDesc::new_2d(width, height, vk::Format::D32_SFLOAT, vk::ImageUsageFlags::SAMPLED),
    );
    let shadow_map = builder.create_render_target(
        "shadow map",
        RgImageDesc::new_2d(2048, 2048, vk::Format::D32_SFLOAT, vk::ImageUsageFlags::SAMPLED),
    );
    let ao_desc = RgImageDesc::new_2d(
        width / 2,
        height / 2,
        vk::Format::R8_UNORM,
        vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::SAMPLED,
    );
    let ssao = builder.create_per_frame_image("ssao", ao_desc.clone());
    let ssao_history = builder.create_temporal_image("ssao history", ao_desc);
    let hdr_color = builder.create_render_target(
        "hdr color",
        RgImageDesc::new_2d(width, height, vk::Format::R16G16B16A16_SFLOAT, vk::ImageUsageFlags::SAMPLED),
    );

    builder
        .create_transfer_pass(
            "Upload Instances",
            |task| {
                task.prefer_async().read(staging).write(instances);
            },
            move |ctx| {
                log::trace!("{}: copy {:?} -> {:?}", ctx.pass_name, ctx.buffer(staging), ctx.buffer(instances));
            },
        )
        .create_graphics_pass(
            "Z Pre Pass",
            |task| {
                task.write(depth);
            },
            |ctx| {
                log::trace!("{}: depth {:?}", ctx.pass_name, ctx.depth_attachment());
            },
        )
        .create_graphics_pass(
            "Shadow Pass",
            |task| {
                task.read(instances).write(shadow_map);
            },
            |ctx| {
                log::trace!("{}: depth {:?}", ctx.pass_name, ctx.depth_attachment());
            },
        )
        .create_compute_pass(
            "SSAO",
            |task| {
                if async_compute {
                    task.prefer_async();
                }
                task.read(depth).write(ssao);
            },
            |ctx| {
                log::trace!("{}: async = {}", ctx.pass_name, ctx.is_async());
            },
        )
        .create_compute_pass(
            "SSAO Blur",
            |task| {
                if async_compute {
                    task.prefer_async();
                }
                task.read(ssao).read_write(ssao_history);
            },
            |ctx| {
                log::trace!("{}: async = {}", ctx.pass_name, ctx.is_async());
            },
        )
        .create_graphics_pass(
            "Opaque Pass",
            |task| {
                task.read(instances).read(shadow_map).read(ssao_history).read(depth).write(hdr_color);
            },
            |ctx| {
                log::trace!("{}: color {:?}", ctx.pass_name, ctx.color_attachments());
            },
        )
        .create_graphics_pass(
            "OIT Pass",
            |task| {
                task.read_write(hdr_color).read(depth);
            },
            |ctx| {
                log::trace!("{}: color {:?}", ctx.pass_name, ctx.color_attachments());
            },
        )
        .create_graphics_pass(
            "Tonemap",
            |task| {
                task.read(hdr_color).write(swapchain);
            },
            move |ctx| {
                log::trace!("{}: present image {:?}", ctx.pass_name, ctx.surface(swapchain));
            },
        )
        .create_graphics_pass(
            "Debug Overlay",
            |task| {
                task.depends_on("Tonemap")
                    .read_write(swapchain)
                    .execute_if(|frame: &RgFrameInfo| frame.frame_index % OVERLAY_INTERVAL == 0);
            },
            |ctx| {
                log::trace!("{}: frame {}", ctx.pass_name, ctx.frame.frame_index);
            },
        );

    builder
}

#[cfg(test)]
mod tests {
    use ash::vk::Handle;
    use strata_render_graph::frame_graph::{RgQueueConfig, RgQueueId, RgWorkType};

    use super::*;

    fn imports() -> SampleFrameImports {
        SampleFrameImports {
            swapchain: vk::SwapchainKHR::from_raw(1),
            staging: vk::Buffer::from_raw(2),
        }
    }

    #[test]
    fn test_sample_frame_on_graphics_only() {
        let builder = build_sample_frame(&FrameSection::default(), imports());
        assert_eq!(builder.pass_count(), 9);

        let plan = builder.compile(RgQueueConfig::GRAPHICS_ONLY);
        assert_eq!(plan.submissions().len(), 1);
        assert_eq!(plan.resources().len(), 8);
        assert_eq!(plan.submissions()[0].pass_names().last(), Some(&"Debug Overlay"));
    }

    #[test]
    fn test_sample_frame_uses_async_queues() {
        let plan = build_sample_frame(&FrameSection::default(), imports()).compile(RgQueueConfig::new(1, 1, 1));

        let queue_of = |name: &str| {
            plan.submissions()
                .iter()
                .find(|submission| submission.pass_names().contains(&name))
                .map(|submission| submission.queue())
        };
        assert_eq!(queue_of("Upload Instances"), Some(RgQueueId::new(RgWorkType::Transfer, 0)));
        assert_eq!(queue_of("SSAO"), Some(RgQueueId::new(RgWorkType::Compute, 0)));
        assert_eq!(queue_of("Tonemap"), Some(RgQueueId::PRIMARY));
    }

    #[test]
    fn test_sample_frame_without_async_compute() {
        let frame = FrameSection {
            async_compute: false,
            ..Default::default()
        };
        let plan = build_sample_frame(&frame, imports()).compile(RgQueueConfig::new(1, 1, 0));

        assert!(plan.submissions().iter().all(|submission| submission.queue() == RgQueueId::PRIMARY));
    }
}

//! 执行计划
//!
//! 编译的唯一产物：资源创建列表 + 按提交顺序排列的批次。
//! 计划创建后不可修改；不同队列上的批次可以在不同线程中并发录制。

use std::fmt;

use ash::vk;
use itertools::Itertools;

use crate::frame_graph::pass::RgPassCallback;
use crate::frame_graph::{
    RgBatchSync, RgComputeContext, RgExecutePredicate, RgExternalResource, RgFrameInfo, RgGraphicsContext,
    RgOwnershipTransfer, RgPassContext, RgPassEntry, RgPhysicalResource, RgPhysicalResources, RgQueueConfig,
    RgQueueId, RgResolvedAccess, RgResourceCreation, RgResourceEntry, RgResourceHandle, RgSchedule,
    RgTimelineReference, RgTransferContext, RgWorkType,
};

/// 批次中的一个 Pass，访问状态已推导完成
pub struct RgScheduledPass {
    pub name: String,
    pub declaration_index: u32,
    /// 声明时的工作类型，可能与所在队列不同
    pub work_type: RgWorkType,
    pub accesses: Vec<RgResolvedAccess>,

    callback: RgPassCallback,
    should_execute: Option<RgExecutePredicate>,
}

impl RgScheduledPass {
    #[inline]
    pub fn should_execute(&self, frame: &RgFrameInfo) -> bool {
        self.should_execute.as_ref().is_none_or(|predicate| predicate(frame))
    }
}

impl fmt::Debug for RgScheduledPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RgScheduledPass")
            .field("name", &self.name)
            .field("declaration_index", &self.declaration_index)
            .field("work_type", &self.work_type)
            .field("accesses", &self.accesses)
            .finish_non_exhaustive()
    }
}

/// 一次队列提交
#[derive(Debug)]
pub struct RgSubmission {
    queue: RgQueueId,
    timeline_value: u64,
    passes: Vec<RgScheduledPass>,
    waits: Vec<RgTimelineReference>,
    signals: Vec<RgTimelineReference>,
    released: Vec<RgOwnershipTransfer>,
    acquired: Vec<RgOwnershipTransfer>,
}

// getters
impl RgSubmission {
    #[inline]
    pub fn queue(&self) -> RgQueueId {
        self.queue
    }

    #[inline]
    pub fn queue_type(&self) -> RgWorkType {
        self.queue.work_type
    }

    #[inline]
    pub fn queue_index(&self) -> u32 {
        self.queue.index
    }

    /// 批次完成后所在队列 timeline 的值
    #[inline]
    pub fn timeline_value(&self) -> u64 {
        self.timeline_value
    }

    #[inline]
    pub fn passes(&self) -> &[RgScheduledPass] {
        &self.passes
    }

    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|pass| pass.name.as_str()).collect()
    }

    #[inline]
    pub fn waits(&self) -> &[RgTimelineReference] {
        &self.waits
    }

    #[inline]
    pub fn signals(&self) -> &[RgTimelineReference] {
        &self.signals
    }

    /// 需要在本批次末尾 release 的资源
    #[inline]
    pub fn released(&self) -> &[RgOwnershipTransfer] {
        &self.released
    }

    /// 需要在本批次开头 acquire 的资源
    #[inline]
    pub fn acquired(&self) -> &[RgOwnershipTransfer] {
        &self.acquired
    }
}

/// 单次录制的统计
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RgRecordStats {
    pub recorded: usize,
    /// should_execute 返回 false 而跳过的 Pass
    pub skipped: usize,
}

/// 编译结果
pub struct RgExecutionPlan {
    resources: Vec<RgResourceEntry>,
    submissions: Vec<RgSubmission>,
    queue_config: RgQueueConfig,
}

// new & init
impl RgExecutionPlan {
    pub(crate) fn assemble(
        resources: Vec<RgResourceEntry>,
        passes: Vec<RgPassEntry>,
        resolved: Vec<Vec<RgResolvedAccess>>,
        schedule: RgSchedule,
        syncs: Vec<RgBatchSync>,
        queue_config: RgQueueConfig,
    ) -> Self {
        debug_assert_eq!(schedule.batches.len(), syncs.len());

        let mut scheduled = passes
            .into_iter()
            .zip(resolved)
            .map(|(pass, accesses)| {
                Some(RgScheduledPass {
                    name: pass.name,
                    declaration_index: pass.declaration_index,
                    work_type: pass.work_type,
                    accesses,
                    callback: pass.callback,
                    should_execute: pass.should_execute,
                })
            })
            .collect_vec();

        let submissions = schedule
            .batches
            .into_iter()
            .zip(syncs)
            .map(|(batch, sync)| RgSubmission {
                queue: batch.queue,
                timeline_value: sync.timeline_value,
                passes: batch
                    .passes
                    .iter()
                    .map(|&pass_idx| {
                        scheduled[pass_idx]
                            .take()
                            .unwrap_or_else(|| panic!("RenderGraph: pass {} scheduled twice", pass_idx))
                    })
                    .collect(),
                waits: sync.waits,
                signals: sync.signals,
                released: sync.released,
                acquired: sync.acquired,
            })
            .collect_vec();

        debug_assert!(scheduled.iter().all(Option::is_none), "RenderGraph: every pass must be scheduled");

        Self {
            resources,
            submissions,
            queue_config,
        }
    }
}

// getters
impl RgExecutionPlan {
    /// 资源创建列表，按注册顺序
    #[inline]
    pub fn resources(&self) -> &[RgResourceEntry] {
        &self.resources
    }

    #[inline]
    pub fn submissions(&self) -> &[RgSubmission] {
        &self.submissions
    }

    #[inline]
    pub fn queue_config(&self) -> &RgQueueConfig {
        &self.queue_config
    }

    pub fn resource(&self, handle: impl Into<RgResourceHandle>) -> Option<&RgResourceEntry> {
        let handle = handle.into();
        self.resources.iter().find(|entry| entry.handle == handle)
    }

    pub fn pass_count(&self) -> usize {
        self.submissions.iter().map(|submission| submission.passes.len()).sum()
    }
}

// execute
impl RgExecutionPlan {
    /// 导入的 buffer/image 对应的物理资源；render surface 的当前 image 需要设备层每帧补充
    pub fn imported_physical_resources(&self) -> RgPhysicalResources {
        let mut physical = RgPhysicalResources::new();
        for entry in &self.resources {
            match entry.creation {
                RgResourceCreation::External(RgExternalResource::Buffer(buffer)) => {
                    physical.insert(entry.handle, RgPhysicalResource::Buffer(buffer));
                }
                RgResourceCreation::External(RgExternalResource::Image { image, view }) => {
                    physical.insert(entry.handle, RgPhysicalResource::Image { image, view });
                }
                _ => {}
            }
        }
        physical
    }

    /// 录制一个批次中所有 Pass 的命令
    ///
    /// 只调用回调，不负责 begin/end command buffer 和提交。
    pub fn record_submission(
        &self,
        submission_index: usize,
        frame: RgFrameInfo,
        cmd: vk::CommandBuffer,
        resources: &RgPhysicalResources,
    ) -> RgRecordStats {
        #[cfg(feature = "profiling")]
        let _span = tracy_client::span!("RgExecutionPlan::record_submission");

        let submission = self.submissions.get(submission_index).unwrap_or_else(|| {
            panic!(
                "RenderGraph: submission index {} out of range ({} submissions)",
                submission_index,
                self.submissions.len()
            )
        });

        let mut stats = RgRecordStats::default();
        for pass in &submission.passes {
            if !pass.should_execute(&frame) {
                log::trace!("RenderGraph: skip pass '{}' in frame {}", pass.name, frame.frame_index);
                stats.skipped += 1;
                continue;
            }

            let base = RgPassContext {
                pass_name: &pass.name,
                queue: submission.queue,
                work_type: pass.work_type,
                frame,
                cmd,
                resources,
                accesses: &pass.accesses,
            };
            match &pass.callback {
                RgPassCallback::Graphics(record) => record(&RgGraphicsContext::new(base)),
                RgPassCallback::Compute(record) => record(&RgComputeContext::new(base)),
                RgPassCallback::Transfer(record) => record(&RgTransferContext::new(base)),
            }
            stats.recorded += 1;
        }
        stats
    }
}

// debug
impl RgExecutionPlan {
    /// 打印执行计划
    pub fn print_execution_plan(&self) {
        log::info!("╔══════════════════════════════════════════════════════════════════╗");
        log::info!("║              FrameGraph Execution Plan                           ║");
        log::info!("╠══════════════════════════════════════════════════════════════════╣");
        log::info!(
            "║ queues: graphics={} compute={} transfer={}",
            self.queue_config.graphics_queues,
            self.queue_config.compute_queues,
            self.queue_config.transfer_queues
        );
        log::info!("║ {} resources, {} passes, {} submissions", self.resources.len(), self.pass_count(), self.submissions.len());
        log::info!("╚══════════════════════════════════════════════════════════════════╝");

        for entry in &self.resources {
            log::info!(
                "  {:?} \"{}\" {:?}{}{}",
                entry.handle,
                entry.name,
                entry.origin,
                if entry.flags.render_target { " render-target" } else { "" },
                if entry.flags.presentable { " presentable" } else { "" }
            );
        }

        for (index, submission) in self.submissions.iter().enumerate() {
            log::info!("");
            log::info!("┌─────────────────────────────────────────────────────────────────┐");
            log::info!(
                "│ [{}/{}] Submission on {} (timeline {})",
                index + 1,
                self.submissions.len(),
                submission.queue,
                submission.timeline_value
            );
            log::info!("├─────────────────────────────────────────────────────────────────┤");
            for wait in &submission.waits {
                log::info!("│ ⏳ wait {} >= {} at {}", wait.queue, wait.value, format_pipeline_stage(wait.stages));
            }
            for transfer in &submission.acquired {
                log::info!("│ ⬇ acquire {:?} from {}", transfer.resource, transfer.src_queue);
            }
            for pass in &submission.passes {
                log::info!("│ Pass #{} \"{}\" ({})", pass.declaration_index, pass.name, pass.work_type);
                for access in &pass.accesses {
                    log::info!(
                        "│     {:?} {:?}: {} / {}{}",
                        access.direction,
                        access.resource,
                        format_pipeline_stage(access.state.stage),
                        format_access_flags(access.state.access),
                        access.state.layout.map(|layout| format!(" / {:?}", layout)).unwrap_or_default()
                    );
                }
            }
            for transfer in &submission.released {
                log::info!("│ ⬆ release {:?} to {}", transfer.resource, transfer.dst_queue);
            }
            for signal in &submission.signals {
                log::info!("│ 🔔 signal {} = {} after {}", signal.queue, signal.value, format_pipeline_stage(signal.stages));
            }
            log::info!("└─────────────────────────────────────────────────────────────────┘");
        }

        log::info!("");
        log::info!("═══════════════════════ End of Execution Plan ═══════════════════════");
    }
}

/// 格式化 PipelineStageFlags2 为可读字符串
fn format_pipeline_stage(stage: vk::PipelineStageFlags2) -> String {
    const NAMES: &[(vk::PipelineStageFlags2, &str)] = &[
        (vk::PipelineStageFlags2::ALL_COMMANDS, "ALL_COMMANDS"),
        (vk::PipelineStageFlags2::VERTEX_SHADER, "VERTEX_SHADER"),
        (vk::PipelineStageFlags2::FRAGMENT_SHADER, "FRAGMENT_SHADER"),
        (vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS, "EARLY_FRAGMENT_TESTS"),
        (vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS, "LATE_FRAGMENT_TESTS"),
        (vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT, "COLOR_ATTACHMENT_OUTPUT"),
        (vk::PipelineStageFlags2::COMPUTE_SHADER, "COMPUTE_SHADER"),
        (vk::PipelineStageFlags2::TRANSFER, "TRANSFER"),
    ];

    let names = NAMES.iter().filter(|(flag, _)| stage.contains(*flag)).map(|(_, name)| *name).collect_vec();
    if names.is_empty() { format!("{:?}", stage) } else { names.join(" | ") }
}

/// 格式化 AccessFlags2 为可读字符串
fn format_access_flags(access: vk::AccessFlags2) -> String {
    const NAMES: &[(vk::AccessFlags2, &str)] = &[
        (vk::AccessFlags2::MEMORY_READ, "MEMORY_READ"),
        (vk::AccessFlags2::MEMORY_WRITE, "MEMORY_WRITE"),
        (vk::AccessFlags2::SHADER_READ, "SHADER_READ"),
        (vk::AccessFlags2::SHADER_SAMPLED_READ, "SHADER_SAMPLED_READ"),
        (vk::AccessFlags2::SHADER_STORAGE_READ, "STORAGE_READ"),
        (vk::AccessFlags2::SHADER_STORAGE_WRITE, "STORAGE_WRITE"),
        (vk::AccessFlags2::COLOR_ATTACHMENT_READ, "COLOR_ATTACH_READ"),
        (vk::AccessFlags2::COLOR_ATTACHMENT_WRITE, "COLOR_ATTACH_WRITE"),
        (vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ, "DEPTH_ATTACH_READ"),
        (vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE, "DEPTH_ATTACH_WRITE"),
        (vk::AccessFlags2::TRANSFER_READ, "TRANSFER_READ"),
        (vk::AccessFlags2::TRANSFER_WRITE, "TRANSFER_WRITE"),
    ];

    if access == vk::AccessFlags2::NONE {
        return "NONE".to_string();
    }
    let names = NAMES.iter().filter(|(flag, _)| access.contains(*flag)).map(|(_, name)| *name).collect_vec();
    if names.is_empty() { format!("{:?}", access) } else { names.join(" | ") }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_flags() {
        let stage = vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS;
        assert_eq!(format_pipeline_stage(stage), "EARLY_FRAGMENT_TESTS | LATE_FRAGMENT_TESTS");
        assert_eq!(format_access_flags(vk::AccessFlags2::NONE), "NONE");
        assert_eq!(format_access_flags(vk::AccessFlags2::TRANSFER_WRITE), "TRANSFER_WRITE");
    }
}

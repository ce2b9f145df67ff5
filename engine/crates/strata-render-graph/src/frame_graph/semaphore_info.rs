use ash::vk;

use crate::frame_graph::{RgQueueId, RgResourceHandle, RgResourceState};

/// 跨队列同步点：某个队列 timeline 上的一个值
///
/// - 出现在 signals 中：本批次执行完 `stages` 后把 `queue` 的 timeline 推进到 `value`
/// - 出现在 waits 中：本批次的 `stages` 需要等到 `queue` 的 timeline 达到 `value`
///
/// 值从 1 开始，在单个执行计划内每个队列实例单调递增；设备层可以用 [`Self::offset_by`] 加上每帧的基准值。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RgTimelineReference {
    pub queue: RgQueueId,
    pub value: u64,
    pub stages: vk::PipelineStageFlags2,
}

impl RgTimelineReference {
    #[inline]
    pub fn new(queue: RgQueueId, value: u64, stages: vk::PipelineStageFlags2) -> Self {
        Self { queue, value, stages }
    }

    #[inline]
    pub fn offset_by(self, base: u64) -> Self {
        Self {
            value: self.value + base,
            ..self
        }
    }
}

/// 队列族所有权转移
///
/// 同一份记录会同时出现在生产批次的 `released` 和消费批次的 `acquired` 中，
/// 设备层据此生成 release / acquire barrier。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgOwnershipTransfer {
    pub resource: RgResourceHandle,
    pub src_queue: RgQueueId,
    pub dst_queue: RgQueueId,
    pub src_state: RgResourceState,
    pub dst_state: RgResourceState,
    /// 对应的 timeline 值（生产队列上）
    pub value: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_graph::RgWorkType;

    #[test]
    fn test_offset_by_keeps_queue_and_stages() {
        let queue = RgQueueId::new(RgWorkType::Compute, 1);
        let reference = RgTimelineReference::new(queue, 3, vk::PipelineStageFlags2::COMPUTE_SHADER);

        let rebased = reference.offset_by(100);
        assert_eq!(rebased.value, 103);
        assert_eq!(rebased.queue, queue);
        assert_eq!(rebased.stages, vk::PipelineStageFlags2::COMPUTE_SHADER);

        assert_eq!(reference.offset_by(0), reference);
    }
}

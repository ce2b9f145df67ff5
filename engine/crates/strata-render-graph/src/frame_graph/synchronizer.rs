//! 跨队列同步
//!
//! 为每条跨越队列的依赖边在生产批次上加一个 timeline signal，在消费批次上加一个相同值的 wait。
//! 同一队列上的批次依靠提交顺序保证先后，不需要 semaphore。
//!
//! 队列族所有权按批次顺序跟踪：资源每次在另一种工作类型的队列上被使用（读也算），
//! 上一次使用它的批次 release，当前批次 acquire，并配一对 signal/wait。

use std::collections::HashMap;

use crate::frame_graph::{
    RgDependencyGraph, RgOwnershipTransfer, RgQueueId, RgResolvedAccess, RgResourceHandle, RgResourceState,
    RgSchedule, RgTimelineReference,
};

/// 每个批次的同步信息，下标与 [`RgSchedule::batches`] 一致
#[derive(Clone, Debug, Default)]
pub struct RgBatchSync {
    /// 批次完成后所在队列 timeline 的值
    pub timeline_value: u64,
    pub waits: Vec<RgTimelineReference>,
    pub signals: Vec<RgTimelineReference>,
    pub released: Vec<RgOwnershipTransfer>,
    pub acquired: Vec<RgOwnershipTransfer>,
}

/// 资源最近一次被使用的位置
///
/// `state` 是自上次所有权转移以来，同一种工作类型的队列上所有访问的并集，layout 取最后一次的。
#[derive(Clone, Copy, Debug)]
struct RgLastUsage {
    batch: usize,
    queue: RgQueueId,
    state: RgResourceState,
}

pub struct RgSynchronizer;

impl RgSynchronizer {
    /// `resolved` 与 Pass 下标一致
    pub fn synchronize(
        graph: &RgDependencyGraph,
        schedule: &RgSchedule,
        resolved: &[Vec<RgResolvedAccess>],
    ) -> Vec<RgBatchSync> {
        let mut syncs = Self::assign_timeline_values(schedule);

        // 不做去重：每条跨队列的边都有自己的 wait/signal
        for edge in graph.edges() {
            let producer_batch = schedule.batch_of_pass[edge.producer];
            let consumer_batch = schedule.batch_of_pass[edge.consumer];
            let producer_queue = schedule.batches[producer_batch].queue;
            let consumer_queue = schedule.batches[consumer_batch].queue;
            if producer_queue == consumer_queue {
                continue;
            }
            debug_assert!(producer_batch < consumer_batch, "RenderGraph: wait must refer to an earlier submission");

            let value = syncs[producer_batch].timeline_value;
            syncs[producer_batch].signals.push(RgTimelineReference::new(
                producer_queue,
                value,
                edge.producer_state.stage,
            ));
            syncs[consumer_batch].waits.push(RgTimelineReference::new(
                producer_queue,
                value,
                edge.consumer_state.stage,
            ));
        }

        Self::transfer_ownership(&mut syncs, schedule, resolved);

        syncs
    }

    /// 按批次顺序跟踪每个资源最后被哪个队列使用
    ///
    /// 不同工作类型的队列视为不同的队列族；同一个资源在一个批次内最多 acquire 一次。
    fn transfer_ownership(syncs: &mut [RgBatchSync], schedule: &RgSchedule, resolved: &[Vec<RgResolvedAccess>]) {
        let mut last_usages: HashMap<RgResourceHandle, RgLastUsage> = HashMap::new();

        for (batch_idx, batch) in schedule.batches.iter().enumerate() {
            for access in batch.passes.iter().flat_map(|&pass_idx| resolved[pass_idx].iter()) {
                let usage = match last_usages.get(&access.resource).copied() {
                    Some(last) if last.queue.work_type == batch.queue.work_type => RgLastUsage {
                        batch: batch_idx,
                        queue: batch.queue,
                        state: RgResourceState {
                            stage: last.state.stage | access.state.stage,
                            access: last.state.access | access.state.access,
                            layout: access.state.layout,
                        },
                    },
                    Some(last) => {
                        debug_assert!(last.batch < batch_idx, "RenderGraph: release must happen in an earlier submission");
                        if !syncs[batch_idx].acquired.iter().any(|transfer| transfer.resource == access.resource) {
                            let value = syncs[last.batch].timeline_value;
                            let transfer = RgOwnershipTransfer {
                                resource: access.resource,
                                src_queue: last.queue,
                                dst_queue: batch.queue,
                                src_state: last.state,
                                dst_state: access.state,
                                value,
                            };
                            syncs[last.batch].released.push(transfer);
                            syncs[last.batch].signals.push(RgTimelineReference::new(
                                last.queue,
                                value,
                                last.state.stage,
                            ));
                            syncs[batch_idx].acquired.push(transfer);
                            syncs[batch_idx].waits.push(RgTimelineReference::new(
                                last.queue,
                                value,
                                access.state.stage,
                            ));
                        }
                        RgLastUsage {
                            batch: batch_idx,
                            queue: batch.queue,
                            state: access.state,
                        }
                    }
                    None => RgLastUsage {
                        batch: batch_idx,
                        queue: batch.queue,
                        state: access.state,
                    },
                };
                last_usages.insert(access.resource, usage);
            }
        }
    }

    /// 每个队列实例的 timeline 从 1 开始，每个批次递增 1
    fn assign_timeline_values(schedule: &RgSchedule) -> Vec<RgBatchSync> {
        let mut counters: HashMap<RgQueueId, u64> = HashMap::new();
        schedule
            .batches
            .iter()
            .map(|batch| {
                let counter = counters.entry(batch.queue).or_insert(0);
                *counter += 1;
                RgBatchSync {
                    timeline_value: *counter,
                    ..Default::default()
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use ash::vk;

    use super::*;
    use crate::frame_graph::{
        RgAccessDirection, RgBatch, RgDependencyEdge, RgHazard, RgResourceHandle, RgResourceKind, RgWorkType,
    };

    const GRAPHICS: RgQueueId = RgQueueId::PRIMARY;
    const COMPUTE: RgQueueId = RgQueueId::new(RgWorkType::Compute, 0);

    fn image(id: u32) -> RgResourceHandle {
        RgResourceHandle::new(11, id, RgResourceKind::Image)
    }

    fn edge(producer: usize, consumer: usize, id: u32, hazard: RgHazard) -> RgDependencyEdge {
        RgDependencyEdge {
            producer,
            consumer,
            resource: Some(image(id)),
            hazard,
            producer_state: RgResourceState::COLOR_ATTACHMENT_WRITE,
            consumer_state: RgResourceState::SHADER_READ_COMPUTE,
        }
    }

    fn access(id: u32, direction: RgAccessDirection, state: RgResourceState) -> RgResolvedAccess {
        RgResolvedAccess {
            resource: image(id),
            direction,
            state,
        }
    }

    /// 三个 Pass：graphics 0 -> compute 1 -> graphics 2，各自一个批次
    fn three_batch_schedule() -> RgSchedule {
        RgSchedule {
            order: vec![0, 1, 2],
            assignments: vec![GRAPHICS, COMPUTE, GRAPHICS],
            batches: vec![
                RgBatch {
                    queue: GRAPHICS,
                    passes: vec![0],
                },
                RgBatch {
                    queue: COMPUTE,
                    passes: vec![1],
                },
                RgBatch {
                    queue: GRAPHICS,
                    passes: vec![2],
                },
            ],
            batch_of_pass: vec![0, 1, 2],
        }
    }

    fn graph(edges: &[RgDependencyEdge]) -> RgDependencyGraph {
        let mut graph = RgDependencyGraph::new(vec![0, 1, 2]);
        for edge in edges {
            graph.add_edge(*edge);
        }
        graph
    }

    #[test]
    fn test_cross_queue_edges_get_wait_and_signal() {
        let graph = graph(&[
            edge(0, 1, 1, RgHazard::ReadAfterWrite),
            edge(0, 1, 2, RgHazard::ReadAfterWrite),
            edge(1, 2, 3, RgHazard::ReadAfterWrite),
            edge(0, 2, 4, RgHazard::ReadAfterWrite),
        ]);
        let syncs = RgSynchronizer::synchronize(&graph, &three_batch_schedule(), &vec![Vec::new(); 3]);

        assert_eq!(syncs.iter().map(|s| s.timeline_value).collect::<Vec<_>>(), vec![1, 1, 2]);

        // 每条跨队列的边各自一对 wait/signal
        assert_eq!(syncs[0].signals.len(), 2);
        assert_eq!(syncs[1].waits.len(), 2);
        assert_eq!(syncs[1].signals.len(), 1);
        assert_eq!(syncs[2].waits.len(), 1);

        // 同队列的 0 -> 2 不需要 semaphore
        assert!(syncs[0].waits.is_empty());
        assert!(syncs[2].signals.is_empty());

        let signal = syncs[0].signals[0];
        let wait = syncs[1].waits[0];
        assert_eq!((signal.queue, signal.value), (wait.queue, wait.value));
        assert_eq!(signal.stages, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(wait.stages, vk::PipelineStageFlags2::COMPUTE_SHADER);
    }

    #[test]
    fn test_ownership_follows_last_queue() {
        use RgAccessDirection::{Read, Write};

        // image 1: graphics 写 -> compute 读两次 -> graphics 读
        // image 2: 只在 graphics 上使用
        let resolved = vec![
            vec![
                access(1, Write, RgResourceState::COLOR_ATTACHMENT_WRITE),
                access(2, Write, RgResourceState::COLOR_ATTACHMENT_WRITE),
            ],
            vec![
                access(1, Read, RgResourceState::SHADER_READ_COMPUTE),
                access(1, Read, RgResourceState::SHADER_READ_COMPUTE),
            ],
            vec![
                access(1, Read, RgResourceState::SHADER_READ_FRAGMENT),
                access(2, Read, RgResourceState::SHADER_READ_FRAGMENT),
            ],
        ];
        let graph = graph(&[edge(0, 1, 1, RgHazard::ReadAfterWrite)]);
        let syncs = RgSynchronizer::synchronize(&graph, &three_batch_schedule(), &resolved);

        assert_eq!(syncs[0].released.len(), 1);
        assert_eq!(syncs[1].acquired, syncs[0].released);
        assert_eq!(syncs[1].acquired[0].resource, image(1));
        assert_eq!(syncs[1].acquired[0].dst_queue, COMPUTE);
        assert_eq!(syncs[1].acquired[0].src_state, RgResourceState::COLOR_ATTACHMENT_WRITE);

        // 只读的 compute 批次要把所有权还给 graphics
        assert_eq!(syncs[1].released.len(), 1);
        assert_eq!(syncs[2].acquired, syncs[1].released);
        let back = syncs[2].acquired[0];
        assert_eq!((back.resource, back.src_queue, back.dst_queue), (image(1), COMPUTE, GRAPHICS));
        assert_eq!(back.src_state, RgResourceState::SHADER_READ_COMPUTE);
        assert_eq!(back.dst_state, RgResourceState::SHADER_READ_FRAGMENT);
        assert_eq!(back.value, syncs[1].timeline_value);

        // 读后读没有依赖边，但仍然需要 wait 上一次使用的批次
        assert_eq!(syncs[2].waits.len(), 1);
        let wait = syncs[2].waits[0];
        assert_eq!((wait.queue, wait.value, wait.stages), (COMPUTE, 1, vk::PipelineStageFlags2::FRAGMENT_SHADER));
        assert!(syncs[1].signals.iter().any(|signal| signal.queue == wait.queue && signal.value == wait.value));

        // 边和所有权转移各自一对 wait/signal
        assert_eq!(syncs[0].signals.len(), 2);
        assert_eq!(syncs[1].waits.len(), 2);
    }

    #[test]
    fn test_same_work_type_keeps_ownership() {
        use RgAccessDirection::{Read, Write};

        let second_graphics = RgQueueId::new(RgWorkType::Graphics, 1);
        let schedule = RgSchedule {
            order: vec![0, 1],
            assignments: vec![GRAPHICS, second_graphics],
            batches: vec![
                RgBatch {
                    queue: GRAPHICS,
                    passes: vec![0],
                },
                RgBatch {
                    queue: second_graphics,
                    passes: vec![1],
                },
            ],
            batch_of_pass: vec![0, 1],
        };
        let resolved = vec![
            vec![access(1, Write, RgResourceState::COLOR_ATTACHMENT_WRITE)],
            vec![access(1, Read, RgResourceState::SHADER_READ_FRAGMENT)],
        ];
        let mut graph = RgDependencyGraph::new(vec![0, 1]);
        graph.add_edge(edge(0, 1, 1, RgHazard::ReadAfterWrite));

        let syncs = RgSynchronizer::synchronize(&graph, &schedule, &resolved);
        assert!(syncs.iter().all(|sync| sync.released.is_empty() && sync.acquired.is_empty()));
        assert_eq!(syncs[1].waits.len(), 1);
    }
}

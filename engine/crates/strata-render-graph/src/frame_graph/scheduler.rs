//! 调度：拓扑排序、队列分配与提交批次划分

use std::collections::HashMap;

use itertools::Itertools;

use crate::frame_graph::{RgDependencyGraph, RgPassEntry, RgQueueConfig, RgQueueId, RgWorkType};

/// 同一个队列实例上连续执行、一次提交的一组 Pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgBatch {
    pub queue: RgQueueId,
    /// Pass 索引，按执行顺序
    pub passes: Vec<usize>,
}

/// 调度结果
#[derive(Clone, Debug)]
pub struct RgSchedule {
    /// 拓扑顺序
    pub order: Vec<usize>,
    /// 每个 Pass 分配到的队列
    pub assignments: Vec<RgQueueId>,
    /// 按提交顺序排列的批次
    pub batches: Vec<RgBatch>,
    /// 每个 Pass 所在的批次
    pub batch_of_pass: Vec<usize>,
}

pub struct RgScheduler;

impl RgScheduler {
    pub fn schedule(passes: &[RgPassEntry], graph: &RgDependencyGraph, config: &RgQueueConfig) -> RgSchedule {
        assert!(config.graphics_queues > 0, "RenderGraph: queue configuration must provide at least one graphics queue");
        debug_assert_eq!(passes.len(), graph.pass_count());

        let order = graph.topological_sort();
        let assignments = Self::assign_queues(passes, graph, config, &order);
        let (batches, batch_of_pass) = Self::build_batches(graph, &order, &assignments);

        RgSchedule {
            order,
            assignments,
            batches,
            batch_of_pass,
        }
    }

    /// Pass 可以使用的专用队列类型；`None` 表示放在主队列
    fn dedicated_queue_type(pass: &RgPassEntry, config: &RgQueueConfig) -> Option<RgWorkType> {
        if !pass.prefer_async {
            return None;
        }
        match pass.work_type {
            RgWorkType::Graphics => None,
            work_type => config.has_dedicated(work_type).then_some(work_type),
        }
    }

    /// 队列分配
    ///
    /// 异步 Pass 优先跟随同类型队列上的前驱，让依赖链留在同一个队列实例上；
    /// 否则在该类型的队列实例之间轮转。
    fn assign_queues(
        passes: &[RgPassEntry],
        graph: &RgDependencyGraph,
        config: &RgQueueConfig,
        order: &[usize],
    ) -> Vec<RgQueueId> {
        let mut assignments = vec![RgQueueId::PRIMARY; passes.len()];
        let mut round_robin: HashMap<RgWorkType, u32> = HashMap::new();

        for &pass_idx in order {
            let pass = &passes[pass_idx];
            let Some(work_type) = Self::dedicated_queue_type(pass, config) else {
                if pass.prefer_async {
                    log::debug!(
                        "RenderGraph: no dedicated {} queue for pass '{}', folded onto {}",
                        pass.work_type,
                        pass.name,
                        RgQueueId::PRIMARY
                    );
                }
                continue;
            };

            let affine = graph
                .predecessors(pass_idx)
                .iter()
                .map(|&pred| assignments[pred])
                .find(|queue| queue.work_type == work_type);
            let queue = affine.unwrap_or_else(|| {
                let next = round_robin.entry(work_type).or_insert(0);
                let queue = RgQueueId::new(work_type, *next % config.queue_count(work_type));
                *next += 1;
                queue
            });
            assignments[pass_idx] = queue;
        }

        assignments
    }

    /// 划分提交批次
    ///
    /// 每个队列实例维护一个打开的批次，Pass 按拓扑顺序加入所在队列的打开批次，除非：
    /// - 它依赖的其他队列上的 Pass 位于该批次之后创建的批次中（加入会让等待早于信号）
    /// - 该批次已关闭：批次内某个 Pass 的输出被其他队列消费，批次在此结束，信号尽早发出
    ///
    /// 批次的提交顺序即创建顺序，任何等待都只指向更早的批次。
    fn build_batches(
        graph: &RgDependencyGraph,
        order: &[usize],
        assignments: &[RgQueueId],
    ) -> (Vec<RgBatch>, Vec<usize>) {
        let mut batches: Vec<RgBatch> = Vec::new();
        let mut batch_of_pass = vec![usize::MAX; assignments.len()];
        let mut open_batches: HashMap<RgQueueId, usize> = HashMap::new();

        for &pass_idx in order {
            let queue = assignments[pass_idx];

            let joinable = open_batches.get(&queue).copied().filter(|&open| {
                graph
                    .predecessors(pass_idx)
                    .iter()
                    .all(|&pred| assignments[pred] == queue || batch_of_pass[pred] < open)
            });
            let batch_idx = joinable.unwrap_or_else(|| {
                batches.push(RgBatch {
                    queue,
                    passes: Vec::new(),
                });
                open_batches.insert(queue, batches.len() - 1);
                batches.len() - 1
            });

            batches[batch_idx].passes.push(pass_idx);
            batch_of_pass[pass_idx] = batch_idx;

            if graph.successors(pass_idx).iter().any(|&succ| assignments[succ] != queue) {
                open_batches.remove(&queue);
            }
        }

        log::debug!(
            "RenderGraph: {} passes scheduled into {} batches: {}",
            order.len(),
            batches.len(),
            batches.iter().map(|batch| format!("{}{:?}", batch.queue, batch.passes)).join(" ")
        );

        (batches, batch_of_pass)
    }
}

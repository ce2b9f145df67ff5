//! 依赖图构建和拓扑排序
//!
//! 按声明顺序扫描 Pass 的资源访问，生成 RAW / WAW / WAR 依赖边。
//! 边总是从先声明的 Pass 指向后声明的 Pass，因此图天然无环。

use std::collections::{BTreeSet, HashMap};

use ash::vk;

use crate::frame_graph::{RgPassEntry, RgResolvedAccess, RgResourceHandle, RgResourceState};

/// 依赖边的成因
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RgHazard {
    ReadAfterWrite,
    WriteAfterWrite,
    WriteAfterRead,
    /// 通过 `depends_on` 声明，不涉及资源
    Explicit,
}

/// 依赖边：从 producer 到 consumer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgDependencyEdge {
    /// 生产者 Pass 索引（先执行）
    pub producer: usize,
    /// 消费者 Pass 索引（后执行）
    pub consumer: usize,
    /// 显式依赖没有资源
    pub resource: Option<RgResourceHandle>,
    pub hazard: RgHazard,
    pub producer_state: RgResourceState,
    pub consumer_state: RgResourceState,
}

/// 显式依赖使用的执行依赖范围
const EXPLICIT_PRODUCER: RgResourceState =
    RgResourceState::buffer(vk::PipelineStageFlags2::ALL_COMMANDS, vk::AccessFlags2::MEMORY_WRITE);
const EXPLICIT_CONSUMER: RgResourceState =
    RgResourceState::buffer(vk::PipelineStageFlags2::ALL_COMMANDS, vk::AccessFlags2::MEMORY_READ);

/// 依赖图
///
/// 节点是 Pass 在声明顺序中的位置；`declaration_indices` 用于拓扑排序的 tie-break。
pub struct RgDependencyGraph {
    declaration_indices: Vec<u32>,
    /// 邻接表（出边），已去重
    successors: Vec<Vec<usize>>,
    /// 入边，已去重
    predecessors: Vec<Vec<usize>>,
    /// 所有边，不去重
    edges: Vec<RgDependencyEdge>,
}

// new & init
impl RgDependencyGraph {
    pub fn new(declaration_indices: Vec<u32>) -> Self {
        let pass_count = declaration_indices.len();
        Self {
            declaration_indices,
            successors: vec![Vec::new(); pass_count],
            predecessors: vec![Vec::new(); pass_count],
            edges: Vec::new(),
        }
    }

    /// 添加依赖边
    pub fn add_edge(&mut self, edge: RgDependencyEdge) {
        debug_assert!(edge.producer < edge.consumer, "RenderGraph: edge must point to a later pass: {:?}", edge);

        if !self.successors[edge.producer].contains(&edge.consumer) {
            self.successors[edge.producer].push(edge.consumer);
            self.predecessors[edge.consumer].push(edge.producer);
        }

        log::trace!("RenderGraph: edge {} -> {} {:?} on {:?}", edge.producer, edge.consumer, edge.hazard, edge.resource);
        self.edges.push(edge);
    }
}

// getters
impl RgDependencyGraph {
    #[inline]
    pub fn pass_count(&self) -> usize {
        self.declaration_indices.len()
    }

    /// 获取 Pass 的直接前驱
    #[inline]
    pub fn predecessors(&self, pass_index: usize) -> &[usize] {
        &self.predecessors[pass_index]
    }

    /// 获取 Pass 的直接后继
    #[inline]
    pub fn successors(&self, pass_index: usize) -> &[usize] {
        &self.successors[pass_index]
    }

    #[inline]
    pub fn edges(&self) -> &[RgDependencyEdge] {
        &self.edges
    }
}

// tools
impl RgDependencyGraph {
    /// Kahn 拓扑排序
    ///
    /// 同时就绪的 Pass 中，声明顺序靠前的先输出。
    pub fn topological_sort(&self) -> Vec<usize> {
        let pass_count = self.pass_count();
        let mut in_degrees = self.predecessors.iter().map(Vec::len).collect::<Vec<_>>();
        let mut ready = (0..pass_count)
            .filter(|&i| in_degrees[i] == 0)
            .map(|i| (self.declaration_indices[i], i))
            .collect::<BTreeSet<_>>();
        let mut order = Vec::with_capacity(pass_count);

        while let Some((_, node)) = ready.pop_first() {
            order.push(node);

            for &next in &self.successors[node] {
                in_degrees[next] -= 1;
                if in_degrees[next] == 0 {
                    ready.insert((self.declaration_indices[next], next));
                }
            }
        }

        debug_assert_eq!(order.len(), pass_count, "RenderGraph: dependency graph must be acyclic");
        order
    }
}

/// 单个资源的扫描状态
#[derive(Default)]
struct ResourceTrack {
    last_writer: Option<(usize, RgResourceState)>,
    /// last_writer 之后的读取者
    pending_readers: Vec<(usize, RgResourceState)>,
}

/// 依赖分析器
pub struct RgDependencyAnalyzer;

impl RgDependencyAnalyzer {
    /// 分析资源依赖，构建依赖图
    ///
    /// `passes` 必须按声明顺序排列，`resolved[i]` 是第 i 个 Pass 推导完成的访问。
    ///
    /// 规则：
    /// - 读：依赖最后一个写入者（RAW）
    /// - 写：依赖最后一个写入者（WAW）和其后的所有读取者（WAR）
    /// - 读写：对之前的写入者按读处理（RAW），再成为新的写入者
    pub fn analyze(passes: &[RgPassEntry], resolved: &[Vec<RgResolvedAccess>]) -> RgDependencyGraph {
        debug_assert_eq!(passes.len(), resolved.len());

        let mut graph = RgDependencyGraph::new(passes.iter().map(|pass| pass.declaration_index).collect());
        let mut tracks: HashMap<RgResourceHandle, ResourceTrack> = HashMap::new();

        for (pass_idx, pass) in passes.iter().enumerate() {
            Self::add_explicit_edges(&mut graph, passes, pass_idx, pass);

            for access in &resolved[pass_idx] {
                let track = tracks.entry(access.resource).or_default();
                let mut add = |producer: usize, producer_state: RgResourceState, hazard: RgHazard| {
                    // 同一个 Pass 内的读写不产生自环
                    if producer != pass_idx {
                        graph.add_edge(RgDependencyEdge {
                            producer,
                            consumer: pass_idx,
                            resource: Some(access.resource),
                            hazard,
                            producer_state,
                            consumer_state: access.state,
                        });
                    }
                };

                if let Some((writer, writer_state)) = track.last_writer {
                    let hazard = if access.direction.has_read() {
                        RgHazard::ReadAfterWrite
                    } else {
                        RgHazard::WriteAfterWrite
                    };
                    add(writer, writer_state, hazard);
                }

                if access.direction.has_write() {
                    for (reader, reader_state) in track.pending_readers.drain(..) {
                        add(reader, reader_state, RgHazard::WriteAfterRead);
                    }
                    track.last_writer = Some((pass_idx, access.state));
                } else if !track.pending_readers.iter().any(|&(reader, _)| reader == pass_idx) {
                    track.pending_readers.push((pass_idx, access.state));
                }
            }
        }

        graph
    }

    fn add_explicit_edges(graph: &mut RgDependencyGraph, passes: &[RgPassEntry], pass_idx: usize, pass: &RgPassEntry) {
        for dependency in &pass.explicit_dependencies {
            let producer = passes[..pass_idx].iter().rposition(|earlier| &earlier.name == dependency).unwrap_or_else(|| {
                panic!(
                    "RenderGraph: pass '{}' depends on '{}', which is not declared before it",
                    pass.name, dependency
                )
            });
            graph.add_edge(RgDependencyEdge {
                producer,
                consumer: pass_idx,
                resource: None,
                hazard: RgHazard::Explicit,
                producer_state: EXPLICIT_PRODUCER,
                consumer_state: EXPLICIT_CONSUMER,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_graph::pass::{RgPassCallback, RgTaskBuilderKind};
    use crate::frame_graph::{
        RgAccessDirection, RgGraphicsContext, RgGraphicsTaskBuilder, RgResourceKind, RgTaskBuilder,
    };

    fn image(id: u32) -> RgResourceHandle {
        RgResourceHandle::new(7, id, RgResourceKind::Image)
    }

    fn pass(name: &str, index: u32, depends_on: &[&str]) -> RgPassEntry {
        let mut builder = RgGraphicsTaskBuilder::default();
        for dependency in depends_on {
            builder.depends_on(*dependency);
        }
        RgPassEntry::freeze(
            name.to_string(),
            index,
            RgTaskBuilderKind::Graphics(builder),
            RgPassCallback::Graphics(Box::new(|_: &RgGraphicsContext<'_>| {})),
        )
    }

    fn read(id: u32) -> RgResolvedAccess {
        RgResolvedAccess {
            resource: image(id),
            direction: RgAccessDirection::Read,
            state: RgResourceState::SHADER_READ_FRAGMENT,
        }
    }

    fn write(id: u32) -> RgResolvedAccess {
        RgResolvedAccess {
            resource: image(id),
            direction: RgAccessDirection::Write,
            state: RgResourceState::COLOR_ATTACHMENT_WRITE,
        }
    }

    fn read_write(id: u32) -> RgResolvedAccess {
        RgResolvedAccess {
            resource: image(id),
            direction: RgAccessDirection::ReadWrite,
            state: RgResourceState::COLOR_ATTACHMENT_READ_WRITE,
        }
    }

    fn passes(count: u32) -> Vec<RgPassEntry> {
        (0..count).map(|i| pass(&format!("pass-{i}"), i, &[])).collect()
    }

    #[test]
    fn test_simple_dependency() {
        // Pass 0 写入 image 1，Pass 1 读取 image 1
        let graph = RgDependencyAnalyzer::analyze(&passes(2), &[vec![write(1)], vec![read(1)]]);

        assert_eq!(graph.edges().len(), 1);
        let edge = graph.edges()[0];
        assert_eq!((edge.producer, edge.consumer), (0, 1));
        assert_eq!(edge.hazard, RgHazard::ReadAfterWrite);
        assert_eq!(edge.producer_state, RgResourceState::COLOR_ATTACHMENT_WRITE);
        assert_eq!(edge.consumer_state, RgResourceState::SHADER_READ_FRAGMENT);
        assert_eq!(graph.topological_sort(), vec![0, 1]);
    }

    #[test]
    fn test_write_after_read() {
        // Pass 0 写，Pass 1 和 Pass 2 读，Pass 3 再写
        let graph = RgDependencyAnalyzer::analyze(
            &passes(4),
            &[vec![write(1)], vec![read(1)], vec![read(1)], vec![write(1)]],
        );

        let hazards = graph.edges().iter().map(|e| (e.producer, e.consumer, e.hazard)).collect::<Vec<_>>();
        assert_eq!(
            hazards,
            vec![
                (0, 1, RgHazard::ReadAfterWrite),
                (0, 2, RgHazard::ReadAfterWrite),
                (0, 3, RgHazard::WriteAfterWrite),
                (1, 3, RgHazard::WriteAfterRead),
                (2, 3, RgHazard::WriteAfterRead),
            ]
        );
    }

    #[test]
    fn test_read_write_has_no_self_loop() {
        let graph = RgDependencyAnalyzer::analyze(
            &passes(2),
            &[vec![write(1)], vec![read(1), read_write(1)]],
        );

        assert!(graph.edges().iter().all(|e| e.producer != e.consumer));
        assert_eq!(graph.predecessors(1), &[0]);
        assert_eq!(graph.successors(0), &[1]);
    }

    #[test]
    fn test_tie_break_follows_declaration_order() {
        // Pass 0 和 Pass 1 互不相关，Pass 2 读取两者的输出
        let graph = RgDependencyAnalyzer::analyze(
            &passes(4),
            &[vec![write(1)], vec![write(2)], vec![read(1), read(2)], vec![]],
        );

        assert_eq!(graph.topological_sort(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_explicit_dependency() {
        let passes = vec![pass("upload", 0, &[]), pass("draw", 1, &["upload"])];
        let graph = RgDependencyAnalyzer::analyze(&passes, &[vec![], vec![]]);

        assert_eq!(graph.edges().len(), 1);
        assert_eq!(graph.edges()[0].hazard, RgHazard::Explicit);
        assert_eq!(graph.edges()[0].resource, None);
    }

    #[test]
    #[should_panic(expected = "not declared before it")]
    fn test_explicit_dependency_on_later_pass() {
        let passes = vec![pass("draw", 0, &["upload"]), pass("upload", 1, &[])];
        RgDependencyAnalyzer::analyze(&passes, &[vec![], vec![]]);
    }
}

//! Pass 声明
//!
//! 每个 `create_*_pass` 调用都会得到一个新的 task builder，
//! setup 闭包通过 [`RgTaskBuilder`] 声明资源访问；setup 返回后访问列表被冻结为 [`RgPassEntry`]。

use std::fmt;

use ash::vk;
use itertools::Itertools;

use crate::frame_graph::{
    RgAccessDirection, RgAccessRecord, RgComputeContext, RgGraphicsContext, RgResourceHandle, RgSyncMask,
    RgTransferContext, RgWorkType,
};

/// 录制时的帧信息
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RgFrameInfo {
    pub frame_index: u64,
}

/// 录制时求值的执行条件，返回 false 时跳过该 Pass 的命令
pub type RgExecutePredicate = Box<dyn Fn(&RgFrameInfo) -> bool + Send + Sync>;

pub type RgGraphicsRecordFn = Box<dyn Fn(&RgGraphicsContext<'_>) + Send + Sync>;
pub type RgComputeRecordFn = Box<dyn Fn(&RgComputeContext<'_>) + Send + Sync>;
pub type RgTransferRecordFn = Box<dyn Fn(&RgTransferContext<'_>) + Send + Sync>;

/// 延迟执行的录制回调，按工作类型区分上下文
pub(crate) enum RgPassCallback {
    Graphics(RgGraphicsRecordFn),
    Compute(RgComputeRecordFn),
    Transfer(RgTransferRecordFn),
}

impl RgPassCallback {
    pub(crate) fn work_type(&self) -> RgWorkType {
        match self {
            RgPassCallback::Graphics(_) => RgWorkType::Graphics,
            RgPassCallback::Compute(_) => RgWorkType::Compute,
            RgPassCallback::Transfer(_) => RgWorkType::Transfer,
        }
    }
}

/// 各类 task builder 共享的访问累积状态
#[derive(Default)]
pub struct RgTaskAccesses {
    accesses: Vec<RgAccessRecord>,
    explicit_dependencies: Vec<String>,
    should_execute: Option<RgExecutePredicate>,
}

impl RgTaskAccesses {
    #[inline]
    fn push(&mut self, record: RgAccessRecord) {
        self.accesses.push(record);
    }

    #[inline]
    pub fn accesses(&self) -> &[RgAccessRecord] {
        &self.accesses
    }
}

/// 资源访问声明接口
///
/// 不带 `_with` 后缀的方法把 stage/access 留给编译期推导。
/// `_with` 方法的 stage 和 access 各自可以是具体的 flags，也可以是 [`RgSyncMask::Infer`]，
/// 显式给出的字段只替换自己那一项。
pub trait RgTaskBuilder {
    fn task(&mut self) -> &mut RgTaskAccesses;

    fn read(&mut self, handle: impl Into<RgResourceHandle>) -> &mut Self {
        self.task().push(RgAccessRecord::inferred(handle.into(), RgAccessDirection::Read));
        self
    }

    fn write(&mut self, handle: impl Into<RgResourceHandle>) -> &mut Self {
        self.task().push(RgAccessRecord::inferred(handle.into(), RgAccessDirection::Write));
        self
    }

    fn read_write(&mut self, handle: impl Into<RgResourceHandle>) -> &mut Self {
        self.task().push(RgAccessRecord::inferred(handle.into(), RgAccessDirection::ReadWrite));
        self
    }

    fn read_with(
        &mut self,
        handle: impl Into<RgResourceHandle>,
        stages: impl Into<RgSyncMask<vk::PipelineStageFlags2>>,
        access: impl Into<RgSyncMask<vk::AccessFlags2>>,
    ) -> &mut Self {
        self.task().push(RgAccessRecord::new(handle.into(), RgAccessDirection::Read, stages.into(), access.into()));
        self
    }

    fn write_with(
        &mut self,
        handle: impl Into<RgResourceHandle>,
        stages: impl Into<RgSyncMask<vk::PipelineStageFlags2>>,
        access: impl Into<RgSyncMask<vk::AccessFlags2>>,
    ) -> &mut Self {
        self.task().push(RgAccessRecord::new(handle.into(), RgAccessDirection::Write, stages.into(), access.into()));
        self
    }

    fn read_write_with(
        &mut self,
        handle: impl Into<RgResourceHandle>,
        stages: impl Into<RgSyncMask<vk::PipelineStageFlags2>>,
        access: impl Into<RgSyncMask<vk::AccessFlags2>>,
    ) -> &mut Self {
        self.task().push(RgAccessRecord::new(
            handle.into(),
            RgAccessDirection::ReadWrite,
            stages.into(),
            access.into(),
        ));
        self
    }

    /// 显式依赖一个更早声明的 Pass，即使两者没有共享资源
    fn depends_on(&mut self, pass_name: impl Into<String>) -> &mut Self {
        self.task().explicit_dependencies.push(pass_name.into());
        self
    }

    /// 每帧录制时求值，返回 false 时跳过命令录制，不影响调度与同步
    fn execute_if(&mut self, predicate: impl Fn(&RgFrameInfo) -> bool + Send + Sync + 'static) -> &mut Self {
        self.task().should_execute = Some(Box::new(predicate));
        self
    }
}

#[derive(Default)]
pub struct RgGraphicsTaskBuilder {
    task: RgTaskAccesses,
}

impl RgTaskBuilder for RgGraphicsTaskBuilder {
    fn task(&mut self) -> &mut RgTaskAccesses {
        &mut self.task
    }
}

#[derive(Default)]
pub struct RgComputeTaskBuilder {
    task: RgTaskAccesses,
    prefer_async: bool,
}

impl RgComputeTaskBuilder {
    /// 希望在专用 compute 队列上执行；没有可用队列时折叠到 graphics 队列
    pub fn prefer_async(&mut self) -> &mut Self {
        self.prefer_async = true;
        self
    }
}

impl RgTaskBuilder for RgComputeTaskBuilder {
    fn task(&mut self) -> &mut RgTaskAccesses {
        &mut self.task
    }
}

#[derive(Default)]
pub struct RgTransferTaskBuilder {
    task: RgTaskAccesses,
    prefer_async: bool,
}

impl RgTransferTaskBuilder {
    /// 希望在专用 transfer 队列上执行
    pub fn prefer_async(&mut self) -> &mut Self {
        self.prefer_async = true;
        self
    }
}

impl RgTaskBuilder for RgTransferTaskBuilder {
    fn task(&mut self) -> &mut RgTaskAccesses {
        &mut self.task
    }
}

/// setup 完成后的 task builder
pub(crate) enum RgTaskBuilderKind {
    Graphics(RgGraphicsTaskBuilder),
    Compute(RgComputeTaskBuilder),
    Transfer(RgTransferTaskBuilder),
}

impl RgTaskBuilderKind {
    fn work_type(&self) -> RgWorkType {
        match self {
            RgTaskBuilderKind::Graphics(_) => RgWorkType::Graphics,
            RgTaskBuilderKind::Compute(_) => RgWorkType::Compute,
            RgTaskBuilderKind::Transfer(_) => RgWorkType::Transfer,
        }
    }

    fn into_parts(self) -> (RgTaskAccesses, bool) {
        match self {
            RgTaskBuilderKind::Graphics(builder) => (builder.task, false),
            RgTaskBuilderKind::Compute(builder) => (builder.task, builder.prefer_async),
            RgTaskBuilderKind::Transfer(builder) => (builder.task, builder.prefer_async),
        }
    }
}

/// 冻结后的 Pass
pub struct RgPassEntry {
    pub name: String,
    /// 声明顺序，调度中所有自由选择都以它为准
    pub declaration_index: u32,
    pub work_type: RgWorkType,
    pub prefer_async: bool,
    pub accesses: Vec<RgAccessRecord>,
    /// 带写入的访问对应的资源，去重
    pub outputs: Vec<RgResourceHandle>,
    pub explicit_dependencies: Vec<String>,

    pub(crate) callback: RgPassCallback,
    pub(crate) should_execute: Option<RgExecutePredicate>,
}

impl RgPassEntry {
    pub(crate) fn freeze(
        name: String,
        declaration_index: u32,
        builder: RgTaskBuilderKind,
        callback: RgPassCallback,
    ) -> Self {
        let work_type = builder.work_type();
        debug_assert_eq!(work_type, callback.work_type());

        let (task, prefer_async) = builder.into_parts();
        let outputs = task
            .accesses
            .iter()
            .filter(|access| access.direction.has_write())
            .map(|access| access.resource)
            .unique()
            .collect_vec();

        Self {
            name,
            declaration_index,
            work_type,
            prefer_async,
            accesses: task.accesses,
            outputs,
            explicit_dependencies: task.explicit_dependencies,
            callback,
            should_execute: task.should_execute,
        }
    }

    #[inline]
    pub fn has_execute_condition(&self) -> bool {
        self.should_execute.is_some()
    }
}

impl fmt::Debug for RgPassEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RgPassEntry")
            .field("name", &self.name)
            .field("declaration_index", &self.declaration_index)
            .field("work_type", &self.work_type)
            .field("prefer_async", &self.prefer_async)
            .field("accesses", &self.accesses)
            .field("outputs", &self.outputs)
            .field("explicit_dependencies", &self.explicit_dependencies)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_graph::RgResourceKind;

    fn handle(id: u32) -> RgResourceHandle {
        RgResourceHandle::new(1, id, RgResourceKind::Image)
    }

    #[test]
    fn test_outputs_are_write_accesses() {
        let mut builder = RgGraphicsTaskBuilder::default();
        builder.read(handle(1)).write(handle(2)).read_write(handle(3)).write(handle(2));

        let entry = RgPassEntry::freeze(
            "pass".to_string(),
            0,
            RgTaskBuilderKind::Graphics(builder),
            RgPassCallback::Graphics(Box::new(|_: &RgGraphicsContext<'_>| {})),
        );

        assert_eq!(entry.accesses.len(), 4);
        assert_eq!(entry.accesses[0], RgAccessRecord::inferred(handle(1), RgAccessDirection::Read));
        assert_eq!(entry.outputs, vec![handle(2), handle(3)]);
        assert!(!entry.has_execute_condition());
    }

    #[test]
    fn test_hints_are_per_field() {
        let mut builder = RgComputeTaskBuilder::default();
        builder
            .read_with(handle(1), vk::PipelineStageFlags2::DRAW_INDIRECT, RgSyncMask::<vk::AccessFlags2>::Infer)
            .write_with(handle(2), RgSyncMask::<vk::PipelineStageFlags2>::Infer, vk::AccessFlags2::SHADER_WRITE)
            .read_write_with(handle(3), vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE)
            .execute_if(|frame| frame.frame_index > 0);

        let entry = RgPassEntry::freeze(
            "hints".to_string(),
            0,
            RgTaskBuilderKind::Compute(builder),
            RgPassCallback::Compute(Box::new(|_: &RgComputeContext<'_>| {})),
        );

        assert_eq!(entry.accesses[0].stages, RgSyncMask::Exact(vk::PipelineStageFlags2::DRAW_INDIRECT));
        assert_eq!(entry.accesses[0].accesses, RgSyncMask::Infer);
        assert_eq!(entry.accesses[1].stages, RgSyncMask::Infer);
        assert_eq!(entry.accesses[1].accesses, RgSyncMask::Exact(vk::AccessFlags2::SHADER_WRITE));
        assert_eq!(entry.accesses[2].direction, RgAccessDirection::ReadWrite);
        assert_eq!(entry.accesses[2].accesses, RgSyncMask::Exact(vk::AccessFlags2::TRANSFER_WRITE));
        assert!(entry.has_execute_condition());
    }

    #[test]
    fn test_prefer_async_is_recorded() {
        let mut builder = RgComputeTaskBuilder::default();
        builder.prefer_async().read(handle(1)).depends_on("earlier");

        let entry = RgPassEntry::freeze(
            "ssao".to_string(),
            3,
            RgTaskBuilderKind::Compute(builder),
            RgPassCallback::Compute(Box::new(|_: &RgComputeContext<'_>| {})),
        );

        assert!(entry.prefer_async);
        assert_eq!(entry.work_type, RgWorkType::Compute);
        assert_eq!(entry.declaration_index, 3);
        assert_eq!(entry.explicit_dependencies, vec!["earlier".to_string()]);
        assert!(entry.outputs.is_empty());
    }
}

//! 帧图 - 声明式的多队列渲染调度
//!
//! 每帧声明资源和 Pass，编译为按硬件队列划分的提交批次。
//!
//! # 核心概念
//!
//! - **RgResourceHandle**: 虚拟资源句柄，只在一次图构建内有效
//! - **RgTaskBuilder**: Pass 的 setup 阶段用来声明读写访问，stage/access 可以留给编译期推导
//! - **RgGraphBuilder**: 注册资源和 Pass，`compile` 消耗构建器
//! - **RgExecutionPlan**: 编译结果，包含资源创建列表、提交批次、timeline wait/signal
//!
//! # 编译流程
//!
//! 1. 推导每个访问的 stage / access / layout
//! 2. 按声明顺序扫描访问，生成 RAW / WAW / WAR 依赖边
//! 3. Kahn 拓扑排序，声明顺序作为 tie-break
//! 4. 队列分配：`prefer_async` 的 Pass 尽量放到专用队列，否则折叠到 graphics 队列
//! 5. 划分提交批次
//! 6. 跨队列的依赖边生成 timeline signal / wait，资源换到另一种队列时转移所有权
//!
//! # 模块结构
//!
//! - `resource_handle`: 虚拟资源句柄
//! - `resource` / `resource_registry`: 资源条目与注册表
//! - `resource_state`: 访问记录与状态推导
//! - `pass` / `context`: Pass 声明与录制上下文
//! - `graph`: 依赖图和拓扑排序
//! - `scheduler`: 队列分配和批次划分
//! - `synchronizer` / `semaphore_info`: 跨队列同步
//! - `plan`: 执行计划
//! - `builder`: 构建器

mod buffer_resource;
mod builder;
mod context;
mod graph;
mod image_resource;
mod pass;
mod plan;
mod queue;
mod resource;
mod resource_handle;
mod resource_registry;
mod resource_state;
mod scheduler;
mod semaphore_info;
mod synchronizer;

pub use buffer_resource::RgBufferDesc;
pub use builder::RgGraphBuilder;
pub use context::{
    RgComputeContext, RgGraphicsContext, RgPassContext, RgPhysicalResource, RgPhysicalResources, RgTransferContext,
};
pub use graph::{RgDependencyAnalyzer, RgDependencyEdge, RgDependencyGraph, RgHazard};
pub use image_resource::RgImageDesc;
pub use pass::{
    RgComputeRecordFn, RgComputeTaskBuilder, RgExecutePredicate, RgFrameInfo, RgGraphicsRecordFn,
    RgGraphicsTaskBuilder, RgPassEntry, RgTaskAccesses, RgTaskBuilder, RgTransferRecordFn, RgTransferTaskBuilder,
};
pub use plan::{RgExecutionPlan, RgRecordStats, RgScheduledPass, RgSubmission};
pub use queue::{RgQueueCapabilities, RgQueueConfig, RgQueueId, RgWorkType};
pub use resource::{RgExternalResource, RgResourceCreation, RgResourceEntry, RgResourceFlags, RgResourceOrigin};
pub use resource_handle::{RgBufferHandle, RgImageHandle, RgResourceHandle, RgResourceKind, RgSurfaceHandle};
pub use resource_registry::RgResourceRegistry;
pub use resource_state::{RgAccessDirection, RgAccessRecord, RgResolvedAccess, RgResourceState, RgSyncMask};
pub use scheduler::{RgBatch, RgSchedule, RgScheduler};
pub use semaphore_info::{RgOwnershipTransfer, RgTimelineReference};
pub use synchronizer::{RgBatchSync, RgSynchronizer};

//! 硬件队列描述
//!
//! 队列数量由设备层通过 [`RgQueueCapabilities`] 提供，调度器只关心每种工作类型有几个队列实例。

use std::fmt;

use ash::vk;
use serde::Deserialize;

/// Pass 的工作类型，同时也是队列类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RgWorkType {
    Graphics,
    Compute,
    Transfer,
}

impl fmt::Display for RgWorkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RgWorkType::Graphics => "graphics",
            RgWorkType::Compute => "compute",
            RgWorkType::Transfer => "transfer",
        };
        f.write_str(name)
    }
}

/// 一个具体的队列实例：类型 + 该类型下的索引
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RgQueueId {
    pub work_type: RgWorkType,
    pub index: u32,
}

impl RgQueueId {
    /// 主队列，所有无法异步执行的 Pass 都会折叠到这里
    pub const PRIMARY: Self = Self::new(RgWorkType::Graphics, 0);

    #[inline]
    pub const fn new(work_type: RgWorkType, index: u32) -> Self {
        Self { work_type, index }
    }
}

impl fmt::Display for RgQueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.work_type, self.index)
    }
}

/// 设备层的队列能力查询
pub trait RgQueueCapabilities {
    /// 某种工作类型可用的专用队列数量
    fn queue_count(&self, work_type: RgWorkType) -> u32;
}

/// 编译时使用的队列配置
///
/// `compute_queues` 与 `transfer_queues` 指的是独立于 graphics 队列的专用队列。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(default)]
pub struct RgQueueConfig {
    pub graphics_queues: u32,
    pub compute_queues: u32,
    pub transfer_queues: u32,
}

impl Default for RgQueueConfig {
    fn default() -> Self {
        Self::GRAPHICS_ONLY
    }
}

// new & 常量定义
impl RgQueueConfig {
    /// 只有一个 graphics 队列
    pub const GRAPHICS_ONLY: Self = Self::new(1, 0, 0);

    #[inline]
    pub const fn new(graphics_queues: u32, compute_queues: u32, transfer_queues: u32) -> Self {
        Self {
            graphics_queues,
            compute_queues,
            transfer_queues,
        }
    }

    pub fn from_capabilities(caps: &(impl RgQueueCapabilities + ?Sized)) -> Self {
        Self::new(
            caps.queue_count(RgWorkType::Graphics),
            caps.queue_count(RgWorkType::Compute),
            caps.queue_count(RgWorkType::Transfer),
        )
    }
}

// getters
impl RgQueueConfig {
    #[inline]
    pub fn queue_count(&self, work_type: RgWorkType) -> u32 {
        match work_type {
            RgWorkType::Graphics => self.graphics_queues,
            RgWorkType::Compute => self.compute_queues,
            RgWorkType::Transfer => self.transfer_queues,
        }
    }

    #[inline]
    pub fn has_dedicated(&self, work_type: RgWorkType) -> bool {
        work_type != RgWorkType::Graphics && self.queue_count(work_type) > 0
    }
}

impl RgQueueCapabilities for RgQueueConfig {
    fn queue_count(&self, work_type: RgWorkType) -> u32 {
        RgQueueConfig::queue_count(self, work_type)
    }
}

/// 按 Vulkan 队列族分类：
/// - 带 GRAPHICS 的族提供 graphics 队列
/// - 带 COMPUTE 但不带 GRAPHICS 的族提供专用 compute 队列
/// - 只带 TRANSFER 的族提供专用 transfer 队列
impl RgQueueCapabilities for [vk::QueueFamilyProperties] {
    fn queue_count(&self, work_type: RgWorkType) -> u32 {
        self.iter()
            .filter(|family| {
                let flags = family.queue_flags;
                let graphics = flags.contains(vk::QueueFlags::GRAPHICS);
                let compute = flags.contains(vk::QueueFlags::COMPUTE);
                let transfer = flags.contains(vk::QueueFlags::TRANSFER);
                match work_type {
                    RgWorkType::Graphics => graphics,
                    RgWorkType::Compute => compute && !graphics,
                    RgWorkType::Transfer => transfer && !graphics && !compute,
                }
            })
            .map(|family| family.queue_count)
            .sum()
    }
}

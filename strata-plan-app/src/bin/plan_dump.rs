//! 编译示例帧并打印执行计划
//!
//! 用法：`plan_dump [config.toml]`，缺省读取工作区根目录下的 `frame-graph.toml`

use std::path::PathBuf;

use anyhow::Result;
use ash::vk;
use ash::vk::Handle;
use strata_crate_tools::init_log::init_log;
use strata_plan_app::config::PlanAppConfig;
use strata_plan_app::sample_frame::{SampleFrameImports, build_sample_frame};

fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(PlanAppConfig::default_path);
    let config = PlanAppConfig::from_file(&config_path)?;

    init_log(config.log_level()?);
    log::info!("config: {:?}", config_path);

    // 只编译执行计划，不访问设备，导入资源用占位句柄
    let imports = SampleFrameImports {
        swapchain: vk::SwapchainKHR::from_raw(1),
        staging: vk::Buffer::from_raw(1),
    };
    let plan = build_sample_frame(&config.frame, imports).compile(config.queues);
    plan.print_execution_plan();

    Ok(())
}

//! 帧图执行计划查看工具
//!
//! 从 `frame-graph.toml` 读取队列配置，构建一帧示例渲染流程（Z Pre Pass、阴影、异步 SSAO、
//! 不透明与 OIT、Tonemap），编译后打印执行计划。

pub mod config;
pub mod sample_frame;

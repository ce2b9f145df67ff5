//! Strata 帧图编译器
//!
//! 每帧声明 Pass 与资源，编译为按硬件队列划分的提交批次，
//! 并自动推导资源状态与跨队列的 timeline semaphore 同步。

pub mod frame_graph;

//! Lustre 的 Vulkan 封装层
//!
//! 以 `Gfx` 为核心上下文，提供设备、队列、资源、命令与交换链的封装。
//! 所有对象都通过显式的 `&Gfx` 引用创建，不依赖全局状态。

pub mod basic;
pub mod commands;
pub mod foundation;
pub mod gfx;
pub mod pipelines;
pub mod resources;
pub mod swapchain;

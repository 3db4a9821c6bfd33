//! Lustre 的 render graph
//!
//! 每帧重新构建：导入外部资源，声明 pass 的读写集合，
//! compile 时完成依赖分析、拓扑排序、barrier 计算与 queue 分段。
//! 资源的物理生命周期完全由调用者持有，graph 只做引用。

pub mod barrier;
pub mod executor;
pub mod graph;
pub mod handle;
pub mod pass;
pub mod resource;

pub use executor::{CompiledGraph, RenderGraphBuilder, RgSegment};
pub use handle::{RgBufferHandle, RgImageHandle};
pub use pass::{RgPass, RgPassBuilder, RgPassContext, RgQueue};

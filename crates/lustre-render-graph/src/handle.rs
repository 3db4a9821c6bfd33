//! graph 内部的资源句柄
//!
//! 只在单帧的 builder/compiled graph 内有效，与物理资源的生命周期无关。

slotmap::new_key_type! {
    pub struct RgImageHandle;
    pub struct RgBufferHandle;
}

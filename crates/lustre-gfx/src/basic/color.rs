/// debug label 使用的颜色
pub struct LabelColor;
impl LabelColor {
    pub const COLOR_PASS: [f32; 4] = [0.2, 0.6, 0.2, 1.0];
    pub const COLOR_CMD: [f32; 4] = [0.2, 0.2, 0.6, 1.0];
    pub const COLOR_STAGE: [f32; 4] = [0.6, 0.4, 0.2, 1.0];
}

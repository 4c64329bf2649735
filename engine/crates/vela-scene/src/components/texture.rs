/// RGBA8 像素数据，按行紧密排列
#[derive(Clone, Default)]
pub struct Texture {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Texture {
    pub fn new(name: impl Into<String>, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        assert_eq!(
            pixels.len(),
            width as usize * height as usize * 4,
            "texture pixels must be tightly packed RGBA8"
        );
        Self {
            name: name.into(),
            width,
            height,
            pixels,
        }
    }

    /// 1x1 的纯色贴图
    pub fn solid(name: impl Into<String>, rgba: [u8; 4]) -> Self {
        Self::new(name, 1, 1, rgba.to_vec())
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("name", &self.name)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

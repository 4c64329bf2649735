use std::path::{Path, PathBuf};

/// 统一资源路径管理
///
/// 所有路径基于工作区根目录（通过 `CARGO_MANIFEST_DIR` 推导）。
///
/// # 使用示例
/// ```ignore
/// let model = VelaPath::assets_path("Box.gltf");          // assets/Box.gltf
/// let shader = VelaPath::shader_build_path("mesh.vert.spv"); // engine/shader/.build/mesh.vert.spv
/// ```
pub struct VelaPath {}
// 核心路径
impl VelaPath {
    /// 获取工作区根目录
    ///
    /// 本 crate 位于 `engine/crates/vela-crate-tools`，向上三级即为工作区根目录
    pub fn workspace_path() -> PathBuf {
        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        manifest_dir.ancestors().nth(3).unwrap_or(manifest_dir).to_path_buf()
    }

    pub fn engine_path() -> PathBuf {
        Self::workspace_path().join("engine")
    }

    /// 获取 `assets/` 目录下的文件路径
    pub fn assets_path(filename: &str) -> PathBuf {
        Self::workspace_path().join("assets").join(filename)
    }
}
// engine 目录下
impl VelaPath {
    pub fn shader_root_path() -> PathBuf {
        Self::engine_path().join("shader")
    }

    /// 编译后的 SPIR-V 所在的目录
    pub fn shader_build_dir() -> PathBuf {
        Self::shader_root_path().join(".build")
    }

    pub fn shader_build_path(filename: &str) -> PathBuf {
        Self::shader_build_dir().join(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_layout() {
        let workspace = VelaPath::workspace_path();
        assert!(workspace.join("engine").join("crates").join("vela-crate-tools").exists());
        assert!(VelaPath::shader_build_path("a.spv").ends_with("engine/shader/.build/a.spv"));
    }
}

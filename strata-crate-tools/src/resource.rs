use std::path::{Path, PathBuf};

/// 统一路径管理
///
/// 所有路径基于工作区根目录（通过 `CARGO_MANIFEST_DIR` 推导）。
///
/// # 使用示例
/// ```ignore
/// let config = StrataPath::config_path("frame-graph.toml"); // <workspace>/frame-graph.toml
/// ```
pub struct StrataPath {}
impl StrataPath {
    /// 获取工作区根目录
    pub fn workspace_path() -> PathBuf {
        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        manifest_dir.parent().unwrap_or(manifest_dir).to_path_buf()
    }

    /// 工作区根目录下的配置文件
    pub fn config_path(filename: &str) -> PathBuf {
        Self::workspace_path().join(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_contains_manifest() {
        let workspace = StrataPath::workspace_path();
        assert!(workspace.join("Cargo.toml").exists());
        assert_eq!(StrataPath::config_path("a.toml"), workspace.join("a.toml"));
    }
}

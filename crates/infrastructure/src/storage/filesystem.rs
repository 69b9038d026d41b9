//! 基于文件系统的脚本存储
//!
//! 目录布局：
//!
//! ```text
//! <root>/<id>/script.json   描述符
//! <root>/<id>/<entrypoint>  入口文件
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use scriptd_core::{ScriptDescriptor, ScriptError, ScriptResult, ScriptStore};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 描述符文件名
pub const DESCRIPTOR_FILE: &str = "script.json";

pub struct FileScriptStore {
    root: PathBuf,
}

impl FileScriptStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 创建存储并确保根目录存在
    pub async fn open(root: impl Into<PathBuf>) -> ScriptResult<Self> {
        let store = Self::new(root);
        fs::create_dir_all(&store.root).await.map_err(|e| {
            ScriptError::Storage(format!("创建脚本根目录失败 {}: {e}", store.root.display()))
        })?;
        Ok(store)
    }

    fn descriptor_path(&self, id: &str) -> PathBuf {
        self.script_dir(id).join(DESCRIPTOR_FILE)
    }

    async fn read_descriptor(&self, dir: &Path) -> ScriptResult<ScriptDescriptor> {
        let raw = fs::read(dir.join(DESCRIPTOR_FILE)).await?;
        let descriptor: ScriptDescriptor = serde_json::from_slice(&raw)?;

        // 目录名就是脚本ID，二者不一致说明文件被移动过
        let dir_name = dir.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if descriptor.id != dir_name {
            return Err(ScriptError::Serialization(format!(
                "描述符ID {} 与目录名 {} 不一致",
                descriptor.id, dir_name
            )));
        }
        Ok(descriptor)
    }

    /// 先写临时文件再重命名，避免留下写了一半的文件
    async fn write_atomic(&self, path: &Path, content: &[u8]) -> ScriptResult<()> {
        let parent = path
            .parent()
            .ok_or_else(|| ScriptError::Storage(format!("无效的路径: {}", path.display())))?;
        fs::create_dir_all(parent).await?;

        let tmp = parent.join(format!(".{}.tmp", Uuid::new_v4()));
        if let Err(e) = fs::write(&tmp, content).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl ScriptStore for FileScriptStore {
    async fn load_all(&self) -> ScriptResult<Vec<ScriptDescriptor>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("脚本根目录不存在，跳过加载: {}", self.root.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut descriptors = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }

            match self.read_descriptor(&path).await {
                Ok(descriptor) => descriptors.push(descriptor),
                Err(e) => warn!("跳过无法加载的脚本目录 {}: {e}", path.display()),
            }
        }

        descriptors.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        debug!("从 {} 加载了 {} 个脚本", self.root.display(), descriptors.len());
        Ok(descriptors)
    }

    async fn write_descriptor(&self, descriptor: &ScriptDescriptor) -> ScriptResult<()> {
        let content = serde_json::to_vec_pretty(descriptor)?;
        self.write_atomic(&self.descriptor_path(&descriptor.id), &content)
            .await
    }

    async fn write_entrypoint(
        &self,
        descriptor: &ScriptDescriptor,
        content: &[u8],
    ) -> ScriptResult<()> {
        let path = descriptor.entrypoint_path(&self.script_dir(&descriptor.id))?;
        self.write_atomic(&path, content).await
    }

    async fn read_entrypoint(&self, descriptor: &ScriptDescriptor) -> ScriptResult<Vec<u8>> {
        let path = descriptor.entrypoint_path(&self.script_dir(&descriptor.id))?;
        Ok(fs::read(path).await?)
    }

    async fn remove_all(&self, id: &str) -> ScriptResult<()> {
        match fs::remove_dir_all(self.script_dir(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("脚本目录已不存在: {id}");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn script_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scriptd_core::RuntimeKind;

    fn descriptor(id: &str) -> ScriptDescriptor {
        ScriptDescriptor::new(id, format!("script {id}"), RuntimeKind::ManagedScriptProcess)
            .unwrap()
    }

    #[tokio::test]
    async fn test_write_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileScriptStore::open(dir.path()).await.unwrap();

        let d = descriptor("a1");
        store.write_entrypoint(&d, b"echo hi\n").await.unwrap();
        store.write_descriptor(&d).await.unwrap();

        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded, vec![d.clone()]);
        assert_eq!(store.read_entrypoint(&d).await.unwrap(), b"echo hi\n");
        assert!(dir.path().join("a1").join("main.sh").exists());
    }

    #[tokio::test]
    async fn test_load_skips_broken_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileScriptStore::open(dir.path()).await.unwrap();

        store.write_descriptor(&descriptor("good")).await.unwrap();
        std::fs::create_dir_all(dir.path().join("empty")).unwrap();
        std::fs::create_dir_all(dir.path().join("broken")).unwrap();
        std::fs::write(dir.path().join("broken").join(DESCRIPTOR_FILE), b"{not json").unwrap();
        std::fs::write(dir.path().join("stray.txt"), b"x").unwrap();

        let moved = descriptor("original");
        std::fs::create_dir_all(dir.path().join("moved")).unwrap();
        std::fs::write(
            dir.path().join("moved").join(DESCRIPTOR_FILE),
            serde_json::to_vec(&moved).unwrap(),
        )
        .unwrap();

        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "good");
    }

    #[tokio::test]
    async fn test_load_orders_by_creation() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileScriptStore::open(dir.path()).await.unwrap();

        let mut late = descriptor("z-late");
        late.created = 100;
        let mut early = descriptor("y-early");
        early.created = 50;
        store.write_descriptor(&late).await.unwrap();
        store.write_descriptor(&early).await.unwrap();

        let ids: Vec<_> = store
            .load_all()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["y-early", "z-late"]);
    }

    #[tokio::test]
    async fn test_missing_root_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileScriptStore::new(dir.path().join("absent"));
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_all_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileScriptStore::open(dir.path()).await.unwrap();
        let d = descriptor("r1");
        store.write_entrypoint(&d, b"true").await.unwrap();
        store.write_descriptor(&d).await.unwrap();

        store.remove_all("r1").await.unwrap();
        assert!(!dir.path().join("r1").exists());
        store.remove_all("r1").await.unwrap();
    }

    #[tokio::test]
    async fn test_overwrite_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileScriptStore::open(dir.path()).await.unwrap();
        let d = descriptor("t1");
        store.write_entrypoint(&d, b"one").await.unwrap();
        store.write_entrypoint(&d, b"two").await.unwrap();

        assert_eq!(store.read_entrypoint(&d).await.unwrap(), b"two");
        let names: Vec<_> = std::fs::read_dir(dir.path().join("t1"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["main.sh"]);
    }
}

//! 脚本注册表
//!
//! 进程内唯一的脚本索引，以ID为键保存全部描述符，列表按插入顺序返回。
//! 所有修改通过写锁串行化，读操作可以并发。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use scriptd_core::{ScriptDescriptor, ScriptError, ScriptResult, ScriptStore, ScriptSummary};

#[derive(Default)]
struct RegistryInner {
    scripts: HashMap<String, ScriptDescriptor>,
    order: Vec<String>,
}

pub struct ScriptRegistry {
    inner: RwLock<RegistryInner>,
    store: Arc<dyn ScriptStore>,
}

impl ScriptRegistry {
    pub fn new(store: Arc<dyn ScriptStore>) -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            store,
        }
    }

    /// 插入新的描述符，ID已存在时返回 `DuplicateIdentifier`
    pub async fn register(&self, descriptor: ScriptDescriptor) -> ScriptResult<()> {
        let mut inner = self.inner.write().await;
        if inner.scripts.contains_key(&descriptor.id) {
            return Err(ScriptError::DuplicateIdentifier { id: descriptor.id });
        }

        debug!("注册表新增脚本: {}", descriptor.id);
        inner.order.push(descriptor.id.clone());
        inner.scripts.insert(descriptor.id.clone(), descriptor);
        Ok(())
    }

    pub async fn find(&self, id: &str) -> ScriptResult<ScriptDescriptor> {
        self.inner
            .read()
            .await
            .scripts
            .get(id)
            .cloned()
            .ok_or_else(|| ScriptError::not_found(id))
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.inner.read().await.scripts.contains_key(id)
    }

    /// 按插入顺序列出脚本摘要
    pub async fn list(&self) -> Vec<ScriptSummary> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|id| inner.scripts.get(id))
            .map(ScriptDescriptor::summary)
            .collect()
    }

    /// 按插入顺序返回全部描述符
    pub async fn all(&self) -> Vec<ScriptDescriptor> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|id| inner.scripts.get(id).cloned())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.scripts.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// 移除并返回描述符
    pub async fn remove(&self, id: &str) -> ScriptResult<ScriptDescriptor> {
        let mut inner = self.inner.write().await;
        let descriptor = inner
            .scripts
            .remove(id)
            .ok_or_else(|| ScriptError::not_found(id))?;
        inner.order.retain(|existing| existing != id);

        debug!("注册表移除脚本: {}", id);
        Ok(descriptor)
    }

    /// 修改描述符字段，刷新更新时间并持久化
    ///
    /// 修改先作用在副本上，写入存储成功后才替换注册表中的记录。
    pub async fn update<F>(&self, id: &str, mutator: F) -> ScriptResult<ScriptDescriptor>
    where
        F: FnOnce(&mut ScriptDescriptor) + Send,
    {
        let mut inner = self.inner.write().await;
        let current = inner
            .scripts
            .get(id)
            .ok_or_else(|| ScriptError::not_found(id))?;

        let mut updated = current.clone();
        mutator(&mut updated);
        updated.id = current.id.clone();
        updated.created = current.created;
        updated.touch();

        self.store.write_descriptor(&updated).await?;
        inner.scripts.insert(id.to_string(), updated.clone());

        debug!("注册表更新脚本: {}", id);
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scriptd_core::RuntimeKind;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingStore {
        writes: AtomicUsize,
        fail_writes: AtomicBool,
    }

    #[async_trait]
    impl ScriptStore for CountingStore {
        async fn load_all(&self) -> ScriptResult<Vec<ScriptDescriptor>> {
            Ok(Vec::new())
        }

        async fn write_descriptor(&self, _descriptor: &ScriptDescriptor) -> ScriptResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(ScriptError::Storage("磁盘已满".to_string()));
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn write_entrypoint(
            &self,
            _descriptor: &ScriptDescriptor,
            _content: &[u8],
        ) -> ScriptResult<()> {
            Ok(())
        }

        async fn read_entrypoint(&self, _descriptor: &ScriptDescriptor) -> ScriptResult<Vec<u8>> {
            Ok(Vec::new())
        }

        async fn remove_all(&self, _id: &str) -> ScriptResult<()> {
            Ok(())
        }

        fn script_dir(&self, id: &str) -> PathBuf {
            PathBuf::from("/tmp").join(id)
        }
    }

    fn descriptor(id: &str) -> ScriptDescriptor {
        ScriptDescriptor::new(id, format!("脚本{id}"), RuntimeKind::ManagedScriptProcess).unwrap()
    }

    #[tokio::test]
    async fn test_register_and_find() {
        let registry = ScriptRegistry::new(Arc::new(CountingStore::default()));
        let script = descriptor("a");

        registry.register(script.clone()).await.unwrap();

        assert_eq!(registry.find("a").await.unwrap(), script);
        assert!(registry.contains("a").await);
        assert!(matches!(
            registry.find("missing").await,
            Err(ScriptError::NotFound { id }) if id == "missing"
        ));
    }

    #[tokio::test]
    async fn test_duplicate_identifier_rejected() {
        let registry = ScriptRegistry::new(Arc::new(CountingStore::default()));
        registry.register(descriptor("a")).await.unwrap();

        let err = registry.register(descriptor("a")).await.unwrap_err();
        assert!(matches!(err, ScriptError::DuplicateIdentifier { id } if id == "a"));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_list_follows_insertion_order() {
        let registry = ScriptRegistry::new(Arc::new(CountingStore::default()));
        for id in ["c", "a", "b"] {
            registry.register(descriptor(id)).await.unwrap();
        }
        registry.remove("a").await.unwrap();
        registry.register(descriptor("a")).await.unwrap();

        let ids: Vec<String> = registry.list().await.into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
        assert_eq!(registry.list().await[0].name, "脚本c");
    }

    #[tokio::test]
    async fn test_remove() {
        let registry = ScriptRegistry::new(Arc::new(CountingStore::default()));
        registry.register(descriptor("a")).await.unwrap();

        let removed = registry.remove("a").await.unwrap();
        assert_eq!(removed.id, "a");
        assert!(registry.is_empty().await);
        assert!(registry.remove("a").await.is_err());
    }

    #[tokio::test]
    async fn test_update_persists_and_protects_identity() {
        let store = Arc::new(CountingStore::default());
        let registry = ScriptRegistry::new(store.clone());
        let mut original = descriptor("a");
        original.created -= 100;
        original.updated = original.created;
        registry.register(original.clone()).await.unwrap();

        let updated = registry
            .update("a", |d| {
                d.id = "hijack".to_string();
                d.name = "新名字".to_string();
                d.webhook_enabled = true;
            })
            .await
            .unwrap();

        assert_eq!(updated.id, "a");
        assert_eq!(updated.name, "新名字");
        assert!(updated.updated > original.updated);
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
        assert_eq!(registry.find("a").await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_failed_update_leaves_registry_unchanged() {
        let store = Arc::new(CountingStore::default());
        let registry = ScriptRegistry::new(store.clone());
        let original = descriptor("a");
        registry.register(original.clone()).await.unwrap();

        store.fail_writes.store(true, Ordering::SeqCst);
        let err = registry
            .update("a", |d| d.name = "不会保存".to_string())
            .await
            .unwrap_err();

        assert!(matches!(err, ScriptError::Storage(_)));
        assert_eq!(registry.find("a").await.unwrap(), original);
        assert!(registry.update("missing", |_| {}).await.is_err());
    }
}

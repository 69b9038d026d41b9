//! 脚本存储接口定义
//!
//! 引擎只通过这个接口访问持久化层：启动时 `load_all` 一次性加载，之后每次修改写入一次。

use std::path::PathBuf;

use async_trait::async_trait;

use crate::errors::ScriptResult;
use crate::models::ScriptDescriptor;

#[async_trait]
pub trait ScriptStore: Send + Sync {
    /// 加载全部脚本描述符
    ///
    /// 单个脚本的数据损坏不应导致整体失败，实现应跳过并记录警告。
    async fn load_all(&self) -> ScriptResult<Vec<ScriptDescriptor>>;

    /// 写入（覆盖）描述符
    async fn write_descriptor(&self, descriptor: &ScriptDescriptor) -> ScriptResult<()>;

    /// 写入入口文件内容
    async fn write_entrypoint(
        &self,
        descriptor: &ScriptDescriptor,
        content: &[u8],
    ) -> ScriptResult<()>;

    /// 读取入口文件内容
    async fn read_entrypoint(&self, descriptor: &ScriptDescriptor) -> ScriptResult<Vec<u8>>;

    /// 删除脚本的全部存储；目录不存在视为成功
    async fn remove_all(&self, id: &str) -> ScriptResult<()>;

    /// 脚本私有目录
    fn script_dir(&self, id: &str) -> PathBuf;
}

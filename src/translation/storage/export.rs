//! 缓存导出与导入
//!
//! 导出格式为带缩进的 JSON：
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "exported_at": "2024-01-01T00:00:00Z",
//!   "entries": [{ "key": "<指纹>:es_ES", "value": "Hola" }],
//!   "metadata": { "source": "docs" }
//! }
//! ```

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::TranslationCache;
use crate::translation::error::{TranslationError, TranslationResult};

/// 当前导出格式版本
pub const EXPORT_FORMAT_VERSION: &str = "1.0";

/// 单个缓存条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportEntry {
    pub key: String,
    pub value: String,
}

/// 导出文件内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportData {
    pub version: String,
    pub exported_at: String,
    pub entries: Vec<ExportEntry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// 导入结果统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub version: String,
    pub metadata: BTreeMap<String, String>,
    pub imported: usize,
    pub failed: usize,
}

/// 缓存导出器
pub struct CacheExporter {
    cache: Arc<dyn TranslationCache>,
}

impl CacheExporter {
    pub fn new(cache: Arc<dyn TranslationCache>) -> Self {
        Self { cache }
    }

    /// 收集缓存中的有效条目
    pub async fn snapshot(&self, metadata: BTreeMap<String, String>) -> TranslationResult<ExportData> {
        let entries = self
            .cache
            .entries()
            .await?
            .into_iter()
            .map(|(key, value)| ExportEntry { key, value })
            .collect();

        Ok(ExportData {
            version: EXPORT_FORMAT_VERSION.to_string(),
            exported_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            entries,
            metadata,
        })
    }

    /// 以 JSON 写入任意输出，返回导出条目数
    pub async fn export<W: Write>(
        &self,
        mut writer: W,
        metadata: BTreeMap<String, String>,
    ) -> TranslationResult<usize> {
        let data = self.snapshot(metadata).await?;
        serde_json::to_writer_pretty(&mut writer, &data)?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        tracing::info!(
            "已从缓存 {} 导出 {} 条译文",
            self.cache.name(),
            data.entries.len()
        );
        Ok(data.entries.len())
    }

    /// 导出到文件
    pub async fn export_to_file(
        &self,
        path: impl AsRef<Path>,
        metadata: BTreeMap<String, String>,
    ) -> TranslationResult<usize> {
        let mut buffer = Vec::new();
        let count = self.export(&mut buffer, metadata).await?;
        tokio::fs::write(path.as_ref(), buffer)
            .await
            .map_err(|e| TranslationError::Io(format!("{}: {}", path.as_ref().display(), e)))?;
        Ok(count)
    }
}

/// 缓存导入器
pub struct CacheImporter {
    cache: Arc<dyn TranslationCache>,
}

impl CacheImporter {
    pub fn new(cache: Arc<dyn TranslationCache>) -> Self {
        Self { cache }
    }

    /// 从 JSON 输入导入
    ///
    /// JSON 格式错误直接返回错误；单个条目写入失败只计入 `failed`。
    pub async fn import<R: Read>(&self, reader: R) -> TranslationResult<ImportReport> {
        let data: ExportData = serde_json::from_reader(reader)?;
        self.load(data).await
    }

    /// 从文件导入
    pub async fn import_from_file(&self, path: impl AsRef<Path>) -> TranslationResult<ImportReport> {
        let bytes = tokio::fs::read(path.as_ref())
            .await
            .map_err(|e| TranslationError::Io(format!("{}: {}", path.as_ref().display(), e)))?;
        self.import(bytes.as_slice()).await
    }

    /// 写入已解析的导出数据
    pub async fn load(&self, data: ExportData) -> TranslationResult<ImportReport> {
        if data.version != EXPORT_FORMAT_VERSION {
            tracing::warn!(
                "导入文件版本 {} 与当前版本 {} 不一致，继续导入",
                data.version,
                EXPORT_FORMAT_VERSION
            );
        }

        let mut report = ImportReport {
            version: data.version,
            metadata: data.metadata,
            ..Default::default()
        };

        for entry in data.entries {
            match self.cache.set(&entry.key, &entry.value).await {
                Ok(()) => report.imported += 1,
                Err(e) => {
                    tracing::warn!("导入条目 {} 失败: {}", entry.key, e);
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            "导入完成: 成功 {} 条，失败 {} 条",
            report.imported,
            report.failed
        );
        Ok(report)
    }
}

//! 缓存批量查询
//!
//! 按唯一指纹查询缓存，得到命中的译文和按首次出现顺序排列的未命中单元。
//! 并行与顺序两种方式的结果完全相同。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::translation::core::fingerprint::cache_key;
use crate::translation::core::types::TextUnit;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::storage::TranslationCache;

/// 查询结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupOutcome {
    /// 指纹 → 缓存中的译文
    pub hits: HashMap<String, String>,
    /// 未命中的单元，每个指纹只保留第一次出现的单元
    pub misses: Vec<TextUnit>,
}

/// 每个指纹第一次出现的单元
fn unique_units(units: &[TextUnit]) -> Vec<&TextUnit> {
    let mut seen = HashSet::new();
    units
        .iter()
        .filter(|unit| seen.insert(unit.fingerprint.as_str()))
        .collect()
}

fn collect_misses(unique: &[&TextUnit], hits: &HashMap<String, String>) -> Vec<TextUnit> {
    unique
        .iter()
        .filter(|unit| !hits.contains_key(&unit.fingerprint))
        .map(|unit| (*unit).clone())
        .collect()
}

/// 并行查询，使用 `指纹:目标语言` 作为键
pub async fn parallel_cache_lookup(
    cache: &Arc<dyn TranslationCache>,
    units: &[TextUnit],
    target_lang: &str,
    cancel: &CancellationToken,
) -> TranslationResult<LookupOutcome> {
    parallel_lookup_with(cache, units, |fp| cache_key(fp, target_lang), cancel).await
}

/// 并行查询，自定义缓存键
///
/// 每个唯一指纹一个任务，结果以任意顺序汇总。
pub async fn parallel_lookup_with<K>(
    cache: &Arc<dyn TranslationCache>,
    units: &[TextUnit],
    key_of: K,
    cancel: &CancellationToken,
) -> TranslationResult<LookupOutcome>
where
    K: Fn(&str) -> String,
{
    let unique = unique_units(units);
    let mut tasks = JoinSet::new();

    for unit in &unique {
        let cache = Arc::clone(cache);
        let fingerprint = unit.fingerprint.clone();
        let key = key_of(&fingerprint);
        tasks.spawn(async move {
            let value = cache.get(&key).await;
            (fingerprint, value)
        });
    }

    let mut hits = HashMap::new();
    loop {
        let joined = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tasks.abort_all();
                return Err(TranslationError::Cancelled);
            }
            joined = tasks.join_next() => joined,
        };

        match joined {
            Some(Ok((fingerprint, Some(value)))) => {
                hits.insert(fingerprint, value);
            }
            Some(Ok((_, None))) => {}
            Some(Err(e)) => {
                // 任务异常按未命中处理
                tracing::warn!("缓存查询任务失败: {}", e);
            }
            None => break,
        }
    }

    let misses = collect_misses(&unique, &hits);
    Ok(LookupOutcome { hits, misses })
}

/// 顺序查询，使用 `指纹:目标语言` 作为键
pub async fn sequential_cache_lookup(
    cache: &Arc<dyn TranslationCache>,
    units: &[TextUnit],
    target_lang: &str,
    cancel: &CancellationToken,
) -> TranslationResult<LookupOutcome> {
    sequential_lookup_with(cache, units, |fp| cache_key(fp, target_lang), cancel).await
}

/// 顺序查询，自定义缓存键
pub async fn sequential_lookup_with<K>(
    cache: &Arc<dyn TranslationCache>,
    units: &[TextUnit],
    key_of: K,
    cancel: &CancellationToken,
) -> TranslationResult<LookupOutcome>
where
    K: Fn(&str) -> String,
{
    let unique = unique_units(units);
    let mut hits = HashMap::new();

    for unit in &unique {
        let key = key_of(&unit.fingerprint);
        let value = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TranslationError::Cancelled),
            value = cache.get(&key) => value,
        };
        if let Some(value) = value {
            hits.insert(unit.fingerprint.clone(), value);
        }
    }

    let misses = collect_misses(&unique, &hits);
    Ok(LookupOutcome { hits, misses })
}

//! 翻译管道模块
//!
//! 批量解析之前的缓存查询阶段

pub mod lookup;

// 重新导出主要类型
pub use lookup::{
    parallel_cache_lookup, parallel_lookup_with, sequential_cache_lookup, sequential_lookup_with,
    LookupOutcome,
};

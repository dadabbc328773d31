//! translayer 命令行入口

use std::collections::BTreeMap;
use std::fs;
use std::future::Future;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use translayer::env::{core as env_core, EnvVar};
use translayer::translation::config::{AppConfig, CacheBackend, ConfigManager, ProviderKind};
use translayer::translation::core::{diff, TextUnit, TranslationStyle};
use translayer::translation::error::{TranslationError, TranslationResult};
use translayer::translation::processor::{default_processors, ContentProcessor};
use translayer::translation::provider::{
    MockBackend, OpenAiBackend, RateLimitedBackend, RetryingBackend, TranslationBackend,
};
use translayer::translation::storage::{CacheExporter, CacheImporter, LocalCache, TranslationCache};
use translayer::translation::TranslationService;

#[derive(Parser)]
#[command(name = "translayer")]
#[command(about = "Translate HTML documents and source code through AI backends with fingerprint caching", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (default: search translayer.toml, .translayer.toml, ~/.config/translayer/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON instead of plain output
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a document
    Translate(TranslateArgs),

    /// List the translatable units of a document without translating
    DryRun(InputArgs),

    /// Compare the translatable units of two versions of a document
    Diff {
        /// Previous version
        old: PathBuf,

        /// New version
        new: PathBuf,

        /// Content type (html, go, rust, c, java, javascript, typescript)
        #[arg(short = 't', long = "type")]
        content_type: Option<String>,

        /// Input encoding label, e.g. utf-8, windows-1252, shift_jis
        #[arg(long, default_value = "utf-8")]
        encoding: String,
    },

    /// Cache export and import
    #[command(subcommand)]
    Cache(CacheCommands),
}

#[derive(Args)]
struct InputArgs {
    /// Input file (default: stdin)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Content type (default: inferred from the file extension, else html)
    #[arg(short = 't', long = "type")]
    content_type: Option<String>,

    /// Input encoding label, e.g. utf-8, windows-1252, shift_jis
    #[arg(long, default_value = "utf-8")]
    encoding: String,
}

#[derive(Args)]
struct TranslateArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Target language, e.g. es, pt-BR, zh_CN
    #[arg(long = "to")]
    target_lang: Option<String>,

    /// Source language (default: en)
    #[arg(long = "from")]
    source_lang: Option<String>,

    /// Translation backend: openai, mock
    #[arg(long)]
    backend: Option<ProviderKind>,

    /// Model name for the OpenAI-compatible backend
    #[arg(long)]
    model: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long)]
    base_url: Option<String>,

    /// Translation style: neutral, formal, casual, technical, marketing
    #[arg(long)]
    style: Option<TranslationStyle>,

    /// Description of the whole document passed to the backend
    #[arg(long)]
    context: Option<String>,

    /// Terms that must not be translated (comma-separated)
    #[arg(long = "exclude", value_delimiter = ',')]
    excluded_terms: Vec<String>,

    /// Glossary entry TERM=TRANSLATION (repeatable)
    #[arg(long = "glossary", value_parser = parse_key_val)]
    glossary: Vec<(String, String)>,

    /// Cache backend: none, memory, redis
    #[arg(long)]
    cache: Option<CacheBackend>,

    /// Load the memory cache from this file before translating and save it afterwards
    #[arg(long)]
    cache_file: Option<PathBuf>,

    /// Give up after this many seconds
    #[arg(long)]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Export the configured cache to a JSON file
    Export {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import entries from a JSON export into the configured cache
    Import {
        /// Export file
        input: PathBuf,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid TERM=TRANSLATION: no `=` found in `{}`", s))?;
    Ok((key.trim().to_string(), value.trim().to_string()))
}

// ============================================================================
// 入口
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("错误: 无法创建异步运行时: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("错误: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// 日志输出到 stderr：`--verbose` 优先，其次 `TRANSLAYER_LOG_LEVEL`，最后 `RUST_LOG`
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("translayer=debug")
    } else if let Ok(Some(level)) = env_core::LogLevel::get_optional() {
        EnvFilter::new(format!("translayer={}", level))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let no_color = env_core::NoColor::get().unwrap_or(false);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(!no_color)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> TranslationResult<()> {
    match cli.command {
        Commands::Translate(args) => {
            let config = load_config(cli.config.as_deref())?;
            translate(config, args, cli.json).await
        }
        Commands::DryRun(args) => dry_run(args, cli.json),
        Commands::Diff {
            old,
            new,
            content_type,
            encoding,
        } => diff_files(&old, &new, content_type, &encoding, cli.json),
        Commands::Cache(command) => {
            let config = load_config(cli.config.as_deref())?;
            cache_command(config, command, cli.json).await
        }
    }
}

fn load_config(path: Option<&Path>) -> TranslationResult<AppConfig> {
    let manager = match path {
        Some(path) => ConfigManager::from_file(path)?,
        None => ConfigManager::new()?,
    };
    Ok(manager.into_config())
}

// ============================================================================
// translate
// ============================================================================

async fn translate(mut config: AppConfig, args: TranslateArgs, json: bool) -> TranslationResult<()> {
    apply_translate_flags(&mut config, &args);
    config.validate()?;

    let (content, content_type) = read_input(&args.input)?;

    let cache = build_cache(&config).await?;
    run_with_cache(cache, |cache| {
        translate_with_cache(&config, &args, &content, &content_type, cache, json)
    })
    .await
}

async fn translate_with_cache(
    config: &AppConfig,
    args: &TranslateArgs,
    content: &str,
    content_type: &str,
    cache: Option<Arc<dyn TranslationCache>>,
    json: bool,
) -> TranslationResult<()> {
    if let (Some(path), Some(cache)) = (&args.cache_file, &cache) {
        if path.exists() {
            let report = CacheImporter::new(Arc::clone(cache)).import_from_file(path).await?;
            tracing::info!("从 {} 导入 {} 条缓存", path.display(), report.imported);
        }
    }

    let backend = build_backend(config)?;
    let service = TranslationService::new(backend, config.translator_config(cache.clone()))?;

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    let result = match config.timeout() {
        Some(timeout) => {
            service
                .process_with_timeout(&cancel, content, content_type, timeout)
                .await?
        }
        None => service.process(&cancel, content, content_type).await?,
    };

    if let (Some(path), Some(cache)) = (&args.cache_file, &cache) {
        let mut metadata = BTreeMap::new();
        metadata.insert("target_lang".to_string(), config.translation.target_lang.clone());
        CacheExporter::new(Arc::clone(cache))
            .export_to_file(path, metadata)
            .await?;
    }

    eprintln!(
        "{} 个单元: 翻译 {}, 缓存 {}",
        result.total_units, result.translated_count, result.cached_count
    );

    if json {
        write_output(args.output.as_deref(), &to_json(&result)?)
    } else {
        write_output(args.output.as_deref(), &result.content)
    }
}

fn apply_translate_flags(config: &mut AppConfig, args: &TranslateArgs) {
    let t = &mut config.translation;
    if let Some(target) = &args.target_lang {
        t.target_lang = target.clone();
    }
    if let Some(source) = &args.source_lang {
        t.source_lang = source.clone();
    }
    if let Some(style) = args.style {
        t.style = style;
    }
    if let Some(context) = &args.context {
        t.context = context.clone();
    }
    t.excluded_terms.extend(args.excluded_terms.iter().cloned());
    t.glossary.extend(args.glossary.iter().cloned());
    if let Some(timeout) = args.timeout {
        t.timeout_secs = timeout;
    }

    let p = &mut config.provider;
    if let Some(kind) = args.backend {
        p.kind = kind;
    }
    if let Some(model) = &args.model {
        p.model = model.clone();
    }
    if let Some(base_url) = &args.base_url {
        p.base_url = base_url.trim_end_matches('/').to_string();
    }

    if let Some(cache) = args.cache {
        config.cache.backend = cache;
    }
}

/// 后端外层依次为重试、限速
fn build_backend(config: &AppConfig) -> TranslationResult<Arc<dyn TranslationBackend>> {
    let mut backend: Arc<dyn TranslationBackend> = match config.provider.kind {
        ProviderKind::Mock => Arc::new(MockBackend::new()),
        ProviderKind::OpenAi => Arc::new(OpenAiBackend::new(config.openai_config()?)?),
    };

    if let Some(rate_limit) = config.rate_limit_config() {
        backend = Arc::new(RateLimitedBackend::new(backend, rate_limit));
    }

    Ok(Arc::new(RetryingBackend::new(backend, config.retry_config())))
}

async fn build_cache(config: &AppConfig) -> TranslationResult<Option<Arc<dyn TranslationCache>>> {
    match config.cache.backend {
        CacheBackend::None => Ok(None),
        CacheBackend::Memory => {
            let mut cache = LocalCache::new(config.cache_ttl());
            if config.cache.max_entries > 0 {
                cache = cache.with_max_entries(config.cache.max_entries);
            }
            Ok(Some(Arc::new(cache)))
        }
        CacheBackend::Redis => connect_redis(config).await,
    }
}

#[cfg(feature = "redis-cache")]
async fn connect_redis(config: &AppConfig) -> TranslationResult<Option<Arc<dyn TranslationCache>>> {
    let cache = translayer::translation::storage::RedisCache::connect(config.redis_config()).await?;
    Ok(Some(Arc::new(cache)))
}

#[cfg(not(feature = "redis-cache"))]
async fn connect_redis(_config: &AppConfig) -> TranslationResult<Option<Arc<dyn TranslationCache>>> {
    Err(TranslationError::Config(
        "未启用 redis-cache 特性，无法使用 Redis 缓存".to_string(),
    ))
}

/// 执行操作后关闭缓存，操作失败时同样关闭
async fn run_with_cache<T, F, Fut>(cache: Option<Arc<dyn TranslationCache>>, op: F) -> TranslationResult<T>
where
    F: FnOnce(Option<Arc<dyn TranslationCache>>) -> Fut,
    Fut: Future<Output = TranslationResult<T>>,
{
    let result = op(cache.clone()).await;
    if let Some(cache) = &cache {
        cache.close().await;
    }
    result
}

fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("收到中断信号，正在取消");
            cancel.cancel();
        }
    });
}

// ============================================================================
// dry-run / diff
// ============================================================================

#[derive(Serialize)]
struct DryRunReport<'a> {
    content_type: &'a str,
    total_units: usize,
    unique_units: usize,
    units: &'a [TextUnit],
}

fn dry_run(args: InputArgs, json: bool) -> TranslationResult<()> {
    let (content, content_type) = read_input(&args)?;
    let processor = find_processor(&content_type)?;
    let (_, units) = processor.extract(&content)?;

    let unique_units = units
        .iter()
        .map(|u| u.fingerprint.as_str())
        .collect::<std::collections::HashSet<_>>()
        .len();

    if json {
        let report = DryRunReport {
            content_type: &content_type,
            total_units: units.len(),
            unique_units,
            units: &units,
        };
        return write_output(None, &to_json(&report)?);
    }

    let mut out = String::new();
    for unit in &units {
        out.push_str(&format!("{}\t{}\t{}\n", unit.id, unit.unit_type, unit.text));
    }
    out.push_str(&format!(
        "{} units ({} unique)\n",
        units.len(),
        unique_units
    ));
    write_output(None, &out)
}

fn diff_files(
    old: &Path,
    new: &Path,
    content_type: Option<String>,
    encoding: &str,
    json: bool,
) -> TranslationResult<()> {
    let content_type = content_type.unwrap_or_else(|| infer_content_type(Some(new)));
    let processor = find_processor(&content_type)?;

    let (_, old_units) = processor.extract(&decode(&read_file(old)?, encoding)?)?;
    let (_, new_units) = processor.extract(&decode(&read_file(new)?, encoding)?)?;
    let result = diff(&old_units, &new_units);

    if json {
        return write_output(None, &to_json(&result)?);
    }

    let mut out = String::new();
    for unit in &result.added {
        out.push_str(&format!("+ {}\n", unit.text));
    }
    for unit in &result.removed {
        out.push_str(&format!("- {}\n", unit.text));
    }
    for modified in &result.modified {
        out.push_str(&format!("~ {} -> {}\n", modified.old.text, modified.new.text));
    }
    let stats = result.stats();
    out.push_str(&format!(
        "added: {}, removed: {}, modified: {}, unchanged: {}\n",
        stats.added, stats.removed, stats.modified, stats.unchanged
    ));
    write_output(None, &out)
}

// ============================================================================
// cache
// ============================================================================

async fn cache_command(config: AppConfig, command: CacheCommands, json: bool) -> TranslationResult<()> {
    if config.cache.backend != CacheBackend::Redis {
        return Err(TranslationError::Config(
            "缓存导出和导入需要共享缓存，请设置 cache.backend = \"redis\"；内存缓存请使用 translate --cache-file".to_string(),
        ));
    }

    let cache = build_cache(&config)
        .await?
        .ok_or_else(|| TranslationError::Config("未配置缓存".to_string()))?;

    run_with_cache(Some(Arc::clone(&cache)), |_| run_cache_command(cache, command, json)).await
}

async fn run_cache_command(
    cache: Arc<dyn TranslationCache>,
    command: CacheCommands,
    json: bool,
) -> TranslationResult<()> {
    match command {
        CacheCommands::Export { output } => {
            let mut buffer = Vec::new();
            let count = CacheExporter::new(cache).export(&mut buffer, BTreeMap::new()).await?;
            let text = String::from_utf8_lossy(&buffer);
            write_output(output.as_deref(), &text)?;
            eprintln!("导出 {} 条缓存", count);
            Ok(())
        }
        CacheCommands::Import { input } => {
            let report = CacheImporter::new(cache).import_from_file(&input).await?;
            if json {
                write_output(None, &to_json(&report)?)
            } else {
                write_output(
                    None,
                    &format!("imported: {}, failed: {}\n", report.imported, report.failed),
                )
            }
        }
    }
}

// ============================================================================
// 输入输出
// ============================================================================

fn find_processor(content_type: &str) -> TranslationResult<Arc<dyn ContentProcessor>> {
    default_processors()?
        .remove(content_type)
        .ok_or_else(|| TranslationError::NoProcessor(content_type.to_string()))
}

/// 根据扩展名推断内容类型，无法推断时为 html
fn infer_content_type(path: Option<&Path>) -> String {
    let ext = path
        .and_then(|p| p.extension())
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    let content_type = match ext.as_deref() {
        Some("go") => "go",
        Some("rs") => "rust",
        Some("c" | "h" | "cc" | "cpp" | "hpp") => "c",
        Some("java") => "java",
        Some("js" | "mjs" | "cjs" | "jsx") => "javascript",
        Some("ts" | "tsx" | "mts") => "typescript",
        _ => "html",
    };
    content_type.to_string()
}

fn read_input(args: &InputArgs) -> TranslationResult<(String, String)> {
    let bytes = match &args.input {
        Some(path) => read_file(path)?,
        None => {
            let mut buffer = Vec::new();
            io::stdin().read_to_end(&mut buffer)?;
            buffer
        }
    };

    let content = decode(&bytes, &args.encoding)?;
    let content_type = args
        .content_type
        .clone()
        .unwrap_or_else(|| infer_content_type(args.input.as_deref()));
    Ok((content, content_type))
}

fn read_file(path: &Path) -> TranslationResult<Vec<u8>> {
    fs::read(path).map_err(|e| TranslationError::Io(format!("{}: {}", path.display(), e)))
}

/// 按编码标签解码，BOM 优先
fn decode(bytes: &[u8], label: &str) -> TranslationResult<String> {
    let encoding = encoding_rs::Encoding::for_label(label.as_bytes())
        .ok_or_else(|| TranslationError::Config(format!("未知的编码: {}", label)))?;

    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::warn!("输入中存在无法按 {} 解码的字节", used.name());
    }
    Ok(text.into_owned())
}

fn write_output(path: Option<&Path>, content: &str) -> TranslationResult<()> {
    match path {
        Some(path) => {
            fs::write(path, content).map_err(|e| TranslationError::Io(format!("{}: {}", path.display(), e)))
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            if !content.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
            stdout.flush()?;
            Ok(())
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> TranslationResult<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

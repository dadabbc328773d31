//! 命令行集成测试
//!
//! 只使用模拟后端，不访问网络

#![cfg(all(feature = "cli", feature = "openai"))]

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use tempfile::TempDir;

const PAGE: &str = "<html><head></head><body><h1>Hello</h1><p>World</p><p>Hello</p></body></html>";

/// 在空目录中运行，避免读到本机的配置文件和环境变量
fn translayer(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("translayer").unwrap();
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env("NO_COLOR", "1")
        .env_remove("OPENAI_API_KEY")
        .env_remove("TRANSLAYER_TARGET_LANG")
        .env_remove("TRANSLAYER_SOURCE_LANG")
        .env_remove("TRANSLAYER_BACKEND")
        .env_remove("TRANSLAYER_CACHE")
        .env_remove("TRANSLAYER_TIMEOUT")
        .env_remove("TRANSLAYER_LOG_LEVEL");
    cmd
}

fn workspace() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("page.html"), PAGE).unwrap();
    dir
}

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn test_version() {
    let dir = workspace();
    let assert = translayer(dir.path()).arg("--version").assert().success();
    assert!(stdout_of(assert.get_output()).contains("translayer"));
    println!("✅ 版本信息通过");
}

#[test]
fn test_dry_run_lists_units() {
    let dir = workspace();
    let assert = translayer(dir.path())
        .args(["dry-run", "--input", "page.html"])
        .assert()
        .success();

    let stdout = stdout_of(assert.get_output());
    assert!(stdout.contains("Hello"));
    assert!(stdout.contains("World"));
    assert!(stdout.contains("3 units (2 unique)"));
    println!("✅ dry-run 通过");
}

#[test]
fn test_translate_with_mock_backend() {
    let dir = workspace();
    let assert = translayer(dir.path())
        .args(["translate", "--input", "page.html", "--to", "es", "--backend", "mock"])
        .assert()
        .success();

    let stdout = stdout_of(assert.get_output());
    assert!(stdout.contains("<h1>Hola</h1>"));
    assert!(stdout.contains("<p>Mundo</p><p>Hola</p>"));
    println!("✅ 模拟后端翻译通过");
}

#[test]
fn test_translate_reads_stdin_and_writes_file() {
    let dir = workspace();
    translayer(dir.path())
        .args(["translate", "--to", "es", "--backend", "mock", "--output", "out.html"])
        .write_stdin(PAGE)
        .assert()
        .success();

    let output = fs::read_to_string(dir.path().join("out.html")).unwrap();
    assert!(output.contains("<h1>Hola</h1>"));
    println!("✅ 标准输入和输出文件通过");
}

#[test]
fn test_cache_file_persists_between_runs() {
    let dir = workspace();
    let args = [
        "translate",
        "--input",
        "page.html",
        "--to",
        "es",
        "--backend",
        "mock",
        "--cache",
        "memory",
        "--cache-file",
        "cache.json",
    ];

    let first = translayer(dir.path()).args(args).assert().success();
    assert!(stderr_of(first.get_output()).contains("翻译 2, 缓存 0"));
    assert!(dir.path().join("cache.json").exists());

    let second = translayer(dir.path()).args(args).assert().success();
    assert!(stderr_of(second.get_output()).contains("翻译 0, 缓存 3"));
    assert!(stdout_of(second.get_output()).contains("<h1>Hola</h1>"));
    println!("✅ 缓存文件持久化通过");
}

#[test]
fn test_translate_json_output() {
    let dir = workspace();
    let assert = translayer(dir.path())
        .args(["--json", "translate", "--input", "page.html", "--to", "es", "--backend", "mock"])
        .assert()
        .success();

    let value: serde_json::Value = serde_json::from_str(&stdout_of(assert.get_output())).unwrap();
    assert_eq!(value["total_units"], 3);
    assert_eq!(value["translated_count"], 2);
    assert!(value["content"].as_str().unwrap().contains("<h1>Hola</h1>"));
    println!("✅ JSON 输出通过");
}

#[test]
fn test_same_language_returns_input() {
    let dir = workspace();
    let assert = translayer(dir.path())
        .args(["translate", "--input", "page.html", "--to", "en_US", "--backend", "mock"])
        .assert()
        .success();

    assert!(stdout_of(assert.get_output()).contains(PAGE));
    println!("✅ 同语言原样输出通过");
}

#[test]
fn test_missing_target_language_fails() {
    let dir = workspace();
    let assert = translayer(dir.path())
        .args(["translate", "--input", "page.html", "--backend", "mock"])
        .assert()
        .failure();

    assert!(stderr_of(assert.get_output()).contains("目标语言不能为空"));
    println!("✅ 缺少目标语言通过");
}

#[test]
fn test_go_source_inferred_from_extension() {
    let dir = workspace();
    fs::write(
        dir.path().join("main.go"),
        "package main\n\n// Hello\nfunc main() {}\n",
    )
    .unwrap();

    let assert = translayer(dir.path())
        .args(["translate", "--input", "main.go", "--to", "es", "--backend", "mock"])
        .assert()
        .success();

    let stdout = stdout_of(assert.get_output());
    assert!(stdout.contains("// Hola\n"));
    assert!(stdout.contains("func main() {}"));
    println!("✅ Go 源码推断通过");
}

#[test]
fn test_diff_command() {
    let dir = workspace();
    fs::write(
        dir.path().join("new.html"),
        "<html><head></head><body><h1>Hello</h1><p>Everyone</p></body></html>",
    )
    .unwrap();

    let assert = translayer(dir.path())
        .args(["diff", "page.html", "new.html"])
        .assert()
        .success();

    let stdout = stdout_of(assert.get_output());
    assert!(stdout.contains("~ World -> Everyone"));
    assert!(stdout.contains("modified: 1"));
    println!("✅ diff 命令通过");
}

#[test]
fn test_cache_export_requires_redis() {
    let dir = workspace();
    let assert = translayer(dir.path())
        .args(["cache", "export"])
        .assert()
        .failure();

    assert!(stderr_of(assert.get_output()).contains("--cache-file"));
    println!("✅ 缓存导出需要 Redis 通过");
}

#[test]
fn test_unknown_content_type() {
    let dir = workspace();
    let assert = translayer(dir.path())
        .args(["dry-run", "--input", "page.html", "--type", "markdown"])
        .assert()
        .failure();

    assert!(stderr_of(assert.get_output()).contains("markdown"));
    println!("✅ 未知内容类型通过");
}

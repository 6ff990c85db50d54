// Job Insight - Build Task Runner
// Unified build system using cargo xtask pattern

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use xshell::{Shell, cmd};

const PACKAGE: &str = "job-insight";

fn main() -> Result<()> {
    let sh = Shell::new()?;
    sh.change_dir(project_root());
    let args: Vec<_> = std::env::args().skip(1).collect();
    let flag = |name: &str| args.iter().any(|a| a == name);

    match args.first().map(|s| s.as_str()) {
        Some("build") => build(&sh, flag("--release")),
        Some("test") => test(&sh),
        Some("format") => format(&sh, flag("--check")),
        Some("clippy") => clippy(&sh),
        Some("run") => run(&sh, &args[1..]),
        Some("sample") => sample(&sh),
        Some("clean") => clean(&sh),
        Some("coverage") => coverage(&sh),
        Some("ci") => ci(&sh),
        Some("dist") => dist(&sh),
        _ => {
            print_help();
            Ok(())
        },
    }
}

fn print_help() {
    println!("Job Insight - Build Commands:");
    println!();
    println!("Usage: cargo xtask <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  build [--release]   Build the analyzer");
    println!("  test                Run all tests");
    println!("  format [--check]    Format code (check mode doesn't modify)");
    println!("  clippy              Run clippy checks");
    println!("  run [ARGS...]       Run job-insight with the given arguments");
    println!("  sample              Analyze the bundled test fixtures");
    println!("  clean               Clean build artifacts");
    println!("  coverage            Generate test coverage report");
    println!("  ci                  Run all CI checks (format + clippy + build + test)");
    println!("  dist                Create distribution package (tar.gz)");
    println!();
    println!("Examples:");
    println!("  cargo xtask run -- --plan plan.xml --runtime stats.xml");
    println!("  cargo xtask format --check");
}

fn build(sh: &Shell, release: bool) -> Result<()> {
    println!("🔨 Building {}{}...", PACKAGE, if release { " (release)" } else { "" });
    if release {
        cmd!(sh, "cargo build --release -p {PACKAGE}")
            .run()
            .context("Failed to build in release mode")?;
    } else {
        cmd!(sh, "cargo build -p {PACKAGE}").run().context("Failed to build")?;
    }
    println!("✅ Build complete");
    Ok(())
}

fn test(sh: &Shell) -> Result<()> {
    println!("🧪 Running tests...");
    cmd!(sh, "cargo test --workspace").run().context("Tests failed")?;
    println!("✅ All tests passed!");
    Ok(())
}

fn format(sh: &Shell, check: bool) -> Result<()> {
    if check {
        cmd!(sh, "cargo fmt --all -- --check")
            .run()
            .context("Rust code is not formatted")?;
        println!("✅ Rust code is properly formatted");
    } else {
        cmd!(sh, "cargo fmt --all").run().context("Failed to format Rust code")?;
        println!("✅ Rust code formatted");
    }
    Ok(())
}

fn clippy(sh: &Shell) -> Result<()> {
    cmd!(sh, "cargo clippy --all-targets -- --deny warnings --allow clippy::uninlined-format-args")
        .run()
        .context("Clippy checks failed")?;
    Ok(())
}

fn run(sh: &Shell, args: &[String]) -> Result<()> {
    let args = args.strip_prefix(&["--".to_string()]).unwrap_or(args);
    cmd!(sh, "cargo run -p {PACKAGE} -- {args...}")
        .run()
        .context("Failed to run job-insight")?;
    Ok(())
}

/// Analyze the fixtures shipped with the tests
fn sample(sh: &Shell) -> Result<()> {
    let fixtures = project_root().join("analyzer/tests/fixtures");
    let plan = fixtures.join("plan_two_vertices.xml");
    let runtime = fixtures.join("runtime_tagged.xml");
    cmd!(sh, "cargo run -p {PACKAGE} -- --plan {plan} --runtime {runtime}")
        .run()
        .context("Failed to analyze sample fixtures")?;
    Ok(())
}

fn clean(sh: &Shell) -> Result<()> {
    println!("🧹 Cleaning build artifacts...");
    cmd!(sh, "cargo clean").run()?;

    let build_dir = project_root().join("build");
    if build_dir.exists() {
        sh.remove_path(&build_dir)?;
    }
    println!("✅ Clean complete!");
    Ok(())
}

fn ci(sh: &Shell) -> Result<()> {
    println!("🔄 Running CI pipeline...");

    println!("📝 [1/4] Checking code format...");
    format(sh, true)?;

    println!("🔍 [2/4] Running clippy checks...");
    clippy(sh)?;

    println!("🔨 [3/4] Building project...");
    build(sh, true)?;

    println!("🧪 [4/4] Running tests...");
    test(sh)?;

    println!("🎉 CI pipeline completed successfully!");
    Ok(())
}

/// Binary plus a default config, packed as build/dist/job-insight-<timestamp>.tar.gz
fn dist(sh: &Shell) -> Result<()> {
    build(sh, true)?;

    let project = project_root();
    let dist_dir = project.join("build/dist");
    sh.create_dir(dist_dir.join("bin"))?;
    sh.create_dir(dist_dir.join("conf"))?;
    sh.create_dir(dist_dir.join("logs"))?;

    sh.copy_file(project.join("target/release").join(PACKAGE), dist_dir.join("bin"))?;
    create_config_file(&dist_dir)?;

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let package_name = format!("{}-{}.tar.gz", PACKAGE, timestamp);
    let _dir = sh.push_dir(&dist_dir);
    cmd!(sh, "tar czf {package_name} bin conf logs")
        .run()
        .context("Failed to create tarball")?;

    println!("✅ Distribution package created: {}", dist_dir.join(&package_name).display());
    Ok(())
}

fn create_config_file(dist_dir: &Path) -> Result<()> {
    let config_content = r#"[logging]
level = "warn,job_insight=info"
file = "logs/job-insight.log"

[analysis]
top_n = 5
time_unit = "ms"

[report]
format = "markdown"
"#;

    std::fs::write(dist_dir.join("conf/config.toml"), config_content)
        .context("Failed to create config file")?;
    Ok(())
}

fn coverage(sh: &Shell) -> Result<()> {
    println!("📊 Generating test coverage report...");

    if cmd!(sh, "cargo tarpaulin --version").quiet().ignore_stdout().run().is_err() {
        println!("⚠️  cargo-tarpaulin not found. Installing...");
        cmd!(sh, "cargo install cargo-tarpaulin")
            .run()
            .context("Failed to install cargo-tarpaulin")?;
    }

    cmd!(sh, "cargo tarpaulin --workspace --out Html --out Xml --output-dir build/coverage")
        .run()
        .context("Failed to generate coverage report")?;

    println!("✅ Coverage report: build/coverage/index.html");
    Ok(())
}

/// Workspace root, one level above this crate
fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

//! comic-page-extract - Extract, edit and save comic archive pages
//!
//! CLI entry point

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use comic_page_extract::{
    archive::{SEVEN_ZIP_COMMANDS, UNRAR_COMMAND},
    config::{LOCAL_CONFIG_NAME, USER_CONFIG_DIR},
    util::plural,
    // CLI
    create_cli_overrides, exit_codes, Cli, Commands, ExtractArgs, InspectArgs, PresetsArgs,
    // Config
    Config, ConfigError, RunConfig,
    // Run
    inspect, PageSort, ProgressCallback, RunContext, RunError, SilentProgress,
    StandardArchiveReader,
};

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Extract(args) => run_extract(&args, cli.verbose),
        Commands::Presets(args) => run_presets(&args),
        Commands::Inspect(args) => run_inspect(&args),
        Commands::Info => run_info(),
    };

    std::process::exit(match result {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_code_for(&e)
        }
    });
}

/// RUST_LOG always wins; -v falls back to DEBUG, otherwise WARN
fn init_tracing(verbose: u8) {
    let level = if verbose > 0 { Level::DEBUG } else { Level::WARN };
    let filter = EnvFilter::from_default_env().add_directive(level.into());
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

fn exit_code_for(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<ConfigError>().is_some() {
        return exit_codes::CONFIG_ERROR;
    }
    match error.downcast_ref::<RunError>() {
        Some(RunError::InputNotFound(_)) => exit_codes::INPUT_NOT_FOUND,
        _ => exit_codes::GENERAL_ERROR,
    }
}

// ============ Progress Callback Implementations ============

/// Verbose progress callback for CLI output
struct VerboseProgress {
    verbose_level: u8,
}

impl VerboseProgress {
    fn new(verbose_level: u8) -> Self {
        Self { verbose_level }
    }
}

impl ProgressCallback for VerboseProgress {
    fn on_step_start(&self, step: &str) {
        println!("  {}", step);
    }

    fn on_step_progress(&self, current: usize, total: usize) {
        print!("\r    Progress: {}/{}", current, total);
        std::io::stdout().flush().ok();
        if current == total {
            println!();
        }
    }

    fn on_step_complete(&self, step: &str, message: &str) {
        println!("    {}: {}", step, message);
    }

    fn on_debug(&self, message: &str) {
        if self.verbose_level > 1 {
            println!("    [DEBUG] {}", message);
        } else {
            println!("{}", message);
        }
    }
}

/// Single progress bar for the default output mode
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} | {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for BarProgress {
    fn on_step_start(&self, step: &str) {
        self.bar.set_position(0);
        self.bar.set_message(step.to_string());
    }

    fn on_step_progress(&self, current: usize, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(current as u64);
    }

    fn on_step_complete(&self, step: &str, message: &str) {
        self.bar.set_message(format!("{}: {}", step, message));
    }

    fn on_debug(&self, message: &str) {
        self.bar.println(message);
    }
}

// ============ Extract Command ============

fn run_extract(args: &ExtractArgs, verbose: u8) -> Result<()> {
    let start_time = Instant::now();

    // An explicit config must load; a discovered one falls back to defaults
    let file_config = match &args.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    let cli_overrides = create_cli_overrides(args);
    let run_config = file_config.merge_with_cli(args.preset.as_deref(), &cli_overrides)?;
    let mut context = RunContext::new(run_config);

    for input in &args.inputs {
        let added = context.add_path(input)?;
        if added == 0 {
            warn!("No new archives found in {}", input.display());
        }
    }
    if context.archives().is_empty() {
        eprintln!("Error: No archives found in input paths");
        std::process::exit(exit_codes::INPUT_NOT_FOUND);
    }

    if args.dry_run {
        print_execution_plan(&context);
        return Ok(());
    }

    let summary = if args.quiet {
        context.run(&SilentProgress)
    } else if verbose > 0 {
        context.run(&VerboseProgress::new(verbose))
    } else {
        let progress = BarProgress::new();
        let summary = context.run(&progress);
        progress.finish();
        summary
    };

    let log_path = context.write_reports().context("Failed to write the run log")?;

    if !args.quiet {
        summary.print();
        if let Some(path) = &log_path {
            println!("Log: {}", path.display());
        }
        println!("Total time: {:.2}s", start_time.elapsed().as_secs_f64());
    }

    let failed_archives = context.report().failed_archives();
    let failed_pages = summary.failed_pages();
    if failed_archives > 0 || failed_pages > 0 {
        anyhow::bail!(
            "{} and {} failed",
            plural(failed_archives, "archive", "archives"),
            plural(failed_pages, "page operation", "page operations")
        );
    }

    Ok(())
}

/// Print execution plan for dry-run mode
fn print_execution_plan(context: &RunContext) {
    let config: &RunConfig = context.config();

    println!("=== Dry Run - Execution Plan ===");
    println!();
    println!("Preset: {}", config.preset);
    if let Some(description) = &config.description {
        println!("  {}", description);
    }
    println!("Archives to process: {}", context.archives().len());
    println!();

    println!("Edit Configuration:");
    let edit = &config.edit;
    if edit.has_resize() {
        println!(
            "  1. Resize: width {}, height {} (aspect ratio {})",
            edit.width,
            edit.height,
            if edit.keep_aspect_ratio { "kept" } else { "free" }
        );
    } else {
        println!("  1. Resize: DISABLED");
    }
    if edit.rotate.is_empty() {
        println!("  2. Rotate: DISABLED");
    } else {
        println!("  2. Rotate: {:?}", edit.rotate);
    }
    if edit.combine.is_empty() {
        println!("  3. Combine: DISABLED");
    } else {
        println!("  3. Combine:");
        for spec in &edit.combine {
            println!("       {} + {} ({})", spec.a, spec.b, spec.direction);
        }
    }
    println!("  Resample: {:?}", edit.resample);
    println!();

    println!("Save Options:");
    let save = &config.save;
    if save.save_dirs.is_empty() {
        println!("  Directory: {}/<archive name>", save.default_root.display());
    } else {
        for dir in &save.save_dirs {
            println!("  Directory: {}", dir.display());
        }
    }
    match &save.name_template {
        Some(template) => println!("  Name template: {}", template),
        None => println!("  Name template: source file name"),
    }
    match save.format {
        Some(format) => println!("  Format: {}", format),
        None => println!("  Format: source format"),
    }
    println!("  Keep archive folders: {}", if save.keep_archive_paths { "YES" } else { "NO" });
    println!("  Overwrite: {}", if save.overwrite { "YES" } else { "NO" });
    match &config.log_path {
        Some(path) => println!("  Log: {}", path.display()),
        None => println!("  Log: DISABLED"),
    }
    println!();

    println!("Archives:");
    for (i, plan) in context.plan().iter().enumerate() {
        match &plan.error {
            Some(error) => println!("  {}. {} (unreadable: {})", i + 1, plan.path.display(), error),
            None => {
                let pages: Vec<String> = plan.selection.iter().map(|index| (index + 1).to_string()).collect();
                println!(
                    "  {}. {} ({} of {} selected: {})",
                    i + 1,
                    plan.path.display(),
                    plan.selection.len(),
                    plural(plan.total_pages, "page", "pages"),
                    pages.join(", ")
                );
            }
        }
    }
}

// ============ Presets Command ============

fn run_presets(args: &PresetsArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    if let Some(name) = &args.show {
        let preset = config.preset(name)?;
        let text = toml::to_string_pretty(&preset).context("Failed to serialize preset")?;
        println!("[presets.{}]", name);
        print!("{}", text);
        return Ok(());
    }

    let default_name = config.default_preset_name();
    println!("Available presets:");
    for (name, preset) in config.all_presets() {
        let marker = if name == default_name { " (default)" } else { "" };
        println!("  {}{}", name, marker);
        if let Some(description) = &preset.description {
            println!("      {}", description);
        }
    }

    Ok(())
}

// ============ Inspect Command ============

fn run_inspect(args: &InspectArgs) -> Result<()> {
    if !args.archive.exists() {
        return Err(RunError::InputNotFound(args.archive.clone()).into());
    }

    let reader = StandardArchiveReader::detect();
    let sort = PageSort::new(args.sort.into(), args.sort_order());
    let mut pages = inspect(&reader, &args.archive, sort)?;
    if let Some(spec) = &args.pages {
        pages.select(spec);
    }

    println!("{}", args.archive.display());
    println!("  {}", plural(pages.total_pages(), "page", "pages"));
    for (index, record) in pages.records.iter().enumerate() {
        let marker = if args.pages.is_some() && pages.is_selected(index) { "*" } else { " " };
        println!("{} {:>4}  {}", marker, index + 1, record.source_name);
    }

    Ok(())
}

// ============ Info Command ============

fn run_info() -> Result<()> {
    println!("comic-page-extract v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("System Information:");
    println!("  Platform: {}", std::env::consts::OS);
    println!("  Arch: {}", std::env::consts::ARCH);

    println!();
    println!("Archive Tools:");
    println!("  ZIP (CBZ): built in");
    for cmd in SEVEN_ZIP_COMMANDS {
        check_tool(cmd, "7-Zip");
    }
    check_tool(UNRAR_COMMAND, "UnRAR");

    println!();
    println!("Config File Locations:");
    println!("  Local: {}", Path::new(".").join(LOCAL_CONFIG_NAME).display());
    if let Some(config_dir) = dirs::config_dir() {
        println!("  User:  {}", config_dir.join(USER_CONFIG_DIR).join("config.toml").display());
    }

    Ok(())
}

fn check_tool(cmd: &str, name: &str) {
    match which::which(cmd) {
        Ok(path) => println!("  {} ({}): {} (found)", name, cmd, path.display()),
        Err(_) => println!("  {} ({}): Not found", name, cmd),
    }
}

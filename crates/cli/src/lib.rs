use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use codedoc_parser::{
    needs_engine, BabelBridge, Language, ParserConfig, SourceParser, SourceScanner,
};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    print_stdout(&text)
}

#[derive(Parser)]
#[command(name = "codedoc")]
#[command(about = "Structural source parser for Python, JavaScript and TypeScript", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding node_modules/@babel/parser
    #[arg(long, global = true)]
    engine_dir: Option<PathBuf>,

    /// Node.js executable
    #[arg(long, global = true)]
    node: Option<String>,

    /// Install the JS/TS engine when it is missing
    #[arg(long, global = true)]
    auto_install: bool,

    /// Upper bound for one engine invocation (ms)
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a file or every supported file under a directory, printing JSON
    Parse(ParseArgs),

    /// Install @babel/parser into the engine directory
    #[command(name = "install-engine")]
    InstallEngine(InstallEngineArgs),
}

#[derive(Args)]
struct ParseArgs {
    /// Source file or directory
    path: PathBuf,

    /// Force the language (python, javascript, typescript); for a directory, parse only that language
    #[arg(long, value_parser = parse_language)]
    language: Option<Language>,

    /// Keep functions, classes and methods whose name starts with `_`
    #[arg(long)]
    include_private: bool,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

fn parse_language(name: &str) -> std::result::Result<Language, String> {
    Language::from_name(name).map_err(|e| e.to_string())
}

#[derive(Args)]
struct InstallEngineArgs {
    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(Serialize)]
struct EngineStatus {
    engine_dir: PathBuf,
    node: String,
    installed: bool,
}

pub fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Parse(args) => run_parse(args, config)?,
        Commands::InstallEngine(args) => run_install_engine(args, config)?,
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<ParserConfig> {
    let mut config = match &cli.config {
        Some(path) => ParserConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ParserConfig::default(),
    };

    if let Some(dir) = &cli.engine_dir {
        config.engine.engine_dir = dir.clone();
    }
    if let Some(node) = &cli.node {
        config.engine.node_program = node.clone();
    }
    if cli.auto_install {
        config.engine.auto_install = true;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.engine.timeout_ms = timeout_ms;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn run_parse(args: ParseArgs, mut config: ParserConfig) -> Result<()> {
    if args.include_private {
        config.include_private = true;
    }

    let max_file_bytes = config.max_file_bytes;
    let mut parser = SourceParser::new(config).context("Failed to create parser")?;

    if args.path.is_dir() {
        let mut scanner = SourceScanner::new(&args.path).max_file_bytes(max_file_bytes);
        if let Some(language) = args.language {
            scanner = scanner.only(language);
        }
        let files = scanner.scan();
        prepare_engine(&mut parser, &files);

        let report = parser.parse_paths(&files);
        return print_json(&report, args.pretty);
    }

    // Unknown extensions fail before the engine is touched
    let language = match args.language {
        Some(language) => language,
        None => Language::from_path(&args.path)?,
    };
    if language.uses_external_engine() {
        parser
            .initialize_engine()
            .context("JS/TS parsing engine is not available")?;
    }

    let module = parser
        .parse_normalized_as(&args.path, language)
        .with_context(|| format!("Failed to parse {}", args.path.display()))?;
    print_json(&module, args.pretty)
}

/// Bring up the engine only when the batch holds JS/TS files; a failure is reported per file
fn prepare_engine(parser: &mut SourceParser, files: &[PathBuf]) {
    if !needs_engine(files) {
        return;
    }
    if let Err(e) = parser.initialize_engine() {
        log::warn!("JS/TS files will be skipped: {e}");
    }
}

fn run_install_engine(args: InstallEngineArgs, mut config: ParserConfig) -> Result<()> {
    config.engine.auto_install = true;
    let bridge = BabelBridge::initialize(&config.engine)
        .context("Failed to install the JS/TS parsing engine")?;

    let engine = bridge.config();
    let status = EngineStatus {
        engine_dir: absolute(&engine.engine_dir),
        node: engine.node_program.clone(),
        installed: codedoc_parser::js::engine_installed(&engine.engine_dir),
    };
    print_json(&status, args.pretty)
}

fn absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

//! DNS Block Checker CLI - command-line interface for parental control coverage checks
//!
//! CDD Principle: Application Layer - CLI coordinates user interactions with domain services
//! - Translates user commands to checker operations
//! - Handles external concerns like file output, process exit codes, and terminal output
//! - Provides clean separation between user interface and business logic

use clap::{Parser, Subcommand, ValueEnum};
use dns_block_checker::rules::{self, blocklist};
use dns_block_checker::{
    CheckOptions, CheckerConfig, CheckerError, CheckerResult, ConfigBuilder, DomainBlockChecker,
    OutputFormat, ParsedRules, ReportFormatter, ReportOptions, RuleKind,
};
use std::fs;
use std::path::PathBuf;
use std::process;

/// DNS Block Checker - find filter-list domains parental control does not block
#[derive(Parser)]
#[command(name = "dns-block-checker")]
#[command(version = "0.1.0")]
#[command(about = "Checks filter-list domains against a DNS dashboard's parental control")]
#[command(long_about = "Drives the AdGuard DNS dashboard's rule checker through WebDriver for every domain in a filter list and reports the domains parental control does not block. Also de-duplicates domain lists against existing blocklists.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every rule in a filter list against the dashboard
    Check {
        /// Rule list to check
        rules_file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormatArg,

        /// Write the report to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// WebDriver URL (overrides config)
        #[arg(long)]
        webdriver: Option<String>,

        /// Attach to an existing WebDriver session
        #[arg(long)]
        session: Option<String>,

        /// Dashboard page to open before checking
        #[arg(long)]
        page_url: Option<String>,

        /// Delay between domains in milliseconds
        #[arg(long)]
        delay: Option<u64>,

        /// Check at most this many rules
        #[arg(long)]
        max_rules: Option<usize>,

        /// Run even if the browser is not on the dashboard user rules page
        #[arg(long)]
        allow_any_page: bool,
    },

    /// Show how each line of a rule list would be treated, without checking
    Parse {
        /// Rule list to inspect
        rules_file: PathBuf,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Write the domains of target lists that are not in existing blocklists
    Filter {
        /// Target lists (glob patterns allowed)
        #[arg(required = true)]
        targets: Vec<String>,

        /// Directory holding the existing blocklists
        #[arg(short, long, default_value = "BlockLists/downloads")]
        blocklists_dir: PathBuf,

        /// Directory for the generated lists
        #[arg(short, long, default_value = "output")]
        output_dir: PathBuf,
    },

    /// Validate configuration file
    ValidateConfig {
        /// Configuration file to validate
        config_file: Option<PathBuf>,
    },

    /// Print the default configuration as YAML
    DefaultConfig,
}

#[derive(Copy, Clone, ValueEnum, PartialEq)]
enum OutputFormatArg {
    Human,
    Json,
    Plain,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Human => OutputFormat::Human,
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Plain => OutputFormat::Plain,
        }
    }
}

/// Overrides for the `check` command
struct CheckArgs {
    rules_file: PathBuf,
    format: OutputFormatArg,
    output: Option<PathBuf>,
    webdriver: Option<String>,
    session: Option<String>,
    page_url: Option<String>,
    delay: Option<u64>,
    max_rules: Option<usize>,
    allow_any_page: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Run the command and handle the result
    let result = run_command(cli).await;

    match result {
        Ok(exit_code) => {
            process::exit(exit_code);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

async fn run_command(cli: Cli) -> CheckerResult<i32> {
    match cli.command {
        Commands::Check {
            rules_file,
            format,
            output,
            webdriver,
            session,
            page_url,
            delay,
            max_rules,
            allow_any_page,
        } => {
            let args = CheckArgs {
                rules_file,
                format,
                output,
                webdriver,
                session,
                page_url,
                delay,
                max_rules,
                allow_any_page,
            };
            run_check(cli.config, args, !cli.no_color).await
        }
        Commands::Parse { rules_file, json } => run_parse(rules_file, json).await,
        Commands::Filter { targets, blocklists_dir, output_dir } => {
            run_filter(cli.config, targets, blocklists_dir, output_dir)
        }
        Commands::ValidateConfig { config_file } => run_validate_config(config_file.or(cli.config)),
        Commands::DefaultConfig => run_default_config(),
    }
}

/// Load the given config file, a default one from the working directory, or the defaults
fn load_config(config_path: Option<PathBuf>) -> CheckerResult<CheckerConfig> {
    if let Some(config_path) = config_path {
        return CheckerConfig::load_from_file(config_path);
    }
    Ok(CheckerConfig::discover()?.unwrap_or_default())
}

async fn run_check(
    config_path: Option<PathBuf>,
    args: CheckArgs,
    use_colors: bool,
) -> CheckerResult<i32> {
    // Read the rules first so an unreadable file never opens a browser session
    let rules = rules::load_rules(&args.rules_file).await?;

    let mut builder = ConfigBuilder::from_config(load_config(config_path)?);
    if let Some(url) = args.webdriver {
        builder = builder.webdriver_url(url);
    }
    if let Some(session) = args.session {
        builder = builder.session_id(session);
    }
    if let Some(page_url) = args.page_url {
        builder = builder.page_url(page_url);
    }
    if let Some(delay) = args.delay {
        builder = builder.request_delay_ms(delay);
    }
    let config = builder.build()?;

    let options = CheckOptions { max_rules: args.max_rules, ..CheckOptions::from_config(&config) };
    let checker = DomainBlockChecker::new_with_config(config)?
        .with_options(options)
        .with_report_formatter(ReportFormatter::new(ReportOptions {
            use_colors: use_colors && args.output.is_none(),
            ..Default::default()
        }));

    let mut probe = checker.connect_webdriver(args.allow_any_page).await?;
    let summary = checker.check_rules(&mut probe, &rules).await?;

    let formatted = checker.format_report(&summary, args.format.into())?;
    match &args.output {
        Some(path) => {
            fs::write(path, &formatted).map_err(|e| {
                CheckerError::report(format!("Failed to write {}: {}", path.display(), e))
            })?;
            eprintln!(
                "Wrote {} unblocked rule{} to {}",
                summary.unblocked.len(),
                if summary.unblocked.len() == 1 { "" } else { "s" },
                path.display()
            );
        }
        None => print!("{}", formatted),
    }

    // Exit code 1 when something slipped through
    if summary.has_unblocked() {
        Ok(1)
    } else {
        Ok(0)
    }
}

async fn run_parse(rules_file: PathBuf, json: bool) -> CheckerResult<i32> {
    let rules = rules::load_rules(&rules_file).await?;

    if json {
        println!("{}", parse_report_json(&rules)?);
    } else {
        print!("{}", parse_report_table(&rules));
    }

    Ok(0)
}

fn parse_report_table(rules: &ParsedRules) -> String {
    let mut output = String::new();

    for line in &rules.lines {
        let action = match line.domain() {
            None => "skip (allowlist)".to_string(),
            Some("") => "invalid (empty domain)".to_string(),
            Some(domain) => format!("check {}", domain),
        };
        output.push_str(&format!("{:>5}  {:<40} {}\n", line.line_number, line.text, action));
    }

    output.push_str(&format!(
        "\n{} rules to check, {} allowlist, {} comments\n",
        rules.block_rules().count(),
        rules.allowlist_count(),
        rules.comment_lines
    ));
    output
}

fn parse_report_json(rules: &ParsedRules) -> CheckerResult<String> {
    let lines: Vec<serde_json::Value> = rules
        .lines
        .iter()
        .map(|line| {
            serde_json::json!({
                "line_number": line.line_number,
                "rule": line.text,
                "kind": match line.kind {
                    RuleKind::Block => "block",
                    RuleKind::Allowlist => "allowlist",
                },
                "domain": line.domain(),
            })
        })
        .collect();

    let report = serde_json::json!({
        "lines": lines,
        "comment_lines": rules.comment_lines,
        "digest": rules.digest,
    });

    serde_json::to_string_pretty(&report)
        .map_err(|e| CheckerError::report(format!("JSON serialization failed: {e}")))
}

fn run_filter(
    config_path: Option<PathBuf>,
    targets: Vec<String>,
    blocklists_dir: PathBuf,
    output_dir: PathBuf,
) -> CheckerResult<i32> {
    let checker = DomainBlockChecker::new_with_config(load_config(config_path)?)?;
    let targets = blocklist::expand_targets(&targets)?;
    if targets.is_empty() {
        eprintln!("No target files to process");
        return Ok(1);
    }

    let run = checker.filter_lists(&targets, &blocklists_dir, &output_dir)?;

    println!("Known domains in {}: {}", blocklists_dir.display(), run.known_domains);
    for diff in &run.targets {
        println!(
            "{}: {} imported, {} new -> {}",
            diff.target.display(),
            diff.imported,
            diff.new_domains.len(),
            diff.output_path.display()
        );
    }
    println!("Combined: {} domains -> {}", run.combined.len(), run.combined_path.display());

    Ok(0)
}

fn run_validate_config(config_path: Option<PathBuf>) -> CheckerResult<i32> {
    let config_path = config_path.unwrap_or_else(|| PathBuf::from("dns_block_checker.yaml"));

    println!("Validating configuration: {}", config_path.display());

    match CheckerConfig::load_from_file(&config_path) {
        Ok(config) => {
            println!("Configuration is valid");
            println!("  WebDriver: {}", config.webdriver.url);
            match &config.webdriver.session_id {
                Some(session) => println!("  Session: {} (attach)", session),
                None => println!("  Session: new"),
            }
            println!("  Page pattern: {}", config.page.url_pattern);
            println!("  Delay between domains: {}ms", config.timing.request_delay_ms);
            println!("  Fingerprint: {}", config.fingerprint());
            Ok(0)
        }
        Err(e) => {
            eprintln!("Configuration validation failed: {}", e);
            Ok(1)
        }
    }
}

fn run_default_config() -> CheckerResult<i32> {
    print!("{}", CheckerConfig::default().to_yaml()?);
    Ok(0)
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

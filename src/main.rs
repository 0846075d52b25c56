use std::io::IsTerminal;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use lgtm_core::{LgtmConfig, LgtmError, OutputFormat, ReviewResult};
use lgtm_review::github::GitHubClient;
use lgtm_review::llm::OllamaClient;
use lgtm_review::mcp::ToolServerRegistry;
use lgtm_review::parser::{parse_review_response, ParseOptions};
use lgtm_review::pipeline::{LogNotifier, ReviewNotifier, ReviewOrchestrator};
use lgtm_review::slack::SlackNotifier;
use lgtm_server::{AppState, ServiceInfo};

const CONFIG_FILE: &str = ".lgtm.toml";

#[derive(Parser)]
#[command(
    name = "lgtm",
    version,
    about = "Self-hosted pull request reviewer backed by a local LLM",
    long_about = "lgtm reviews GitHub pull requests with a local Ollama model.\n\n\
                   It fetches the pull request and its diff, asks the model for a review,\n\
                   turns the answer into findings and a verdict, then comments, labels\n\
                   and notifies Slack.\n\n\
                   Examples:\n  \
                     lgtm serve                       Listen for GitHub webhooks\n  \
                     lgtm review 42                   Review pull request #42 now\n  \
                     lgtm review 42 --dry-run         Review without publishing\n  \
                     lgtm parse --file reply.md       Parse a saved model reply\n  \
                     lgtm health                      Check Ollama and integrations"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .lgtm.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable summaries (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable verbose (debug) logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Command {
    /// Run the webhook server
    #[command(long_about = "Run the webhook server.\n\n\
        Routes: POST /webhook/github, POST /webhook/manual-review,\n\
        GET /health, GET /health/ollama. Stops on Ctrl+C.\n\n\
        Examples:\n  lgtm serve\n  lgtm serve --address 127.0.0.1:8080")]
    Serve {
        /// Listen address (default: server.address from config, 0.0.0.0:3000)
        #[arg(long)]
        address: Option<String>,
    },
    /// Review one pull request
    #[command(long_about = "Review one pull request.\n\n\
        Runs the full pipeline: fetch, generate, parse, then post the review comment,\n\
        notify and label. With --dry-run nothing is published.\n\n\
        Examples:\n  lgtm review 42\n  lgtm review 42 --dry-run --format markdown")]
    Review {
        /// Pull request number
        number: u64,

        /// Print the review without commenting, notifying or labelling
        #[arg(long)]
        dry_run: bool,
    },
    /// Parse a saved model reply into a structured review
    #[command(long_about = "Parse a saved model reply into a structured review.\n\n\
        Reads from a file or stdin. No network access.\n\n\
        Examples:\n  lgtm parse --file reply.md\n  cat reply.md | lgtm parse --format json")]
    Parse {
        /// Read the reply from a file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,

        /// Minimum recommendation length (default: review.min_recommendation_len)
        #[arg(long)]
        min_recommendation_len: Option<usize>,
    },
    /// Check Ollama connectivity and which integrations are configured
    Health,
    /// Call or list tools on a registered tool server
    #[command(long_about = "Call or list tools on a registered tool server.\n\n\
        Servers come from [mcp.servers] in the config. Without that table the defaults\n\
        github, slack and ollama are used.\n\n\
        Examples:\n  lgtm tools --server github\n  lgtm tools --server jira --call create_issue --args '{\"title\":\"x\"}'")]
    Tools {
        /// Server id
        #[arg(long)]
        server: String,

        /// Tool to call (omit to list tools)
        #[arg(long)]
        call: Option<String>,

        /// JSON arguments for --call
        #[arg(long, default_value = "{}")]
        args: String,
    },
    /// Create a default .lgtm.toml configuration file
    #[command(long_about = "Create a default .lgtm.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .lgtm.toml already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

fn init_tracing(verbose: bool, serving: bool) {
    let default_level = match (verbose, serving) {
        (true, _) => "debug",
        (false, true) => "info",
        (false, false) => "warn",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!("lgtm v{version}: pull request reviews from a local LLM\n");

    println!("Quick start:");
    println!("  lgtm init            Create a .lgtm.toml config file");
    println!("  lgtm health          Check Ollama and integrations");
    println!("  lgtm serve           Listen for GitHub webhooks\n");

    println!("All commands:");
    println!("  serve     Webhook server");
    println!("  review    Review one pull request");
    println!("  parse     Parse a saved model reply offline");
    println!("  health    Connectivity and configuration report");
    println!("  tools     Call or list tools on a tool server");
    println!("  init      Create default configuration\n");

    println!("Run 'lgtm <command> --help' for details.");
}

fn load_config(path: Option<&Path>) -> Result<LgtmConfig> {
    let mut config = match path {
        Some(path) => LgtmConfig::from_file(path)
            .wrap_err_with(|| format!("loading {}", path.display()))?,
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                LgtmConfig::from_file(default_path)?
            } else {
                LgtmConfig::default()
            }
        }
    };
    config.apply_env();
    Ok(config)
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err(format!("reading {}", path.display())),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .into_diagnostic()
                .wrap_err("reading stdin")?;
            Ok(input)
        }
    }
}

fn print_review(review: &ReviewResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(review).into_diagnostic()?);
        }
        OutputFormat::Markdown => print!("{}", review.to_markdown()),
        OutputFormat::Text => print!("{review}"),
    }
    Ok(())
}

fn spinner(message: &'static str) -> Option<indicatif::ProgressBar> {
    if !std::io::stderr().is_terminal() {
        return None;
    }
    let pb = indicatif::ProgressBar::new_spinner();
    if let Ok(style) = indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
    {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    Some(pb)
}

fn build_notifier(config: &LgtmConfig) -> Result<Arc<dyn ReviewNotifier>> {
    if config.slack.is_configured() {
        Ok(Arc::new(SlackNotifier::new(&config.slack)?))
    } else {
        Ok(Arc::new(LogNotifier))
    }
}

/// Fetch and generate without posting, notifying or labelling.
async fn preview_review(
    github: &GitHubClient,
    orchestrator: &ReviewOrchestrator,
    number: u64,
) -> std::result::Result<ReviewResult, LgtmError> {
    let pr = github.get_pull_request(number).await?;
    let files = github.get_pull_request_files(number).await?;
    let diff = github.get_diff(number).await?;
    orchestrator.generate_review(&pr, &files, &diff).await
}

#[derive(serde::Serialize)]
struct CheckResult {
    name: &'static str,
    status: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

impl CheckResult {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "pass",
            detail: detail.into(),
            hint: None,
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name,
            status: "fail",
            detail: detail.into(),
            hint: Some(hint.into()),
        }
    }

    fn info(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "info",
            detail: detail.into(),
            hint: None,
        }
    }

    fn symbol(&self, use_color: bool) -> &'static str {
        match (self.status, use_color) {
            ("pass", true) => "\x1b[32m\u{2713}\x1b[0m",
            ("fail", true) => "\x1b[31m\u{2717}\x1b[0m",
            (_, true) => "\x1b[33m~\x1b[0m",
            ("pass", false) => "\u{2713}",
            ("fail", false) => "\u{2717}",
            _ => "~",
        }
    }
}

async fn run_health(config: &LgtmConfig, format: OutputFormat, use_color: bool) -> Result<()> {
    let mut checks = Vec::new();

    let llm = OllamaClient::new(&config.llm)?;
    if llm.check_health().await {
        checks.push(CheckResult::pass(
            "ollama",
            format!("{} reachable, model {}", llm.base_url(), llm.model()),
        ));
    } else {
        checks.push(CheckResult::fail(
            "ollama",
            format!("{} unreachable", llm.base_url()),
            "Start Ollama or set OLLAMA_BASE_URL",
        ));
    }

    let gh = &config.github;
    match (&gh.token, &gh.owner, &gh.repo) {
        (Some(_), Some(owner), Some(repo)) => {
            checks.push(CheckResult::pass("github", format!("{owner}/{repo}")));
        }
        (None, _, _) => checks.push(CheckResult::fail(
            "github",
            "token not configured",
            "Set GITHUB_TOKEN or github.token",
        )),
        _ => checks.push(CheckResult::fail(
            "github",
            "repository not configured",
            "Set GITHUB_OWNER and GITHUB_REPO or github.owner / github.repo",
        )),
    }

    if config.slack.is_configured() {
        let channel = config.slack.channel.as_deref().unwrap_or_default();
        checks.push(CheckResult::pass("slack", format!("posting to {channel}")));
    } else {
        checks.push(CheckResult::info(
            "slack",
            "not configured, reviews are only logged",
        ));
    }

    let signatures = match (
        config.server.verify_signatures,
        config.server.signing_secret().is_some(),
    ) {
        (true, true) => CheckResult::pass("webhook", "signatures verified"),
        (true, false) => CheckResult::fail(
            "webhook",
            "verification enabled without a secret",
            "Set WEBHOOK_SECRET or server.webhook_secret",
        ),
        (false, _) => CheckResult::info("webhook", "signature verification disabled"),
    };
    checks.push(signatures);

    let servers: Vec<&str> = config.mcp.servers.keys().map(String::as_str).collect();
    checks.push(CheckResult::info(
        "tool servers",
        if servers.is_empty() {
            "none".to_string()
        } else {
            servers.join(", ")
        },
    ));

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&checks).into_diagnostic()?);
        }
        OutputFormat::Text | OutputFormat::Markdown => {
            for check in &checks {
                println!("{} {:<13} {}", check.symbol(use_color), check.name, check.detail);
                if let Some(hint) = &check.hint {
                    println!("  {hint}");
                }
            }
        }
    }
    Ok(())
}

const DEFAULT_CONFIG: &str = r##"# lgtm configuration
# Environment variables override values set here.

[github]
# token = "ghp_..."            # or GITHUB_TOKEN
# owner = "acme"               # or GITHUB_OWNER
# repo = "api"                 # or GITHUB_REPO
# api_base = "https://api.github.com"

[llm]
# base_url = "http://localhost:11434"   # or OLLAMA_BASE_URL
# model = "llama2"                      # or OLLAMA_MODEL
# temperature = 0.3
# timeout_secs = 120

[slack]
# bot_token = "xoxb-..."       # or SLACK_BOT_TOKEN
# channel = "#code-review"     # or SLACK_CHANNEL

[review]
# max_diff_chars = 4000
# min_recommendation_len = 10
# prompt_template = "..."      # placeholders: {{title}} {{author}} {{branch}} {{filesCount}} {{diff}}

[server]
# address = "0.0.0.0:3000"     # or LGTM_ADDRESS
# webhook_secret = "..."       # or WEBHOOK_SECRET
# verify_signatures = false

# Tool servers. github, slack and ollama are registered by default; declaring
# any [mcp.servers.<id>] table replaces that whole set, so list every server you use.
# [mcp.servers.jira]
# name = "Jira MCP Server"
# base_url = "http://localhost:3005"
# timeout_ms = 30000
"##;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose, matches!(cli.command, Some(Command::Serve { .. })));

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };

    match cli.command {
        None => {
            print_welcome();
        }
        Some(Command::Serve { address }) => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(address) = address {
                config.server.address = address;
            }

            let github = GitHubClient::new(&config.github)?;
            let llm = OllamaClient::new(&config.llm)?;
            let orchestrator = ReviewOrchestrator::new(
                Arc::new(github),
                Arc::new(llm),
                build_notifier(&config)?,
                config.review.clone(),
                config.llm.temperature,
            );
            let state = Arc::new(AppState {
                orchestrator: Arc::new(orchestrator),
                server: config.server.clone(),
                services: ServiceInfo::from_config(&config),
            });
            lgtm_server::run_server(state).await?;
        }
        Some(Command::Review { number, dry_run }) => {
            let config = load_config(cli.config.as_deref())?;
            let github = Arc::new(GitHubClient::new(&config.github)?);
            let llm = Arc::new(OllamaClient::new(&config.llm)?);
            let orchestrator = ReviewOrchestrator::new(
                github.clone(),
                llm,
                build_notifier(&config)?,
                config.review.clone(),
                config.llm.temperature,
            );

            let pb = spinner("Reviewing pull request...");
            let outcome = if dry_run {
                preview_review(&github, &orchestrator, number).await
            } else {
                orchestrator.review_pull_request(number).await
            };
            if let Some(pb) = &pb {
                pb.finish_and_clear();
            }

            let review = outcome.wrap_err_with(|| format!("reviewing PR #{number}"))?;
            print_review(&review, cli.format)?;
        }
        Some(Command::Parse {
            file,
            min_recommendation_len,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            let raw = read_input(file.as_deref())?;
            let mut options = ParseOptions::from(&config.review);
            if let Some(len) = min_recommendation_len {
                options.min_recommendation_len = len;
            }
            print_review(&parse_review_response(&raw, &options), cli.format)?;
        }
        Some(Command::Health) => {
            let config = load_config(cli.config.as_deref())?;
            run_health(&config, cli.format, use_color).await?;
        }
        Some(Command::Tools { server, call, args }) => {
            let config = load_config(cli.config.as_deref())?;
            let registry = ToolServerRegistry::from_config(&config.mcp)?;

            let response = match call {
                Some(tool) => {
                    let arguments: serde_json::Value = serde_json::from_str(&args)
                        .into_diagnostic()
                        .wrap_err("--args must be valid JSON")?;
                    registry.call_tool(&server, &tool, arguments).await?
                }
                None => registry.list_tools(&server).await?,
            };

            println!("{}", serde_json::to_string_pretty(&response).into_diagnostic()?);
            if !response.success {
                miette::bail!("tool server '{server}' request failed");
            }
        }
        Some(Command::Init) => {
            let path = Path::new(CONFIG_FILE);
            if path.exists() {
                miette::bail!("{CONFIG_FILE} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {CONFIG_FILE} with default configuration");
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "lgtm", &mut std::io::stdout());
        }
    }

    Ok(())
}

use clap::{Parser, Subcommand};
use site_compiler::config::{self, JobConfig};
use site_compiler::content::LocalContentClient;
use site_compiler::output;
use site_compiler::reporter::{Level, Reporter};
use site_compiler::site::SiteCompiler;
use site_compiler::structure::site_root_prefix;
use std::path::PathBuf;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

/// Flags of the `compile` command.
#[derive(clap::Args, Clone)]
struct CompileArgs {
    /// Theme folder (defaults to <site>/theme)
    #[arg(long)]
    theme: Option<PathBuf>,

    /// Components folder (defaults to <site>/components)
    #[arg(long)]
    components: Option<PathBuf>,

    /// Local content export (defaults to <site>/content)
    #[arg(long)]
    content: Option<PathBuf>,

    /// Compile only these page ids
    #[arg(long, value_delimiter = ',')]
    pages: Vec<String>,

    /// Also compile the descendants of --pages
    #[arg(long)]
    recurse: bool,

    /// Compile only these locales
    #[arg(long, value_delimiter = ',')]
    locales: Vec<String>,

    /// Run the mobile pass even without a mobile rule in _folder.json
    #[arg(long)]
    mobile: bool,

    /// Inline site info into every page instead of a shared bootstrap file
    #[arg(long)]
    inline_site_info: bool,

    /// Show debug messages (never affects pass/fail)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser)]
#[command(name = "site-compiler")]
#[command(about = "Compile a site export into static HTML")]
#[command(long_about = "\
Compile a site export into static HTML

Pages are described as data: a navigation tree, per-page models naming a
theme layout, slots and component instances. Each page is compiled to a
static file; components that need a client-side runtime are left for
hydration.

Site structure:

  site/
  ├── compile.toml                 # Overrides (optional, see gen-config)
  ├── structure.json               # Navigation tree
  ├── siteinfo.json                # Site-level properties
  ├── fr-FR_structure.json         # Locale overlays (optional)
  ├── slots.json                   # Slots shared by every page (optional)
  ├── pages/
  │   ├── 100.json                 # Page model
  │   └── fr-FR_100.json           # Locale overlay (optional)
  ├── theme/layouts/index.html     # Theme layout (+ index.hook.toml)
  ├── components/<name>/assets/    # File-based components and layouts
  └── content/items/<id>.json      # Local content export

The run fails when any error was reported; pages are still written.

Run 'site-compiler gen-config' to generate a documented compile.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Site export folder
    #[arg(long, default_value = "site", global = true)]
    site: PathBuf,

    /// Output directory
    #[arg(long, default_value = "dist", global = true)]
    output: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile every selected page of the site
    Compile(CompileArgs),
    /// Print a stock compile.toml with all options documented
    GenConfig,
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Compile(args) => {
            init_tracing(args.verbose);

            let mut settings = config::load_config(&cli.site)?;
            if args.inline_site_info {
                settings.inline_site_info = true;
            }
            let mut job = JobConfig::new(&cli.site, &cli.output);
            if let Some(theme) = args.theme {
                job.theme_folder = theme;
            }
            if let Some(components) = args.components {
                job.components_folder = components;
            }
            job.pages = args.pages;
            job.recurse = args.recurse;
            job.locales = args.locales;
            job.mobile = args.mobile;
            job.settings = settings;

            let content_folder = args.content.unwrap_or_else(|| cli.site.join("content"));
            let content_url = format!(
                "{}content",
                site_root_prefix(&job.settings, &job.settings.site_name)
            );
            let client = LocalContentClient::new(content_folder, content_url)
                .with_channel_token(job.settings.channel_token.clone());

            let reporter = Reporter::new();
            reporter.set_output_stream(Box::new(std::io::stderr()));
            reporter.set_reporting_level(if args.verbose {
                Level::Debug
            } else {
                Level::Warn
            });

            println!("==> Compiling {} → {}", cli.site.display(), cli.output.display());
            let result = SiteCompiler::new(&job, &reporter)
                .with_content(&client)
                .with_status(Box::new(|progress| {
                    println!("    {:>3.0}%", progress * 100.0);
                }))
                .run()
                .await;

            if let Ok(summary) = &result {
                output::print_run_summary(summary);
            }
            output::print_report(&reporter.messages());
            let summary = result?;
            if !summary.success {
                return Err("compilation reported errors".into());
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

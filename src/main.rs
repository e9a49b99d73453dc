use clap::{Parser, Subcommand};
use folio::{config, generate, output};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Static site generator for an artist's portfolio")]
#[command(long_about = "\
Static site generator for an artist's portfolio

Every directory under the projects and pieces folders becomes a page. A
Markdown description (index.md, <name>.md, or any .md) supplies the text;
without one, a page is made from the directory's representative image.

Content structure:

  portfolio/
  ├── config.toml                  # Site config (optional)
  └── source/
      ├── projects/
      │   └── Bronze Cast/         # → /projects/bronze-cast/
      │       ├── index.md         # Description, front matter first
      │       ├── bronze-cast.jpg  # Asset, copied beside the page
      │       └── detail.png
      ├── pieces/
      │   └── small-bowl/          # → /pieces/small-bowl/ (synthesized)
      │       └── small-bowl.jpg
      ├── style/                   # Static, copied to generated/style/
      └── images/

Description front matter:

  date: 2021-03-04
  medium: cast bronze

  ![Bronze Cast](bronze-cast.jpg){.headline}
  # Bronze Cast

Run 'folio gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Config file (default: ./config.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More log output (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Less log output (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    quiet: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build pages for the given resources, or for every resource
    Build {
        /// Resource directories or description files
        targets: Vec<PathBuf>,
        /// Do not rebuild gallery indexes and the homepage
        #[arg(long)]
        no_gallery: bool,
    },
    /// Resolve every resource and write the build manifest
    Scan,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Command::Build {
            targets,
            no_gallery,
        } => {
            let loaded = load(cli.config)?;
            println!("==> Building {}", loaded.paths.output.display());
            let options = generate::BuildOptions {
                targets,
                galleries: !no_gallery,
            };
            let report = generate::build_site(&loaded, &options)?;
            output::print_build_output(&report, &loaded.paths.output);
        }
        Command::Scan => {
            let loaded = load(cli.config)?;
            let manifest = generate::scan_site(&loaded.paths)?;
            let manifest_path = generate::write_manifest(&manifest, &loaded.paths.build)?;
            output::print_scan_output(&manifest);
            println!("==> Manifest: {}", manifest_path.display());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn load(explicit: Option<PathBuf>) -> Result<config::LoadedConfig, Box<dyn std::error::Error>> {
    let cwd = std::env::current_dir()?;
    Ok(config::load_config(explicit.as_deref(), &cwd)?)
}

/// Base level `warn`; each `-v` lowers it one step, each `-q` raises it.
/// `RUST_LOG` wins when set.
fn init_logging(verbose: u8, quiet: u8) {
    const LEVELS: [log::LevelFilter; 6] = [
        log::LevelFilter::Off,
        log::LevelFilter::Error,
        log::LevelFilter::Warn,
        log::LevelFilter::Info,
        log::LevelFilter::Debug,
        log::LevelFilter::Trace,
    ];
    let index = (2 + i32::from(verbose) - i32::from(quiet)).clamp(0, 5) as usize;
    env_logger::Builder::new()
        .filter_level(LEVELS[index])
        .parse_default_env()
        .init();
}

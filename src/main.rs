use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};

mod commands;

/// elmpm - a project-aware package manager and build planner for Elm
#[derive(Parser)]
#[command(name = "elmpm")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install one or more packages (all-or-nothing)
    Install {
        /// Packages to install (e.g. elm/html or elm/html@2.0.0)
        packages: Vec<String>,

        /// Install into the test dependencies
        #[arg(long)]
        test: bool,

        /// Allow every existing dependency to move within its major
        #[arg(long)]
        upgrade_all: bool,

        /// Install this package across major versions
        #[arg(long, value_name = "PACKAGE")]
        major: Option<String>,

        /// Answer yes to every prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Remove a package from the manifest
    Remove {
        /// Package name (e.g. elm/html)
        package: String,

        /// Answer yes to every prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Upgrade one package or all of them
    Upgrade {
        /// Specific package to upgrade (omit to upgrade everything)
        package: Option<String>,

        /// Allow major version jumps
        #[arg(long)]
        major: bool,

        /// With --major, drop the test-dependency pins as well
        #[arg(long)]
        major_ignore_test: bool,

        /// Answer yes to every prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Manage the package cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Compute the build plan
    Build {
        #[command(subcommand)]
        action: Option<BuildAction>,

        /// Emit the plan as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Entry files (e.g. src/Main.elm)
        entries: Vec<String>,
    },

    /// Extract modules into a new local package
    Extract {
        /// New package name (e.g. me/widgets)
        package: String,

        /// Target directory for the new package
        target: String,

        /// Project-relative source files to extract
        paths: Vec<String>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List dependencies missing from the cache, optionally download
    Missing {
        /// Answer yes to every prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum BuildAction {
    /// Print a human-readable plan and ask before proceeding
    Check {
        /// Proceed without prompting
        #[arg(long, conflicts_with = "no")]
        yes: bool,

        /// Abort without prompting
        #[arg(long)]
        no: bool,

        /// Entry files (e.g. src/Main.elm)
        entries: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Install {
            packages,
            test,
            upgrade_all,
            major,
            yes,
        } => commands::install::run(packages, test, upgrade_all, major, yes),
        Commands::Remove { package, yes } => commands::remove::run(package, yes),
        Commands::Upgrade {
            package,
            major,
            major_ignore_test,
            yes,
        } => commands::upgrade::run(package, major, major_ignore_test, yes),
        Commands::Cache { action } => match action {
            CacheAction::Missing { yes } => commands::cache::run_missing(yes),
        },
        Commands::Build {
            action,
            json,
            entries,
        } => match action {
            Some(BuildAction::Check { yes, no, entries }) => {
                commands::build::run_check(yes, no, entries)
            }
            None => commands::build::run(json, entries),
        },
        Commands::Extract {
            package,
            target,
            paths,
        } => commands::extract::run(package, target, paths),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "elmpm", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

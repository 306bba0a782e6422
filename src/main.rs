use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use git_partial_stage::{
    Direction, GroupFilter, Listing, Outcome, PartialStageError, PartialStager, Pattern,
    Selection,
};

#[derive(Parser)]
#[command(name = "git-partial-stage")]
#[command(version)]
#[command(about = "Stage or unstage individual change groups within a file's diff")]
struct Cli {
    /// Context lines shown around each change group and searched by --grep
    #[arg(long, global = true, default_value_t = git_partial_stage::DEFAULT_CONTEXT, env = "GIT_PARTIAL_STAGE_CONTEXT")]
    context: usize,

    /// Repository to operate on
    #[arg(short = 'C', long = "repo", global = true, default_value = ".")]
    repo: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the change groups of a file
    Show {
        /// File to inspect
        file: String,
        /// Show only this group number
        #[arg(long)]
        group: Option<usize>,
        /// Show only groups matching this case-insensitive regex
        #[arg(long)]
        grep: Option<String>,
        /// Inspect staged changes instead of unstaged ones
        #[arg(long)]
        cached: bool,
        /// Show the context lines around each change
        #[arg(short, long)]
        verbose: bool,
    },
    /// Stage selected change groups (e.g. --groups 2,5,7-9)
    Stage {
        /// File to stage from
        file: String,
        #[command(flatten)]
        selection: SelectionArgs,
    },
    /// Unstage selected change groups from the index
    Unstage {
        /// File to unstage from
        file: String,
        #[command(flatten)]
        selection: SelectionArgs,
    },
    /// Print shell completions
    Completions {
        shell: Shell,
    },
    /// Print the man page
    #[command(hide = true)]
    Man,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct SelectionArgs {
    /// Groups to act on (e.g. "1,3,5-7" or "all")
    #[arg(long)]
    groups: Option<String>,
    /// Act on groups matching this case-insensitive regex
    #[arg(long)]
    grep: Option<String>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        log::error!("{}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), PartialStageError> {
    let stager = PartialStager::new(&cli.repo).with_context(cli.context);

    match cli.command {
        Commands::Show {
            file,
            group,
            grep,
            cached,
            verbose,
        } => {
            let filter = GroupFilter {
                index: group,
                matcher: grep.as_deref().map(Pattern::new).transpose()?,
            };
            let groups = match stager.show(&file, cached, &filter)? {
                Listing::NoChanges => {
                    let side = if cached { "staged" } else { "unstaged" };
                    println!("No {} changes in {}", side, file);
                    return Ok(());
                }
                Listing::NoGroups => {
                    println!("No change groups found.");
                    return Ok(());
                }
                Listing::Groups(groups) => groups,
            };
            if groups.is_empty() {
                match (&grep, group) {
                    (Some(pattern), _) => println!("No groups matching '{}'", pattern),
                    (None, Some(index)) => println!("Group {} not found.", index),
                    (None, None) => println!("No change groups found."),
                }
                return Ok(());
            }

            println!("\n{} change group(s) in {}:\n", groups.len(), file);
            for group in &groups {
                println!("{}", group.render(verbose));
            }
        }
        Commands::Stage { file, selection } => {
            let selection =
                Selection::from_args(selection.groups.as_deref(), selection.grep.as_deref())?;
            let outcome = stager.stage(&file, &selection)?;
            report(&stager, &file, &selection, Direction::Stage, outcome);
        }
        Commands::Unstage { file, selection } => {
            let selection =
                Selection::from_args(selection.groups.as_deref(), selection.grep.as_deref())?;
            let outcome = stager.unstage(&file, &selection)?;
            report(&stager, &file, &selection, Direction::Unstage, outcome);
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "git-partial-stage",
                &mut std::io::stdout(),
            );
        }
        Commands::Man => {
            if let Err(e) = clap_mangen::Man::new(Cli::command()).render(&mut std::io::stdout()) {
                log::error!("Failed to render man page: {}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Print the result of a stage/unstage request
fn report(
    stager: &PartialStager<'_>,
    file: &str,
    selection: &Selection,
    direction: Direction,
    outcome: Outcome,
) {
    for line in outcome_lines(file, selection, direction, &outcome) {
        println!("{}", line);
    }
    if let Outcome::Applied(_) = outcome
        && let Some(stat) = staged_stat(stager)
    {
        print!("{}", stat);
    }
}

/// The messages describing `outcome`, without the staged summary
fn outcome_lines(
    file: &str,
    selection: &Selection,
    direction: Direction,
    outcome: &Outcome,
) -> Vec<String> {
    let (side, verb) = match direction {
        Direction::Stage => ("unstaged", "Staged"),
        Direction::Unstage => ("staged", "Unstaged"),
    };

    match (outcome, selection) {
        (Outcome::NoChanges, _) => vec![format!("No {} changes in {}", side, file)],
        (Outcome::NoGroups, _) => vec!["No change groups found.".to_string()],
        (Outcome::NothingSelected, Selection::Grep(pattern)) => {
            vec![format!("No groups matching '{}'", pattern.as_str())]
        }
        (Outcome::NothingSelected, Selection::Groups(_)) => {
            vec!["No valid groups selected.".to_string()]
        }
        (Outcome::Applied(groups), _) => {
            let mut lines = Vec::new();
            if let Selection::Grep(_) = selection {
                let matched: Vec<usize> = groups.iter().map(|g| g.index).collect();
                lines.push(format!("Matched groups: {:?}", matched));
            }
            lines.extend(groups.iter().map(|g| g.render(false)));
            lines.push(format!("{} {} group(s) from {}", verb, groups.len(), file));
            lines
        }
    }
}

/// `git diff --cached --stat` after an apply that already succeeded
fn staged_stat(stager: &PartialStager<'_>) -> Option<String> {
    stager
        .cached_stat()
        .inspect_err(|e| log::warn!("Could not summarise staged changes: {}", e))
        .ok()
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use xrefscope_verifier::Verifier;

#[derive(Parser)]
#[command(
    name = "xrefscope",
    version,
    about = "Verify cross-reference fact streams against embedded assertions",
    long_about = "Xrefscope checks the fact stream produced by an extractor against \
                  goal programs embedded in magic comments of the extractor's input. \
                  Facts are read as newline-delimited JSON entries."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prove the assertions in one or more goal files against a fact stream
    Verify {
        /// Path to the newline-delimited JSON entry stream
        #[arg(short, long, value_name = "FILE")]
        entries: PathBuf,

        /// Goal files containing assertions in magic comments
        #[arg(value_name = "GOAL_FILE", required = true)]
        goals: Vec<PathBuf>,

        /// Magic comment prefix marking assertion lines
        #[arg(long, default_value = "//-")]
        prefix: String,

        /// Print the parsed goal groups before solving
        #[arg(long)]
        show_goals: bool,

        /// Accept duplicate facts in the entry stream
        #[arg(long)]
        ignore_dups: bool,
    },
    /// Dump a fact stream as a sorted JSON array
    Dump {
        /// Path to the newline-delimited JSON entry stream
        #[arg(value_name = "FILE")]
        entries: PathBuf,
    },
}

fn main() -> ExitCode {
    let _guard = xrefscope_core::logging::init_logging("cli", true);
    let cli = Cli::parse();

    match cli.command {
        Commands::Verify {
            entries,
            goals,
            prefix,
            show_goals,
            ignore_dups,
        } => {
            let mut verifier = Verifier::new();
            if ignore_dups {
                verifier.ignore_duplicate_facts();
            }
            let data = match std::fs::read_to_string(&entries) {
                Ok(data) => data,
                Err(err) => {
                    eprintln!("when reading {}: {err}", entries.display());
                    return ExitCode::FAILURE;
                }
            };
            match verifier.load_json_entries(&data) {
                Ok(count) => info!("loaded {count} facts from {}", entries.display()),
                Err(err) => {
                    eprintln!("when loading {}: {err}", entries.display());
                    return ExitCode::FAILURE;
                }
            }
            let mut parsed_ok = true;
            for goal_file in &goals {
                if !verifier.parse_inline_rules_file(goal_file, &prefix) {
                    for error in verifier.parse_errors() {
                        eprintln!("{error}");
                    }
                    parsed_ok = false;
                }
            }
            if !parsed_ok {
                return ExitCode::FAILURE;
            }
            if show_goals {
                print!("{}", verifier.show_goals());
            }
            if verifier.verify_all_goals() {
                info!("all goals verified");
                ExitCode::SUCCESS
            } else {
                for diagnostic in verifier.diagnostics() {
                    eprintln!("{diagnostic}");
                }
                eprintln!(
                    "verification failed (group {}, goal {})",
                    verifier.highest_group_reached(),
                    verifier.highest_goal_reached()
                );
                ExitCode::FAILURE
            }
        }
        Commands::Dump { entries } => {
            let mut verifier = Verifier::new();
            let data = match std::fs::read_to_string(&entries) {
                Ok(data) => data,
                Err(err) => {
                    eprintln!("when reading {}: {err}", entries.display());
                    return ExitCode::FAILURE;
                }
            };
            if let Err(err) = verifier.load_json_entries(&data) {
                eprintln!("when loading {}: {err}", entries.display());
                return ExitCode::FAILURE;
            }
            match verifier.dump_as_json() {
                Ok(json) => {
                    println!("{json}");
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    eprintln!("when dumping: {err}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

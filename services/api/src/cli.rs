use crate::report::{run_codes, run_detail, run_rank, CodesArgs, DetailArgs, RankArgs};
use crate::server;
use ci_ranker::error::AppError;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "ci-ranker",
    about = "Rank research-grant Chief Investigators by Field-of-Research code and year",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Print the Chief Investigator ranking for a filter
    Rank(RankArgs),
    /// Print the projects behind one Chief Investigator's count
    Detail(DetailArgs),
    /// Print the FoR code and year catalog
    Codes(CodesArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Override the configured grants CSV
    #[arg(long)]
    pub(crate) dataset: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Rank(args) => run_rank(args),
        Command::Detail(args) => run_detail(args),
        Command::Codes(args) => run_codes(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_defaults_to_serve() {
        let cli = Cli::try_parse_from(["ci-ranker"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn rank_splits_comma_separated_codes() {
        let cli = Cli::try_parse_from([
            "ci-ranker",
            "rank",
            "--codes",
            "0101,010101",
            "--divisions",
            "02",
            "--min-year",
            "2018",
            "--json",
        ])
        .expect("parses");

        match cli.command {
            Some(Command::Rank(args)) => {
                assert_eq!(args.filter.codes, vec!["0101", "010101"]);
                assert_eq!(args.filter.divisions, vec!["02"]);
                assert_eq!(args.filter.min_year.as_deref(), Some("2018"));
                assert!(args.source.json);
            }
            other => panic!("expected rank command, got {other:?}"),
        }
    }

    #[test]
    fn detail_takes_name_and_paging() {
        let cli = Cli::try_parse_from([
            "ci-ranker",
            "detail",
            "Prof A Smith",
            "--limit",
            "5",
            "--dataset",
            "grants.csv",
        ])
        .expect("parses");

        match cli.command {
            Some(Command::Detail(args)) => {
                assert_eq!(args.ci_name, "Prof A Smith");
                assert_eq!(args.limit, Some(5));
                assert_eq!(args.offset, None);
                assert_eq!(args.source.dataset, Some(PathBuf::from("grants.csv")));
            }
            other => panic!("expected detail command, got {other:?}"),
        }
    }

    #[test]
    fn serve_accepts_overrides() {
        let cli = Cli::try_parse_from(["ci-ranker", "serve", "--port", "8080"]).expect("parses");

        match cli.command {
            Some(Command::Serve(args)) => {
                assert_eq!(args.port, Some(8080));
                assert!(args.host.is_none());
            }
            other => panic!("expected serve command, got {other:?}"),
        }
    }
}

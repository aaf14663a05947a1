use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use cubestats::convert::{convert_file, default_sessions_path};
use cubestats::export::DateStyle;

/// convert a csTimer export into csv tables of solves and sessions
#[derive(Parser, Debug, Clone)]
#[clap(version, about)]
pub struct Cli {
    /// csTimer export file
    #[clap(short = 'i', long)]
    input: PathBuf,

    /// csv file receiving one row per solve
    #[clap(short = 'o', long)]
    output: PathBuf,

    /// csv file receiving one row per session (default: sessions.csv next to the output)
    #[clap(short = 's', long)]
    sessions: Option<PathBuf>,

    /// print dates in UTC instead of local time
    #[clap(long)]
    utc: bool,
}

impl Cli {
    fn sessions_path(&self) -> PathBuf {
        self.sessions
            .clone()
            .unwrap_or_else(|| default_sessions_path(&self.output))
    }

    fn date_style(&self) -> DateStyle {
        if self.utc {
            DateStyle::Utc
        } else {
            DateStyle::Local
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let sessions = cli.sessions_path();
    tracing::info!("converting {}", cli.input.display());

    if let Err(err) = convert_file(&cli.input, &cli.output, &sessions, cli.date_style()) {
        tracing::error!("conversion failed: {err}");
        return Err(err.into());
    }

    println!("Conversion complete.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_default_next_to_output() {
        let cli = Cli::parse_from(["cstimer2csv", "-i", "in.txt", "-o", "out/solves.csv"]);
        assert_eq!(cli.sessions_path(), PathBuf::from("out/sessions.csv"));
        assert_eq!(cli.date_style(), DateStyle::Local);
    }

    #[test]
    fn explicit_sessions_and_utc() {
        let cli = Cli::parse_from([
            "cstimer2csv",
            "--input",
            "in.txt",
            "--output",
            "solves.csv",
            "-s",
            "summary.csv",
            "--utc",
        ]);
        assert_eq!(cli.sessions_path(), PathBuf::from("summary.csv"));
        assert_eq!(cli.date_style(), DateStyle::Utc);
    }

    #[test]
    fn input_and_output_are_required() {
        assert!(Cli::try_parse_from(["cstimer2csv", "-i", "in.txt"]).is_err());
        assert!(Cli::try_parse_from(["cstimer2csv", "-o", "out.csv"]).is_err());
    }
}

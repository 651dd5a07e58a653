//! Standalone validator for session strings.
//!
//! Checks the format of a session string without connecting to Telegram.
//! A passing string can still be revoked; only a login proves it works.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::Serialize;

use nexus_userbot::session::{self, SessionAnalysis, SessionComparison, ValidationReport};

/// Session string validator.
#[derive(Parser, Debug)]
#[command(name = "validate_session")]
#[command(about = "Validates Nexus session strings offline")]
#[command(version)]
struct Args {
    /// Session string to validate (default: SESSION_STRING from the environment).
    session: Option<String>,

    /// Read the session string from a file instead.
    #[arg(short, long, conflicts_with = "session")]
    file: Option<PathBuf>,

    /// Include a security score and recommendations.
    #[arg(short, long)]
    analyze: bool,

    /// Compare against another session string.
    #[arg(short, long, value_name = "OTHER")]
    compare: Option<String>,

    /// Print the result as JSON.
    #[arg(long)]
    json: bool,

    /// Path to the .env file consulted for SESSION_STRING.
    #[arg(long, default_value = ".env")]
    env_file: String,
}

/// Everything the tool can report, in one serializable value.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Outcome {
    Report(ValidationReport),
    Analysis(SessionAnalysis),
    Comparison(SessionComparison),
}

impl Outcome {
    fn is_valid(&self) -> bool {
        match self {
            Self::Report(report) => report.valid,
            Self::Analysis(analysis) => analysis.report.valid,
            Self::Comparison(comparison) => comparison.session1_valid && comparison.session2_valid,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let session_string = match load_session(&args) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("✗ {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = evaluate(&session_string, &args);

    if args.json {
        match serde_json::to_string_pretty(&outcome) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("✗ Failed to serialize result: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_outcome(&outcome);
    }

    if outcome.is_valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn load_session(args: &Args) -> Result<String> {
    if let Some(path) = &args.file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return Ok(content.trim().to_owned());
    }

    if let Some(session) = &args.session {
        return Ok(session.trim().to_owned());
    }

    let _ = dotenvy::from_filename(&args.env_file);
    match std::env::var("SESSION_STRING") {
        Ok(session) if !session.trim().is_empty() => Ok(session.trim().to_owned()),
        _ => bail!("No session string given and SESSION_STRING is not set"),
    }
}

fn evaluate(session_string: &str, args: &Args) -> Outcome {
    if let Some(other) = &args.compare {
        Outcome::Comparison(session::compare(session_string, other.trim()))
    } else if args.analyze {
        Outcome::Analysis(session::analyze(session_string))
    } else {
        Outcome::Report(session::validate(session_string))
    }
}

fn print_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Report(report) => print_report(report),
        Outcome::Analysis(analysis) => {
            print_report(&analysis.report);
            println!("\nSecurity score: {}/100", analysis.security_score);
            println!(
                "Compatible with: grammers {}, pyrogram {}",
                yes_no(analysis.compatibility.grammers),
                yes_no(analysis.compatibility.pyrogram),
            );
            if !analysis.recommendations.is_empty() {
                println!("\nRecommendations:");
                for recommendation in &analysis.recommendations {
                    println!("  • {recommendation}");
                }
            }
        }
        Outcome::Comparison(comparison) => {
            println!("Session 1 valid: {}", yes_no(comparison.session1_valid));
            println!("Session 2 valid: {}", yes_no(comparison.session2_valid));
            println!("Identical: {}", yes_no(comparison.identical));
            println!("Same DC: {}", yes_no(comparison.same_dc));
            for difference in &comparison.differences {
                println!("  ≠ {difference}");
            }
        }
    }
}

fn print_report(report: &ValidationReport) {
    if report.valid {
        println!("✓ Session string format looks valid");
    } else {
        println!(
            "✗ Session string is invalid: {}",
            report.error.as_deref().unwrap_or("unknown error")
        );
    }

    if let Some(info) = &report.info {
        println!("  Length: {} characters", info.string_length);
        println!("  Decoded size: {} bytes", info.decoded_length);
        println!("  Type: {}", info.estimated_type);
        if let Some(dc_id) = info.dc_id {
            println!("  Data center: DC{dc_id}");
        }
    }

    for warning in &report.warnings {
        println!("  ⚠ {warning}");
    }
}

const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

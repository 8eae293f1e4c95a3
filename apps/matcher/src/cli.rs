//! Command-line interface for the matcher client

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::pages::requirements::{parse_add, parse_delete, parse_set, EditOp};

#[derive(Parser)]
#[command(name = "matcher")]
#[command(about = "Drive the CV/JD matching workflow against a matcher server")]
#[command(
    long_about = "Upload a job description, confirm its extracted requirements, upload CVs, follow the analysis and read the categorized results. Every stage can be opened directly by its location."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Server base URL (overrides MATCHER_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Milliseconds between status polls (overrides MATCHER_POLL_INTERVAL_MS)
    #[arg(long, global = true)]
    pub poll_interval_ms: Option<u64>,

    /// Disable coloured output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Step 1: upload a Job Description (PDF, DOCX, TXT)
    UploadJd {
        file: PathBuf,
    },

    /// Step 2: review, edit and confirm the requirements extracted from a JD.
    ///
    /// Edits apply in this order: --reset, --set, --delete, --add. Indices
    /// refer to the list as shown before any deletion.
    Requirements {
        jd_id: String,

        /// Replace an entry, e.g. skills:1=Go
        #[arg(long = "set", value_name = "CAT:IDX=VALUE", value_parser = parse_set)]
        set: Vec<EditOp>,

        /// Remove an entry, e.g. education:0
        #[arg(long = "delete", value_name = "CAT:IDX", value_parser = parse_delete)]
        delete: Vec<EditOp>,

        /// Append an entry, e.g. skills=Rust
        #[arg(long = "add", value_name = "CAT=VALUE", value_parser = parse_add)]
        add: Vec<EditOp>,

        /// Discard edits and start from the extracted requirements
        #[arg(long)]
        reset: bool,

        /// Save the requirements and continue to CV upload
        #[arg(long)]
        confirm: bool,
    },

    /// Step 3: upload CVs (PDF, DOCX, TXT or ZIP) and analyze them against a JD
    UploadCvs {
        jd_id: String,

        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Start the analysis and exit without following its progress
        #[arg(long)]
        no_wait: bool,
    },

    /// Step 4: show the categorized results of an analysis session
    Results {
        session_id: String,
    },

    /// Open any workflow location, e.g. /results/12 or /upload-cvs/7
    Open {
        location: String,

        /// Files for locations that upload them
        files: Vec<PathBuf>,
    },

    /// Run the whole pipeline, confirming requirements as extracted
    Run {
        /// Job Description file
        #[arg(long)]
        jd: PathBuf,

        /// CV files or ZIP archives
        #[arg(long, required = true, num_args = 1..)]
        cvs: Vec<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::requirements::RequirementCategory;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_requirements_edits_parse() {
        let cli = Cli::try_parse_from([
            "matcher",
            "requirements",
            "7",
            "--set",
            "skills:0=Go",
            "--delete",
            "education:1",
            "--add",
            "skills=Rust",
            "--confirm",
        ])
        .unwrap();

        let Commands::Requirements { jd_id, set, delete, add, reset, confirm } = cli.command else {
            panic!("expected the requirements command");
        };
        assert_eq!(jd_id, "7");
        assert_eq!(
            set,
            vec![EditOp::Set {
                category: RequirementCategory::Skills,
                index: 0,
                value: "Go".to_string()
            }]
        );
        assert_eq!(delete.len(), 1);
        assert_eq!(add.len(), 1);
        assert!(confirm && !reset);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "matcher",
            "results",
            "12",
            "--api-url",
            "http://server/api/v1",
            "--poll-interval-ms",
            "500",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.api_url.as_deref(), Some("http://server/api/v1"));
        assert_eq!(cli.poll_interval_ms, Some(500));
    }

    #[test]
    fn test_malformed_edit_is_rejected_by_the_parser() {
        assert!(Cli::try_parse_from(["matcher", "requirements", "7", "--set", "skills=Go"]).is_err());
    }

    #[test]
    fn test_upload_cvs_requires_files() {
        assert!(Cli::try_parse_from(["matcher", "upload-cvs", "7"]).is_err());
    }
}

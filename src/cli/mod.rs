use clap::{Parser, Subcommand};

use crate::bookmarks::Source;

mod errors;
mod handlers;
mod validation;

pub use handlers::*;

#[derive(Parser, Debug)]
#[command(version, about = "Index and search bookmarks from X, Raindrop and GitHub stars", long_about = None)]
pub struct Args {
    /// Debug logging (RUST_LOG overrides)
    #[clap(short, long, global = true, default_value = "false")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Pull new bookmarks from the sources and enrich them
    Fetch {
        /// Full resync; bookmarks removed upstream are deleted
        #[clap(short, long, default_value = "false")]
        force: bool,

        /// Re-fetch content, summary and embedding of known bookmarks
        #[clap(short, long, default_value = "false")]
        reprocess: bool,

        /// Only these sources (x, raindrop, github)
        #[clap(short, long = "source", value_delimiter = ',')]
        sources: Vec<Source>,

        /// Most pending bookmarks to enrich (config pipeline.batch_limit by default)
        #[clap(short, long)]
        limit: Option<usize>,
    },

    /// Hybrid full-text and semantic search
    Search {
        /// Search terms; empty lists the newest bookmarks
        #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
        query: Vec<String>,

        #[clap(short = 'n', long, default_value = "20")]
        limit: usize,

        #[clap(flatten)]
        output: OutputArgs,

        /// Don't start a background refresh even if one is due
        #[clap(long, default_value = "false")]
        no_refresh: bool,
    },

    /// List bookmarks, newest first
    List {
        /// Only these sources
        #[clap(short, long = "source", value_delimiter = ',')]
        sources: Vec<Source>,

        #[clap(short = 'n', long, default_value = "20")]
        limit: usize,

        #[clap(flatten)]
        output: OutputArgs,
    },

    /// Index a URL by hand
    Add {
        url: String,

        #[clap(short, long)]
        title: Option<String>,

        #[clap(long)]
        notes: Option<String>,

        #[clap(long, default_value = "false")]
        json: bool,
    },

    /// Reset a bookmark and enrich it again
    Reprocess {
        /// Bookmark id or url
        target: String,
    },

    /// Generate missing summaries for bookmarks that already have content
    Resummarize {
        #[clap(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Delete a bookmark
    Delete {
        /// Bookmark id or url
        target: String,

        /// Auto confirm
        #[clap(short, long, default_value = "false")]
        yes: bool,
    },

    /// Edit a bookmark's fields
    Edit {
        /// Bookmark id or url
        target: String,

        #[clap(short, long)]
        title: Option<String>,

        #[clap(short, long)]
        summary: Option<String>,

        /// Comma separated
        #[clap(short, long)]
        keywords: Option<String>,

        #[clap(long)]
        notes: Option<String>,

        /// Hide from listings and search
        #[clap(long, default_value = "false", conflicts_with = "unhide")]
        hide: bool,

        #[clap(long, default_value = "false")]
        unhide: bool,
    },
}

#[derive(clap::Args, Debug, Clone, Copy)]
pub struct OutputArgs {
    /// Print results as JSON
    #[clap(long, default_value = "false", conflicts_with = "plaintext")]
    pub json: bool,

    /// Print `source<TAB>title<TAB>url` lines
    #[clap(long, default_value = "false")]
    pub plaintext: bool,
}

impl OutputArgs {
    pub fn format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else if self.plaintext {
            OutputFormat::Plain
        } else {
            OutputFormat::Pretty
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Pretty,
    Json,
    Plain,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fetch_sources() {
        let args = Args::parse_from(["xhub", "fetch", "--force", "-s", "github,x"]);
        match args.command {
            Command::Fetch { force, sources, .. } => {
                assert!(force);
                assert_eq!(sources, vec![Source::Github, Source::X]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_search_query_words() {
        let args = Args::parse_from(["xhub", "search", "--json", "rust", "async"]);
        match args.command {
            Command::Search { query, output, .. } => {
                assert_eq!(query.join(" "), "rust async");
                assert_eq!(output.format(), OutputFormat::Json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_json_and_plaintext_conflict() {
        assert!(Args::try_parse_from(["xhub", "list", "--json", "--plaintext"]).is_err());
    }

    #[test]
    fn test_unknown_source_is_rejected() {
        assert!(Args::try_parse_from(["xhub", "list", "-s", "mastodon"]).is_err());
    }
}

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod app;
mod bookmarks;
mod cli;
mod config;
mod eid;
mod enrich;
mod lock;
mod semantic;
mod sources;
mod store;
#[cfg(test)]
mod tests;

use app::AppFactory;
use bookmarks::BookmarkUpdate;
use cli::Command;

fn init_logging(verbose: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if verbose {
        EnvFilter::new("xhub=debug,warn")
    } else {
        EnvFilter::new("warn")
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let args = cli::Args::parse();
    init_logging(args.verbose);

    let paths = AppFactory::get_paths()?;
    let app = AppFactory::create_app_service(&paths)?;

    match args.command {
        Command::Fetch {
            force,
            reprocess,
            sources,
            limit,
        } => cli::handle_fetch(&app, force, reprocess, sources, limit),

        Command::Search {
            query,
            limit,
            output,
            no_refresh,
        } => cli::handle_search(&app, &query, limit, output.format(), no_refresh),

        Command::List {
            sources,
            limit,
            output,
        } => cli::handle_list(&app, &sources, limit, output.format()),

        Command::Add {
            url,
            title,
            notes,
            json,
        } => cli::handle_add(&app, &url, title, notes, json),

        Command::Reprocess { target } => cli::handle_reprocess(&app, &target),

        Command::Resummarize { limit } => cli::handle_resummarize(&app, limit),

        Command::Delete { target, yes } => cli::handle_delete(&app, &target, yes),

        Command::Edit {
            target,
            title,
            summary,
            keywords,
            notes,
            hide,
            unhide,
        } => {
            let hidden = match (hide, unhide) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            let update = BookmarkUpdate {
                title,
                summary,
                keywords,
                notes,
                hidden,
            };
            cli::handle_edit(&app, &target, update)
        }
    }
}

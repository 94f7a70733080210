use crate::bookmarks::BookmarkUpdate;
use crate::cli::errors::{CliError, CliResult};
use url::Url;

/// Validates URL format. Only web URLs can be fetched and summarized.
pub fn validate_url(url: &str) -> CliResult<()> {
    if url.trim().is_empty() {
        return Err(CliError::validation("url", "URL cannot be empty"));
    }

    match Url::parse(url.trim()) {
        Ok(parsed_url) => {
            if !matches!(parsed_url.scheme(), "http" | "https") {
                return Err(CliError::validation("url", "URL must start with http:// or https://"));
            }
            if parsed_url.host_str().is_none() {
                return Err(CliError::validation("url", "URL must have a host"));
            }
            Ok(())
        }
        Err(_) => Err(CliError::validation("url", "Invalid URL format")),
    }
}

pub fn validate_limit(limit: usize) -> CliResult<()> {
    if limit == 0 {
        return Err(CliError::validation("limit", "Limit must be greater than 0"));
    }
    Ok(())
}

/// Validates title length
pub fn validate_title(title: &str) -> CliResult<()> {
    if title.chars().count() > 500 {
        return Err(CliError::validation("title", "Title cannot exceed 500 characters"));
    }
    Ok(())
}

/// Validates a user edit before it reaches the store.
pub fn validate_update(update: &BookmarkUpdate) -> CliResult<()> {
    if update.is_empty() {
        return Err(CliError::invalid_input("This update request does nothing"));
    }
    if let Some(title) = &update.title {
        validate_title(title)?;
    }
    Ok(())
}

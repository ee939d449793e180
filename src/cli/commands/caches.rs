//! Caches and entries commands - inspect cache storage

use crate::cli::args::{CachesArgs, EntriesArgs, OutputFormat};
use crate::cli::Environment;
use crate::error::{StreamsError, StreamsResult};
use crate::http::Request;
use crate::storage::name::{compare_names, CacheName};
use crate::storage::{existing, CacheStorage};
use crate::ui::{self, UiContext};
use console::style;
use serde::Serialize;
use url::Url;

/// One cache namespace as listed
#[derive(Debug, Serialize)]
struct CacheRow {
    name: String,
    version: Option<String>,
    entries: usize,
    status: &'static str,
}

/// One cache entry as listed
#[derive(Debug, Serialize)]
struct EntryRow {
    method: String,
    url: String,
    status: u16,
    kind: String,
    size: usize,
}

/// Execute the caches command
pub async fn execute(args: CachesArgs, env: &Environment) -> StreamsResult<()> {
    let storage = env.storage();
    let rows = cache_rows(&*storage, &env.config.worker.cache_name()).await?;

    if rows.is_empty() {
        match args.format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => ui::step_info(&UiContext::detect(), "No caches found"),
        }
        return Ok(());
    }

    match args.format {
        OutputFormat::Table => print_cache_table(&rows),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Plain => {
            for row in &rows {
                println!("{}", row.name);
            }
        }
    }
    Ok(())
}

async fn cache_rows(storage: &dyn CacheStorage, current: &str) -> StreamsResult<Vec<CacheRow>> {
    let current_name = CacheName::parse(current);
    let mut names = storage.keys().await?;
    names.sort_by(|a, b| compare_names(a, b));

    let mut rows = Vec::with_capacity(names.len());
    for name in names {
        let entries = storage.open(&name).await?.keys().await?.len();
        let parsed = CacheName::parse(&name);
        let status = if name == current {
            "current"
        } else if matches!((&parsed, &current_name), (Some(p), Some(c)) if p.same_family(c)) {
            "stale"
        } else {
            "foreign"
        };
        rows.push(CacheRow {
            version: parsed.map(|p| p.raw_version),
            name,
            entries,
            status,
        });
    }
    Ok(rows)
}

fn print_cache_table(rows: &[CacheRow]) {
    println!(
        "{:<32} {:<10} {:<8} {:<10}",
        style("NAME").bold(),
        style("VERSION").bold(),
        style("ENTRIES").bold(),
        style("STATUS").bold()
    );
    println!("{}", "-".repeat(62));

    for row in rows {
        let status = match row.status {
            "current" => style(row.status).green(),
            "stale" => style(row.status).yellow(),
            _ => style(row.status).dim(),
        };
        println!(
            "{:<32} {:<10} {:<8} {:<10}",
            row.name,
            row.version.as_deref().unwrap_or("-"),
            row.entries,
            status
        );
    }

    println!();
    println!("{} cache(s)", rows.len());
}

/// Execute the entries command
pub async fn entries(args: EntriesArgs, env: &Environment) -> StreamsResult<()> {
    let storage = env.storage();
    let name = args
        .cache
        .unwrap_or_else(|| env.config.worker.cache_name());
    let cache = existing(&*storage, &name).await?;

    let mut rows = Vec::new();
    for key in cache.keys().await? {
        let url = Url::parse(&key.url).map_err(|e| StreamsError::invalid_url(&key.url, e))?;
        let Some(response) = cache.match_request(&Request::new(&key.method, url)).await? else {
            continue;
        };
        rows.push(EntryRow {
            method: key.method,
            url: key.url,
            status: response.status,
            kind: response.kind.to_string(),
            size: response.body.len(),
        });
    }

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Plain => {
            for row in &rows {
                println!("{}", row.url);
            }
        }
        OutputFormat::Table => {
            let ctx = UiContext::detect();
            if rows.is_empty() {
                ui::step_info(&ctx, &format!("{} is empty", name));
                return Ok(());
            }
            ui::intro(&ctx, &name);
            println!(
                "{:<6} {:<7} {:<8} {:>10}  {}",
                style("METHOD").bold(),
                style("STATUS").bold(),
                style("KIND").bold(),
                style("SIZE").bold(),
                style("URL").bold()
            );
            for row in &rows {
                println!(
                    "{:<6} {:<7} {:<8} {:>10}  {}",
                    row.method, row.status, row.kind, row.size, row.url
                );
            }
            println!();
            println!("{} entr{}", rows.len(), if rows.len() == 1 { "y" } else { "ies" });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Response;
    use crate::storage::MemoryStorage;

    #[tokio::test]
    async fn rows_mark_current_stale_and_foreign() {
        let storage = MemoryStorage::new();
        storage.open("streams-cache-v13.2").await.unwrap();
        storage.open("workbox-precache").await.unwrap();
        let old = storage.open("streams-cache-v13.1").await.unwrap();
        let url = Url::parse("http://localhost:8080/index.html").unwrap();
        old.put(&Request::get(url.clone()), Response::new(url, 200, "old"))
            .await
            .unwrap();

        let rows = cache_rows(&storage, "streams-cache-v13.2").await.unwrap();
        let summary: Vec<_> = rows
            .iter()
            .map(|r| (r.name.as_str(), r.status, r.entries))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("streams-cache-v13.1", "stale", 1),
                ("streams-cache-v13.2", "current", 0),
                ("workbox-precache", "foreign", 0),
            ]
        );
        assert_eq!(rows[0].version.as_deref(), Some("13.1"));
        assert!(rows[2].version.is_none());
    }
}

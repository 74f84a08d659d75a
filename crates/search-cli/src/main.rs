//! hsearch
//!
//! Command-line front end for helios-search.

mod args;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use helios_search::{
    BulkOperation, ClientConfig, HighlightOptions, IndexSettings, QueryBuilder, RequestContext,
    SearchClient, SearchOptions, SortField, connect, match_query, multi_match, range, term,
};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use args::{Cli, Command, QueryArgs};

/// Installs the tracing subscriber; `RUST_LOG` overrides `level`.
fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("helios_search={},hsearch={}", level, level))
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<ClientConfig> {
    let Some(ref path) = cli.config else {
        return Ok(cli.client_config());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
}

/// Reads a JSON argument: inline, `-` for stdin, or `@path`.
fn read_json_arg(arg: &str) -> anyhow::Result<Value> {
    let raw = match arg {
        "-" => std::io::read_to_string(std::io::stdin()).context("reading stdin")?,
        _ => match arg.strip_prefix('@') {
            Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?,
            None => arg.to_string(),
        },
    };
    serde_json::from_str(&raw).context("document is not valid JSON")
}

/// Splits `field=value`; the value is JSON when it parses, a string otherwise.
fn field_value(arg: &str) -> anyhow::Result<(String, Value)> {
    let Some((field, value)) = arg.split_once('=') else {
        bail!("expected field=value, got {:?}", arg);
    };
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((field.to_string(), value))
}

fn build_query(args: &QueryArgs) -> anyhow::Result<QueryBuilder> {
    let mut query = QueryBuilder::new();
    if let Some(ref text) = args.text {
        query = match args.field {
            Some(ref field) => query.must(match_query(field.as_str(), text.as_str())),
            None => query.must(multi_match(text.as_str(), ["*"])),
        };
    }
    for arg in &args.terms {
        let (field, value) = field_value(arg)?;
        query = query.filter(term(field, value));
    }
    for arg in &args.gte {
        let (field, value) = field_value(arg)?;
        query = query.filter(range(field).gte(value));
    }
    for arg in &args.lte {
        let (field, value) = field_value(arg)?;
        query = query.filter(range(field).lte(value));
    }
    Ok(query)
}

fn read_bulk_file(path: &Path) -> anyhow::Result<Vec<BulkOperation>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading bulk file {}", path.display()))?;
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid bulk operation", path.display(), number + 1))
        })
        .collect()
}

fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(client: Arc<dyn SearchClient>, ctx: &RequestContext, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Health => {
            client.health_check(ctx).await?;
            print(&json!({ "backend": client.backend(), "status": "ok" }))?;
        }
        Command::CreateIndex {
            index,
            primary_key,
            shards,
            replicas,
            mappings,
            searchable,
            filterable,
            sortable,
        } => {
            let mut settings = IndexSettings::new()
                .searchable(searchable)
                .filterable(filterable)
                .sortable(sortable);
            settings.primary_key = primary_key;
            settings.number_of_shards = shards;
            settings.number_of_replicas = replicas;
            if let Some(ref mappings) = mappings {
                settings.mappings = Some(read_json_arg(mappings)?);
            }
            client.create_index(ctx, &index, &settings).await?.wait(ctx).await?;
            info!(index = %index, "Index created");
            print(&json!({ "index": index, "created": true }))?;
        }
        Command::DeleteIndex { index, wait } => {
            let receipt = client.delete_index(ctx, &index).await?;
            if wait {
                receipt.wait(ctx).await?;
            }
            print(&json!({ "index": index, "deleted": true, "task_uid": receipt.task_uid() }))?;
        }
        Command::Exists { index } => {
            let exists = client.index_exists(ctx, &index).await?;
            print(&json!({ "index": index, "exists": exists }))?;
        }
        Command::Index {
            index,
            document,
            id,
            wait,
        } => {
            let document = read_json_arg(&document)?;
            let receipt = client.index(ctx, &index, &id, &document).await?;
            if wait {
                receipt.wait(ctx).await?;
            }
            print(&json!({ "index": index, "id": id, "task_uid": receipt.task_uid() }))?;
        }
        Command::Get { index, id } => {
            let document = client.get(ctx, &index, &id).await?;
            print(&json!({
                "index": document.index,
                "id": document.id,
                "version": document.version,
                "source": document.source_json()?,
            }))?;
        }
        Command::Delete { index, id, wait } => {
            let receipt = client.delete(ctx, &index, &id).await?;
            if wait {
                receipt.wait(ctx).await?;
            }
            print(&json!({ "index": index, "id": id, "deleted": true }))?;
        }
        Command::Search {
            index,
            query,
            from,
            size,
            sort,
            highlight,
            exact_total,
        } => {
            let query = build_query(&query)?;
            let mut options = SearchOptions::new();
            options.from = from;
            options.size = size;
            options.sort = sort.iter().map(|s| SortField::parse(s)).collect();
            if !highlight.is_empty() {
                options.highlight = Some(HighlightOptions::fields(highlight));
            }
            if exact_total {
                options.track_total_hits = Some(true);
            }

            let result = client.search_with_options(ctx, &index, &query, &options).await?;
            debug!(total = result.total, took_ms = result.took_ms, "Search finished");
            let hits = result
                .hits
                .iter()
                .map(|hit| {
                    Ok(json!({
                        "id": hit.id,
                        "score": hit.score,
                        "highlight": hit.highlight,
                        "source": hit.source_json()?,
                    }))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            print(&json!({
                "total": result.total,
                "exact": result.is_exact(),
                "took_ms": result.took_ms,
                "hits": hits,
                "aggregations": result.aggregations,
            }))?;
        }
        Command::Count { index, query } => {
            let query = build_query(&query)?;
            let count = client.count(ctx, &index, &query).await?;
            print(&json!({ "index": index, "count": count }))?;
        }
        Command::Bulk { file } => {
            let operations = read_bulk_file(&file)?;
            let result = client.bulk(ctx, &operations).await?;
            print(&result)?;
            if result.has_errors() {
                bail!("{} of {} operations failed", result.error_count, result.items.len());
            }
        }
        Command::Refresh { index } => {
            client.refresh(ctx, &index).await?;
            print(&json!({ "index": index, "refreshed": true }))?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config = load_config(&cli)?;
    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }
    info!(backend = %config.backend(), "Connecting");
    let client = connect(config)?;

    let ctx = RequestContext::new().with_timeout(Duration::from_secs(cli.timeout));
    let on_interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let outcome = run(client.clone(), &ctx, cli.command).await;
    client.close().await?;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_field_value_parses_json_scalars() {
        assert_eq!(field_value("price=1000").unwrap(), ("price".to_string(), json!(1000)));
        assert_eq!(field_value("in_stock=true").unwrap(), ("in_stock".to_string(), json!(true)));
        assert_eq!(field_value("brand=acme").unwrap(), ("brand".to_string(), json!("acme")));
        assert!(field_value("brand").is_err());
    }

    #[test]
    fn test_build_query() {
        let args = QueryArgs {
            text: Some("laptop".to_string()),
            field: Some("name".to_string()),
            lte: vec!["price=1000".to_string()],
            ..Default::default()
        };
        let body = build_query(&args).unwrap().build();
        assert_eq!(body["query"]["bool"]["must"], json!([{ "match": { "name": "laptop" } }]));
        assert_eq!(
            body["query"]["bool"]["filter"],
            json!([{ "range": { "price": { "lte": 1000 } } }])
        );
    }

    #[test]
    fn test_read_bulk_file_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"action":"index","index":"products","id":"1","document":{{"name":"a"}}}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"action":"delete","index":"products","id":"2"}}"#).unwrap();

        let operations = read_bulk_file(file.path()).unwrap();
        assert_eq!(operations.len(), 2);
        assert_eq!(operations[1], BulkOperation::delete("products", "2"));
    }

    #[test]
    fn test_load_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"backend":"meilisearch","url":"http://search:7700","strict":true}}"#).unwrap();
        let cli = Cli::try_parse_from([
            "hsearch",
            "--config",
            file.path().to_str().unwrap(),
            "health",
        ])
        .unwrap();
        let ClientConfig::Meilisearch(config) = load_config(&cli).unwrap() else {
            panic!("expected meilisearch config");
        };
        assert_eq!(config.url, "http://search:7700");
        assert!(config.strict);
    }
}

//! Command-line arguments for `hsearch`.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `HSEARCH_BACKEND` | elasticsearch | `elasticsearch` or `meilisearch` |
//! | `HSEARCH_URL` | backend default | Node URL(s), comma-separated for Elasticsearch |
//! | `HSEARCH_API_KEY` | - | Elasticsearch API key or Meilisearch key |
//! | `HSEARCH_USERNAME` | - | Elasticsearch basic-auth user |
//! | `HSEARCH_PASSWORD` | - | Elasticsearch basic-auth password |
//! | `HSEARCH_CONFIG` | - | JSON client config file, overrides the flags above |
//! | `HSEARCH_LOG_LEVEL` | warn | Log level |

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use helios_search::{
    ClientConfig, ElasticsearchAuth, ElasticsearchConfig, MeilisearchConfig,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    Elasticsearch,
    Meilisearch,
}

/// Talk to Elasticsearch or Meilisearch from the shell.
#[derive(Debug, Parser)]
#[command(name = "hsearch")]
#[command(about = "Backend-agnostic search client")]
pub struct Cli {
    /// Search engine to talk to.
    #[arg(long, env = "HSEARCH_BACKEND", value_enum, default_value = "elasticsearch")]
    pub backend: Backend,

    /// Engine URL; comma-separated node list for Elasticsearch.
    #[arg(long, env = "HSEARCH_URL")]
    pub url: Option<String>,

    /// API key (Elasticsearch `ApiKey`, Meilisearch bearer token).
    #[arg(long, env = "HSEARCH_API_KEY")]
    pub api_key: Option<String>,

    /// Basic-auth user name (Elasticsearch).
    #[arg(long, env = "HSEARCH_USERNAME")]
    pub username: Option<String>,

    /// Basic-auth password (Elasticsearch).
    #[arg(long, env = "HSEARCH_PASSWORD")]
    pub password: Option<String>,

    /// Reject features the engine cannot express instead of ignoring them (Meilisearch).
    #[arg(long, env = "HSEARCH_STRICT", default_value = "false")]
    pub strict: bool,

    /// JSON client configuration file; replaces the connection flags.
    #[arg(long, env = "HSEARCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Overall deadline for the command in seconds.
    #[arg(long, env = "HSEARCH_TIMEOUT", default_value = "60")]
    pub timeout: u64,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "HSEARCH_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check that the engine is reachable.
    Health,

    /// Create an index.
    CreateIndex {
        index: String,
        #[arg(long)]
        primary_key: Option<String>,
        #[arg(long)]
        shards: Option<u32>,
        #[arg(long)]
        replicas: Option<u32>,
        /// Mappings JSON (Elasticsearch).
        #[arg(long)]
        mappings: Option<String>,
        #[arg(long, value_delimiter = ',')]
        searchable: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        filterable: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        sortable: Vec<String>,
    },

    /// Delete an index.
    DeleteIndex {
        index: String,
        /// Wait until the engine applied the deletion.
        #[arg(long)]
        wait: bool,
    },

    /// Print whether an index exists.
    Exists { index: String },

    /// Index one JSON document (`-` reads stdin, `@file` reads a file).
    Index {
        index: String,
        document: String,
        #[arg(long, default_value = "")]
        id: String,
        #[arg(long)]
        wait: bool,
    },

    /// Fetch a document by id.
    Get { index: String, id: String },

    /// Delete a document by id.
    Delete {
        index: String,
        id: String,
        #[arg(long)]
        wait: bool,
    },

    /// Search an index.
    Search {
        index: String,
        #[command(flatten)]
        query: QueryArgs,
        #[arg(long)]
        from: Option<usize>,
        #[arg(long)]
        size: Option<usize>,
        /// Sort keys: `field`, `-field`, `field:asc`, `field:desc`.
        #[arg(long)]
        sort: Vec<String>,
        /// Fields to highlight.
        #[arg(long, value_delimiter = ',')]
        highlight: Vec<String>,
        /// Ask for an exact total.
        #[arg(long)]
        exact_total: bool,
    },

    /// Count documents matching a query.
    Count {
        index: String,
        #[command(flatten)]
        query: QueryArgs,
    },

    /// Apply an NDJSON file of bulk operations (`{"action","index","id","document"}` per line).
    Bulk { file: PathBuf },

    /// Make accepted writes visible to search.
    Refresh { index: String },
}

#[derive(Debug, Clone, Default, clap::Args)]
pub struct QueryArgs {
    /// Free text to match.
    #[arg(long)]
    pub text: Option<String>,

    /// Field the text is matched against; all fields when omitted.
    #[arg(long)]
    pub field: Option<String>,

    /// Exact-match filter `field=value`; repeatable.
    #[arg(long = "term")]
    pub terms: Vec<String>,

    /// Lower bound filter `field=value`; repeatable.
    #[arg(long)]
    pub gte: Vec<String>,

    /// Upper bound filter `field=value`; repeatable.
    #[arg(long)]
    pub lte: Vec<String>,
}

impl Cli {
    /// Client configuration from the connection flags.
    pub fn client_config(&self) -> ClientConfig {
        match self.backend {
            Backend::Elasticsearch => {
                let mut config = ElasticsearchConfig::default();
                if let Some(ref url) = self.url {
                    config.nodes = url
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect();
                }
                config.auth = match (&self.username, &self.password, &self.api_key) {
                    (Some(username), Some(password), _) => Some(ElasticsearchAuth::Basic {
                        username: username.clone(),
                        password: password.clone(),
                    }),
                    (_, _, Some(key)) => Some(ElasticsearchAuth::ApiKey {
                        id: None,
                        key: key.clone(),
                    }),
                    _ => None,
                };
                ClientConfig::elasticsearch(config)
            }
            Backend::Meilisearch => {
                let mut config = MeilisearchConfig::default();
                if let Some(ref url) = self.url {
                    config.url = url.clone();
                }
                config.api_key = self.api_key.clone();
                config.strict = self.strict;
                ClientConfig::meilisearch(config)
            }
        }
    }
}

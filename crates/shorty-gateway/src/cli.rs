use clap::{Parser, ValueEnum};
use shorty_telemetry::LogFormat;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;

pub const LISTEN_ADDR_ENV: &str = "SHORTY_LISTEN_ADDR";
pub const STORAGE_BACKEND_ENV: &str = "SHORTY_STORAGE_BACKEND";
pub const REDIS_URL_ENV: &str = "SHORTY_REDIS_URL";
pub const REDIS_KEY_PREFIX_ENV: &str = "SHORTY_REDIS_KEY_PREFIX";
pub const PUBLIC_BASE_URL_ENV: &str = "SHORTY_PUBLIC_BASE_URL";
pub const GENERATOR_ENV: &str = "SHORTY_GENERATOR";
pub const GENERATOR_PREFIX_ENV: &str = "SHORTY_GENERATOR_PREFIX";
pub const CODE_LENGTH_ENV: &str = "SHORTY_CODE_LENGTH";
pub const MAX_GENERATION_ATTEMPTS_ENV: &str = "SHORTY_MAX_GENERATION_ATTEMPTS";
pub const LOG_FORMAT_ENV: &str = "SHORTY_LOG_FORMAT";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_REDIS_KEY_PREFIX: &str = shorty_storage::redis::DEFAULT_KEY_PREFIX;
pub const DEFAULT_GENERATOR_PREFIX: &str = "s";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "redis")]
    Redis,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::Redis => write!(f, "redis"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GeneratorArg {
    /// Uniformly random alphanumeric codes.
    #[value(name = "random")]
    Random,
    /// Prefixed base36 counter.
    #[value(name = "seq")]
    Seq,
}

impl Display for GeneratorArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GeneratorArg::Random => write!(f, "random"),
            GeneratorArg::Seq => write!(f, "seq"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "shorty", about = "URL shortener HTTP gateway")]
pub struct Cli {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    /// Base used to render `shortUrl` in responses.
    #[arg(long, env = PUBLIC_BASE_URL_ENV, default_value = DEFAULT_PUBLIC_BASE_URL)]
    pub public_base_url: String,

    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = REDIS_URL_ENV, required_if_eq("storage", "redis"))]
    pub redis_url: Option<String>,

    #[arg(long, env = REDIS_KEY_PREFIX_ENV, default_value = DEFAULT_REDIS_KEY_PREFIX)]
    pub redis_key_prefix: String,

    #[arg(
        long,
        env = GENERATOR_ENV,
        value_enum,
        default_value_t = GeneratorArg::Random
    )]
    pub generator: GeneratorArg,

    /// Only used by the `seq` generator.
    #[arg(long, env = GENERATOR_PREFIX_ENV, default_value = DEFAULT_GENERATOR_PREFIX)]
    pub generator_prefix: String,

    /// Only used by the `random` generator. Values below 3 are raised to 3.
    #[arg(
        long,
        env = CODE_LENGTH_ENV,
        default_value_t = shorty_generator::DEFAULT_CODE_LENGTH
    )]
    pub code_length: usize,

    #[arg(
        long,
        env = MAX_GENERATION_ATTEMPTS_ENV,
        default_value_t = shorty_shortener::DEFAULT_MAX_GENERATION_ATTEMPTS
    )]
    pub max_generation_attempts: usize,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormatArg::Text)]
    pub log_format: LogFormatArg,
}

use std::net::SocketAddr;
use std::str::FromStr;

use serde::Deserialize;
use time::macros::format_description;
use time::UtcOffset;

use crate::compression::CompressionOptions;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub audience: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub public_url: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt: JwtConfig,
    pub s3: S3Config,
    pub compression: CompressionOptions,
    pub bonus_offset: UtcOffset,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let host = std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = env_or("APP_PORT", 8080u16);
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "authenticated".into()),
        };

        let endpoint = std::env::var("S3_ENDPOINT")?;
        let bucket = std::env::var("S3_BUCKET").unwrap_or_else(|_| "meal-images".into());
        let public_url = std::env::var("S3_PUBLIC_URL")
            .unwrap_or_else(|_| format!("{}/{}", endpoint.trim_end_matches('/'), bucket));
        let s3 = S3Config {
            access_key: std::env::var("S3_ACCESS_KEY")?,
            secret_key: std::env::var("S3_SECRET_KEY")?,
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
            endpoint,
            bucket,
            public_url,
        };

        let defaults = CompressionOptions::default();
        let compression = CompressionOptions {
            max_width: env_or("COMPRESS_MAX_WIDTH", defaults.max_width),
            max_height: env_or("COMPRESS_MAX_HEIGHT", defaults.max_height),
            initial_quality: env_or("COMPRESS_QUALITY", defaults.initial_quality),
            target_size_bytes: env_or("COMPRESS_TARGET_BYTES", defaults.target_size_bytes),
        }
        .normalized();

        let bonus_offset = std::env::var("BONUS_UTC_OFFSET")
            .ok()
            .and_then(|v| parse_offset(&v))
            .unwrap_or(UtcOffset::UTC);

        Ok(Self {
            host,
            port,
            database_url,
            jwt,
            s3,
            compression,
            bonus_offset,
        })
    }
}

impl AppConfig {
    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Parse `+HH:MM`, `-HH:MM`, `+HH`, `Z` or `UTC`.
pub fn parse_offset(raw: &str) -> Option<UtcOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return Some(UtcOffset::UTC);
    }
    UtcOffset::parse(raw, format_description!("[offset_hour]:[offset_minute]"))
        .or_else(|_| UtcOffset::parse(raw, format_description!("[offset_hour]")))
        .ok()
}

//! Effective run settings: config file values overridden by flags, validated
//! before anything is processed.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use hsloader_core::{ElasticsearchConfig, PipelineOptions, PublisherConfig, Zone};

use crate::config::Config;

/// Flag values that override the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub bulk: Option<usize>,
    pub timezone: Option<String>,
    pub timeout: Option<u64>,
    pub concurrency: Option<usize>,
    pub index_prefix: Option<String>,
    pub debug: bool,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub sink: ElasticsearchConfig,
    pub publisher: PublisherConfig,
    pub options: PipelineOptions,
}

impl Settings {
    pub fn resolve(config: &Config, overrides: &Overrides) -> Result<Self> {
        let bulk_size = overrides.bulk.unwrap_or(config.publisher.bulk_size);
        if bulk_size == 0 {
            bail!("bulk size must be at least 1");
        }
        let concurrency = overrides.concurrency.unwrap_or(config.publisher.concurrency);
        if concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        let timeout_secs = overrides.timeout.unwrap_or(config.sink.timeout_secs);
        if timeout_secs == 0 {
            bail!("timeout must be at least 1 second");
        }
        let zone_name = overrides.timezone.as_deref().unwrap_or(&config.time.zone);
        let zone: Zone = zone_name.parse().map_err(anyhow::Error::msg)?;

        Ok(Self {
            sink: ElasticsearchConfig {
                host: overrides.host.clone().unwrap_or_else(|| config.sink.host.clone()),
                port: overrides.port.unwrap_or(config.sink.port),
                index_prefix: overrides
                    .index_prefix
                    .clone()
                    .unwrap_or_else(|| config.sink.index_prefix.clone()),
                timeout: Duration::from_secs(timeout_secs),
            },
            publisher: PublisherConfig {
                bulk_size,
                concurrency,
            },
            options: PipelineOptions {
                zone,
                debug: overrides.debug,
            },
        })
    }
}

/// Expand glob patterns in order; every pattern must match something.
pub fn expand_files(patterns: &[String]) -> Result<Vec<PathBuf>> {
    if patterns.is_empty() {
        bail!("no input files given");
    }
    let mut files = Vec::new();
    for pattern in patterns {
        let mut matched: Vec<PathBuf> = glob::glob(pattern)
            .with_context(|| format!("Invalid file pattern: {pattern}"))?
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .collect();
        if matched.is_empty() {
            bail!("no input files match {pattern}");
        }
        matched.sort();
        files.append(&mut matched);
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve() {
        let settings = Settings::resolve(&Config::default(), &Overrides::default()).unwrap();
        assert_eq!(settings.sink.bulk_url(), "http://localhost:9200/_bulk");
        assert_eq!(settings.sink.timeout, Duration::from_secs(60));
        assert_eq!(settings.publisher.bulk_size, 1000);
        assert!(matches!(settings.options.zone, Zone::Local));
        assert!(!settings.options.debug);
    }

    #[test]
    fn flags_override_config() {
        let overrides = Overrides {
            host: Some("es.internal".to_string()),
            port: Some(9300),
            bulk: Some(50),
            timezone: Some("Asia/Tokyo".to_string()),
            index_prefix: Some(String::new()),
            debug: true,
            ..Default::default()
        };
        let settings = Settings::resolve(&Config::default(), &overrides).unwrap();
        assert_eq!(settings.sink.bulk_url(), "http://es.internal:9300/_bulk");
        assert_eq!(settings.sink.index_name("resource-log-201601"), "resource-log-201601");
        assert_eq!(settings.publisher.bulk_size, 50);
        assert_eq!(settings.options.zone.to_string(), "Asia/Tokyo");
        assert!(settings.options.debug);
    }

    #[test]
    fn zero_values_rejected() {
        for overrides in [
            Overrides {
                bulk: Some(0),
                ..Default::default()
            },
            Overrides {
                concurrency: Some(0),
                ..Default::default()
            },
            Overrides {
                timeout: Some(0),
                ..Default::default()
            },
        ] {
            assert!(Settings::resolve(&Config::default(), &overrides).is_err());
        }
    }

    #[test]
    fn unknown_zone_rejected() {
        let overrides = Overrides {
            timezone: Some("Mars/Olympus_Mons".to_string()),
            ..Default::default()
        };
        let err = Settings::resolve(&Config::default(), &overrides).unwrap_err();
        assert!(err.to_string().contains("unknown time zone"));
    }

    #[test]
    fn expand_globs_sorted_per_pattern() {
        let dir = tempfile::TempDir::new().unwrap();
        for name in ["b.jsonl", "a.jsonl", "c.csv"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        let pattern = format!("{}/*.jsonl", dir.path().display());
        let literal = dir.path().join("c.csv").display().to_string();
        let files = expand_files(&[pattern, literal]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.jsonl", "b.jsonl", "c.csv"]);
    }

    #[test]
    fn unmatched_pattern_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let pattern = format!("{}/*.jsonl", dir.path().display());
        assert!(expand_files(&[pattern]).is_err());
        assert!(expand_files(&[]).is_err());
    }
}

//! Pull command - Fetch items from SonarQube
//!
//! Pull the metric catalog, current measures or measure history of one
//! component and print the items as JSON envelopes.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use glean_connectors::datetime::parse_datetime;
use glean_connectors::{
    Archive, Envelope, FetchArgs, SONAR_URL, Sonar, SonarConfig, SonarConnectorConfig,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Output format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed JSON, one envelope after another
    #[default]
    Json,
    /// One envelope per line
    Compact,
}

/// Pull command arguments
#[derive(Args, Debug)]
pub struct PullArgs {
    /// SonarQube component key (project)
    #[arg(value_name = "COMPONENT")]
    component: String,

    /// SonarQube server URL
    #[arg(long, default_value = SONAR_URL)]
    base_url: String,

    /// Comma-separated metric keys (default: from config file)
    #[arg(long = "metricKeys", value_name = "KEYS")]
    metric_keys: Option<String>,

    /// Category to fetch: metric, measures, history
    #[arg(long, default_value = "measures")]
    category: String,

    /// Start date (YYYY-MM-DD, YYYY-MM-DD HH:MM:SS or RFC 3339). Validated but not
    /// applied: SonarQube returns the full set regardless.
    #[arg(long, value_name = "DATE")]
    from_date: Option<String>,

    /// Label attached to every item (default: the API URL)
    #[arg(long)]
    tag: Option<String>,

    /// Archive file recording responses (or replayed with --fetch-archive)
    #[arg(long, value_name = "FILE")]
    archive_path: Option<PathBuf>,

    /// Replay responses from the archive instead of the server
    #[arg(long, requires = "archive_path")]
    fetch_archive: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    output: OutputFormat,
}

/// Run the pull command
pub async fn run(args: PullArgs, config_path: Option<&Path>) -> Result<()> {
    let connection =
        SonarConnectorConfig::resolve(config_path).context("failed to load configuration")?;

    let from_date = args
        .from_date
        .as_deref()
        .map(parse_datetime)
        .transpose()
        .context("invalid --from-date")?;

    let config = SonarConfig {
        base_url: args.base_url.clone(),
        tag: args.tag.clone(),
        connection,
    };

    let (sonar, recorder) = build_connector(&args, config)?;

    tracing::info!(
        connector = "sonarqube",
        component = %args.component,
        category = %args.category,
        replay = sonar.is_replaying(),
        "pulling items"
    );

    let envelopes = sonar
        .fetch(
            Some(&args.category),
            FetchArgs {
                from_date,
                metric_keys: args.metric_keys.clone(),
            },
        )
        .await
        .context("failed to fetch from SonarQube")?;

    let mut stdout = io::stdout().lock();
    for envelope in envelopes {
        let envelope = envelope.context("failed to fetch item")?;
        write_envelope(&mut stdout, &envelope, args.output)?;
    }
    stdout.flush()?;

    if let Some(archive) = recorder {
        archive.save().context("failed to save archive")?;
        tracing::info!(
            path = ?archive.path(),
            entries = archive.len(),
            "archive saved"
        );
    }

    Ok(())
}

/// Pick live, recording or replaying mode from the archive flags
///
/// Returns the archive to save afterwards when recording.
fn build_connector(args: &PullArgs, config: SonarConfig) -> Result<(Sonar, Option<Arc<Archive>>)> {
    let Some(path) = &args.archive_path else {
        let sonar = Sonar::new(&args.component, config)
            .context("failed to create SonarQube connector")?;
        return Ok((sonar, None));
    };

    let archive = Arc::new(
        Archive::open(path)
            .with_context(|| format!("failed to open archive {}", path.display()))?,
    );

    if args.fetch_archive {
        let sonar = Sonar::from_archive(&args.component, config, archive)
            .context("failed to create SonarQube connector")?;
        Ok((sonar, None))
    } else {
        let sonar = Sonar::with_archive(&args.component, config, archive.clone())
            .context("failed to create SonarQube connector")?;
        Ok((sonar, Some(archive)))
    }
}

fn write_envelope(out: &mut impl Write, envelope: &Envelope, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Compact => writeln!(out, "{}", serde_json::to_string(envelope)?)?,
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(envelope)?)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use glean_connectors::Connector;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        pull: PullArgs,
    }

    fn parse(args: &[&str]) -> Result<PullArgs, clap::Error> {
        let argv = std::iter::once("pull").chain(args.iter().copied());
        TestCli::try_parse_from(argv).map(|cli| cli.pull)
    }

    #[test]
    fn test_parse_defaults() {
        let args = parse(&["c01"]).unwrap();
        assert_eq!(args.component, "c01");
        assert_eq!(args.base_url, SONAR_URL);
        assert_eq!(args.category, "measures");
        assert_eq!(args.output, OutputFormat::Json);
        assert!(args.metric_keys.is_none());
        assert!(!args.fetch_archive);
    }

    #[test]
    fn test_parse_all_options() {
        let args = parse(&[
            "c01",
            "--base-url",
            "https://a.sonarqube.instance/",
            "--metricKeys",
            "accessors,new_technical_debt",
            "--category",
            "history",
            "--from-date",
            "2019-01-01",
            "--tag",
            "quality",
            "--archive-path",
            "sonar.json",
            "--fetch-archive",
            "--output",
            "compact",
        ])
        .unwrap();

        assert_eq!(args.base_url, "https://a.sonarqube.instance/");
        assert_eq!(args.metric_keys.as_deref(), Some("accessors,new_technical_debt"));
        assert_eq!(args.category, "history");
        assert_eq!(args.from_date.as_deref(), Some("2019-01-01"));
        assert_eq!(args.tag.as_deref(), Some("quality"));
        assert_eq!(args.archive_path, Some(PathBuf::from("sonar.json")));
        assert!(args.fetch_archive);
        assert_eq!(args.output, OutputFormat::Compact);
    }

    #[tokio::test]
    async fn test_run_rejects_invalid_from_date() {
        let args = parse(&["c01", "--from-date", "yesterday"]).unwrap();
        assert!(run(args, None).await.is_err());
    }

    #[test]
    fn test_parse_requires_component() {
        assert!(parse(&[]).is_err());
    }

    #[test]
    fn test_parse_fetch_archive_requires_path() {
        assert!(parse(&["c01", "--fetch-archive"]).is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_output() {
        assert!(parse(&["c01", "--output", "yaml"]).is_err());
    }

    #[test]
    fn test_build_connector_replay_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sonar.json");
        let args = parse(&["c01", "--archive-path", path.to_str().unwrap(), "--fetch-archive"]).unwrap();

        let (sonar, recorder) = build_connector(&args, SonarConfig::default()).unwrap();
        assert!(sonar.is_replaying());
        assert!(recorder.is_none());
    }

    #[test]
    fn test_build_connector_recording_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sonar.json");
        let args = parse(&["c01", "--archive-path", path.to_str().unwrap()]).unwrap();

        let (sonar, recorder) = build_connector(&args, SonarConfig::default()).unwrap();
        assert!(!sonar.is_replaying());
        assert_eq!(recorder.unwrap().path(), Some(path.as_path()));
        assert_eq!(sonar.origin(), "https://sonarcloud.io/api");
    }

    #[test]
    fn test_build_connector_rejects_empty_component() {
        let args = parse(&[""]).unwrap();
        assert!(build_connector(&args, SonarConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_run_replays_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sonar.json");

        let archive = Archive::open(&path).unwrap();
        archive.insert(
            "https://sonarcloud.io/api/metrics/search",
            200,
            r#"{"metrics":[{"id":"1","key":"bugs"}]}"#,
        );
        archive.save().unwrap();

        let args = parse(&[
            "c01",
            "--category",
            "metric",
            "--archive-path",
            path.to_str().unwrap(),
            "--fetch-archive",
            "--output",
            "compact",
        ])
        .unwrap();

        run(args, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_run_unknown_category() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sonar.json");
        let args = parse(&[
            "c01",
            "--category",
            "issues",
            "--archive-path",
            path.to_str().unwrap(),
            "--fetch-archive",
        ])
        .unwrap();

        assert!(run(args, None).await.is_err());
    }

    #[test]
    fn test_write_envelope_compact_is_one_line() {
        let archive = Arc::new(Archive::in_memory());
        let sonar = Sonar::from_archive("c01", SonarConfig::default(), archive).unwrap();
        let envelope =
            Envelope::wrap(&sonar, "1", "metric", 1.5, serde_json::json!({"key": "bugs"})).unwrap();

        let mut out = Vec::new();
        write_envelope(&mut out, &envelope, OutputFormat::Compact).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("\"backend_name\":\"Sonar\""));
    }
}

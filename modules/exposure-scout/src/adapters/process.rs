//! Adapters that shell out to locally installed OSINT tools.
//!
//! Each tool's output is reshaped into the JSON payload its normalizer
//! expects. The entity key always follows `--` so it is never read as an
//! option. The coordinator's timeout drops the future, and `kill_on_drop`
//! takes the child process down with it.

use std::io::ErrorKind;
use std::path::Path;
use std::process::Output;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::debug;

use exposure_common::{Config, EntityType, Finding, SourceError, SourceErrorKind, SourceId};

use crate::traits::SourceAdapter;

/// `[+] Site: https://...` lines printed by sherlock and maigret.
static FOUND_SITE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[\+\]\s*([^:]+):\s*(\S+)").expect("valid regex"));

/// `[+] service.com` lines printed by holehe.
static FOUND_SERVICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[\+\]\s*(\S+)").expect("valid regex"));

const STDERR_LIMIT: usize = 300;

pub struct ProcessAdapter {
    source: SourceId,
    bin: String,
}

impl ProcessAdapter {
    pub fn new(source: SourceId, bin: impl Into<String>) -> Self {
        Self {
            source,
            bin: bin.into(),
        }
    }

    /// `None` for sources that are not command-line tools.
    pub fn from_config(source: SourceId, config: &Config) -> Option<Self> {
        let bin = match source {
            SourceId::Sherlock => &config.sherlock_bin,
            SourceId::Maigret => &config.maigret_bin,
            SourceId::Holehe => &config.holehe_bin,
            SourceId::TheHarvester => &config.theharvester_bin,
            _ => return None,
        };
        Some(Self::new(source, bin.clone()))
    }

    fn error(&self, kind: SourceErrorKind, message: impl Into<String>) -> SourceError {
        SourceError::new(self.source, kind, message)
    }

    async fn exec(&self, args: &[String]) -> Result<Output, SourceError> {
        debug!(source = %self.source, bin = %self.bin, ?args, "Spawning tool");
        let output = Command::new(&self.bin)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => self.error(
                    SourceErrorKind::Unavailable,
                    format!("binary not found: {}", self.bin),
                ),
                _ => self.error(
                    SourceErrorKind::Unavailable,
                    format!("failed to start {}: {e}", self.bin),
                ),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr: String = stderr.trim().chars().take(STDERR_LIMIT).collect();
            return Err(self.error(
                SourceErrorKind::Unavailable,
                format!("{} exited with {}: {stderr}", self.bin, output.status),
            ));
        }
        Ok(output)
    }

    fn workdir(&self) -> Result<tempfile::TempDir, SourceError> {
        tempfile::tempdir().map_err(|e| {
            self.error(SourceErrorKind::Unavailable, format!("no scratch directory: {e}"))
        })
    }

    fn read_json(&self, path: &Path) -> Result<Option<Value>, SourceError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(self.error(
                    SourceErrorKind::Unavailable,
                    format!("failed to read {}: {e}", path.display()),
                ))
            }
        };
        serde_json::from_str(&raw).map(Some).map_err(|e| {
            self.error(
                SourceErrorKind::MalformedResponse,
                format!("{}: {e}", path.display()),
            )
        })
    }

    async fn run_tool(&self, entity_key: &str) -> Result<Value, SourceError> {
        match self.source {
            SourceId::Sherlock => {
                let output = self
                    .exec(&command_args(self.source, entity_key, Path::new("")))
                    .await?;
                Ok(json!({ "profiles": found_sites(&stdout(&output)) }))
            }
            SourceId::Maigret => {
                let dir = self.workdir()?;
                let output = self
                    .exec(&command_args(self.source, entity_key, dir.path()))
                    .await?;
                let report = dir.path().join(format!("report_{entity_key}_simple.json"));
                match self.read_json(&report)? {
                    Some(value) => Ok(value),
                    None => Ok(json!({ "profiles": found_sites(&stdout(&output)) })),
                }
            }
            SourceId::Holehe => {
                let output = self
                    .exec(&command_args(self.source, entity_key, Path::new("")))
                    .await?;
                Ok(json!({ "services": found_services(&stdout(&output)) }))
            }
            SourceId::TheHarvester => {
                let dir = self.workdir()?;
                self.exec(&command_args(self.source, entity_key, dir.path()))
                    .await?;
                self.read_json(&dir.path().join("harvest.json"))?.ok_or_else(|| {
                    self.error(
                        SourceErrorKind::MalformedResponse,
                        "theHarvester wrote no JSON report",
                    )
                })
            }
            other => Err(self.error(
                SourceErrorKind::Unavailable,
                format!("{other} is not a command-line tool"),
            )),
        }
    }
}

/// Arguments for one tool run. `scratch` is where tools that write report
/// files put them.
fn command_args(source: SourceId, entity_key: &str, scratch: &Path) -> Vec<String> {
    let folder = scratch.to_string_lossy().into_owned();
    let harvest = scratch.join("harvest").to_string_lossy().into_owned();
    let args: Vec<&str> = match source {
        SourceId::Sherlock => vec!["--print-found", "--no-color", "--", entity_key],
        SourceId::Maigret => vec![
            "--json",
            "simple",
            "--folderoutput",
            folder.as_str(),
            "--no-color",
            "--no-progressbar",
            "--",
            entity_key,
        ],
        SourceId::Holehe => vec!["--only-used", "--no-color", "--", entity_key],
        SourceId::TheHarvester => vec!["-d", entity_key, "-b", "all", "-l", "100", "-f", harvest.as_str()],
        _ => Vec::new(),
    };
    args.into_iter().map(str::to_string).collect()
}

#[async_trait]
impl SourceAdapter for ProcessAdapter {
    fn source_id(&self) -> SourceId {
        self.source
    }

    async fn query(&self, entity_type: EntityType, entity_key: &str) -> Result<Finding, SourceError> {
        if !self.supports(entity_type) {
            return Err(self.error(
                SourceErrorKind::Unavailable,
                format!("{} does not handle {entity_type} lookups", self.source),
            ));
        }
        let payload = self.run_tool(entity_key).await?;
        Ok(Finding::success(self.source, entity_type, entity_key, payload))
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn found_sites(text: &str) -> Vec<Value> {
    text.lines()
        .filter_map(|line| FOUND_SITE.captures(line.trim()))
        .filter(|caps| caps[2].starts_with("http"))
        .map(|caps| json!({ "site": caps[1].trim(), "url": &caps[2] }))
        .collect()
}

fn found_services(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| FOUND_SERVICE.captures(line.trim()))
        .map(|caps| caps[1].to_string())
        .filter(|service| service.contains('.'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sherlock_lines_become_site_entries() {
        let out = "[*] Checking username alice on:\n\
                   [+] GitHub: https://github.com/alice\n\
                   [+] Reddit: https://www.reddit.com/user/alice\n\
                   [-] Nothing here\n";
        let sites = found_sites(out);
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0]["site"], "GitHub");
        assert_eq!(sites[1]["url"], "https://www.reddit.com/user/alice");
    }

    #[test]
    fn holehe_keeps_only_domains() {
        let out = "[+] twitter.com\n[-] instagram.com\n[+] Email used\n[+] spotify.com\n";
        assert_eq!(found_services(out), vec!["twitter.com", "spotify.com"]);
    }

    #[test]
    fn entity_key_always_follows_the_option_terminator() {
        for source in [SourceId::Sherlock, SourceId::Maigret, SourceId::Holehe] {
            let args = command_args(source, "alice", Path::new("/tmp/scratch"));
            let n = args.len();
            assert_eq!(args[n - 2], "--", "{source}");
            assert_eq!(args[n - 1], "alice", "{source}");
        }
        let harvester = command_args(SourceId::TheHarvester, "example.com", Path::new("/tmp/s"));
        assert_eq!(harvester[..2], ["-d", "example.com"]);
        assert_eq!(harvester.last().map(String::as_str), Some("/tmp/s/harvest"));
    }

    #[test]
    fn http_sources_are_not_process_adapters() {
        let config = Config::default();
        assert!(ProcessAdapter::from_config(SourceId::Hibp, &config).is_none());
        assert!(ProcessAdapter::from_config(SourceId::Holehe, &config).is_some());
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let adapter = ProcessAdapter::new(SourceId::Sherlock, "definitely-not-installed-sherlock");
        let err = adapter.query(EntityType::Username, "alice").await.unwrap_err();
        assert_eq!(err.kind, SourceErrorKind::Unavailable);
        assert!(err.message.contains("binary not found"));
    }
}

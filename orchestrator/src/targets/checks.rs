//! Post-deploy verification checks

use std::fmt;
use std::time::Duration;

use colored::Colorize;
use reqwest::Client;
use url::Url;

use crate::errors::LaunchError;
use crate::filesys::dir::Dir;
use crate::logs::RunLog;

const SITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of a single check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = if self.passed {
            "[PASS]".green().bold()
        } else {
            "[FAIL]".red().bold()
        };
        if self.detail.is_empty() {
            write!(f, "{} {}", marker, self.name)
        } else {
            write!(f, "{} {} ({})", marker, self.name, self.detail)
        }
    }
}

/// Ordered list of checks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub checks: Vec<CheckResult>,
}

impl VerifyReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, name: impl Into<String>, passed: bool, detail: impl Into<String>) {
        self.checks.push(CheckResult {
            name: name.into(),
            passed,
            detail: detail.into(),
        });
    }

    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> usize {
        self.checks.iter().filter(|c| !c.passed).count()
    }

    /// Log every check, print it for the operator and fail on any failure
    pub fn conclude(&self, log: &RunLog) -> Result<(), LaunchError> {
        for check in &self.checks {
            println!("{}", check);
            let line = format!(
                "Check {}: {}{}",
                if check.passed { "passed" } else { "failed" },
                check.name,
                if check.detail.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", check.detail)
                }
            );
            if check.passed {
                log.info(line);
            } else {
                log.warn(line);
            }
        }

        if self.passed() {
            log.info(format!("All {} check(s) passed", self.checks.len()));
            Ok(())
        } else {
            Err(LaunchError::VerificationFailed(format!(
                "{} of {} check(s) failed",
                self.failures(),
                self.checks.len()
            )))
        }
    }
}

/// Build output exists and contains an `index.html`
pub async fn check_build_output(report: &mut VerifyReport, build: &Dir) {
    if !build.exists().await {
        report.record(
            "build output",
            false,
            format!("{} does not exist", build.path().display()),
        );
        return;
    }

    let index = build.file("index.html");
    if index.exists().await {
        let sitemap = if build.file("sitemap.xml").exists().await {
            ", sitemap.xml present"
        } else {
            ""
        };
        report.record(
            "build output",
            true,
            format!("{}{}", index.path().display(), sitemap),
        );
    } else {
        report.record(
            "build output",
            false,
            format!("no index.html in {}", build.path().display()),
        );
    }
}

/// The public site answers a GET with 2xx
pub async fn check_site(report: &mut VerifyReport, url: &Url) {
    let name = format!("site {}", url);
    let client = match Client::builder().timeout(SITE_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => {
            report.record(name, false, e.to_string());
            return;
        }
    };

    match client.get(url.clone()).send().await {
        Ok(response) if response.status().is_success() => {
            report.record(name, true, format!("HTTP {}", response.status().as_u16()));
        }
        Ok(response) => {
            report.record(name, false, format!("HTTP {}", response.status().as_u16()));
        }
        Err(e) => report.record(name, false, e.to_string()),
    }
}

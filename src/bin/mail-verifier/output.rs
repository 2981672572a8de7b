#[cfg(any(feature = "with-serde", feature = "with-csv"))]
use anyhow::Context;
use anyhow::{Result, bail};

use crate::args::Cli;
use mail_verifier::{SkippedServer, SmtpEvent, Verdict, VerificationReport, VerifyError};

#[cfg_attr(feature = "with-serde", derive(serde::Serialize))]
#[derive(Debug, Clone)]
pub struct OutputRow {
    pub destination: String,
    pub status: &'static str,
    #[cfg_attr(feature = "with-serde", serde(skip_serializing_if = "Option::is_none"))]
    pub exchanger: Option<String>,
    #[cfg_attr(feature = "with-serde", serde(skip_serializing_if = "Option::is_none"))]
    pub error: Option<String>,
    #[cfg_attr(feature = "with-serde", serde(skip_serializing_if = "Vec::is_empty"))]
    pub skipped: Vec<SkippedServer>,
    #[cfg_attr(feature = "with-serde", serde(skip_serializing_if = "Vec::is_empty"))]
    pub transcript: Vec<SmtpEvent>,
}

impl OutputRow {
    pub fn new(destination: &str, outcome: Result<VerificationReport, VerifyError>) -> Self {
        match outcome {
            Ok(report) => Self {
                destination: report.destination,
                status: match report.verdict {
                    Verdict::Accepted => "accepted",
                    Verdict::Rejected => "rejected",
                },
                exchanger: Some(report.exchanger),
                error: None,
                skipped: report.skipped,
                transcript: report.transcript,
            },
            Err(err) => Self {
                destination: destination.trim().to_string(),
                status: "failed",
                exchanger: None,
                error: Some(err.to_string()),
                skipped: Vec::new(),
                transcript: Vec::new(),
            },
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.status == "accepted"
    }

    /// Drops the diagnostics unless `--transcript` was requested.
    pub fn trimmed(mut self, keep_diagnostics: bool) -> Self {
        if !keep_diagnostics {
            self.skipped.clear();
            self.transcript.clear();
        }
        self
    }

    #[cfg(feature = "with-csv")]
    fn csv_record(&self) -> [String; 4] {
        [
            self.destination.clone(),
            self.status.to_string(),
            self.exchanger.clone().unwrap_or_default(),
            self.error.clone().unwrap_or_default(),
        ]
    }
}

pub fn any_unverified(rows: &[OutputRow]) -> bool {
    rows.iter().any(|row| !row.is_accepted())
}

pub fn write_reports(rows: &[OutputRow], cli: &Cli) -> Result<()> {
    match cli.format.as_str() {
        "human" => {
            write_human(rows);
            Ok(())
        }
        "json" => write_json(rows, cli),
        "ndjson" => write_ndjson(rows, cli),
        "csv" => write_csv(rows, cli),
        other => bail!("unknown --format '{other}', use: human|json|ndjson|csv"),
    }
}

fn write_human(rows: &[OutputRow]) {
    for row in rows {
        println!("{}", human_line(row));
        for skipped in &row.skipped {
            println!("        skipped {}: {}", skipped.exchanger, skipped.reason);
        }
        for event in &row.transcript {
            for line in event.to_string().lines() {
                println!("        {line}");
            }
        }
    }
}

fn human_line(row: &OutputRow) -> String {
    let via = row
        .exchanger
        .as_deref()
        .map(|mx| format!(" (via {mx})"))
        .unwrap_or_default();
    match (&row.error, row.status) {
        (Some(error), _) => format!("[FAILED]   {} :: {error}", row.destination),
        (None, "accepted") => format!("[ACCEPTED] {}{via}", row.destination),
        (None, _) => format!("[REJECTED] {}{via}", row.destination),
    }
}

#[cfg(feature = "with-serde")]
fn write_json(rows: &[OutputRow], cli: &Cli) -> Result<()> {
    let s = serde_json::to_string_pretty(rows)?;
    if let Some(path) = &cli.out {
        write_all_atomically(path, s.as_bytes()).with_context(|| format!("write {path}"))
    } else {
        println!("{s}");
        Ok(())
    }
}

#[cfg(not(feature = "with-serde"))]
fn write_json(_rows: &[OutputRow], _cli: &Cli) -> Result<()> {
    bail!("format=json nécessite la feature 'with-serde'")
}

#[cfg(feature = "with-serde")]
fn write_ndjson(rows: &[OutputRow], cli: &Cli) -> Result<()> {
    if let Some(path) = &cli.out {
        let mut buf = Vec::new();
        for row in rows {
            let line = serde_json::to_string(row)?;
            buf.extend_from_slice(line.as_bytes());
            buf.push(b'\n');
        }
        write_all_atomically(path, &buf).with_context(|| format!("write {path}"))
    } else {
        for row in rows {
            println!("{}", serde_json::to_string(row)?);
        }
        Ok(())
    }
}

#[cfg(not(feature = "with-serde"))]
fn write_ndjson(_rows: &[OutputRow], _cli: &Cli) -> Result<()> {
    bail!("format=ndjson nécessite la feature 'with-serde'")
}

#[cfg(feature = "with-csv")]
fn write_csv(rows: &[OutputRow], cli: &Cli) -> Result<()> {
    const HEADER: [&str; 4] = ["destination", "status", "exchanger", "error"];
    if let Some(path) = &cli.out {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(HEADER)?;
        for row in rows {
            wtr.write_record(row.csv_record())?;
        }
        let data = wtr.into_inner()?;
        write_all_atomically(path, &data).with_context(|| format!("write {path}"))
    } else {
        let mut wtr = csv::Writer::from_writer(std::io::stdout());
        wtr.write_record(HEADER)?;
        for row in rows {
            wtr.write_record(row.csv_record())?;
        }
        wtr.flush()?;
        Ok(())
    }
}

#[cfg(not(feature = "with-csv"))]
fn write_csv(_rows: &[OutputRow], _cli: &Cli) -> Result<()> {
    bail!("format=csv nécessite la feature 'with-csv'")
}

#[cfg(any(feature = "with-serde", feature = "with-csv"))]
fn write_all_atomically(path: &str, bytes: &[u8]) -> Result<()> {
    use std::io::Write;
    let tmp = format!("{}.tmp", path);
    {
        let mut f = std::fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

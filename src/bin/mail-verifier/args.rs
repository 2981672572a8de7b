use std::time::Duration;

use clap::{ArgAction, Parser};
use mail_verifier::VerifyOptions;
use tracing::Level;

#[derive(Parser)]
#[command(name = "mail-verifier", version)]
pub struct Cli {
    /// adresses à vérifier
    pub destinations: Vec<String>,

    /// expéditeur présenté dans MAIL FROM (une vraie boîte de préférence)
    #[arg(long = "from")]
    pub origin: String,

    /// lit des adresses depuis stdin (une par ligne)
    #[arg(long)]
    pub stdin: bool,

    /// write report to file (JSON/NDJSON/CSV selon --format)
    #[arg(long)]
    pub out: Option<String>,

    /// format: human|json|ndjson|csv
    #[arg(long, default_value = "human")]
    pub format: String,

    /// port SMTP des serveurs MX
    #[arg(long, default_value_t = 25)]
    pub port: u16,

    /// nom utilisé pour EHLO/HELO (par défaut le domaine de --from)
    #[arg(long)]
    pub helo: Option<String>,

    /// timeout de chaque commande SMTP (ms)
    #[arg(long = "timeout-ms", default_value_t = 5_000)]
    pub timeout_ms: u64,

    /// timeout de connexion TCP (ms)
    #[arg(long = "connect-timeout-ms", default_value_t = 5_000)]
    pub connect_timeout_ms: u64,

    /// timeout des requêtes DNS (ms)
    #[arg(long = "dns-timeout-ms", default_value_t = 5_000)]
    pub dns_timeout_ms: u64,

    /// nombre de vérifications menées en parallèle
    #[arg(long, default_value_t = 1)]
    pub jobs: usize,

    /// affiche le dialogue SMTP et les serveurs ignorés
    #[arg(long)]
    pub transcript: bool,

    /// verbosité des logs sur stderr (-v, -vv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn clap_command() -> clap::Command {
        <Self as clap::CommandFactory>::command()
    }

    pub fn options(&self) -> VerifyOptions {
        VerifyOptions {
            port: self.port,
            helo_domain: self.helo.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            command_timeout: Duration::from_millis(self.timeout_ms),
            dns_timeout: Duration::from_millis(self.dns_timeout_ms),
        }
    }

    pub fn log_level(&self) -> Level {
        match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_options_from_flags() {
        let cli = <Cli as Parser>::try_parse_from([
            "mail-verifier",
            "--from",
            "me@origin.example",
            "--port",
            "2525",
            "--timeout-ms",
            "1500",
            "--helo",
            "probe.example",
            "-vv",
            "you@dest.example",
        ])
        .expect("valid arguments");

        let options = cli.options();
        assert_eq!(options.port, 2525);
        assert_eq!(options.command_timeout, Duration::from_millis(1500));
        assert_eq!(options.connect_timeout, Duration::from_secs(5));
        assert_eq!(options.helo_domain.as_deref(), Some("probe.example"));
        assert_eq!(cli.log_level(), Level::DEBUG);
        assert_eq!(cli.destinations, vec!["you@dest.example".to_string()]);
    }

    #[test]
    fn origin_is_required() {
        assert!(<Cli as Parser>::try_parse_from(["mail-verifier", "you@dest.example"]).is_err());
    }
}

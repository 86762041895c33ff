//! Command-line arguments and their merge with the settings file

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use sippcap_scenario::GeneratorSettings;

use crate::logging::LoggingConfig;

#[derive(Parser, Debug)]
#[command(name = "sippcap", version)]
#[command(about = "Generate SIPp UAC and UAS scenarios from a SIP packet capture")]
pub struct Args {
    /// pcap or pcapng file to read
    #[arg(short, long)]
    pub input_file: PathBuf,

    /// Caller address, `ip` or `ip:port`
    #[arg(short, long)]
    pub client: Option<String>,

    /// Callee address, `ip` or `ip:port`
    #[arg(short, long)]
    pub server: Option<String>,

    /// Caller number [default: 999912344321]
    #[arg(short, long)]
    pub a_number: Option<String>,

    /// Callee number [default: 888812344321]
    #[arg(short, long)]
    pub b_number: Option<String>,

    /// Scenario name [default: "SIPp Scenario"]
    #[arg(short = 'n', long)]
    pub scen_name: Option<String>,

    /// A proxy sits between client and server
    #[arg(short, long)]
    pub proxy: bool,

    /// Directory for UAC.xml and UAS.xml [default: scenarios]
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// TOML settings file; flags override its values
    #[arg(long, env = "SIPPCAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Insert a pause before sent messages captured at least this long after the previous one
    #[arg(long)]
    pub pause_threshold_ms: Option<u64>,

    /// Log level, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,
}

impl Args {
    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig::new(&self.log_level).with_json(self.json_logs)
    }

    /// Settings file values (or defaults) with the flags applied on top
    pub fn settings(&self) -> Result<GeneratorSettings> {
        let base = match &self.config {
            Some(path) => GeneratorSettings::load(path)
                .with_context(|| format!("loading settings from {}", path.display()))?,
            None => GeneratorSettings::default(),
        };
        let settings = self.apply(base);
        settings.validate()?;
        Ok(settings)
    }

    fn apply(&self, mut settings: GeneratorSettings) -> GeneratorSettings {
        if let Some(client) = &self.client {
            settings.client = Some(client.clone());
        }
        if let Some(server) = &self.server {
            settings.server = Some(server.clone());
        }
        if let Some(a_number) = &self.a_number {
            settings.a_number = a_number.clone();
        }
        if let Some(b_number) = &self.b_number {
            settings.b_number = b_number.clone();
        }
        if let Some(name) = &self.scen_name {
            settings.scenario_name = name.clone();
        }
        if self.proxy {
            settings.proxy = true;
        }
        if let Some(dir) = &self.output_dir {
            settings.output_dir = dir.clone();
        }
        if self.pause_threshold_ms.is_some() {
            settings.pause_threshold_ms = self.pause_threshold_ms;
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let args = Args::try_parse_from(["sippcap", "-i", "call.pcap", "-c", "10.0.0.1", "-s", "10.0.0.2"]).unwrap();
        let settings = args.settings().unwrap();

        assert_eq!(settings.client.as_deref(), Some("10.0.0.1"));
        assert_eq!(settings.a_number, "999912344321");
        assert_eq!(settings.b_number, "888812344321");
        assert_eq!(settings.scenario_name, "SIPp Scenario");
        assert_eq!(settings.output_dir, PathBuf::from("scenarios"));
        assert!(!settings.proxy);
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "client = \"10.0.0.1\"\nserver = \"10.0.0.2\"\nscenario_name = \"From file\"\nb_number = \"555\""
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let args = Args::try_parse_from([
            "sippcap", "-i", "call.pcap", "--config", &path, "-n", "From flag", "-p", "-s", "10.0.0.3:5080",
        ])
        .unwrap();
        let settings = args.settings().unwrap();

        assert_eq!(settings.client.as_deref(), Some("10.0.0.1"));
        assert_eq!(settings.server.as_deref(), Some("10.0.0.3:5080"));
        assert_eq!(settings.scenario_name, "From flag");
        assert_eq!(settings.b_number, "555");
        assert!(settings.proxy);
    }

    #[test]
    fn test_flag_values_are_validated() {
        let args = Args::try_parse_from(["sippcap", "-i", "call.pcap", "-n", "bad ]]> name"]).unwrap();
        let err = args.settings().unwrap_err();
        assert!(err.to_string().contains("scenario_name"));
    }

    #[test]
    fn test_input_file_is_required() {
        assert!(Args::try_parse_from(["sippcap", "-c", "10.0.0.1"]).is_err());
    }
}

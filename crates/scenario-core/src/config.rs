//! Generator settings
//!
//! Every field has a default, so a settings file only needs the values it
//! changes. Command-line flags are layered on top by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classifier::RoleAddress;
use crate::compiler::{CompileOptions, RoutingProfile};
use crate::error::{Result, ScenarioError};
use crate::template::{DialogContext, DEFAULT_EVENT_PACKAGE};

/// Settings for one generator run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    /// A-side address, `ip` or `ip:port`
    pub client: Option<String>,
    /// B-side address, `ip` or `ip:port`
    pub server: Option<String>,
    pub a_number: String,
    pub b_number: String,
    pub scenario_name: String,
    /// A proxy sits between the parties
    pub proxy: bool,
    pub output_dir: PathBuf,
    /// Pause before a sent message whose captured gap is at least this long
    pub pause_threshold_ms: Option<u64>,
    pub event_package: String,
    pub uac_label: String,
    pub uas_label: String,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            client: None,
            server: None,
            a_number: "999912344321".to_string(),
            b_number: "888812344321".to_string(),
            scenario_name: "SIPp Scenario".to_string(),
            proxy: false,
            output_dir: PathBuf::from("scenarios"),
            pause_threshold_ms: None,
            event_package: DEFAULT_EVENT_PACKAGE.to_string(),
            uac_label: "UAC".to_string(),
            uas_label: "UAS".to_string(),
        }
    }
}

impl GeneratorSettings {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let settings: Self = toml::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values that cannot be written inside a CDATA message
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("a_number", &self.a_number),
            ("b_number", &self.b_number),
            ("scenario_name", &self.scenario_name),
            ("event_package", &self.event_package),
        ];
        for (name, value) in fields {
            if value.contains("]]>") {
                return Err(ScenarioError::Config(format!("{} may not contain ']]>'", name)));
            }
            if value.contains(['\r', '\n']) {
                return Err(ScenarioError::Config(format!("{} may not contain a line break", name)));
            }
        }
        Ok(())
    }

    /// Load settings from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    pub fn routing(&self) -> RoutingProfile {
        if self.proxy {
            RoutingProfile::Intermediary
        } else {
            RoutingProfile::Direct
        }
    }

    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            routing: self.routing(),
            pause_threshold: self.pause_threshold_ms.map(Duration::from_millis),
        }
    }

    pub fn dialog_context(&self) -> DialogContext {
        let mut dialog = DialogContext::new(&self.a_number, &self.b_number, &self.scenario_name);
        dialog.default_event = self.event_package.clone();
        dialog
    }

    /// Parsed caller and callee addresses
    ///
    /// Fails with [`ScenarioError::Config`] when either is missing or
    /// cannot be parsed.
    pub fn role_addresses(&self) -> Result<(RoleAddress, RoleAddress)> {
        let client = self
            .client
            .as_deref()
            .ok_or_else(|| ScenarioError::Config("client address is required".into()))?;
        let server = self
            .server
            .as_deref()
            .ok_or_else(|| ScenarioError::Config("server address is required".into()))?;
        Ok((client.parse()?, server.parse()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings = GeneratorSettings::from_toml_str(
            r#"
            client = "10.0.0.1"
            server = "10.0.0.2:5060"
            proxy = true
            pause_threshold_ms = 500
            "#,
        )
        .unwrap();

        assert_eq!(settings.a_number, "999912344321");
        assert_eq!(settings.output_dir, PathBuf::from("scenarios"));
        assert_eq!(settings.routing(), RoutingProfile::Intermediary);
        assert_eq!(
            settings.compile_options().pause_threshold,
            Some(Duration::from_millis(500))
        );

        let (client, server) = settings.role_addresses().unwrap();
        assert_eq!(client.to_string(), "10.0.0.1");
        assert_eq!(server.to_string(), "10.0.0.2:5060");
    }

    #[test]
    fn test_missing_or_bad_addresses() {
        let settings = GeneratorSettings::default();
        assert!(matches!(settings.role_addresses(), Err(ScenarioError::Config(_))));

        let settings = GeneratorSettings {
            client: Some("not-an-ip".into()),
            server: Some("10.0.0.2".into()),
            ..Default::default()
        };
        assert!(matches!(settings.role_addresses(), Err(ScenarioError::Config(_))));
    }

    #[test]
    fn test_unknown_type_is_config_error() {
        let err = GeneratorSettings::from_toml_str("proxy = \"yes\"").unwrap_err();
        assert!(matches!(err, ScenarioError::Config(_)));
    }

    #[test]
    fn test_cdata_terminator_is_rejected() {
        let err = GeneratorSettings::from_toml_str(r#"scenario_name = "call ]]> end""#).unwrap_err();
        assert!(matches!(err, ScenarioError::Config(ref m) if m.contains("scenario_name")));

        let settings = GeneratorSettings {
            b_number: "1]]>2".into(),
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(ScenarioError::Config(_))));
        assert!(GeneratorSettings::default().validate().is_ok());
    }

    #[test]
    fn test_line_break_in_name_is_rejected() {
        let settings = GeneratorSettings {
            scenario_name: "two\nlines".into(),
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(ScenarioError::Config(_))));
    }
}

//! User configuration: a TOML file plus `KEY=VALUE` command-line overrides.
//!
//! ```toml
//! [parameters]
//! QA_PLOT = true
//! APERTURE_POSITIONS = [3.5, 11.0]
//!
//! [standards]
//! run_tie_break = "nearest-start"
//! ```

use crate::driver::BatchParameters;
use crate::matcher::RunTieBreak;
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    parameters: BTreeMap<String, toml::Value>,
    standards: StandardsSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct StandardsSection {
    run_tie_break: RunTieBreak,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    /// Parameter overrides in application order; later entries win.
    pub overrides: Vec<(String, String)>,
    pub tie_break: RunTieBreak,
}

impl Config {
    pub fn load(path: &Path) -> Result<Config> {
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::NotFound(format!("config file {}", path.display())),
            _ => Error::Io(e),
        })?;
        Config::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Config> {
        let file: ConfigFile = toml::from_str(text)?;
        let mut overrides = Vec::with_capacity(file.parameters.len());
        for (key, value) in file.parameters {
            let text = value_text(&key, &value)?;
            overrides.push((key, text));
        }
        Ok(Config {
            overrides,
            tie_break: file.standards.run_tie_break,
        })
    }

    /// Add one `KEY=VALUE` override.
    pub fn set(&mut self, assignment: &str) -> Result<()> {
        let Some((key, value)) = assignment.split_once('=') else {
            return Err(Error::Config(format!(
                "override {:?} is not KEY=VALUE",
                assignment
            )));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::Config(format!("override {:?} has no key", assignment)));
        }
        self.overrides.push((key.to_string(), value.trim().to_string()));
        Ok(())
    }

    /// Built-in defaults with every override applied.
    pub fn parameters(&self) -> Result<BatchParameters> {
        let mut params = BatchParameters::default();
        for (key, value) in &self.overrides {
            params
                .set(key, value)
                .map_err(|msg| Error::Config(format!("{}: {}", key, msg)))?;
        }
        Ok(params)
    }
}

fn value_text(key: &str, value: &toml::Value) -> Result<String> {
    use toml::Value;
    Ok(match value {
        Value::String(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Datetime(d) => d.to_string(),
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::Array(_) | Value::Table(_) => Err(Error::Config(format!(
                    "{}: nested lists and tables are not parameter values",
                    key
                ))),
                scalar => value_text(key, scalar),
            })
            .collect::<Result<Vec<_>>>()?
            .join(","),
        Value::Table(_) => {
            return Err(Error::Config(format!(
                "{}: a table is not a parameter value",
                key
            )));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn toml_values_become_parameter_text() {
        let cfg = Config::from_toml(
            r#"
[parameters]
QA_PLOT = true
NPOSITIONS = 3
APERTURE_POSITIONS = [3.5, 11.0]
OBSERVER = "Rayner"

[standards]
run_tie_break = "nearest-start"
"#,
        )
        .unwrap();
        assert_eq!(cfg.tie_break, RunTieBreak::NearestStart);

        let params = cfg.parameters().unwrap();
        assert!(params.qa_plot);
        assert_eq!(params.observer, "Rayner");
        assert_eq!(params.extra["NPOSITIONS"], "3");
        assert_eq!(params.extra["APERTURE_POSITIONS"], "3.5,11");
    }

    #[test]
    fn command_line_overrides_come_last() {
        let mut cfg = Config::from_toml("[parameters]\nPLOT_TYPE = \".png\"\n").unwrap();
        cfg.set("PLOT_TYPE=.pdf").unwrap();
        cfg.set("qa_file = false").unwrap();
        let params = cfg.parameters().unwrap();
        assert_eq!(params.plot_type, ".pdf");
        assert!(!params.qa_file);
    }

    #[test]
    fn bad_input_is_reported() {
        assert!(matches!(Config::from_toml("[paramters]\n"), Err(Error::Toml(_))));
        assert!(Config::default().set("QA_FILE").is_err());
        assert!(Config::default().set("=1").is_err());

        let mut cfg = Config::default();
        cfg.set("QA_FILE=sometimes").unwrap();
        assert!(matches!(cfg.parameters(), Err(Error::Config(_))));
    }

    #[test]
    fn empty_file_is_defaults() {
        let cfg = Config::from_toml("").unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.parameters().unwrap(), BatchParameters::default());
    }
}

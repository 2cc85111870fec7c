// ABOUTME: Environment variable values with interpolation support.
// ABOUTME: Literal values or references to variables in the deploying shell's environment.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Literal(String),
    FromEnv {
        #[serde(rename = "env")]
        var: String,
        #[serde(default)]
        default: Option<String>,
    },
}

impl EnvValue {
    pub fn resolve(&self) -> Result<String> {
        match self {
            EnvValue::Literal(s) => Ok(s.clone()),
            EnvValue::FromEnv { var, default } => match std::env::var(var) {
                Ok(val) => Ok(val),
                Err(_) => default
                    .clone()
                    .ok_or_else(|| Error::MissingEnvVar(var.clone())),
            },
        }
    }
}

/// True for names usable as `KEY` in a `KEY=VALUE` env file.
pub fn is_valid_env_key(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Resolve every value, rejecting keys that cannot appear in an env file.
pub fn resolve_env_map(map: &HashMap<String, EnvValue>) -> Result<BTreeMap<String, String>> {
    map.iter()
        .map(|(k, v)| {
            if !is_valid_env_key(k) {
                return Err(Error::InvalidConfig(format!(
                    "invalid environment variable name: {k}"
                )));
            }
            let resolved = v.resolve()?;
            // One KEY=VALUE per line in the env file.
            if resolved.contains(['\n', '\r']) {
                return Err(Error::InvalidConfig(format!(
                    "environment value for {k} cannot span multiple lines"
                )));
            }
            Ok((k.clone(), resolved))
        })
        .collect()
}

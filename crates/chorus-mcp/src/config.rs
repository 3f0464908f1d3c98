//! Launch specs for tool-provider processes.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::McpError;

fn default_timeout() -> u64 {
    30000
}

/// How to launch one MCP server process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchSpec {
    /// Command to run (e.g., "npx", "python").
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables; the parent environment is inherited.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Timeout for each request in milliseconds (default: 30000).
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

impl LaunchSpec {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env: HashMap::new(),
            timeout_ms: default_timeout(),
        }
    }

    /// Launch spec for a server script: `.py` runs under `python`, `.js`
    /// under `node`.
    pub fn for_script(path: &Path) -> Result<Self, McpError> {
        let command = match path.extension().and_then(|e| e.to_str()) {
            Some("py") => "python",
            Some("js") => "node",
            _ => {
                return Err(McpError::InvalidLaunchSpec {
                    name: path.display().to_string(),
                    message: "server script must be a .py or .js file".to_string(),
                });
            }
        };
        Ok(Self::new(command, vec![path.display().to_string()]))
    }

    pub(crate) fn validate(&self, name: &str) -> Result<(), McpError> {
        if self.command.trim().is_empty() {
            return Err(McpError::InvalidLaunchSpec {
                name: name.to_string(),
                message: "missing 'command'".to_string(),
            });
        }
        Ok(())
    }
}

/// A launch spec with the name it was declared under.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedServer {
    pub name: String,
    pub spec: LaunchSpec,
}

/// Declarative server configuration: `{"mcpServers": {name: spec, ...}}`.
///
/// Servers keep the order they were written in, which is the connection
/// order and therefore the tool-collision precedence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McpServersConfig {
    #[serde(
        rename = "mcpServers",
        default,
        serialize_with = "serialize_servers",
        deserialize_with = "deserialize_servers"
    )]
    pub servers: Vec<NamedServer>,
}

impl McpServersConfig {
    /// Append a server, builder style.
    pub fn with_server(mut self, name: impl Into<String>, spec: LaunchSpec) -> Self {
        self.servers.push(NamedServer {
            name: name.into(),
            spec,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

fn serialize_servers<S: Serializer>(servers: &[NamedServer], s: S) -> Result<S::Ok, S::Error> {
    let mut map = s.serialize_map(Some(servers.len()))?;
    for server in servers {
        map.serialize_entry(&server.name, &server.spec)?;
    }
    map.end()
}

fn deserialize_servers<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<NamedServer>, D::Error> {
    struct OrderedServers;

    impl<'de> Visitor<'de> for OrderedServers {
        type Value = Vec<NamedServer>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of server names to launch specs")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut servers = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, spec)) = map.next_entry::<String, LaunchSpec>()? {
                if servers.iter().any(|s: &NamedServer| s.name == name) {
                    return Err(serde::de::Error::custom(format!(
                        "duplicate server name '{name}'"
                    )));
                }
                servers.push(NamedServer { name, spec });
            }
            Ok(servers)
        }
    }

    d.deserialize_map(OrderedServers)
}

/// Where the set of provider processes comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerSources {
    /// Server scripts, launched with the interpreter matching their extension.
    Scripts(Vec<PathBuf>),
    /// Named launch specs from a configuration file.
    Config(McpServersConfig),
}

impl ServerSources {
    /// Resolve into named launch specs, in order.
    ///
    /// Script servers are named after their file path. A script with an
    /// unsupported extension is returned as an error alongside its name.
    pub(crate) fn resolve(&self) -> Vec<(String, Result<LaunchSpec, McpError>)> {
        match self {
            ServerSources::Scripts(paths) => paths
                .iter()
                .map(|p| (p.display().to_string(), LaunchSpec::for_script(p)))
                .collect(),
            ServerSources::Config(config) => config
                .servers
                .iter()
                .map(|s| (s.name.clone(), Ok(s.spec.clone())))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ServerSources::Scripts(paths) => paths.is_empty(),
            ServerSources::Config(config) => config.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_json_config_in_file_order() {
        let json = r#"{
            "mcpServers": {
                "zeta": {"command": "python", "args": ["servers/calculator.py"]},
                "alpha": {"command": "node", "args": ["weather.js"], "timeout_ms": 5000}
            }
        }"#;
        let config: McpServersConfig = serde_json::from_str(json).unwrap();
        let names: Vec<&str> = config.servers.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert_eq!(config.servers[0].spec.timeout_ms, 30000);
        assert_eq!(config.servers[1].spec.timeout_ms, 5000);
        assert_eq!(config.servers[0].spec.args, vec!["servers/calculator.py"]);
    }

    #[test]
    fn parse_toml_config_with_env() {
        let toml_str = r#"
[mcpServers.github]
command = "npx"
args = ["-y", "@modelcontextprotocol/server-github"]
env = { GITHUB_TOKEN = "ghp_xxxx" }
"#;
        let config: McpServersConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.servers[0].spec.env["GITHUB_TOKEN"], "ghp_xxxx");
    }

    #[test]
    fn missing_servers_key_is_empty() {
        let config: McpServersConfig = serde_json::from_str("{}").unwrap();
        assert!(config.is_empty());
    }

    #[test]
    fn missing_command_parses_but_fails_validation() {
        let json = r#"{"mcpServers": {"broken": {"args": ["x"]}}}"#;
        let config: McpServersConfig = serde_json::from_str(json).unwrap();
        let err = config.servers[0].spec.validate("broken").unwrap_err();
        assert!(err.to_string().contains("missing 'command'"));
    }

    #[test]
    fn serialize_keeps_order() {
        let config = McpServersConfig::default()
            .with_server("b", LaunchSpec::new("bash", vec![]))
            .with_server("a", LaunchSpec::new("bash", vec![]));
        let text = serde_json::to_string(&config).unwrap();
        assert!(text.find("\"b\"").unwrap() < text.find("\"a\"").unwrap());
        let back: McpServersConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn script_extension_selects_interpreter() {
        let py = LaunchSpec::for_script(Path::new("servers/calculator.py")).unwrap();
        assert_eq!(py.command, "python");
        assert_eq!(py.args, vec!["servers/calculator.py"]);

        let js = LaunchSpec::for_script(Path::new("build/index.js")).unwrap();
        assert_eq!(js.command, "node");

        let err = LaunchSpec::for_script(Path::new("server.rb")).unwrap_err();
        assert!(matches!(err, McpError::InvalidLaunchSpec { .. }));
    }
}

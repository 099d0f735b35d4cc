//! [`SnmpTransport`] backed by the net-snmp command-line tools.
//!
//! Every request spawns one tool with an argument vector. Options come
//! first, then `--`, then the agent address and objects, so probe values
//! that start with `-` are never read as options.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use tracing::debug;

use rowprobe_common::defaults::{READ_COMMUNITY, SNMP_VERSION, WRITE_COMMUNITY};
use rowprobe_common::shell::{
    self, SNMPGETNEXT_CMD, SNMPGET_CMD, SNMPSET_CMD, SNMPTRANSLATE_CMD,
};
use rowprobe_common::{ObjectInfo, RowProbeError, RowProbeResult, SnmpTransport, VarBind};

static LEADING_OID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^((?:\.\d+)+)\s*(.*)$").expect("Invalid regex pattern"));

static OBJECT_TYPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\S+)\s+OBJECT-TYPE").expect("Invalid regex pattern"));

static FROM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^--\s*FROM\s+(\S+)").expect("Invalid regex pattern"));

static SYNTAX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^SYNTAX\s+(.+)$").expect("Invalid regex pattern"));

static ACCESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^MAX-ACCESS\s+(\S+)").expect("Invalid regex pattern"));

/// Markers net-snmp prints (with exit code 0) when a GET finds nothing.
const NO_SUCH_MARKERS: [&str; 3] = ["No Such Object", "No Such Instance", "No more variables"];

/// Settings shared by every net-snmp invocation.
#[derive(Debug, Clone)]
pub struct NetSnmpConfig {
    /// `-v` argument.
    pub version: String,
    /// `-c` argument for GET / GET-NEXT.
    pub read_community: String,
    /// `-c` argument for SET.
    pub write_community: String,
    /// Directory holding the tools; `None` resolves them from `PATH`.
    pub tools_dir: Option<PathBuf>,
    /// Extra MIB modules, loaded with `-m +MODULE`.
    pub mibs: Vec<String>,
}

impl Default for NetSnmpConfig {
    fn default() -> Self {
        Self {
            version: SNMP_VERSION.to_string(),
            read_community: READ_COMMUNITY.to_string(),
            write_community: WRITE_COMMUNITY.to_string(),
            tools_dir: None,
            mibs: Vec::new(),
        }
    }
}

/// net-snmp tool runner for one agent.
#[derive(Debug, Clone)]
pub struct NetSnmpTransport {
    agent: Ipv4Addr,
    config: NetSnmpConfig,
}

impl NetSnmpTransport {
    /// Creates a transport for `agent`.
    pub fn new(agent: Ipv4Addr, config: NetSnmpConfig) -> Self {
        Self { agent, config }
    }

    /// The agent address.
    pub fn agent(&self) -> Ipv4Addr {
        self.agent
    }

    fn program(&self, tool: &str) -> PathBuf {
        match &self.config.tools_dir {
            Some(dir) => dir.join(tool),
            None => PathBuf::from(tool),
        }
    }

    fn mib_args(&self) -> Vec<String> {
        self.config
            .mibs
            .iter()
            .flat_map(|m| ["-m".to_string(), format!("+{}", m)])
            .collect()
    }

    fn session_args(&self, community: &str) -> Vec<String> {
        let mut args = vec![
            "-v".to_string(),
            self.config.version.clone(),
            "-c".to_string(),
            community.to_string(),
        ];
        args.extend(self.mib_args());
        args
    }

    /// Arguments for `snmpget`.
    pub fn get_args(&self, object: &str) -> Vec<String> {
        let mut args = self.session_args(&self.config.read_community);
        args.extend(["-Oqv".to_string(), "--".to_string()]);
        args.extend([self.agent.to_string(), object.to_string()]);
        args
    }

    /// Arguments for `snmpgetnext`.
    pub fn get_next_args(&self, object: &str) -> Vec<String> {
        let mut args = self.session_args(&self.config.read_community);
        args.extend(["-On".to_string(), "-Oq".to_string(), "--".to_string()]);
        args.extend([self.agent.to_string(), object.to_string()]);
        args
    }

    /// Arguments for `snmpset`.
    pub fn set_args(&self, varbinds: &[VarBind]) -> Vec<String> {
        let mut args = self.session_args(&self.config.write_community);
        args.extend(["--".to_string(), self.agent.to_string()]);
        for vb in varbinds {
            args.extend([vb.object.clone(), vb.syntax.tag().to_string(), vb.value.clone()]);
        }
        args
    }

    /// Arguments for `snmptranslate -On -Td`.
    pub fn translate_args(&self, object: &str) -> Vec<String> {
        let mut args = self.mib_args();
        args.extend([
            "-On".to_string(),
            "-Td".to_string(),
            "--".to_string(),
            object.to_string(),
        ]);
        args
    }

    /// Arguments for `snmptranslate -Tp`.
    pub fn subtree_args(&self, module: &str, root: &str) -> Vec<String> {
        let mut args = vec!["-m".to_string(), format!("+{}", module)];
        args.extend(self.mib_args());
        args.extend(["-Tp".to_string(), "--".to_string(), root.to_string()]);
        args
    }
}

#[async_trait]
impl SnmpTransport for NetSnmpTransport {
    async fn get(&self, object: &str) -> RowProbeResult<String> {
        let out = shell::exec_or_throw(self.program(SNMPGET_CMD), &self.get_args(object)).await?;
        parse_get_output(object, &out)
    }

    async fn get_next(&self, object: &str) -> RowProbeResult<(String, String)> {
        let out =
            shell::exec_or_throw(self.program(SNMPGETNEXT_CMD), &self.get_next_args(object))
                .await?;
        parse_get_next_output(object, &out)
    }

    async fn set(&self, varbinds: &[VarBind]) -> RowProbeResult<()> {
        if varbinds.is_empty() {
            return Err(RowProbeError::internal("SET request without varbinds"));
        }
        let out = shell::exec_or_throw(self.program(SNMPSET_CMD), &self.set_args(varbinds)).await?;
        debug!("snmpset: {}", out);
        Ok(())
    }

    async fn translate(&self, object: &str) -> RowProbeResult<ObjectInfo> {
        let out =
            shell::exec_or_throw(self.program(SNMPTRANSLATE_CMD), &self.translate_args(object))
                .await?;
        parse_translate_output(object, &out)
    }

    async fn subtree(&self, module: &str, root: &str) -> RowProbeResult<String> {
        shell::exec_or_throw(
            self.program(SNMPTRANSLATE_CMD),
            &self.subtree_args(module, root),
        )
        .await
    }
}

fn no_such(output: &str) -> bool {
    NO_SUCH_MARKERS.iter().any(|m| output.contains(m))
}

/// Extracts the value printed by `snmpget -Oqv`.
pub fn parse_get_output(object: &str, output: &str) -> RowProbeResult<String> {
    if no_such(output) {
        return Err(RowProbeError::NoSuchObject {
            object: object.to_string(),
        });
    }
    let value = output.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    Ok(value.to_string())
}

/// Splits `snmpgetnext -On -Oq` output into numeric OID and value.
pub fn parse_get_next_output(object: &str, output: &str) -> RowProbeResult<(String, String)> {
    let line = output.lines().next().unwrap_or("").trim();
    if no_such(line) {
        return Err(RowProbeError::NoSuchObject {
            object: object.to_string(),
        });
    }
    let caps = LEADING_OID_RE.captures(line).ok_or_else(|| {
        RowProbeError::parse(SNMPGETNEXT_CMD, format!("no numeric OID in '{}'", line))
    })?;
    Ok((caps[1].to_string(), caps[2].trim().to_string()))
}

/// Parses `snmptranslate -On -Td` output.
pub fn parse_translate_output(object: &str, output: &str) -> RowProbeResult<ObjectInfo> {
    let mut info = ObjectInfo::default();
    for line in output.lines().map(str::trim) {
        if info.oid.is_empty() {
            if let Some(caps) = LEADING_OID_RE.captures(line) {
                info.oid = caps[1].to_string();
                continue;
            }
        }
        if let Some(caps) = OBJECT_TYPE_RE.captures(line) {
            info.label.get_or_insert_with(|| caps[1].to_string());
        } else if let Some(caps) = FROM_RE.captures(line) {
            info.module.get_or_insert_with(|| caps[1].to_string());
        } else if let Some(caps) = SYNTAX_RE.captures(line) {
            info.syntax.get_or_insert_with(|| caps[1].trim().to_string());
        } else if let Some(caps) = ACCESS_RE.captures(line) {
            info.access.get_or_insert_with(|| caps[1].to_string());
        }
    }
    if info.oid.is_empty() {
        return Err(RowProbeError::parse(
            SNMPTRANSLATE_CMD,
            format!("no numeric OID for {}", object),
        ));
    }
    Ok(info)
}

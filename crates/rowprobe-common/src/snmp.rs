//! SNMP vocabulary shared by the transport, the drivers and the fake agent.
//!
//! Nothing here speaks SNMP on the wire; the [`SnmpTransport`] trait is the
//! seam behind which the net-snmp tools (or a test double) do the work.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

use crate::error::{RowProbeError, RowProbeResult};

/// Value syntax tag, spelled the way `snmpset` expects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxType {
    /// `i` INTEGER
    Integer,
    /// `u` Unsigned32 / Gauge32
    Unsigned,
    /// `t` TimeTicks
    TimeTicks,
    /// `a` IpAddress
    IpAddress,
    /// `o` OBJECT IDENTIFIER
    ObjectId,
    /// `s` OCTET STRING / DisplayString
    String,
    /// `x` hex string
    HexString,
    /// `d` decimal string
    DecimalString,
    /// `b` BITS
    Bits,
    /// `U` unsigned int64
    Unsigned64,
    /// `I` signed int64
    Integer64,
    /// `F` float
    Float,
    /// `D` double
    Double,
    /// `=` take the type from the MIB
    MibDefault,
}

impl SyntaxType {
    /// Returns the net-snmp type tag.
    pub fn tag(&self) -> &'static str {
        match self {
            SyntaxType::Integer => "i",
            SyntaxType::Unsigned => "u",
            SyntaxType::TimeTicks => "t",
            SyntaxType::IpAddress => "a",
            SyntaxType::ObjectId => "o",
            SyntaxType::String => "s",
            SyntaxType::HexString => "x",
            SyntaxType::DecimalString => "d",
            SyntaxType::Bits => "b",
            SyntaxType::Unsigned64 => "U",
            SyntaxType::Integer64 => "I",
            SyntaxType::Float => "F",
            SyntaxType::Double => "D",
            SyntaxType::MibDefault => "=",
        }
    }
}

impl FromStr for SyntaxType {
    type Err = RowProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "i" => SyntaxType::Integer,
            "u" => SyntaxType::Unsigned,
            "t" => SyntaxType::TimeTicks,
            "a" => SyntaxType::IpAddress,
            "o" => SyntaxType::ObjectId,
            "s" => SyntaxType::String,
            "x" => SyntaxType::HexString,
            "d" => SyntaxType::DecimalString,
            "b" => SyntaxType::Bits,
            "U" => SyntaxType::Unsigned64,
            "I" => SyntaxType::Integer64,
            "F" => SyntaxType::Float,
            "D" => SyntaxType::Double,
            "=" => SyntaxType::MibDefault,
            other => {
                return Err(RowProbeError::config(
                    "type",
                    format!("unknown syntax tag '{}'", other),
                ))
            }
        })
    }
}

impl fmt::Display for SyntaxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One (object instance, type, value) triple of a SET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarBind {
    /// Index-qualified object name, e.g. `IF-MIB::ifAlias.1`.
    pub object: String,
    /// Syntax tag.
    pub syntax: SyntaxType,
    /// Value in net-snmp's textual form.
    pub value: String,
}

impl VarBind {
    /// Creates a new varbind.
    pub fn new(object: impl Into<String>, syntax: SyntaxType, value: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            syntax,
            value: value.into(),
        }
    }

    /// Creates an INTEGER varbind.
    pub fn integer(object: impl Into<String>, value: i64) -> Self {
        Self::new(object, SyntaxType::Integer, value.to_string())
    }
}

/// RowStatus textual convention (RFC 2579).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowStatus {
    Active,
    NotInService,
    NotReady,
    CreateAndGo,
    CreateAndWait,
    Destroy,
}

impl RowStatus {
    /// Value some legacy switch MIBs accept as `invalid(4)` when a row with
    /// invalid leaves refuses `destroy(6)`.
    pub const DESTROY_FALLBACK: i64 = 4;

    /// Returns the integer encoding.
    pub fn value(&self) -> i64 {
        match self {
            RowStatus::Active => 1,
            RowStatus::NotInService => 2,
            RowStatus::NotReady => 3,
            RowStatus::CreateAndGo => 4,
            RowStatus::CreateAndWait => 5,
            RowStatus::Destroy => 6,
        }
    }

    /// Decodes the integer encoding.
    pub fn from_value(value: i64) -> Option<Self> {
        Some(match value {
            1 => RowStatus::Active,
            2 => RowStatus::NotInService,
            3 => RowStatus::NotReady,
            4 => RowStatus::CreateAndGo,
            5 => RowStatus::CreateAndWait,
            6 => RowStatus::Destroy,
            _ => return None,
        })
    }

    /// Returns the enumeration label.
    pub fn as_str(&self) -> &'static str {
        match self {
            RowStatus::Active => "active",
            RowStatus::NotInService => "notInService",
            RowStatus::NotReady => "notReady",
            RowStatus::CreateAndGo => "createAndGo",
            RowStatus::CreateAndWait => "createAndWait",
            RowStatus::Destroy => "destroy",
        }
    }

    /// Parses a GET result: a label (`active`), a label with value
    /// (`active(1)`) or a bare integer.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(n) = s.parse::<i64>() {
            return Self::from_value(n);
        }
        let label = s.split('(').next().unwrap_or(s).trim();
        [
            RowStatus::Active,
            RowStatus::NotInService,
            RowStatus::NotReady,
            RowStatus::CreateAndGo,
            RowStatus::CreateAndWait,
            RowStatus::Destroy,
        ]
        .into_iter()
        .find(|rs| rs.as_str() == label)
    }
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.as_str(), self.value())
    }
}

static SIZE_RANGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([0-9\s|.]+)\)").expect("Invalid regex pattern"));

/// What the MIB says about one object, as reported by `snmptranslate -On -Td`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Numeric OID with leading dot, e.g. `.1.3.6.1.2.1.31.1.1.1.18`.
    pub oid: String,
    /// Object descriptor, e.g. `ifAlias`.
    pub label: Option<String>,
    /// Defining module, e.g. `IF-MIB`.
    pub module: Option<String>,
    /// The SYNTAX clause, e.g. `OCTET STRING (0..64)`.
    pub syntax: Option<String>,
    /// The MAX-ACCESS clause, e.g. `read-create`.
    pub access: Option<String>,
}

impl ObjectInfo {
    /// Returns `MODULE::label` when both are known.
    pub fn qualified_name(&self) -> Option<String> {
        match (&self.module, &self.label) {
            (Some(m), Some(l)) => Some(format!("{}::{}", m, l)),
            _ => None,
        }
    }

    /// Minimum string length implied by the SYNTAX size constraint.
    ///
    /// `(0..255)` gives 0, `(8)` gives 8 and `(0 | 4..32)` gives 4: a lone
    /// zero alternative means "may be empty" and is skipped when other sizes
    /// are allowed. No constraint gives 0.
    pub fn min_string_length(&self) -> usize {
        self.syntax
            .as_deref()
            .map(min_length_from_syntax)
            .unwrap_or(0)
    }

    /// Maximum string length allowed by the SYNTAX size constraint, if any.
    pub fn max_string_length(&self) -> Option<usize> {
        self.syntax.as_deref().and_then(max_length_from_syntax)
    }
}

/// Size alternatives of a SYNTAX clause as `(lower, upper)` pairs; a single
/// size has no upper bound of its own.
fn size_alternatives(syntax: &str) -> Vec<(usize, Option<usize>)> {
    let Some(caps) = SIZE_RANGE_RE.captures(syntax) else {
        return Vec::new();
    };
    caps[1]
        .split('|')
        .filter_map(|alt| {
            let alt = alt.trim();
            match alt.split_once("..") {
                Some((lo, hi)) => Some((lo.trim().parse().ok()?, hi.trim().parse().ok())),
                None => Some((alt.parse().ok()?, None)),
            }
        })
        .collect()
}

/// Extracts the minimum length from a SYNTAX clause.
pub fn min_length_from_syntax(syntax: &str) -> usize {
    let alternatives = size_alternatives(syntax);
    let candidates: Vec<usize> = if alternatives.len() > 1 {
        alternatives
            .iter()
            .filter(|(lo, hi)| !(*lo == 0 && hi.is_none()))
            .map(|(lo, _)| *lo)
            .collect()
    } else {
        alternatives.iter().map(|(lo, _)| *lo).collect()
    };

    candidates.into_iter().min().unwrap_or(0)
}

/// Extracts the maximum length from a SYNTAX clause, if it has a size
/// constraint.
pub fn max_length_from_syntax(syntax: &str) -> Option<usize> {
    size_alternatives(syntax)
        .into_iter()
        .map(|(lo, hi)| hi.unwrap_or(lo))
        .max()
}

/// The SNMP collaborator every driver works through.
///
/// Each call blocks (asynchronously) until the agent answers or the
/// transport gives up; retries below this layer belong to the transport.
#[async_trait]
pub trait SnmpTransport: Send + Sync {
    /// Reads one object instance and returns its value as text.
    async fn get(&self, object: &str) -> RowProbeResult<String>;

    /// Returns the numeric OID and value of the instance following `object`.
    async fn get_next(&self, object: &str) -> RowProbeResult<(String, String)>;

    /// Sends one SET request carrying all `varbinds`.
    async fn set(&self, varbinds: &[VarBind]) -> RowProbeResult<()>;

    /// Looks up an object in the loaded MIBs.
    async fn translate(&self, object: &str) -> RowProbeResult<ObjectInfo>;

    /// Returns the `-Tp` tree listing of `root` with `module` loaded.
    async fn subtree(&self, module: &str, root: &str) -> RowProbeResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_type_round_trip() {
        for tag in ["i", "u", "t", "a", "o", "s", "x", "d", "b", "U", "I", "F", "D", "="] {
            let syntax: SyntaxType = tag.parse().unwrap();
            assert_eq!(syntax.tag(), tag);
        }
        assert!("q".parse::<SyntaxType>().is_err());
        assert!("".parse::<SyntaxType>().is_err());
    }

    #[test]
    fn test_row_status_values() {
        assert_eq!(RowStatus::Active.value(), 1);
        assert_eq!(RowStatus::Destroy.value(), 6);
        assert_eq!(RowStatus::from_value(5), Some(RowStatus::CreateAndWait));
        assert_eq!(RowStatus::from_value(7), None);
        assert_eq!(RowStatus::NotReady.to_string(), "notReady(3)");
    }

    #[test]
    fn test_row_status_parse() {
        assert_eq!(RowStatus::parse("active"), Some(RowStatus::Active));
        assert_eq!(RowStatus::parse("notInService(2)"), Some(RowStatus::NotInService));
        assert_eq!(RowStatus::parse(" 3\n"), Some(RowStatus::NotReady));
        assert_eq!(RowStatus::parse("No Such Instance"), None);
    }

    #[test]
    fn test_min_length_from_syntax() {
        assert_eq!(min_length_from_syntax("OCTET STRING (0..255)"), 0);
        assert_eq!(min_length_from_syntax("OCTET STRING (4..32)"), 4);
        assert_eq!(min_length_from_syntax("OCTET STRING (0 | 4..32)"), 4);
        assert_eq!(min_length_from_syntax("OCTET STRING (8)"), 8);
        assert_eq!(min_length_from_syntax("OCTET STRING (6 | 12)"), 6);
        assert_eq!(min_length_from_syntax("OCTET STRING"), 0);
    }

    #[test]
    fn test_max_length_from_syntax() {
        assert_eq!(max_length_from_syntax("OCTET STRING (0..255)"), Some(255));
        assert_eq!(max_length_from_syntax("OCTET STRING (1..2)"), Some(2));
        assert_eq!(max_length_from_syntax("OCTET STRING (0 | 4..32)"), Some(32));
        assert_eq!(max_length_from_syntax("OCTET STRING (6 | 12)"), Some(12));
        assert_eq!(max_length_from_syntax("DisplayString"), None);
    }

    #[test]
    fn test_object_info() {
        let info = ObjectInfo {
            oid: ".1.3.6.1.2.1.31.1.1.1.18".to_string(),
            label: Some("ifAlias".to_string()),
            module: Some("IF-MIB".to_string()),
            syntax: Some("OCTET STRING (0..64)".to_string()),
            access: Some("read-write".to_string()),
        };
        assert_eq!(info.qualified_name().as_deref(), Some("IF-MIB::ifAlias"));
        assert_eq!(info.min_string_length(), 0);
        assert_eq!(info.max_string_length(), Some(64));
        assert_eq!(ObjectInfo::default().qualified_name(), None);
    }
}

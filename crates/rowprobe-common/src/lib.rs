//! Common infrastructure for the rowprobe tools.
//!
//! - [`shell`]: external tool execution without a shell in between
//! - [`snmp`]: syntax tags, varbinds, RowStatus and the [`SnmpTransport`] seam
//! - [`error`]: error taxonomy shared by every crate
//! - [`defaults`]: communities, probe character set, report constants
//!
//! # Example
//!
//! ```ignore
//! use rowprobe_common::{RowProbeResult, SnmpTransport, SyntaxType, VarBind};
//!
//! async fn rename<T: SnmpTransport>(agent: &T) -> RowProbeResult<()> {
//!     agent.set(&[VarBind::new("IF-MIB::ifAlias.1", SyntaxType::String, "uplink")]).await
//! }
//! ```

pub mod defaults;
pub mod error;
pub mod shell;
pub mod snmp;

// Re-export commonly used items at crate root
pub use error::{RowProbeError, RowProbeResult};
pub use snmp::{ObjectInfo, RowStatus, SnmpTransport, SyntaxType, VarBind};

//! Default values shared by the CLI, the transport and the drivers.

/// SNMP protocol version passed to the net-snmp tools.
pub const SNMP_VERSION: &str = "2c";

/// Community used for GET / GET-NEXT.
pub const READ_COMMUNITY: &str = "public";

/// Community used for SET.
pub const WRITE_COMMUNITY: &str = "private";

/// Probe character set: ASCII punctuation in table order.
pub const PROBE_CHARS: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// Fill length used by the single-leaf probe when the leaf needs more than
/// one character.
pub const FIXED_FILL_LEN: usize = 8;

/// Prefix of the placeholder value held by leaves that are not being probed.
pub const PLACEHOLDER_PREFIX: &str = "ph";

/// Padding character for placeholders with a minimum length.
pub const PLACEHOLDER_PAD: char = 'x';

/// Report cell for a leaf with no disallowed characters.
pub const REPORT_NONE: &str = "None";

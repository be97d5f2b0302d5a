//! Collection names and global-key prefixes of the watched topology.

pub(crate) const MACHINES: &str = "machines";
pub(crate) const UNITS: &str = "units";
pub(crate) const APPLICATIONS: &str = "applications";
pub(crate) const RELATIONS: &str = "relations";
pub(crate) const ANNOTATIONS: &str = "annotations";
pub(crate) const STATUSES: &str = "statuses";
pub(crate) const CONSTRAINTS: &str = "constraints";
pub(crate) const SETTINGS: &str = "settings";
pub(crate) const OPENED_PORTS: &str = "openedPorts";

// Cross-read only, never watched.
pub(crate) const INSTANCE_DATA: &str = "instanceData";

/// Global keys are `<prefix><id>` with `#` separating further segments,
/// e.g. `m#0`, `u#wordpress/0`, `a#wordpress#local:quantal/wordpress-3`.
pub(crate) const MACHINE_PREFIX: &str = "m#";
pub(crate) const UNIT_PREFIX: &str = "u#";
pub(crate) const APPLICATION_PREFIX: &str = "a#";
pub(crate) const KEY_SEPARATOR: char = '#';

/// Network segment of an opened-ports key, `m#0#n#juju-public`.
pub(crate) const NETWORK_SEGMENT: &str = "n#";
pub(crate) const DEFAULT_NETWORK: &str = "juju-public";

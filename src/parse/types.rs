//! Audit record type numbers and names.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Record types this viewer knows by name.
///
/// The kernel defines many more; unknown types are carried by number.
pub const RECORD_TYPES: &[(u32, &str)] = &[
    (1006, "LOGIN"),
    (1100, "USER_AUTH"),
    (1101, "USER_ACCT"),
    (1102, "USER_MGMT"),
    (1103, "CRED_ACQ"),
    (1104, "CRED_DISP"),
    (1105, "USER_START"),
    (1106, "USER_END"),
    (1107, "USER_AVC"),
    (1108, "USER_CHAUTHTOK"),
    (1109, "USER_ERR"),
    (1110, "CRED_REFR"),
    (1112, "USER_LOGIN"),
    (1113, "USER_LOGOUT"),
    (1114, "ADD_USER"),
    (1115, "DEL_USER"),
    (1116, "ADD_GROUP"),
    (1117, "DEL_GROUP"),
    (1130, "SERVICE_START"),
    (1131, "SERVICE_STOP"),
    (1200, "DAEMON_START"),
    (1201, "DAEMON_END"),
    (1202, "DAEMON_ABORT"),
    (1203, "DAEMON_CONFIG"),
    (1300, "SYSCALL"),
    (1302, "PATH"),
    (1303, "IPC"),
    (1304, "SOCKETCALL"),
    (1305, "CONFIG_CHANGE"),
    (1306, "SOCKADDR"),
    (1307, "CWD"),
    (1309, "EXECVE"),
    (1320, "EOE"),
    (1321, "BPRM_FCAPS"),
    (1322, "CAPSET"),
    (1323, "MMAP"),
    (1324, "NETFILTER_PKT"),
    (1325, "NETFILTER_CFG"),
    (1326, "SECCOMP"),
    (1327, "PROCTITLE"),
    (1400, "AVC"),
    (1401, "SELINUX_ERR"),
    (1403, "MAC_STATUS"),
    (1404, "MAC_CONFIG_CHANGE"),
];

static NAME_BY_CODE: Lazy<HashMap<u32, &'static str>> =
    Lazy::new(|| RECORD_TYPES.iter().copied().collect());

static CODE_BY_NAME: Lazy<HashMap<&'static str, u32>> =
    Lazy::new(|| RECORD_TYPES.iter().map(|&(code, name)| (name, code)).collect());

/// Return a display string for a record type, falling back to the number.
pub fn type_name(code: u32) -> String {
    match NAME_BY_CODE.get(&code) {
        Some(name) => (*name).to_string(),
        None => code.to_string(),
    }
}

/// Resolve a record type name to its number.
///
/// Accepts the `UNKNOWN[n]` form emitted for types the logging daemon
/// itself did not recognize. Names not in the table resolve to 0.
pub fn type_code(name: &str) -> u32 {
    if let Some(code) = CODE_BY_NAME.get(name) {
        return *code;
    }
    if let Some(inner) = name.strip_prefix("UNKNOWN[").and_then(|s| s.strip_suffix(']')) {
        if let Ok(code) = inner.parse() {
            return code;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_types_resolve_both_ways() {
        assert_eq!(type_code("SYSCALL"), 1300);
        assert_eq!(type_name(1300), "SYSCALL");
        assert_eq!(type_code("USER_LOGIN"), 1112);
    }

    #[test]
    fn unknown_types_fall_back_to_numbers() {
        assert_eq!(type_name(9999), "9999");
        assert_eq!(type_code("UNKNOWN[2404]"), 2404);
        assert_eq!(type_code("NO_SUCH_TYPE"), 0);
    }
}

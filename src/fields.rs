//! Lists of known audit field names.

/// Field names offered for filtering and grouping.
///
/// Not authoritative; the kernel and userspace tools keep growing this set.
pub const FIELD_NAMES: &[&str] = &[
    "acct",
    "addr",
    "arch",
    "audit_backlog_limit",
    "audit_enabled",
    "auid",
    "a0",
    "a1",
    "a2",
    "a3",
    "banners",
    "comm",
    "dev",
    "egid",
    "euid",
    "exe",
    "exit",
    "format",
    "fsgid",
    "fsuid",
    "gid",
    "hostname",
    "ino",
    "inode",
    "item",
    "items",
    "key",
    "name",
    "node",
    "old",
    "op",
    "path",
    "pid",
    "ppid",
    "printer",
    "range",
    "res",
    "scontext",
    "seperms",
    "seresults",
    "sgid",
    "subj",
    "success",
    "suid",
    "syscall",
    "tclass",
    "tcontext",
    "terminal",
    "tty",
    "type",
    "uid",
    "uri",
    "ver",
];

/// Fields whose values are whole numbers; their statistics sort numerically.
pub const INTEGER_FIELD_NAMES: &[&str] = &[
    "audit_backlog_limit",
    "audit_enabled",
    "ino",
    "inode",
    "item",
    "items",
    "pid",
    "ppid",
];

/// Return true if values of `field` are known to be integers.
pub fn is_integer_field(field: &str) -> bool {
    INTEGER_FIELD_NAMES.contains(&field)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_fields_are_known_fields() {
        for name in INTEGER_FIELD_NAMES {
            assert!(FIELD_NAMES.contains(name), "{name} missing from FIELD_NAMES");
        }
    }

    #[test]
    fn uid_is_not_integer_sorted() {
        // uid values are interpreted into user names, so they sort as text.
        assert!(!is_integer_field("uid"));
        assert!(is_integer_field("pid"));
    }
}

// src/route.rs

//! Default-route detection from the kernel routing tables.
//!
//! Used as the predicate of the "wait for connectivity" stage. A host has a
//! default route when either table holds an up, non-reject route to the
//! all-zero prefix through a gateway.

use std::fs;
use std::path::Path;

use tracing::debug;

pub const IPV4_ROUTE_TABLE: &str = "/proc/net/route";
pub const IPV6_ROUTE_TABLE: &str = "/proc/net/ipv6_route";

const RTF_UP: u32 = 0x0001;
const RTF_GATEWAY: u32 = 0x0002;
const RTF_REJECT: u32 = 0x0200;

pub fn has_default_route() -> bool {
    has_default_route_in(Path::new(IPV4_ROUTE_TABLE), Path::new(IPV6_ROUTE_TABLE))
}

/// Same as [`has_default_route`], reading the given table files.
///
/// Unreadable tables count as "no default route".
pub fn has_default_route_in(ipv4_table: &Path, ipv6_table: &Path) -> bool {
    read_table(ipv4_table).is_some_and(|s| ipv4_table_has_default(&s))
        || read_table(ipv6_table).is_some_and(|s| ipv6_table_has_default(&s))
}

fn read_table(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(s) => Some(s),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "route table unreadable");
            None
        }
    }
}

/// Parse the `/proc/net/route` format.
///
/// ```text
/// Iface  Destination  Gateway   Flags  RefCnt  Use  Metric  Mask      MTU  Window  IRTT
/// eth0   00000000     0202000A  0003   0       0    100     00000000  0    0       0
/// ```
pub fn ipv4_table_has_default(contents: &str) -> bool {
    contents.lines().skip(1).any(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 8 {
            return false;
        }
        let (Some(dest), Some(flags), Some(mask)) = (
            parse_hex(fields[1]),
            parse_hex(fields[3]),
            parse_hex(fields[7]),
        ) else {
            return false;
        };
        dest == 0 && mask == 0 && is_usable_gateway_route(flags)
    })
}

/// Parse the `/proc/net/ipv6_route` format (no header line).
///
/// Columns: destination, prefix length, source, source prefix length,
/// next hop, metric, refcount, use count, flags, interface.
pub fn ipv6_table_has_default(contents: &str) -> bool {
    contents.lines().any(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 {
            return false;
        }
        let Some(flags) = parse_hex(fields[8]) else {
            return false;
        };
        is_zero_hex(fields[0]) && is_zero_hex(fields[1]) && is_usable_gateway_route(flags)
    })
}

fn is_usable_gateway_route(flags: u32) -> bool {
    flags & RTF_UP != 0 && flags & RTF_GATEWAY != 0 && flags & RTF_REJECT == 0
}

fn parse_hex(field: &str) -> Option<u32> {
    u32::from_str_radix(field, 16).ok()
}

fn is_zero_hex(field: &str) -> bool {
    !field.is_empty() && field.chars().all(|c| c == '0')
}

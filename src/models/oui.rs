//! OUI (vendor MAC prefix) lookup.
//!
//! A small curated table rather than the full IEEE registry - enough to
//! recognise the vendors the discovery scenarios care about.

const OUI_TABLE: &[(&str, &str)] = &[
    ("00:17:88", "Hikvision"),
    ("4C:0B:BE", "Dahua"),
    ("BC:AD:28", "Hikvision"),
    ("00:40:8C", "Axis"),
    ("AC:CC:8E", "Axis"),
    ("00:09:18", "Hanwha"),
    ("00:15:6D", "Ubiquiti"),
    ("24:A4:3C", "Ubiquiti"),
    ("B8:27:EB", "Raspberry Pi"),
    ("DC:A6:32", "Raspberry Pi"),
    ("00:0C:42", "Mikrotik"),
];

/// Look up a manufacturer by MAC prefix. `mac` may be in any common
/// delimiter style; only the first three octets are compared.
pub fn lookup(mac: &str) -> Option<&'static str> {
    let canonical = crate::util::format_mac_ieee(mac);
    let prefix = canonical.get(0..8)?;
    OUI_TABLE
        .iter()
        .find(|(oui, _)| oui.eq_ignore_ascii_case(prefix))
        .map(|(_, vendor)| *vendor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_known_vendor_prefix() {
        assert_eq!(lookup("00-17-88-aa-bb-cc"), Some("Hikvision"));
        assert_eq!(lookup("4c:0b:be:11:22:33"), Some("Dahua"));
    }

    #[test]
    fn unknown_prefix_returns_none() {
        assert_eq!(lookup("ff:ff:ff:00:00:00"), None);
    }
}

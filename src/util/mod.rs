//! Utility functions shared across the discovery engine.

pub mod dns;
pub mod net;

/// Format a MAC address into canonical IEEE form (`AA:BB:CC:DD:EE:FF`).
/// Any non-hex-digit input is returned unchanged.
pub fn format_mac_ieee(mac: &str) -> String {
    let clean: String = mac.chars().filter(|c| c.is_ascii_hexdigit()).collect();
    if clean.len() != 12 {
        return mac.to_string();
    }
    clean
        .to_uppercase()
        .as_bytes()
        .chunks(2)
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or("00").to_string())
        .collect::<Vec<String>>()
        .join(":")
}

/// Format uptime ticks (hundredths of a second) into human-readable string.
pub fn format_uptime(ticks: i64) -> String {
    let seconds = ticks / 100;
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if days > 365 {
        let years = days / 365;
        let remaining_days = days % 365;
        format!("{} year{} {} day{} {:02}:{:02}:{:02}",
            years, if years != 1 { "s" } else { "" },
            remaining_days, if remaining_days != 1 { "s" } else { "" },
            hours, minutes, secs)
    } else if days > 0 {
        format!("{} day{} {:02}:{:02}:{:02}",
            days, if days != 1 { "s" } else { "" },
            hours, minutes, secs)
    } else {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_mac_from_dash_separated_lowercase() {
        assert_eq!(format_mac_ieee("00-17-88-aa-bb-cc"), "00:17:88:AA:BB:CC");
    }

    #[test]
    fn formats_mac_from_bare_hex() {
        assert_eq!(format_mac_ieee("001788aabbcc"), "00:17:88:AA:BB:CC");
    }

    #[test]
    fn leaves_malformed_mac_unchanged() {
        assert_eq!(format_mac_ieee("not-a-mac"), "not-a-mac");
    }

    #[test]
    fn formats_uptime_days_and_time() {
        // 1 day, 2 hours, 3 minutes, 4 seconds, in hundredths.
        let ticks = (86400 + 2 * 3600 + 3 * 60 + 4) * 100;
        assert_eq!(format_uptime(ticks), "1 day 02:03:04");
    }

    #[test]
    fn formats_uptime_under_a_day() {
        assert_eq!(format_uptime(3661 * 100), "01:01:01");
    }
}

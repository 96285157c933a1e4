use serde::{Deserialize, Serialize};

fn default_port() -> u16 {
    161
}

/// Устройство (OLT), пригодное для опроса.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    pub address: String,
    /// Идентификатор профиля вендора, например `VSOL`
    pub vendor: String,
    pub community: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Device {
    /// `ip:port` для SNMP сессии
    pub fn target(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            // IPv6 без скобок
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }

    pub fn matches(&self, address_or_name: &str) -> bool {
        self.address == address_or_name || self.name.as_deref() == Some(address_or_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(address: &str) -> Device {
        Device {
            id: 1,
            name: Some("olt-1".into()),
            address: address.into(),
            vendor: "VSOL".into(),
            community: "public".into(),
            port: 161,
        }
    }

    #[test]
    fn target_formats_ipv4_and_ipv6() {
        assert_eq!(device("10.0.0.2").target(), "10.0.0.2:161");
        assert_eq!(device("fd00::2").target(), "[fd00::2]:161");
    }

    #[test]
    fn matches_by_address_or_name() {
        let d = device("10.0.0.2");
        assert!(d.matches("10.0.0.2"));
        assert!(d.matches("olt-1"));
        assert!(!d.matches("olt-2"));
    }

    #[test]
    fn port_defaults_to_161() {
        let d: Device = serde_yml::from_str(
            "id: 7\naddress: 10.1.1.1\nvendor: BDCOM\ncommunity: secret\n",
        )
        .unwrap();
        assert_eq!(d.port, 161);
        assert_eq!(d.name, None);
    }
}

//! Virtual machine parameters passed to the configuration bundle.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{HarnessError, HarnessResult};

/// Guest operating system type understood by the Proxmox provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsType {
    Linux,
    L26,
    L24,
    Win11,
    Win10,
    Win8,
    Win7,
    Wxp,
    W2k,
    W2k3,
    W2k8,
    Wvista,
    Solaris,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDevice {
    pub bridge: String,
    pub model: String,
    pub enabled: bool,
}

impl Default for NetworkDevice {
    fn default() -> Self {
        Self {
            bridge: "vmbr0".to_string(),
            model: "virtio".to_string(),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disk {
    pub datastore_id: String,
    /// Size with unit suffix, e.g. "10G"
    pub size: String,
    pub interface: String,
    pub cache: String,
    pub file_format: String,
}

impl Default for Disk {
    fn default() -> Self {
        Self {
            datastore_id: "local-lvm".to_string(),
            size: "10G".to_string(),
            interface: "scsi0".to_string(),
            cache: "writeback".to_string(),
            file_format: "raw".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv4Config {
    /// Static CIDR address or "dhcp"
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpConfig {
    pub ipv4: Ipv4Config,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
}

/// Cloud-init settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Initialization {
    pub datastore_id: String,
    pub ip_config: IpConfig,
    pub user_account: UserAccount,
}

/// Input variables describing the VM under test.
///
/// Fields missing from a scenario file take their value from `Default`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmParameters {
    pub name_vm: String,
    pub description: String,
    pub node_name: String,
    pub vm_id: String,
    pub cores: u32,
    /// Memory in MB
    pub memory: u64,
    pub os_type: OsType,
    pub template_vm: bool,
    pub started: bool,
    pub network_device: Vec<NetworkDevice>,
    pub disk: Vec<Disk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initialization: Option<Initialization>,
    /// Extra variables merged on top of the typed ones
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for VmParameters {
    fn default() -> Self {
        Self {
            name_vm: "test".to_string(),
            description: "Test VM created by vmprobe".to_string(),
            node_name: "pve".to_string(),
            vm_id: "1000".to_string(),
            cores: 1,
            memory: 2048,
            os_type: OsType::Linux,
            template_vm: true,
            started: false,
            network_device: vec![NetworkDevice::default()],
            disk: vec![Disk {
                datastore_id: "test".to_string(),
                ..Disk::default()
            }],
            initialization: None,
            extra: Map::new(),
        }
    }
}

impl VmParameters {
    pub fn validate(&self) -> HarnessResult<()> {
        if self.name_vm.trim().is_empty() {
            return Err(HarnessError::Scenario("name_vm must not be empty".to_string()));
        }
        if self.node_name.trim().is_empty() {
            return Err(HarnessError::Scenario("node_name must not be empty".to_string()));
        }
        if self.cores == 0 {
            return Err(HarnessError::Scenario("cores must be at least 1".to_string()));
        }
        if self.memory == 0 {
            return Err(HarnessError::Scenario("memory must be at least 1 MB".to_string()));
        }
        if !self.vm_id.is_empty() && self.vm_id.parse::<u32>().is_err() {
            return Err(HarnessError::Scenario(format!(
                "vm_id '{}' is not numeric",
                self.vm_id
            )));
        }
        Ok(())
    }

    /// Render as a Terraform variables object.
    pub fn to_vars(&self) -> HarnessResult<Map<String, Value>> {
        match serde_json::to_value(self).map_err(|e| HarnessError::Scenario(e.to_string()))? {
            Value::Object(map) => Ok(map),
            other => Err(HarnessError::Scenario(format!(
                "parameters rendered to {} instead of an object",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_vars_shape() {
        let vars = VmParameters::default().to_vars().unwrap();

        assert_eq!(vars["name_vm"], json!("test"));
        assert_eq!(vars["vm_id"], json!("1000"));
        assert_eq!(vars["cores"], json!(1));
        assert_eq!(vars["memory"], json!(2048));
        assert_eq!(vars["os_type"], json!("linux"));
        assert_eq!(vars["template_vm"], json!(true));
        assert_eq!(vars["started"], json!(false));
        assert_eq!(
            vars["network_device"],
            json!([{"bridge": "vmbr0", "model": "virtio", "enabled": true}])
        );
        assert_eq!(
            vars["disk"],
            json!([{
                "datastore_id": "test",
                "size": "10G",
                "interface": "scsi0",
                "cache": "writeback",
                "file_format": "raw"
            }])
        );
        assert!(!vars.contains_key("initialization"));
    }

    #[test]
    fn test_extra_vars_are_flattened() {
        let mut params = VmParameters::default();
        params.extra.insert("tags".to_string(), json!(["ci"]));

        let vars = params.to_vars().unwrap();
        assert_eq!(vars["tags"], json!(["ci"]));
        assert!(!vars.contains_key("extra"));
    }

    #[test]
    fn test_initialization_rendering() {
        let params = VmParameters {
            initialization: Some(Initialization {
                datastore_id: "local-lvm".to_string(),
                ip_config: IpConfig {
                    ipv4: Ipv4Config {
                        address: "dhcp".to_string(),
                        gateway: None,
                    },
                },
                user_account: UserAccount {
                    username: "testuser".to_string(),
                    password: None,
                    keys: vec![],
                },
            }),
            ..VmParameters::default()
        };

        let vars = params.to_vars().unwrap();
        assert_eq!(
            vars["initialization"],
            json!({
                "datastore_id": "local-lvm",
                "ip_config": {"ipv4": {"address": "dhcp"}},
                "user_account": {"username": "testuser"}
            })
        );
    }

    #[test]
    fn test_validate() {
        assert!(VmParameters::default().validate().is_ok());

        let bad_cores = VmParameters {
            cores: 0,
            ..VmParameters::default()
        };
        assert!(bad_cores.validate().is_err());

        let bad_id = VmParameters {
            vm_id: "abc".to_string(),
            ..VmParameters::default()
        };
        assert!(bad_id.validate().is_err());
    }

    #[test]
    fn test_os_type_names() {
        assert_eq!(serde_json::to_value(OsType::L26).unwrap(), json!("l26"));
        assert_eq!(serde_json::to_value(OsType::Win11).unwrap(), json!("win11"));
        let parsed: OsType = serde_json::from_value(json!("w2k8")).unwrap();
        assert_eq!(parsed, OsType::W2k8);
    }
}

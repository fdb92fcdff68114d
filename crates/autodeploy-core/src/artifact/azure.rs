//! Azure template family. Azure has no usable default network, so the
//! chain is built out in full: resource group, virtual network, subnet,
//! security group, public IP, NIC and a Linux VM booted via custom data.

use serde_json::json;
use std::collections::BTreeMap;

use super::{ProviderTemplate, TemplateContext, BOOT_SCRIPT_FILE};
use crate::domain::{DeployError, Provider, Result};

pub struct AzureTemplate;

impl ProviderTemplate for AzureTemplate {
    fn provider(&self) -> Provider {
        Provider::Azure
    }

    fn render(&self, ctx: &TemplateContext<'_>) -> Result<BTreeMap<String, String>> {
        let subscription = ctx.config.azure.subscription_id.clone().ok_or_else(|| {
            DeployError::Template("azure template requires a subscription id".to_string())
        })?;
        let ssh_key = ctx.config.ssh_public_key.clone().ok_or_else(|| {
            DeployError::Template("azure template requires an ssh public key".to_string())
        })?;
        let suffix = ctx.suffix;

        let main_tf = format!(
            r#"terraform {{
  required_providers {{
    azurerm = {{
      source  = "hashicorp/azurerm"
      version = "~> 3.0"
    }}
  }}
}}

provider "azurerm" {{
  features {{}}
  subscription_id = var.subscription_id
}}

resource "azurerm_resource_group" "app" {{
  name     = "autodeploy-rg-{suffix}"
  location = var.location
}}

resource "azurerm_virtual_network" "app" {{
  name                = "autodeploy-vnet-{suffix}"
  address_space       = ["10.0.0.0/16"]
  location            = azurerm_resource_group.app.location
  resource_group_name = azurerm_resource_group.app.name
}}

resource "azurerm_subnet" "app" {{
  name                 = "autodeploy-subnet-{suffix}"
  resource_group_name  = azurerm_resource_group.app.name
  virtual_network_name = azurerm_virtual_network.app.name
  address_prefixes     = ["10.0.1.0/24"]
}}

resource "azurerm_network_security_group" "app" {{
  name                = "autodeploy-nsg-{suffix}"
  location            = azurerm_resource_group.app.location
  resource_group_name = azurerm_resource_group.app.name

  security_rule {{
    name                       = "allow-ssh"
    priority                   = 1001
    direction                  = "Inbound"
    access                     = "Allow"
    protocol                   = "Tcp"
    source_port_range          = "*"
    destination_port_range     = "22"
    source_address_prefix      = "*"
    destination_address_prefix = "*"
  }}

  security_rule {{
    name                       = "allow-http"
    priority                   = 1002
    direction                  = "Inbound"
    access                     = "Allow"
    protocol                   = "Tcp"
    source_port_range          = "*"
    destination_port_range     = "80"
    source_address_prefix      = "*"
    destination_address_prefix = "*"
  }}

  security_rule {{
    name                       = "allow-app"
    priority                   = 1003
    direction                  = "Inbound"
    access                     = "Allow"
    protocol                   = "Tcp"
    source_port_range          = "*"
    destination_port_range     = var.app_port
    source_address_prefix      = "*"
    destination_address_prefix = "*"
  }}
}}

resource "azurerm_public_ip" "app" {{
  name                = "autodeploy-ip-{suffix}"
  location            = azurerm_resource_group.app.location
  resource_group_name = azurerm_resource_group.app.name
  allocation_method   = "Static"
  sku                 = "Standard"
}}

resource "azurerm_network_interface" "app" {{
  name                = "autodeploy-nic-{suffix}"
  location            = azurerm_resource_group.app.location
  resource_group_name = azurerm_resource_group.app.name

  ip_configuration {{
    name                          = "internal"
    subnet_id                     = azurerm_subnet.app.id
    private_ip_address_allocation = "Dynamic"
    public_ip_address_id          = azurerm_public_ip.app.id
  }}
}}

resource "azurerm_network_interface_security_group_association" "app" {{
  network_interface_id      = azurerm_network_interface.app.id
  network_security_group_id = azurerm_network_security_group.app.id
}}

resource "azurerm_linux_virtual_machine" "app" {{
  name                  = "autodeploy-vm-{suffix}"
  location              = azurerm_resource_group.app.location
  resource_group_name   = azurerm_resource_group.app.name
  size                  = var.vm_size
  admin_username        = var.admin_username
  network_interface_ids = [azurerm_network_interface.app.id]

  admin_ssh_key {{
    username   = var.admin_username
    public_key = var.ssh_public_key
  }}

  os_disk {{
    caching              = "ReadWrite"
    storage_account_type = "Standard_LRS"
  }}

  source_image_reference {{
    publisher = "Canonical"
    offer     = "0001-com-ubuntu-server-jammy"
    sku       = "22_04-lts-gen2"
    version   = "latest"
  }}

  custom_data = filebase64("{BOOT_SCRIPT_FILE}")
}}

output "public_ip" {{
  value = azurerm_public_ip.app.ip_address
}}
"#
        );

        let variables_tf = r#"variable "subscription_id" {
  type      = string
  sensitive = true
}

variable "location" {
  type = string
}

variable "vm_size" {
  type = string
}

variable "admin_username" {
  type = string
}

variable "ssh_public_key" {
  type = string
}

variable "app_port" {
  type = string
}
"#
        .to_string();

        let tfvars = json!({
            "subscription_id": subscription,
            "location": ctx.config.azure.location,
            "vm_size": ctx.config.azure.vm_size,
            "admin_username": ctx.config.azure.admin_username,
            "ssh_public_key": ssh_key,
            "app_port": ctx.target.app_port.to_string(),
        });

        let mut files = BTreeMap::new();
        files.insert("main.tf".to_string(), main_tf);
        files.insert("variables.tf".to_string(), variables_tf);
        files.insert(
            "terraform.tfvars.json".to_string(),
            format!("{:#}\n", tfvars),
        );
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{flask_target, test_config};
    use super::*;

    fn render() -> BTreeMap<String, String> {
        let config = test_config();
        let target = flask_target(Provider::Azure);
        let ctx = TemplateContext {
            target: &target,
            config: &config,
            suffix: "abc123",
        };
        AzureTemplate.render(&ctx).unwrap()
    }

    #[test]
    fn test_full_network_chain_carries_suffix() {
        let main_tf = &render()["main.tf"];
        for name in [
            "autodeploy-rg-abc123",
            "autodeploy-vnet-abc123",
            "autodeploy-subnet-abc123",
            "autodeploy-nsg-abc123",
            "autodeploy-ip-abc123",
            "autodeploy-nic-abc123",
            "autodeploy-vm-abc123",
        ] {
            assert!(main_tf.contains(name), "missing {name}");
        }
    }

    #[test]
    fn test_security_rules_cover_ssh_http_and_app_port() {
        let main_tf = &render()["main.tf"];
        assert!(main_tf.contains(r#"destination_port_range     = "22""#));
        assert!(main_tf.contains(r#"destination_port_range     = "80""#));
        assert!(main_tf.contains("destination_port_range     = var.app_port"));
    }

    #[test]
    fn test_boot_script_delivered_as_custom_data() {
        let main_tf = &render()["main.tf"];
        assert!(main_tf.contains(r#"custom_data = filebase64("startup.sh")"#));
    }

    #[test]
    fn test_missing_subscription_is_template_error() {
        let mut config = test_config();
        config.azure.subscription_id = None;
        let target = flask_target(Provider::Azure);
        let ctx = TemplateContext {
            target: &target,
            config: &config,
            suffix: "abc123",
        };
        assert!(matches!(
            AzureTemplate.render(&ctx),
            Err(DeployError::Template(_))
        ));
    }
}

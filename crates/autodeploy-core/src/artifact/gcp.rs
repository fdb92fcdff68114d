//! GCP template family: default-network firewall pair plus a single
//! Ubuntu 22.04 compute instance booted through the startup script.

use serde_json::json;
use std::collections::BTreeMap;

use super::{ProviderTemplate, TemplateContext, BOOT_SCRIPT_FILE};
use crate::domain::{DeployError, Provider, Result};

pub struct GcpTemplate;

impl ProviderTemplate for GcpTemplate {
    fn provider(&self) -> Provider {
        Provider::Gcp
    }

    fn render(&self, ctx: &TemplateContext<'_>) -> Result<BTreeMap<String, String>> {
        let project = ctx.config.gcp.project.clone().ok_or_else(|| {
            DeployError::Template("gcp template requires a project id".to_string())
        })?;
        let suffix = ctx.suffix;

        // Firewall rules share a network-wide namespace, so both carry the
        // attempt suffix; the port-80 and app-port rules need distinct names
        // even when the ports coincide.
        let main_tf = format!(
            r#"terraform {{
  required_providers {{
    google = {{
      source  = "hashicorp/google"
      version = "~> 5.0"
    }}
  }}
}}

provider "google" {{
  project = var.project
  region  = var.region
  zone    = var.zone
}}

resource "google_project_service" "compute" {{
  project            = var.project
  service            = "compute.googleapis.com"
  disable_on_destroy = false
}}

resource "google_compute_firewall" "allow_http" {{
  name    = "autodeploy-http-{suffix}"
  network = "default"

  allow {{
    protocol = "tcp"
    ports    = ["80"]
  }}

  source_ranges = ["0.0.0.0/0"]
  target_tags   = ["autodeploy-{suffix}"]
}}

resource "google_compute_firewall" "allow_app" {{
  name    = "autodeploy-app-{suffix}"
  network = "default"

  allow {{
    protocol = "tcp"
    ports    = [var.app_port]
  }}

  source_ranges = ["0.0.0.0/0"]
  target_tags   = ["autodeploy-{suffix}"]
}}

resource "google_compute_instance" "app" {{
  name         = "autodeploy-vm-{suffix}"
  machine_type = var.machine_type
  tags         = ["autodeploy-{suffix}"]

  boot_disk {{
    initialize_params {{
      image = "ubuntu-os-cloud/ubuntu-2204-lts"
    }}
  }}

  network_interface {{
    network = "default"
    access_config {{}}
  }}

  metadata_startup_script = file("{BOOT_SCRIPT_FILE}")

  depends_on = [google_project_service.compute]
}}

output "public_ip" {{
  value = google_compute_instance.app.network_interface[0].access_config[0].nat_ip
}}
"#
        );

        let variables_tf = r#"variable "project" {
  type = string
}

variable "region" {
  type = string
}

variable "zone" {
  type = string
}

variable "machine_type" {
  type = string
}

variable "app_port" {
  type = number
}
"#
        .to_string();

        let tfvars = json!({
            "project": project,
            "region": ctx.config.gcp.region,
            "zone": ctx.config.gcp.zone,
            "machine_type": ctx.config.gcp.machine_type,
            "app_port": ctx.target.app_port,
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

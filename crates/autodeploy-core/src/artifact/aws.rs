//! AWS template family: security group in the default VPC, an imported
//! SSH key pair, and one Ubuntu 22.04 instance booted via user data.

use serde_json::json;
use std::collections::BTreeMap;

use super::{ProviderTemplate, TemplateContext, BOOT_SCRIPT_FILE};
use crate::domain::{DeployError, Provider, Result};

pub struct AwsTemplate;

impl ProviderTemplate for AwsTemplate {
    fn provider(&self) -> Provider {
        Provider::Aws
    }

    fn render(&self, ctx: &TemplateContext<'_>) -> Result<BTreeMap<String, String>> {
        let access_key = ctx.config.aws.access_key_id.clone().ok_or_else(|| {
            DeployError::Template("aws template requires an access key id".to_string())
        })?;
        let secret_key = ctx.config.aws.secret_access_key.clone().ok_or_else(|| {
            DeployError::Template("aws template requires a secret access key".to_string())
        })?;
        let ssh_key = ctx.config.ssh_public_key.clone().ok_or_else(|| {
            DeployError::Template("aws template requires an ssh public key".to_string())
        })?;
        let suffix = ctx.suffix;

        let main_tf = format!(
            r#"terraform {{
  required_providers {{
    aws = {{
      source  = "hashicorp/aws"
      version = "~> 5.0"
    }}
  }}
}}

provider "aws" {{
  region     = var.region
  access_key = var.access_key_id
  secret_key = var.secret_access_key
}}

data "aws_vpc" "default" {{
  default = true
}}

data "aws_ami" "ubuntu" {{
  most_recent = true
  owners      = ["099720109477"]

  filter {{
    name   = "name"
    values = ["ubuntu/images/hvm-ssd/ubuntu-jammy-22.04-amd64-server-*"]
  }}

  filter {{
    name   = "virtualization-type"
    values = ["hvm"]
  }}
}}

resource "aws_key_pair" "deploy" {{
  key_name   = "autodeploy-key-{suffix}"
  public_key = var.ssh_public_key
}}

resource "aws_security_group" "app" {{
  name        = "autodeploy-sg-{suffix}"
  description = "Inbound ssh, http and application port"
  vpc_id      = data.aws_vpc.default.id

  ingress {{
    from_port   = 22
    to_port     = 22
    protocol    = "tcp"
    cidr_blocks = ["0.0.0.0/0"]
  }}

  ingress {{
    from_port   = 80
    to_port     = 80
    protocol    = "tcp"
    cidr_blocks = ["0.0.0.0/0"]
  }}

  ingress {{
    from_port   = var.app_port
    to_port     = var.app_port
    protocol    = "tcp"
    cidr_blocks = ["0.0.0.0/0"]
  }}

  egress {{
    from_port   = 0
    to_port     = 0
    protocol    = "-1"
    cidr_blocks = ["0.0.0.0/0"]
  }}
}}

resource "aws_instance" "app" {{
  ami                    = data.aws_ami.ubuntu.id
  instance_type          = var.instance_type
  key_name               = aws_key_pair.deploy.key_name
  vpc_security_group_ids = [aws_security_group.app.id]
  user_data              = file("{BOOT_SCRIPT_FILE}")

  tags = {{
    Name = "autodeploy-vm-{suffix}"
  }}
}}

output "public_ip" {{
  value = aws_instance.app.public_ip
}}
"#
        );

        let variables_tf = r#"variable "region" {
  type = string
}

variable "access_key_id" {
  type      = string
  sensitive = true
}

variable "secret_access_key" {
  type      = string
  sensitive = true
}

variable "ssh_public_key" {
  type = string
}

variable "instance_type" {
  type = string
}

variable "app_port" {
  type = number
}
"#
        .to_string();

        let tfvars = json!({
            "region": ctx.config.aws.region,
            "access_key_id": access_key,
            "secret_access_key": secret_key,
            "ssh_public_key": ssh_key,
            "instance_type": ctx.config.aws.instance_type,
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

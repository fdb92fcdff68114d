//! Boot-time execution script generation.
//!
//! The generator has incomplete information about what will actually
//! succeed on a freshly provisioned machine, so the script embeds its own
//! fallback ladder, independent of the orchestration-level strategy
//! ladder. The ladder is data: an ordered list of [`BootStep`]s with
//! explicit success probes, compiled to bash.

use crate::domain::{DetectedLanguage, ResolvedTarget, RunStrategy};

/// One rung of the boot-time fallback ladder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootStep {
    /// Run the prebuilt image with an explicit start command.
    PrebuiltWithStart { image: String, start_command: String },
    /// Run the prebuilt image with its default CMD.
    PrebuiltDefault { image: String },
    /// Clone the repository and build the image locally from its Dockerfile.
    BuildFromSource,
    /// Install the interpreter, dependencies, and a supervised service.
    NativeService { language: DetectedLanguage },
}

impl BootStep {
    fn label(&self) -> &'static str {
        match self {
            BootStep::PrebuiltWithStart { .. } => "prebuilt_with_start",
            BootStep::PrebuiltDefault { .. } => "prebuilt_default",
            BootStep::BuildFromSource => "build_from_source",
            BootStep::NativeService { .. } => "native_service",
        }
    }
}

/// Explicit in-container start command for the workload, when one can be
/// derived from the profile.
fn explicit_start_command(target: &ResolvedTarget) -> Option<String> {
    let entry = target.profile.entry_point.as_ref()?;
    match target.profile.detected_language {
        DetectedLanguage::Python => Some(format!("python3 {}", entry.display())),
        DetectedLanguage::Node => Some(format!("node {}", entry.display())),
        _ => None,
    }
}

/// Plan the boot ladder for one target. Rungs appear only when the profile
/// supports them, starting at the rung matching the target's run strategy
/// and falling through every later applicable rung.
pub fn plan_boot_steps(target: &ResolvedTarget) -> Vec<BootStep> {
    let profile = &target.profile;
    let mut steps = Vec::new();

    let container_rungs_wanted = matches!(target.run_strategy, RunStrategy::ContainerPrebuilt);
    let source_rung_wanted = matches!(
        target.run_strategy,
        RunStrategy::ContainerPrebuilt | RunStrategy::ContainerFromSource
    );

    if container_rungs_wanted {
        if let Some(image) = &profile.prebuilt_image {
            if let Some(start) = explicit_start_command(target) {
                steps.push(BootStep::PrebuiltWithStart {
                    image: image.clone(),
                    start_command: start,
                });
            }
            steps.push(BootStep::PrebuiltDefault {
                image: image.clone(),
            });
        }
    }
    if source_rung_wanted && profile.has_dockerfile {
        steps.push(BootStep::BuildFromSource);
    }
    match profile.detected_language {
        DetectedLanguage::Python | DetectedLanguage::Node => {
            steps.push(BootStep::NativeService {
                language: profile.detected_language,
            });
        }
        _ => {}
    }

    steps
}

/// Compile the planned ladder into a self-contained startup script.
///
/// Each rung is a bash function returning non-zero on failure; the main
/// loop tries them in order. When no rung succeeds the script exits with a
/// non-zero status and an explicit diagnostic rather than hanging.
pub fn render_boot_script(target: &ResolvedTarget) -> String {
    let steps = plan_boot_steps(target);
    let repo_url = &target.profile.source_url;
    let port = target.app_port;

    let mut script = String::new();
    script.push_str(&format!(
        r#"#!/usr/bin/env bash
set -uo pipefail

LOG_DIR=/var/log/autodeploy
mkdir -p "$LOG_DIR"
exec >>"$LOG_DIR/startup.log" 2>&1

echo "=== $(date -Is) startup BEGIN ==="

REPO_URL="{repo_url}"
APP_DIR=/opt/app
APP_PORT={port}

export DEBIAN_FRONTEND=noninteractive
apt-get update -y
apt-get install -y git curl ca-certificates

clone_repo() {{
  if [ ! -d "$APP_DIR/.git" ]; then
    git clone --depth 1 "$REPO_URL" "$APP_DIR"
  fi
}}

ensure_docker() {{
  if ! command -v docker >/dev/null 2>&1; then
    apt-get install -y docker.io
  fi
  systemctl enable --now docker
}}

probe_app() {{
  for _ in $(seq 1 12); do
    if curl -fsS "http://127.0.0.1:$APP_PORT/" >/dev/null 2>&1; then
      return 0
    fi
    sleep 5
  done
  return 1
}}

forward_port_80() {{
  if [ "$APP_PORT" != "80" ] && command -v iptables >/dev/null 2>&1; then
    iptables -t nat -A PREROUTING -p tcp --dport 80 -j REDIRECT --to-ports "$APP_PORT"
    iptables -t nat -A OUTPUT -p tcp --dport 80 -j REDIRECT --to-ports "$APP_PORT"
  fi
}}

"#
    ));

    for (i, step) in steps.iter().enumerate() {
        script.push_str(&render_step_function(i, step, target));
        script.push('\n');
    }

    script.push_str("run_ladder() {\n");
    for (i, step) in steps.iter().enumerate() {
        script.push_str(&format!(
            "  echo \"[ladder] trying {}\"\n  if step_{i}; then echo \"[ladder] {} succeeded\"; return 0; fi\n",
            step.label(),
            step.label(),
        ));
    }
    script.push_str("  return 1\n}\n\n");

    script.push_str(
        r#"if run_ladder; then
  forward_port_80
  echo "=== $(date -Is) startup END (ok) ==="
  exit 0
fi

echo "FATAL: no run strategy succeeded for $REPO_URL; see above for per-step output" >&2
echo "=== $(date -Is) startup END (failed) ==="
exit 1
"#,
    );

    script
}

fn render_step_function(index: usize, step: &BootStep, target: &ResolvedTarget) -> String {
    match step {
        BootStep::PrebuiltWithStart {
            image,
            start_command,
        } => format!(
            r#"step_{index}() {{
  ensure_docker || return 1
  docker pull {image} || return 1
  docker rm -f autodeploy-app >/dev/null 2>&1 || true
  docker run -d --name autodeploy-app --restart unless-stopped \
    -p "$APP_PORT:$APP_PORT" {image} {start_command} || return 1
  probe_app
}}
"#
        ),
        BootStep::PrebuiltDefault { image } => format!(
            r#"step_{index}() {{
  ensure_docker || return 1
  docker pull {image} || return 1
  docker rm -f autodeploy-app >/dev/null 2>&1 || true
  docker run -d --name autodeploy-app --restart unless-stopped \
    -p "$APP_PORT:$APP_PORT" {image} || return 1
  probe_app
}}
"#
        ),
        BootStep::BuildFromSource => format!(
            r#"step_{index}() {{
  ensure_docker || return 1
  clone_repo || return 1
  docker build -t autodeploy-local "$APP_DIR" || return 1
  docker rm -f autodeploy-app >/dev/null 2>&1 || true
  docker run -d --name autodeploy-app --restart unless-stopped \
    -p "$APP_PORT:$APP_PORT" autodeploy-local || return 1
  probe_app
}}
"#
        ),
        BootStep::NativeService { language } => {
            render_native_step(index, *language, target)
        }
    }
}

/// Native interpreter install-and-run under a systemd unit with
/// `Restart=always`, so a crashing workload is restarted rather than left
/// dead until the next attempt.
fn render_native_step(
    index: usize,
    language: DetectedLanguage,
    target: &ResolvedTarget,
) -> String {
    let entry = target
        .profile
        .entry_point
        .as_ref()
        .map(|p| p.display().to_string());

    let (install, exec_start) = match language {
        DetectedLanguage::Python => {
            let entry = entry.unwrap_or_else(|| "app.py".to_string());
            (
                r#"  apt-get install -y python3 python3-pip python3-venv || return 1
  python3 -m venv "$APP_DIR/.venv" || return 1
  if [ -f "$APP_DIR/requirements.txt" ]; then
    "$APP_DIR/.venv/bin/pip" install --upgrade pip
    "$APP_DIR/.venv/bin/pip" install -r "$APP_DIR/requirements.txt" || return 1
  fi"#
                    .to_string(),
                format!("/opt/app/.venv/bin/python3 /opt/app/{entry}"),
            )
        }
        _ => {
            let entry = entry.unwrap_or_else(|| "index.js".to_string());
            (
                r#"  curl -fsSL https://deb.nodesource.com/setup_18.x | bash - || return 1
  apt-get install -y nodejs || return 1
  if [ -f "$APP_DIR/package.json" ]; then
    (cd "$APP_DIR" && npm install) || return 1
  fi"#
                .to_string(),
                format!("/usr/bin/node /opt/app/{entry}"),
            )
        }
    };

    format!(
        r#"step_{index}() {{
  clone_repo || return 1
{install}
  cat > /etc/systemd/system/autodeploy-app.service <<UNIT
[Unit]
Description=autodeploy application
After=network.target

[Service]
WorkingDirectory=/opt/app
Environment=PORT=$APP_PORT
Environment=HOST=0.0.0.0
ExecStart={exec_start}
Restart=always
RestartSec=3

[Install]
WantedBy=multi-user.target
UNIT
  systemctl daemon-reload
  systemctl enable --now autodeploy-app.service || return 1
  probe_app
}}
"#
    )
}

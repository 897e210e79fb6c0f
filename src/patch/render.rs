// Renders manager state into the nix fragments a patch writes

use std::collections::HashMap;
use std::fmt::Write;

use super::{ConfigPatch, PatchOp};
use crate::error::PatchError;
use crate::models::{PupId, PupRecord, ServiceId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkConnection {
    Ethernet {
        interface: String,
    },
    Wifi {
        interface: String,
        ssid: String,
        password: String,
    },
}

/// Quote `s` as a nix string literal.
fn nix_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '$' => out.push_str("\\$"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Container definition for one pup. `peers` resolves provider IDs to
/// records so each selected interface can be wired to its provider's IP.
pub fn pup_config(record: &PupRecord, peers: &HashMap<&str, &PupRecord>) -> String {
    let mut out = String::new();
    // writeln! into a String cannot fail.
    let _ = writeln!(out, "{{ ... }}:");
    let _ = writeln!(out, "{{");
    let container = ServiceId::container(record.id.clone()).container_name();
    let _ = writeln!(out, "  containers.{} = {{", nix_str(&container));
    let _ = writeln!(out, "    autoStart = {};", record.enabled);
    let _ = writeln!(out, "    privateNetwork = true;");
    let _ = writeln!(out, "    localAddress = {};", nix_str(&record.ip.to_string()));

    let mut forwards: Vec<(u16, u16)> = record
        .web_uis
        .iter()
        .map(|w| (w.host_port, w.internal_port))
        .chain(record.manifest.host_ports().map(|p| (p, p)))
        .collect();
    forwards.sort_unstable();
    if !forwards.is_empty() {
        let _ = writeln!(out, "    forwardPorts = [");
        for (host, container) in forwards {
            let _ = writeln!(
                out,
                "      {{ hostPort = {host}; containerPort = {container}; protocol = \"tcp\"; }}"
            );
        }
        let _ = writeln!(out, "    ];");
    }

    let _ = writeln!(out, "    config = {{ ... }}: {{");
    for service in &record.manifest.container.services {
        let _ = writeln!(out, "      systemd.services.{} = {{", nix_str(&service.name));
        let _ = writeln!(out, "        wantedBy = [ \"multi-user.target\" ];");
        let _ = writeln!(out, "        script = {};", nix_str(&service.command));

        let mut env: Vec<(String, String)> = record
            .config
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (interface, provider) in &record.providers {
            if let Some(peer) = peers.get(provider.as_str()) {
                env.push((interface_env_key(interface), peer.ip.to_string()));
            }
        }
        env.sort();
        if !env.is_empty() {
            let _ = writeln!(out, "        environment = {{");
            for (k, v) in env {
                let _ = writeln!(out, "          {} = {};", nix_str(&k), nix_str(&v));
            }
            let _ = writeln!(out, "        }};");
        }
        let _ = writeln!(out, "      }};");
    }
    let _ = writeln!(out, "    }};");
    let _ = writeln!(out, "  }};");
    let _ = writeln!(out, "}}");
    out
}

fn interface_env_key(interface: &str) -> String {
    let mut key = String::from("DBX_IFACE_");
    key.extend(interface.chars().map(|c| {
        if c.is_ascii_alphanumeric() {
            c.to_ascii_uppercase()
        } else {
            '_'
        }
    }));
    key.push_str("_HOST");
    key
}

/// Host firewall: open every host port held by an enabled pup.
pub fn firewall_rules(records: &[PupRecord]) -> String {
    let mut ports: Vec<u16> = records
        .iter()
        .filter(|r| r.enabled)
        .flat_map(|r| r.bound_host_ports())
        .collect();
    ports.sort_unstable();
    ports.dedup();

    let list = ports
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    format!("{{ ... }}:\n{{\n  networking.firewall.allowedTCPPorts = [ {list} ];\n}}\n")
}

/// Imports every per-pup container file.
pub fn system_containers(records: &[PupRecord]) -> String {
    let mut ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    ids.sort_unstable();
    let mut out = String::from("{ ... }:\n{\n  imports = [\n");
    for id in ids {
        let _ = writeln!(out, "    ./{}", super::pup_file_name(id));
    }
    out.push_str("  ];\n}\n");
    out
}

pub fn network_config(conn: &NetworkConnection) -> String {
    match conn {
        NetworkConnection::Ethernet { interface } => format!(
            "{{ ... }}:\n{{\n  networking.interfaces.{}.useDHCP = true;\n  networking.wireless.enable = false;\n}}\n",
            nix_str(interface)
        ),
        NetworkConnection::Wifi {
            interface,
            ssid,
            password,
        } => format!(
            "{{ ... }}:\n{{\n  networking.interfaces.{}.useDHCP = true;\n  networking.wireless.enable = true;\n  networking.wireless.interfaces = [ {} ];\n  networking.wireless.networks.{}.psk = {};\n}}\n",
            nix_str(interface),
            nix_str(interface),
            nix_str(ssid),
            nix_str(password)
        ),
    }
}

fn peer_index(records: &[PupRecord]) -> HashMap<&str, &PupRecord> {
    records.iter().map(|r| (r.id.as_str(), r)).collect()
}

/// Stage the container file for `pup_id` plus the firewall and container
/// list derived from all `records` (which must include `pup_id`).
pub fn stage_pup_changes(
    patch: &mut ConfigPatch,
    records: &[PupRecord],
    pup_id: &PupId,
) -> Result<(), PatchError> {
    let peers = peer_index(records);
    if let Some(record) = peers.get(pup_id.as_str()) {
        patch.stage(PatchOp::WritePupFile {
            pup_id: pup_id.clone(),
            contents: pup_config(record, &peers),
        })?;
    }
    patch.stage(PatchOp::UpdateFirewall {
        contents: firewall_rules(records),
    })?;
    patch.stage(PatchOp::UpdateSystemContainers {
        contents: system_containers(records),
    })
}

/// Stage removal of `pup_id`. `remaining` must no longer contain it.
pub fn stage_pup_removal(
    patch: &mut ConfigPatch,
    remaining: &[PupRecord],
    pup_id: &PupId,
) -> Result<(), PatchError> {
    patch.stage(PatchOp::RemovePupFile {
        pup_id: pup_id.clone(),
    })?;
    patch.stage(PatchOp::UpdateFirewall {
        contents: firewall_rules(remaining),
    })?;
    patch.stage(PatchOp::UpdateSystemContainers {
        contents: system_containers(remaining),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ExposeKind, InstallationPhase, ManifestContainer, ManifestExpose, ManifestMeta,
        ManifestService, PupManifest, PupSource, WebUiBinding,
    };
    use std::net::Ipv4Addr;

    fn record(id: &str, ip: [u8; 4], enabled: bool) -> PupRecord {
        PupRecord {
            id: id.into(),
            installation: InstallationPhase::Ready,
            enabled,
            config: HashMap::new(),
            ip: Ipv4Addr::from(ip),
            web_uis: vec![],
            providers: HashMap::new(),
            manifest: PupManifest {
                meta: ManifestMeta {
                    name: id.into(),
                    version: "1.0.0".into(),
                    description: String::new(),
                },
                container: ManifestContainer {
                    services: vec![ManifestService {
                        name: "main".into(),
                        command: "run \"it\"".into(),
                    }],
                    exposes: vec![ManifestExpose {
                        name: "p2p".into(),
                        kind: ExposeKind::Tcp,
                        port: 22556,
                        web_ui: false,
                        listen_on_host: true,
                    }],
                },
                interfaces: vec![],
                dependencies: vec![],
                config: vec![],
                metrics: vec![],
            },
            source: PupSource {
                source_id: "local".into(),
                location: "/tmp".into(),
            },
            needs_conf: false,
            needs_deps: false,
        }
    }

    #[test]
    fn nix_strings_are_escaped() {
        assert_eq!(nix_str("a\"b\\c${x}"), "\"a\\\"b\\\\c\\${x}\"");
    }

    #[test]
    fn pup_config_wires_provider_ip() {
        let core = record("core", [10, 69, 0, 1], true);
        let mut wallet = record("wallet", [10, 69, 0, 2], true);
        wallet.providers.insert("core-rpc".into(), "core".into());
        wallet.web_uis.push(WebUiBinding {
            name: "ui".into(),
            internal_port: 8080,
            host_port: 10000,
        });
        let all = vec![core, wallet];
        let peers = peer_index(&all);

        let text = pup_config(&all[1], &peers);
        assert!(text.contains("localAddress = \"10.69.0.2\";"), "{text}");
        assert!(text.contains("\"DBX_IFACE_CORE_RPC_HOST\" = \"10.69.0.1\";"), "{text}");
        assert!(text.contains("hostPort = 10000; containerPort = 8080;"), "{text}");
        assert!(text.contains("script = \"run \\\"it\\\"\";"), "{text}");
    }

    #[test]
    fn firewall_only_opens_enabled_pups() {
        let mut on = record("on", [10, 69, 0, 1], true);
        on.web_uis.push(WebUiBinding {
            name: "ui".into(),
            internal_port: 80,
            host_port: 10001,
        });
        let mut off = record("off", [10, 69, 0, 2], false);
        off.manifest.container.exposes.clear();
        off.web_uis.push(WebUiBinding {
            name: "ui".into(),
            internal_port: 80,
            host_port: 10002,
        });
        let text = firewall_rules(&[on, off]);
        assert!(text.contains("[ 10001 22556 ]"), "{text}");
        assert!(!text.contains("10002"));
    }

    #[test]
    fn wifi_network_includes_credentials() {
        let text = network_config(&NetworkConnection::Wifi {
            interface: "wlan0".into(),
            ssid: "home".into(),
            password: "hunter2".into(),
        });
        assert!(text.contains("networking.wireless.enable = true;"));
        assert!(text.contains("networks.\"home\".psk = \"hunter2\";"));
    }

    #[test]
    fn system_containers_imports_sorted_pup_files() {
        let text = system_containers(&[
            record("b", [10, 69, 0, 2], true),
            record("a", [10, 69, 0, 1], true),
        ]);
        let a = text.find("pup_a.nix").unwrap();
        let b = text.find("pup_b.nix").unwrap();
        assert!(a < b);
    }
}

// IP and host port allocation for newly adopted pups

use std::collections::HashSet;
use std::net::Ipv4Addr;

use crate::config::AllocationConfig;
use crate::error::{PupError, PupResult};
use crate::models::{PupManifest, PupRecord};

/// Next address in octet-carry order: bump the last octet, wrapping 255 -> 0
/// and carrying into the one before. `None` past 255.255.255.255.
pub fn increment_ip(ip: Ipv4Addr) -> Option<Ipv4Addr> {
    let mut octets = ip.octets();
    for i in (0..4).rev() {
        if octets[i] == u8::MAX {
            octets[i] = 0;
            continue;
        }
        octets[i] += 1;
        return Some(Ipv4Addr::from(octets));
    }
    None
}

/// Hands out IPs above a high-water mark and host ports by lowest-free scan.
/// Callers must hold the manager's write lock from allocation until commit.
#[derive(Debug, Clone)]
pub struct Allocator {
    config: AllocationConfig,
    last_ip: Ipv4Addr,
}

impl Allocator {
    /// Rebuild the high-water mark from the highest IP among `records`.
    pub fn new<'a>(
        config: AllocationConfig,
        records: impl IntoIterator<Item = &'a PupRecord>,
    ) -> Self {
        let last_ip = records
            .into_iter()
            .map(|r| r.ip)
            .filter(|ip| *ip > config.ip_base)
            .max()
            .unwrap_or(config.ip_base);
        Self { config, last_ip }
    }

    pub fn last_ip(&self) -> Ipv4Addr {
        self.last_ip
    }

    /// The address the next adoption would get. Does not reserve it.
    pub fn next_ip(&self) -> PupResult<Ipv4Addr> {
        let exhausted = || {
            PupError::ResourceExhausted(format!(
                "no pup IPs left after {} (ceiling {})",
                self.last_ip, self.config.ip_ceiling
            ))
        };
        let ip = increment_ip(self.last_ip).ok_or_else(exhausted)?;
        if ip > self.config.ip_ceiling {
            return Err(exhausted());
        }
        Ok(ip)
    }

    /// Record `ip` as handed out. Addresses are never reused.
    pub fn commit_ip(&mut self, ip: Ipv4Addr) {
        if ip > self.last_ip {
            self.last_ip = ip;
        }
    }

    /// Reject a manifest whose `listen_on_host` ports repeat or are already
    /// bound by an existing record, either as a web UI or as a host expose.
    pub fn check_host_ports<'a>(
        &self,
        manifest: &PupManifest,
        records: impl IntoIterator<Item = &'a PupRecord>,
    ) -> PupResult<()> {
        let mut seen = HashSet::new();
        for port in manifest.host_ports() {
            if !seen.insert(port) {
                return Err(PupError::Validation(format!(
                    "host port {port} is declared more than once"
                )));
            }
        }
        for record in records {
            if let Some(port) = record.bound_host_ports().find(|p| seen.contains(p)) {
                return Err(PupError::Validation(format!(
                    "host port {port} is already bound by pup {}",
                    record.id
                )));
            }
        }
        Ok(())
    }

    /// Allocate `count` distinct host ports for one pup in a single pass.
    /// Skips every port bound by an existing record and every host port
    /// reserved by `manifest` itself. Calling twice before committing the
    /// first result hands out the same ports again.
    pub fn allocate_ports<'a>(
        &self,
        count: usize,
        manifest: &PupManifest,
        records: impl IntoIterator<Item = &'a PupRecord>,
    ) -> PupResult<Vec<u16>> {
        let mut taken: HashSet<u16> = records
            .into_iter()
            .flat_map(|r| r.bound_host_ports().collect::<Vec<_>>())
            .collect();
        taken.extend(manifest.host_ports());

        let mut out = Vec::with_capacity(count);
        let mut candidate = Some(self.config.port_start);
        while out.len() < count {
            let Some(port) = candidate else {
                return Err(PupError::ResourceExhausted(format!(
                    "no free host ports above {} for {} web UIs",
                    self.config.port_start, count
                )));
            };
            if taken.insert(port) {
                out.push(port);
            }
            candidate = port.checked_add(1);
        }
        Ok(out)
    }
}

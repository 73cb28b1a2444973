//! # Result Normalizer
//!
//! Turns a raw [`NmapRun`] into the typed report returned to callers:
//! target → service → vulnerability.
//!
//! Rules:
//!
//! - one host result per requested target, in request order; a target is
//!   matched to the reported host carrying it as an address or hostname
//! - a target nmap did not report (down, unresolvable) gets an entry with the
//!   target as given and no services
//! - reported hosts no target names directly, such as members of a CIDR
//!   range, follow in the order nmap reported them
//! - ports keep the order nmap reported them in
//! - a port contributes a service only if the vulnerability script ran on it;
//!   when the script appears more than once the first occurrence is used
//! - every child table of the script's first table is one vulnerability;
//!   elements are looked up by key (`id`, `cvss`), other keys are ignored
//! - a `cvss` value that is not a finite number fails the whole report

use crate::constants::vulners_keys;
use crate::entity::{HostResult, ServiceResult, Vulnerability};
use crate::error::{Result, VulnScanError};
use crate::external::nmap::{NmapHost, NmapPort, NmapRun, ScriptTable};

/// Build the per-target report from a raw scan
pub fn normalize(run: &NmapRun, targets: &[String], script_id: &str) -> Result<Vec<HostResult>> {
    let reported = run
        .hosts
        .iter()
        .map(|host| normalize_host(host, script_id))
        .collect::<Result<Vec<_>>>()?;
    let mut claimed = vec![false; reported.len()];

    let mut results = Vec::with_capacity(targets.len());
    for target in targets {
        let matching = || {
            run.hosts
                .iter()
                .enumerate()
                .filter(|(_, host)| host.answers_to(target))
                .map(|(index, _)| index)
        };

        // Repeated targets share the host of their first occurrence.
        let index = matching()
            .find(|&index| !claimed[index])
            .or_else(|| matching().next());

        match index {
            Some(index) => {
                claimed[index] = true;
                results.push(reported[index].clone());
            }
            None => results.push(HostResult {
                target_ip: target.clone(),
                services: Vec::new(),
            }),
        }
    }

    results.extend(
        reported
            .into_iter()
            .zip(claimed)
            .filter(|(_, claimed)| !claimed)
            .map(|(host, _)| host),
    );
    Ok(results)
}

fn normalize_host(host: &NmapHost, script_id: &str) -> Result<HostResult> {
    let target_ip = host
        .addresses
        .first()
        .map(|address| address.addr.clone())
        .ok_or_else(|| VulnScanError::malformed("host reported without an address"))?;

    let mut services = Vec::new();
    for port in &host.ports {
        if let Some(service) = normalize_port(port, script_id)? {
            services.push(service);
        }
    }

    Ok(HostResult {
        target_ip,
        services,
    })
}

fn normalize_port(port: &NmapPort, script_id: &str) -> Result<Option<ServiceResult>> {
    let script = match port.scripts.iter().find(|script| script.id == script_id) {
        Some(script) => script,
        None => return Ok(None),
    };

    let vulns = match script.tables.first() {
        Some(results) => results
            .tables
            .iter()
            .map(parse_vulnerability)
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };

    Ok(Some(ServiceResult {
        name: port.service.name.clone(),
        version: port.service.version.clone(),
        tcp_port: port.id,
        vulns,
    }))
}

fn parse_vulnerability(record: &ScriptTable) -> Result<Vulnerability> {
    let mut identifier = String::new();
    let mut cvss_score = 0.0;

    for element in &record.elements {
        match element.key.as_deref() {
            Some(vulners_keys::ID) => identifier = element.value.clone(),
            Some(vulners_keys::CVSS) => {
                cvss_score = parse_cvss(&element.value)?;
            }
            _ => {}
        }
    }

    Ok(Vulnerability {
        identifier,
        cvss_score,
    })
}

/// Parse a CVSS score; values a 32-bit float cannot hold are rejected
fn parse_cvss(value: &str) -> Result<f32> {
    let score = value.parse::<f32>().map_err(|e| {
        VulnScanError::malformed(format!("unable to parse cvss score {:?}: {}", value, e))
    })?;

    if !score.is_finite() {
        return Err(VulnScanError::malformed(format!(
            "cvss score {:?} is out of range",
            value
        )));
    }

    Ok(score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::nmap::{HostAddress, HostName, NmapScript, PortService, ScriptElement};

    fn elem(key: &str, value: &str) -> ScriptElement {
        ScriptElement {
            key: Some(key.to_string()),
            value: value.to_string(),
        }
    }

    fn record(id: &str, cvss: &str) -> ScriptTable {
        ScriptTable {
            key: None,
            tables: vec![],
            elements: vec![
                elem("is_exploit", "false"),
                elem("cvss", cvss),
                elem("id", id),
                elem("type", "cve"),
            ],
        }
    }

    fn vulners(records: Vec<ScriptTable>) -> NmapScript {
        NmapScript {
            id: "vulners".to_string(),
            output: String::new(),
            tables: vec![ScriptTable {
                key: Some("cpe:/a:libssh:libssh:0.8.1".to_string()),
                tables: records,
                elements: vec![],
            }],
            elements: vec![],
        }
    }

    fn port(id: u16, name: &str, version: &str, scripts: Vec<NmapScript>) -> NmapPort {
        NmapPort {
            id,
            protocol: "tcp".to_string(),
            state: "open".to_string(),
            service: PortService {
                name: name.to_string(),
                product: String::new(),
                version: version.to_string(),
            },
            scripts,
        }
    }

    fn host(addr: &str, ports: Vec<NmapPort>) -> NmapHost {
        NmapHost {
            addresses: vec![HostAddress {
                addr: addr.to_string(),
                addr_type: "ipv4".to_string(),
            }],
            ports,
            ..NmapHost::default()
        }
    }

    fn named_host(addr: &str, hostname: &str, ports: Vec<NmapPort>) -> NmapHost {
        let mut host = host(addr, ports);
        host.hostnames.push(HostName {
            name: hostname.to_string(),
            name_type: "user".to_string(),
        });
        host
    }

    fn targets(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    fn run(hosts: Vec<NmapHost>) -> NmapRun {
        NmapRun {
            hosts,
            ..NmapRun::default()
        }
    }

    #[test]
    fn test_normalize_single_service() {
        let raw = run(vec![host(
            "127.0.0.1",
            vec![port(
                11001,
                "ssh",
                "0.8.1",
                vec![vulners(vec![
                    record("CVE-2018-10933", "6.4"),
                    record("CVE-2019-14889", "9.3"),
                ])],
            )],
        )]);

        let hosts = normalize(&raw, &targets(&["127.0.0.1"]), "vulners").unwrap();
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].target_ip, "127.0.0.1");

        let service = &hosts[0].services[0];
        assert_eq!(service.name, "ssh");
        assert_eq!(service.version, "0.8.1");
        assert_eq!(service.tcp_port, 11001);
        assert_eq!(
            service.vulns,
            vec![
                Vulnerability {
                    identifier: "CVE-2018-10933".to_string(),
                    cvss_score: 6.4
                },
                Vulnerability {
                    identifier: "CVE-2019-14889".to_string(),
                    cvss_score: 9.3
                },
            ]
        );
    }

    #[test]
    fn test_port_without_script_is_skipped() {
        let raw = run(vec![host(
            "10.0.0.1",
            vec![
                port(80, "http", "1.13.2", vec![]),
                port(22, "ssh", "7.4", vec![vulners(vec![record("CVE-1", "5.0")])]),
            ],
        )]);

        let hosts = normalize(&raw, &targets(&["10.0.0.1"]), "vulners").unwrap();
        assert_eq!(hosts[0].services.len(), 1);
        assert_eq!(hosts[0].services[0].tcp_port, 22);
    }

    #[test]
    fn test_host_without_matches_is_kept() {
        let raw = run(vec![host("10.0.0.2", vec![port(22, "ssh", "", vec![])])]);

        let hosts = normalize(&raw, &targets(&["10.0.0.2"]), "vulners").unwrap();
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].target_ip, "10.0.0.2");
        assert!(hosts[0].services.is_empty());
    }

    #[test]
    fn test_first_matching_script_wins() {
        let raw = run(vec![host(
            "10.0.0.3",
            vec![port(
                22,
                "ssh",
                "",
                vec![
                    vulners(vec![record("FIRST", "1.0")]),
                    vulners(vec![record("SECOND", "2.0")]),
                ],
            )],
        )]);

        let hosts = normalize(&raw, &targets(&["10.0.0.3"]), "vulners").unwrap();
        assert_eq!(hosts[0].services[0].vulns[0].identifier, "FIRST");
        assert_eq!(hosts[0].services[0].vulns.len(), 1);
    }

    #[test]
    fn test_other_scripts_are_ignored() {
        let mut banner = vulners(vec![record("NOPE", "1.0")]);
        banner.id = "banner".to_string();
        let raw = run(vec![host("10.0.0.4", vec![port(21, "ftp", "", vec![banner])])]);

        let hosts = normalize(&raw, &targets(&["10.0.0.4"]), "vulners").unwrap();
        assert!(hosts[0].services.is_empty());
    }

    #[test]
    fn test_script_without_tables_yields_empty_vulns() {
        let mut script = vulners(vec![]);
        script.tables.clear();
        let raw = run(vec![host("10.0.0.5", vec![port(22, "ssh", "", vec![script])])]);

        let hosts = normalize(&raw, &targets(&["10.0.0.5"]), "vulners").unwrap();
        assert_eq!(hosts[0].services.len(), 1);
        assert!(hosts[0].services[0].vulns.is_empty());
    }

    #[test]
    fn test_missing_keys_default() {
        let partial = ScriptTable {
            key: None,
            tables: vec![],
            elements: vec![elem("type", "githubexploit")],
        };
        let raw = run(vec![host(
            "10.0.0.6",
            vec![port(22, "ssh", "", vec![vulners(vec![partial])])],
        )]);

        let hosts = normalize(&raw, &targets(&["10.0.0.6"]), "vulners").unwrap();
        let vuln = &hosts[0].services[0].vulns[0];
        assert!(vuln.identifier.is_empty());
        assert_eq!(vuln.cvss_score, 0.0);
    }

    #[test]
    fn test_malformed_cvss_fails_whole_report() {
        let raw = run(vec![
            host(
                "10.0.0.7",
                vec![port(22, "ssh", "", vec![vulners(vec![record("CVE-1", "5.0")])])],
            ),
            host(
                "10.0.0.8",
                vec![port(22, "ssh", "", vec![vulners(vec![record("CVE-2", "high")])])],
            ),
        ]);

        let err = normalize(&raw, &targets(&["10.0.0.7", "10.0.0.8"]), "vulners").unwrap_err();
        assert!(matches!(err, VulnScanError::MalformedScanData(_)));
    }

    #[test]
    fn test_host_without_address_is_malformed() {
        let raw = run(vec![NmapHost::default()]);
        assert!(matches!(
            normalize(&raw, &targets(&[]), "vulners"),
            Err(VulnScanError::MalformedScanData(_))
        ));
    }

    #[test]
    fn test_unreported_target_is_kept_empty() {
        let hosts = normalize(&NmapRun::default(), &targets(&["192.0.2.10"]), "vulners").unwrap();
        assert_eq!(
            hosts,
            vec![HostResult {
                target_ip: "192.0.2.10".to_string(),
                services: vec![],
            }]
        );
    }

    #[test]
    fn test_results_follow_request_order() {
        let raw = run(vec![
            host("10.0.1.1", vec![port(22, "ssh", "", vec![vulners(vec![])])]),
            named_host("10.0.1.2", "Web.Example", vec![]),
        ]);

        let hosts = normalize(
            &raw,
            &targets(&["web.example", "down.example", "10.0.1.1"]),
            "vulners",
        )
        .unwrap();

        let order: Vec<&str> = hosts.iter().map(|h| h.target_ip.as_str()).collect();
        assert_eq!(order, vec!["10.0.1.2", "down.example", "10.0.1.1"]);
        assert!(hosts[1].services.is_empty());
        assert_eq!(hosts[2].services.len(), 1);
    }

    #[test]
    fn test_repeated_target_reuses_host() {
        let raw = run(vec![host("10.0.2.1", vec![port(22, "ssh", "", vec![vulners(vec![])])])]);

        let hosts = normalize(&raw, &targets(&["10.0.2.1", "10.0.2.1"]), "vulners").unwrap();
        assert_eq!(hosts.len(), 2);
        assert_eq!(hosts[0], hosts[1]);
    }

    #[test]
    fn test_hosts_outside_targets_follow_in_engine_order() {
        let raw = run(vec![
            host("10.0.3.1", vec![]),
            host("10.0.3.2", vec![]),
            host("10.0.3.3", vec![]),
        ]);

        let hosts = normalize(&raw, &targets(&["10.0.3.2"]), "vulners").unwrap();
        let order: Vec<&str> = hosts.iter().map(|h| h.target_ip.as_str()).collect();
        assert_eq!(order, vec!["10.0.3.2", "10.0.3.1", "10.0.3.3"]);
    }

    #[test]
    fn test_non_finite_cvss_is_malformed() {
        for value in ["1e50", "-1e50", "inf", "NaN"] {
            let raw = run(vec![host(
                "10.0.4.1",
                vec![port(80, "http", "", vec![vulners(vec![record("CVE-2021-41773", value)])])],
            )]);

            let err = normalize(&raw, &targets(&["10.0.4.1"]), "vulners").unwrap_err();
            assert!(
                matches!(err, VulnScanError::MalformedScanData(_)),
                "value {:?}",
                value
            );
        }
    }

    #[test]
    fn test_parse_cvss() {
        assert_eq!(parse_cvss("7.5").unwrap(), 7.5);
        assert_eq!(parse_cvss("5").unwrap(), 5.0);
        assert!(parse_cvss("").is_err());
        assert!(parse_cvss(" 5.0").is_err());
        assert!(parse_cvss("3.4e38").is_ok());
        assert!(parse_cvss("3.5e38").is_err());
    }
}

use crate::error::ScanEngineError;
use crate::external::{BaseTool, ScanEngine, ScanOutcome, ScanParameters};
use crate::{constants, logging, validation};
use async_trait::async_trait;
use roxmltree::{Document, Node};
use std::process::Output;
use tokio::time::Instant;
use tracing::debug;

/// Parsed `nmaprun` document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NmapRun {
    pub hosts: Vec<NmapHost>,
    pub stats: RunStats,
}

/// Figures from `<runstats><finished .../></runstats>`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    /// Wall time reported by nmap, in seconds
    pub elapsed: f64,
    pub summary: String,
    pub exit: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NmapHost {
    pub addresses: Vec<HostAddress>,
    pub hostnames: Vec<HostName>,
    pub ports: Vec<NmapPort>,
}

impl NmapHost {
    /// Whether `target` names this host, by address or hostname
    pub fn answers_to(&self, target: &str) -> bool {
        self.addresses
            .iter()
            .any(|address| address.addr.eq_ignore_ascii_case(target))
            || self
                .hostnames
                .iter()
                .any(|hostname| hostname.name.eq_ignore_ascii_case(target))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostAddress {
    pub addr: String,
    pub addr_type: String,
}

/// `<hostname>`; `name_type` is `user` for names given on the command line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostName {
    pub name: String,
    pub name_type: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NmapPort {
    pub id: u16,
    pub protocol: String,
    pub state: String,
    pub service: PortService,
    pub scripts: Vec<NmapScript>,
}

/// Service detection fields of a port
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortService {
    pub name: String,
    pub product: String,
    pub version: String,
}

/// Output of one NSE script on a port
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NmapScript {
    pub id: String,
    pub output: String,
    pub tables: Vec<ScriptTable>,
    pub elements: Vec<ScriptElement>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptTable {
    pub key: Option<String>,
    pub tables: Vec<ScriptTable>,
    pub elements: Vec<ScriptElement>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptElement {
    pub key: Option<String>,
    pub value: String,
}

impl NmapRun {
    /// Parse nmap XML output (`-oX`)
    pub fn from_xml(xml_content: &str) -> Result<Self, ScanEngineError> {
        let xml_clean = clean_xml_content(xml_content);

        let doc = Document::parse(&xml_clean).map_err(|e| {
            ScanEngineError::execution(
                constants::NMAP_BINARY,
                format!("Failed to parse nmap XML: {}", e),
            )
        })?;

        let root = doc.root_element();
        if root.tag_name().name() != "nmaprun" {
            return Err(ScanEngineError::execution(
                constants::NMAP_BINARY,
                "Invalid nmap XML format",
            ));
        }

        let mut run = NmapRun::default();

        for child in root.children().filter(Node::is_element) {
            match child.tag_name().name() {
                "host" => run.hosts.push(parse_host(&child)),
                "runstats" => run.stats = parse_run_stats(&child),
                _ => {}
            }
        }

        Ok(run)
    }
}

/// Remove DOCTYPE declarations, which roxmltree rejects
fn clean_xml_content(xml_content: &str) -> String {
    xml_content
        .lines()
        .filter(|line| !line.trim().starts_with("<!DOCTYPE"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn attr(node: &Node, name: &str) -> String {
    node.attribute(name).unwrap_or_default().to_string()
}

fn parse_host(host_elem: &Node) -> NmapHost {
    let mut host = NmapHost::default();

    for child in host_elem.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "address" => host.addresses.push(HostAddress {
                addr: attr(&child, "addr"),
                addr_type: attr(&child, "addrtype"),
            }),
            "hostnames" => host.hostnames.extend(
                child
                    .children()
                    .filter(|n| n.has_tag_name("hostname"))
                    .map(|n| HostName {
                        name: attr(&n, "name"),
                        name_type: attr(&n, "type"),
                    }),
            ),
            "ports" => host.ports.extend(
                child
                    .children()
                    .filter(|n| n.has_tag_name("port"))
                    .filter_map(|n| parse_port(&n)),
            ),
            _ => {}
        }
    }

    host
}

/// Parse a `<port>` element; ports without a numeric id are dropped
fn parse_port(port_elem: &Node) -> Option<NmapPort> {
    let id = port_elem.attribute("portid")?.parse::<u16>().ok()?;

    let mut port = NmapPort {
        id,
        protocol: attr(port_elem, "protocol"),
        ..NmapPort::default()
    };

    for child in port_elem.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "state" => port.state = attr(&child, "state"),
            "service" => {
                port.service = PortService {
                    name: attr(&child, "name"),
                    product: attr(&child, "product"),
                    version: attr(&child, "version"),
                }
            }
            "script" => port.scripts.push(parse_script(&child)),
            _ => {}
        }
    }

    Some(port)
}

fn parse_script(script_elem: &Node) -> NmapScript {
    let (tables, elements) = parse_table_body(script_elem);
    NmapScript {
        id: attr(script_elem, "id"),
        output: attr(script_elem, "output"),
        tables,
        elements,
    }
}

/// Collect the nested `<table>` and `<elem>` children of a node
fn parse_table_body(node: &Node) -> (Vec<ScriptTable>, Vec<ScriptElement>) {
    let mut tables = Vec::new();
    let mut elements = Vec::new();

    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "table" => {
                let (nested_tables, nested_elements) = parse_table_body(&child);
                tables.push(ScriptTable {
                    key: child.attribute("key").map(str::to_string),
                    tables: nested_tables,
                    elements: nested_elements,
                });
            }
            "elem" => elements.push(ScriptElement {
                key: child.attribute("key").map(str::to_string),
                value: child.text().unwrap_or_default().to_string(),
            }),
            _ => {}
        }
    }

    (tables, elements)
}

fn parse_run_stats(runstats_elem: &Node) -> RunStats {
    runstats_elem
        .children()
        .find(|n| n.has_tag_name("finished"))
        .map(|finished| RunStats {
            elapsed: finished
                .attribute("elapsed")
                .and_then(|e| e.parse::<f64>().ok())
                .unwrap_or_default(),
            summary: attr(&finished, "summary"),
            exit: attr(&finished, "exit"),
        })
        .unwrap_or_default()
}

/// Runs nmap with a vulnerability script and service detection
pub struct NmapScanner {
    base_tool: BaseTool,
}

impl NmapScanner {
    /// Locate the nmap binary on `PATH`
    pub fn new() -> Result<Self, ScanEngineError> {
        let base_tool = BaseTool::new(constants::NMAP_BINARY)?;
        Ok(Self { base_tool })
    }

    /// Use the nmap binary at `binary_path`
    pub fn with_binary(binary_path: impl Into<String>) -> Self {
        Self {
            base_tool: BaseTool::with_path(constants::NMAP_BINARY, binary_path),
        }
    }

    /// Build nmap command arguments
    pub fn build_args(params: &ScanParameters) -> Result<Vec<String>, ScanEngineError> {
        if params.targets().is_empty() {
            return Err(ScanEngineError::config("No targets given"));
        }
        for target in params.targets() {
            validation::validate_target_for_engine(target)?;
        }

        let script = params.script_path().to_string_lossy();
        if script.is_empty() {
            return Err(ScanEngineError::config("Script path cannot be empty"));
        }

        let mut args = Vec::new();
        if params.service_detection() {
            args.push("-sV".to_string());
        }
        args.push("--script".to_string());
        args.push(script.into_owned());

        if !params.ports().is_empty() {
            args.push("-p".to_string());
            args.push(params.port_list(","));
        }

        args.push("-oX".to_string());
        args.push("-".to_string()); // Output to stdout
        args.extend(params.targets().iter().cloned());

        Ok(args)
    }

    /// Turn a finished nmap process into a parsed run
    fn parse_nmap_output(output: &Output) -> Result<NmapRun, ScanEngineError> {
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScanEngineError::execution(
                constants::NMAP_BINARY,
                format!("Command failed ({}): {}", output.status, stderr.trim()),
            ));
        }

        NmapRun::from_xml(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Non-empty stderr lines, reported as warnings
pub fn collect_warnings(stderr: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(stderr)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl ScanEngine for NmapScanner {
    async fn execute(&self, params: &ScanParameters) -> Result<ScanOutcome, ScanEngineError> {
        let args = Self::build_args(params)?;
        let args_str: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
        let command = args.join(" ");
        debug!(command = %command, "Starting nmap");

        let started = Instant::now();
        let result = self
            .base_tool
            .execute_command(&args_str, params.deadline())
            .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                logging::log_external_tool(constants::NMAP_BINARY, &command, duration_ms, false);
                return Err(e);
            }
        };
        logging::log_external_tool(
            constants::NMAP_BINARY,
            &command,
            duration_ms,
            output.status.success(),
        );

        let warnings = collect_warnings(&output.stderr);
        let run = match Self::parse_nmap_output(&output) {
            Ok(run) => run,
            Err(e) => return Err(e.with_warnings(warnings)),
        };

        Ok(ScanOutcome { run, warnings })
    }
}

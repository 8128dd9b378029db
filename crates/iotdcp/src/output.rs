use std::io::IsTerminal;
use std::net::SocketAddr;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use iotdcp_catalog::{Interface, Scale};
use iotdcp_device::ServeStats;
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Everything `probe` learned about a device.
#[derive(Debug, Serialize)]
pub struct ProbeReport {
    pub address: SocketAddr,
    pub name: String,
    pub category_uuid: String,
    pub device_uuid: String,
    pub flags: Vec<&'static str>,
    pub interfaces: Vec<InterfaceReport>,
}

#[derive(Debug, Serialize)]
pub struct InterfaceReport {
    pub index: u8,
    #[serde(flatten)]
    pub interface: Interface,
}

#[derive(Serialize)]
struct ListeningEvent<'a> {
    event: &'static str,
    address: SocketAddr,
    device: &'a str,
    profile: &'a str,
}

#[derive(Serialize)]
struct StoppedEvent {
    event: &'static str,
    datagrams: u64,
    responses: u64,
    send_failures: u64,
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_listening(address: SocketAddr, device: &str, profile: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&ListeningEvent {
            event: "listening",
            address,
            device,
            profile,
        }),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("Serving \"{device}\" on {address} ({profile} profile). Press Ctrl-C to stop.");
        }
    }
}

pub fn print_stopped(stats: &ServeStats, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&StoppedEvent {
            event: "stopped",
            datagrams: stats.datagrams,
            responses: stats.responses,
            send_failures: stats.send_failures,
        }),
        OutputFormat::Table | OutputFormat::Pretty => println!(
            "Stopped after {} datagrams, {} responses sent.",
            stats.datagrams, stats.responses
        ),
    }
}

pub fn print_probe(report: &ProbeReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            let mut device = Table::new();
            device
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"])
                .add_row(vec!["Address".to_string(), report.address.to_string()])
                .add_row(vec!["Name".to_string(), report.name.clone()])
                .add_row(vec!["Category".to_string(), report.category_uuid.clone()])
                .add_row(vec!["Device".to_string(), report.device_uuid.clone()])
                .add_row(vec!["Flags".to_string(), flag_list(&report.flags)]);
            println!("{device}");

            let mut properties = Table::new();
            properties
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "INTERFACE", "TYPE", "#", "PROPERTY", "MODE", "DATA", "UNIT", "SCALE",
                ]);
            for entry in &report.interfaces {
                let interface = &entry.interface;
                if interface.properties.is_empty() {
                    properties.add_row(vec![
                        format!("{} {}", entry.index, interface.name),
                        interface.kind.name().to_string(),
                        String::new(),
                        String::new(),
                        String::new(),
                        String::new(),
                        String::new(),
                        String::new(),
                    ]);
                }
                for (index, property) in interface.properties.iter().enumerate() {
                    properties.add_row(vec![
                        format!("{} {}", entry.index, interface.name),
                        interface.kind.name().to_string(),
                        index.to_string(),
                        property.name.clone(),
                        format!("{:?}", property.mode),
                        format!("{:?} x{}", property.data_type, property.element_count),
                        unit_label(property.unit, property.unit_denominator),
                        scale_label(property.scale),
                    ]);
                }
            }
            println!("{properties}");
        }
        OutputFormat::Pretty => {
            println!("Device {}", report.address);
            println!("  Name:     {}", report.name);
            println!("  Category: {}", report.category_uuid);
            println!("  Device:   {}", report.device_uuid);
            println!("  Flags:    {}", flag_list(&report.flags));
            for entry in &report.interfaces {
                let interface = &entry.interface;
                println!(
                    "  Interface {}: {} ({})",
                    entry.index,
                    interface.name,
                    interface.kind.name()
                );
                for (index, property) in interface.properties.iter().enumerate() {
                    println!(
                        "    [{index}] {} {:?} {:?}x{} {} {}",
                        property.name,
                        property.mode,
                        property.data_type,
                        property.element_count,
                        unit_label(property.unit, property.unit_denominator),
                        scale_label(property.scale)
                    );
                }
            }
        }
    }
}

fn flag_list(flags: &[&str]) -> String {
    if flags.is_empty() {
        "none".to_string()
    } else {
        flags.join(", ")
    }
}

fn unit_label(unit: iotdcp_catalog::Unit, denominator: iotdcp_catalog::Unit) -> String {
    if denominator == iotdcp_catalog::Unit::default() {
        format!("{unit:?}")
    } else {
        format!("{unit:?}/{denominator:?}")
    }
}

fn scale_label(scale: Scale) -> String {
    match scale {
        Scale::Decimal(0) => String::new(),
        Scale::Decimal(exponent) => format!("1e{exponent}"),
        Scale::Iec(multiplier) => format!("{multiplier:?}"),
    }
}

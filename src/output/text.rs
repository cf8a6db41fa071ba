use comfy_table::{Table, presets::ASCII_BORDERS_ONLY_CONDENSED};
use std::fmt::Write;

use crate::check::{CheckReport, CheckResult};
use crate::route::ResolvedRoute;
use crate::target::Target;

/// Spaces added per hop of the route tree
const INDENT_STEP: usize = 3;

pub struct TextFormatter;

impl TextFormatter {
    pub fn format(report: &CheckReport) -> String {
        let mut out = String::new();

        write_target(&mut out, &report.target);
        if let Some(route) = &report.route {
            out.push('\n');
            write_route(&mut out, route);
        }

        out.push('\n');
        for result in &report.results {
            match result {
                CheckResult::Passed { name } => {
                    let _ = writeln!(out, "--- PASS: {}", name);
                }
                CheckResult::Failed { name, reason } => {
                    let _ = writeln!(out, "--- FAIL: {}", name);
                    let _ = writeln!(out, "    {}", reason);
                }
            }
        }
        for name in &report.skipped {
            let _ = writeln!(out, "--- SKIP: {}", name);
        }
        if let Some(reason) = &report.aborted {
            let _ = writeln!(out, "--- ABORTED: {}", reason);
        }

        let _ = writeln!(out, "=== PASS: ({}/{})", report.passed(), report.total);
        for name in report.passed_names() {
            let _ = writeln!(out, "    --- {}", name);
        }
        let _ = writeln!(out, "=== FAIL: ({}/{})", report.failed(), report.total);
        for name in report.failed_names() {
            let _ = writeln!(out, "    --- {}", name);
        }

        out
    }
}

fn write_target(out: &mut String, target: &Target) {
    let _ = writeln!(out, "host: {}", target.host);
    let _ = writeln!(out, "port: {}", target.port);
    let _ = writeln!(out, "path: {}", target.path);
    let _ = writeln!(out, "ip address: {}", target.ip);
}

fn write_route(out: &mut String, route: &ResolvedRoute) {
    let mut indent = 0;

    if let Some(ingress) = &route.ingress {
        let pad = " ".repeat(indent);
        let _ = writeln!(out, "{}-> ingress: {}", pad, ingress.ingress_name);
        let _ = writeln!(out, "{}   namespace: {}", pad, ingress.namespace);
        let _ = writeln!(out, "{}   path: {}", pad, ingress.path);
        if let Some(ip) = ingress.ip_address {
            let _ = writeln!(out, "{}   ip address: {}", pad, ip);
        }
        indent += INDENT_STEP;
    }

    let service = &route.service;
    let pad = " ".repeat(indent);
    let _ = writeln!(out, "{}-> service: {}", pad, service.service_name);
    let _ = writeln!(out, "{}   namespace: {}", pad, service.namespace);
    let _ = writeln!(out, "{}   type: {}", pad, service.service_type);
    let _ = writeln!(
        out,
        "{}   mapping: {} -> {}",
        pad, service.source_port, service.target_port
    );
    indent += INDENT_STEP;

    let pad = " ".repeat(indent);
    let _ = writeln!(out, "{}-> pods:", pad);
    for line in pod_table(route).lines() {
        let _ = writeln!(out, "{}   {}", pad, line);
    }
}

fn pod_table(route: &ResolvedRoute) -> String {
    let mut table = Table::new();
    table.load_preset(ASCII_BORDERS_ONLY_CONDENSED);
    table.set_header(vec!["pod", "container", "image", "port", "phase"]);
    for pod in &route.pods {
        table.add_row(vec![
            pod.pod_name.clone(),
            pod.container_name.clone(),
            pod.container_image.clone(),
            pod.container_port.to_string(),
            pod.pod_phase.clone(),
        ]);
    }
    table.to_string()
}

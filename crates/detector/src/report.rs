//! Human-readable rendering of a merged detection result. Pure formatting
//! over already-validated data; every populated field is reflected.

use crate::schemas::{DetectionResult, VmComponentVariable};
use std::fmt::Write;

pub fn render_report(file: &str, result: &DetectionResult) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", "=".repeat(60));
    let _ = writeln!(out, "JSVMP DETECTION REPORT");
    let _ = writeln!(out, "File: {}", file);
    let _ = writeln!(out, "{}", "=".repeat(60));

    let _ = writeln!(out, "\n## Summary\n");
    let _ = writeln!(out, "{}", result.summary.description());
    if let Some(recommendation) = result.summary.debugging_recommendation() {
        let _ = writeln!(out, "\nDebugging recommendation: {}", recommendation);
    }

    if let Some(global) = &result.global_bytecode {
        let _ = writeln!(out, "\n## Global Bytecode Array\n");
        if let Some(name) = &global.variable_name {
            let _ = writeln!(out, "Variable: {}", name);
        }
        if let Some(line) = global.line_number {
            let _ = write!(out, "Line: {}", line);
            if let (Some(sl), Some(sc)) = (global.source_line, global.source_column) {
                let _ = write!(out, " (source {}:{})", sl, sc);
            }
            let _ = writeln!(out);
        }
        if !global.description.is_empty() {
            let _ = writeln!(out, "{}", global.description);
        }
    }

    if result.regions.is_empty() {
        let _ = writeln!(out, "\nNo JSVMP regions detected.");
        return out;
    }

    let _ = writeln!(out, "\n## Detected Regions ({})", result.regions.len());

    for (idx, region) in result.regions.iter().enumerate() {
        let _ = writeln!(out, "\n### Region {}: {}", idx + 1, region.region_type);
        let _ = writeln!(
            out,
            "Lines {}-{} | confidence: {}",
            region.start, region.end, region.confidence
        );
        let _ = writeln!(out, "{}", region.description);

        if let Some(components) = &region.vm_components {
            let _ = writeln!(out, "\nVM components:");
            for (role, variable) in components.roles() {
                if let Some(variable) = variable {
                    render_component(&mut out, role, variable);
                }
            }
        }

        if let Some(injection) = &region.loop_entry_injection {
            let _ = write!(out, "\nLoop entry injection:");
            if let Some(line) = injection.line_number {
                let _ = write!(out, " line {}", line);
                if let (Some(sl), Some(sc)) = (injection.source_line, injection.source_column) {
                    let _ = write!(out, " (source {}:{})", sl, sc);
                }
            }
            let _ = writeln!(out);
            if !injection.description.is_empty() {
                let _ = writeln!(out, "  {}", injection.description);
            }
        }

        if let Some(injection) = &region.breakpoint_injection {
            let _ = write!(out, "\nBreakpoint injection:");
            if let Some(line) = injection.line_number {
                let _ = write!(out, " line {}", line);
                if let (Some(sl), Some(sc)) = (injection.source_line, injection.source_column) {
                    let _ = write!(out, " (source {}:{})", sl, sc);
                }
            }
            let _ = writeln!(out);
            if !injection.pattern.is_empty() {
                let _ = writeln!(out, "  pattern: {}", injection.pattern);
            }
        }

        if let Some(entry) = &region.debugging_entry_point {
            let _ = write!(out, "\nDebugging entry point:");
            if let Some(line) = entry.line_number {
                let _ = write!(out, " line {}", line);
            }
            let _ = writeln!(out);
            if !entry.description.is_empty() {
                let _ = writeln!(out, "  {}", entry.description);
            }
        }
    }

    out
}

fn render_component(out: &mut String, role: &str, variable: &VmComponentVariable) {
    let name = variable.variable_name.as_deref().unwrap_or("<not identified>");
    let _ = write!(out, "  {}: {}", role, name);
    if let Some(line) = variable.line_number {
        let _ = write!(out, " @ line {}", line);
        if let (Some(sl), Some(sc)) = (variable.source_line, variable.source_column) {
            let _ = write!(out, " (source {}:{})", sl, sc);
        }
    }
    if let Some(confidence) = variable.confidence {
        let _ = write!(out, " [{}]", confidence);
    }
    let _ = writeln!(out);
    if !variable.reasoning.is_empty() {
        let _ = writeln!(out, "    {}", variable.reasoning);
    }
}

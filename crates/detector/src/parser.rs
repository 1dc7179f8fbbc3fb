//! Schema-tolerant parsing of model responses into [`DetectionResult`]s.
//!
//! Required fields are validated strictly with errors naming the offending
//! field; optional enrichment (vm_components, global_bytecode, legacy
//! debugging_entry_point) is extracted per-field so one malformed sub-field
//! never invalidates the whole parse. Both the legacy flat-region shape and
//! the enriched shape validate against the same entry point.

use crate::error::DetectError;
use crate::schemas::{
    BreakpointInjection, Confidence, DebuggingEntryPoint, DetectionRegion, DetectionResult,
    GlobalBytecodeInfo, LoopEntryInjection, RegionType, Summary, VmComponentVariable, VmComponents,
};
use serde_json::Value;
use tracing::{debug, warn};

/// Parses raw model output into a validated [`DetectionResult`].
pub fn parse_detection_response(text: &str) -> Result<DetectionResult, DetectError> {
    let json_text = extract_json_from_text(text);

    let root: Value = serde_json::from_str(&json_text)
        .map_err(|e| DetectError::parse(format!("invalid JSON in model response: {}", e)))?;

    let obj = root
        .as_object()
        .ok_or_else(|| DetectError::parse("model response must be a JSON object"))?;

    let summary = parse_summary(obj.get("summary"))?;

    let regions_value = obj
        .get("regions")
        .ok_or_else(|| DetectError::parse("missing required field 'regions'"))?;
    let regions_array = regions_value
        .as_array()
        .ok_or_else(|| DetectError::parse("field 'regions' must be an array"))?;

    let mut regions = Vec::with_capacity(regions_array.len());
    for (idx, region) in regions_array.iter().enumerate() {
        regions.push(parse_region(region, idx)?);
    }

    let global_bytecode = obj.get("global_bytecode").and_then(parse_global_bytecode);

    debug!(regions = regions.len(), "parsed detection response");

    Ok(DetectionResult {
        summary,
        global_bytecode,
        regions,
    })
}

/// Models wrap JSON in markdown fences or surrounding prose often enough
/// that stripping it here is cheaper than failing the batch.
fn extract_json_from_text(text: &str) -> String {
    if let Some(start) = text.find("```json") {
        let body = &text[start + 7..];
        if let Some(end) = body.find("```") {
            return body[..end].trim().to_string();
        }
    }

    if let Some(start) = text.find('{') {
        let bytes = text.as_bytes();
        let mut depth = 0i32;
        let mut in_string = false;
        let mut escape_next = false;

        for (i, &byte) in bytes[start..].iter().enumerate() {
            if escape_next {
                escape_next = false;
                continue;
            }
            match byte {
                b'\\' if in_string => escape_next = true,
                b'"' => in_string = !in_string,
                b'{' if !in_string => depth += 1,
                b'}' if !in_string => {
                    depth -= 1;
                    if depth == 0 {
                        return text[start..start + i + 1].to_string();
                    }
                }
                _ => {}
            }
        }
    }

    text.to_string()
}

fn parse_summary(value: Option<&Value>) -> Result<Summary, DetectError> {
    let value = value.ok_or_else(|| DetectError::parse("missing required field 'summary'"))?;

    if let Some(s) = value.as_str() {
        return Ok(Summary::Plain(s.to_string()));
    }

    if let Some(obj) = value.as_object() {
        let overall = obj.get("overall_description").and_then(Value::as_str);
        let recommendation = obj.get("debugging_recommendation").and_then(Value::as_str);
        if let (Some(overall), Some(recommendation)) = (overall, recommendation) {
            return Ok(Summary::Structured {
                overall_description: overall.to_string(),
                debugging_recommendation: recommendation.to_string(),
            });
        }
        return Err(DetectError::parse(
            "field 'summary' object must contain string 'overall_description' \
             and 'debugging_recommendation'",
        ));
    }

    Err(DetectError::parse(
        "field 'summary' must be a string or an object",
    ))
}

/// Current field name wins over its legacy alias when both are present.
fn required_line_field(
    region: &Value,
    current: &str,
    legacy: &str,
    idx: usize,
) -> Result<u32, DetectError> {
    let (name, value) = match (region.get(current), region.get(legacy)) {
        (Some(v), _) => (current, v),
        (None, Some(v)) => (legacy, v),
        (None, None) => {
            return Err(DetectError::parse(format!(
                "region {} missing required field '{}' (or legacy '{}')",
                idx, current, legacy
            )))
        }
    };

    value
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| {
            DetectError::parse(format!(
                "region {} field '{}' must be a non-negative integer",
                idx, name
            ))
        })
}

fn required_str<'a>(region: &'a Value, field: &str, idx: usize) -> Result<&'a str, DetectError> {
    region
        .get(field)
        .ok_or_else(|| DetectError::parse(format!("region {} missing required field '{}'", idx, field)))?
        .as_str()
        .ok_or_else(|| DetectError::parse(format!("region {} field '{}' must be a string", idx, field)))
}

fn parse_region(region: &Value, idx: usize) -> Result<DetectionRegion, DetectError> {
    let start = required_line_field(region, "start_line", "start", idx)?;
    let end = required_line_field(region, "end_line", "end", idx)?;
    if start > end {
        return Err(DetectError::parse(format!(
            "region {} has start {} greater than end {}",
            idx, start, end
        )));
    }

    let type_str = required_str(region, "type", idx)?;
    let region_type = RegionType::from_wire(type_str).ok_or_else(|| {
        DetectError::parse(format!(
            "region {} has unknown type '{}' (accepted: {})",
            idx,
            type_str,
            RegionType::ACCEPTED.join(", ")
        ))
    })?;

    let confidence_str = required_str(region, "confidence", idx)?;
    let confidence = Confidence::from_wire(confidence_str).ok_or_else(|| {
        DetectError::parse(format!(
            "region {} has unknown confidence '{}' (accepted: {})",
            idx,
            confidence_str,
            Confidence::ACCEPTED.join(", ")
        ))
    })?;

    let description = required_str(region, "description", idx)?.to_string();

    let mut parsed = DetectionRegion::new(start, end, region_type, confidence, description);
    parsed.vm_components = region.get("vm_components").and_then(parse_vm_components);
    parsed.loop_entry_injection = region
        .get("loop_entry_injection")
        .and_then(parse_loop_entry_injection);
    parsed.breakpoint_injection = region
        .get("breakpoint_injection")
        .and_then(parse_breakpoint_injection);
    parsed.debugging_entry_point = region
        .get("debugging_entry_point")
        .and_then(parse_debugging_entry_point);

    Ok(parsed)
}

fn opt_u32(value: &Value, field: &str) -> Option<u32> {
    value
        .get(field)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
}

fn opt_string(value: &Value, field: &str) -> Option<String> {
    value.get(field).and_then(Value::as_str).map(str::to_string)
}

fn parse_component_variable(value: &Value) -> Option<VmComponentVariable> {
    let obj = value.as_object()?;

    Some(VmComponentVariable {
        variable_name: opt_string(value, "variable_name"),
        line_number: opt_u32(value, "line_number"),
        source_line: opt_u32(value, "source_line"),
        source_column: opt_u32(value, "source_column"),
        confidence: obj
            .get("confidence")
            .and_then(Value::as_str)
            .and_then(Confidence::from_wire),
        reasoning: opt_string(value, "reasoning").unwrap_or_default(),
    })
}

/// Attached only when at least one of the four roles carries a recognized
/// confidence value; a components block with no confident role is dropped
/// entirely.
fn parse_vm_components(value: &Value) -> Option<VmComponents> {
    let obj = value.as_object()?;

    let components = VmComponents {
        instruction_pointer: obj
            .get("instruction_pointer")
            .and_then(parse_component_variable),
        stack_pointer: obj.get("stack_pointer").and_then(parse_component_variable),
        virtual_stack: obj.get("virtual_stack").and_then(parse_component_variable),
        bytecode_array: obj.get("bytecode_array").and_then(parse_component_variable),
    };

    if components.has_confident_role() {
        Some(components)
    } else {
        warn!("dropping vm_components block with no confident role");
        None
    }
}

fn parse_loop_entry_injection(value: &Value) -> Option<LoopEntryInjection> {
    value.as_object()?;
    Some(LoopEntryInjection {
        line_number: opt_u32(value, "line_number"),
        source_line: opt_u32(value, "source_line"),
        source_column: opt_u32(value, "source_column"),
        description: opt_string(value, "description").unwrap_or_default(),
    })
}

fn parse_breakpoint_injection(value: &Value) -> Option<BreakpointInjection> {
    value.as_object()?;
    Some(BreakpointInjection {
        line_number: opt_u32(value, "line_number"),
        source_line: opt_u32(value, "source_line"),
        source_column: opt_u32(value, "source_column"),
        pattern: opt_string(value, "pattern").unwrap_or_default(),
    })
}

fn parse_debugging_entry_point(value: &Value) -> Option<DebuggingEntryPoint> {
    value.as_object()?;
    Some(DebuggingEntryPoint {
        line_number: opt_u32(value, "line_number"),
        source_line: opt_u32(value, "source_line"),
        source_column: opt_u32(value, "source_column"),
        description: opt_string(value, "description").unwrap_or_default(),
    })
}

/// Keeps the descriptor only when it actually names the array.
fn parse_global_bytecode(value: &Value) -> Option<GlobalBytecodeInfo> {
    value.as_object()?;
    let info = GlobalBytecodeInfo {
        variable_name: opt_string(value, "variable_name"),
        line_number: opt_u32(value, "line_number"),
        source_line: opt_u32(value, "source_line"),
        source_column: opt_u32(value, "source_column"),
        description: opt_string(value, "description").unwrap_or_default(),
    };
    info.variable_name.as_ref()?;
    Some(info)
}

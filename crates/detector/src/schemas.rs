//! Typed schema for model detection responses.
//!
//! The model response format evolved over time: older responses use flat
//! `start`/`end` region fields and a plain-string summary, newer ones use
//! `start_line`/`end_line`, a structured summary and optional VM-component
//! enrichment. Both shapes validate against the same types; the tolerant
//! extraction lives in [`crate::parser`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Detection certainty, ordered so that comparisons pick the stronger claim
/// during merge deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
    UltraHigh,
}

impl Confidence {
    pub const ACCEPTED: &'static [&'static str] = &["ultra_high", "high", "medium", "low"];

    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "ultra_high" => Some(Self::UltraHigh),
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::UltraHigh => "ultra_high",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// The closed set of JSVMP constructs the model may claim to have found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegionType {
    #[serde(rename = "If-Else Dispatcher")]
    IfElseDispatcher,
    #[serde(rename = "Switch Dispatcher")]
    SwitchDispatcher,
    #[serde(rename = "Instruction Array")]
    InstructionArray,
    /// Legacy responses only.
    #[serde(rename = "Stack Operation")]
    StackOperation,
}

impl RegionType {
    pub const ACCEPTED: &'static [&'static str] = &[
        "If-Else Dispatcher",
        "Switch Dispatcher",
        "Instruction Array",
        "Stack Operation",
    ];

    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "If-Else Dispatcher" => Some(Self::IfElseDispatcher),
            "Switch Dispatcher" => Some(Self::SwitchDispatcher),
            "Instruction Array" => Some(Self::InstructionArray),
            "Stack Operation" => Some(Self::StackOperation),
            _ => None,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::IfElseDispatcher => "If-Else Dispatcher",
            Self::SwitchDispatcher => "Switch Dispatcher",
            Self::InstructionArray => "Instruction Array",
            Self::StackOperation => "Stack Operation",
        }
    }
}

impl fmt::Display for RegionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// A model summary in either of its two accepted shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Summary {
    Plain(String),
    Structured {
        overall_description: String,
        debugging_recommendation: String,
    },
}

impl Summary {
    /// Renders the summary down to a single description string. The
    /// structured form contributes its `overall_description`.
    pub fn description(&self) -> &str {
        match self {
            Self::Plain(s) => s,
            Self::Structured {
                overall_description, ..
            } => overall_description,
        }
    }

    pub fn debugging_recommendation(&self) -> Option<&str> {
        match self {
            Self::Plain(_) => None,
            Self::Structured {
                debugging_recommendation,
                ..
            } => Some(debugging_recommendation),
        }
    }
}

impl Default for Summary {
    fn default() -> Self {
        Self::Plain(String::new())
    }
}

/// One candidate variable for a VM role (instruction pointer, stack pointer,
/// virtual stack or bytecode array). `variable_name == None` means the role
/// was not identified, which is distinct from a missing confidence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VmComponentVariable {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_line: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_column: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,

    #[serde(default)]
    pub reasoning: String,
}

/// Per-region identification of the four VM roles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VmComponents {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction_pointer: Option<VmComponentVariable>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_pointer: Option<VmComponentVariable>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_stack: Option<VmComponentVariable>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytecode_array: Option<VmComponentVariable>,
}

impl VmComponents {
    pub fn roles(&self) -> [(&'static str, Option<&VmComponentVariable>); 4] {
        [
            ("instruction_pointer", self.instruction_pointer.as_ref()),
            ("stack_pointer", self.stack_pointer.as_ref()),
            ("virtual_stack", self.virtual_stack.as_ref()),
            ("bytecode_array", self.bytecode_array.as_ref()),
        ]
    }

    /// A component block is only worth attaching when at least one role
    /// carries a recognized confidence value.
    pub fn has_confident_role(&self) -> bool {
        self.roles()
            .iter()
            .any(|(_, v)| v.map(|v| v.confidence.is_some()).unwrap_or(false))
    }
}

/// Where to inject instrumentation relative to a dispatcher's loop entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoopEntryInjection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_line: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_column: Option<u32>,

    #[serde(default)]
    pub description: String,
}

/// Where to place a breakpoint on the opcode-fetch statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BreakpointInjection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_line: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_column: Option<u32>,

    #[serde(default)]
    pub pattern: String,
}

/// Legacy single-point debugging hint carried by older responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebuggingEntryPoint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_line: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_column: Option<u32>,

    #[serde(default)]
    pub description: String,
}

/// Identifies the master bytecode array when multiple VM regions share one
/// source array. At most one per file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalBytecodeInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_line: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_column: Option<u32>,

    #[serde(default)]
    pub description: String,
}

/// A claimed line range in the formatted (beautified) coordinate space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRegion {
    pub start: u32,
    pub end: u32,

    #[serde(rename = "type")]
    pub region_type: RegionType,

    pub confidence: Confidence,

    pub description: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vm_components: Option<VmComponents>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_entry_injection: Option<LoopEntryInjection>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakpoint_injection: Option<BreakpointInjection>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub debugging_entry_point: Option<DebuggingEntryPoint>,
}

impl DetectionRegion {
    pub fn new(
        start: u32,
        end: u32,
        region_type: RegionType,
        confidence: Confidence,
        description: impl Into<String>,
    ) -> Self {
        Self {
            start,
            end,
            region_type,
            confidence,
            description: description.into(),
            vm_components: None,
            loop_entry_injection: None,
            breakpoint_injection: None,
            debugging_entry_point: None,
        }
    }

    /// True when the two line ranges share at least one line. A shared
    /// endpoint (end == other.start) counts as overlap; strictly adjacent
    /// ranges do not.
    pub fn overlaps(&self, other: &DetectionRegion) -> bool {
        self.start <= other.end && self.end >= other.start
    }
}

/// One model response after validation, or the merged whole-file result.
/// Never mutated once built; merging constructs a fresh value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub summary: Summary,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_bytecode: Option<GlobalBytecodeInfo>,

    pub regions: Vec<DetectionRegion>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_ordering() {
        assert!(Confidence::UltraHigh > Confidence::High);
        assert!(Confidence::High > Confidence::Medium);
        assert!(Confidence::Medium > Confidence::Low);
    }

    #[test]
    fn test_confidence_wire_round_trip() {
        for name in Confidence::ACCEPTED {
            let c = Confidence::from_wire(name).unwrap();
            assert_eq!(c.as_wire(), *name);
        }
        assert!(Confidence::from_wire("certain").is_none());
    }

    #[test]
    fn test_region_type_wire_names() {
        assert_eq!(
            RegionType::from_wire("Switch Dispatcher"),
            Some(RegionType::SwitchDispatcher)
        );
        assert!(RegionType::from_wire("Dispatcher").is_none());
    }

    #[test]
    fn test_overlap_touching_vs_adjacent() {
        let a = DetectionRegion::new(10, 20, RegionType::SwitchDispatcher, Confidence::High, "");
        let touching =
            DetectionRegion::new(20, 40, RegionType::InstructionArray, Confidence::Low, "");
        let adjacent =
            DetectionRegion::new(21, 40, RegionType::InstructionArray, Confidence::Low, "");

        assert!(a.overlaps(&touching));
        assert!(touching.overlaps(&a));
        assert!(!a.overlaps(&adjacent));
    }

    #[test]
    fn test_summary_forms() {
        let plain = Summary::Plain("found a vm".to_string());
        assert_eq!(plain.description(), "found a vm");
        assert!(plain.debugging_recommendation().is_none());

        let structured = Summary::Structured {
            overall_description: "two dispatchers".to_string(),
            debugging_recommendation: "break at line 4".to_string(),
        };
        assert_eq!(structured.description(), "two dispatchers");
        assert_eq!(
            structured.debugging_recommendation(),
            Some("break at line 4")
        );
    }

    #[test]
    fn test_vm_components_confident_role() {
        let mut components = VmComponents::default();
        assert!(!components.has_confident_role());

        components.instruction_pointer = Some(VmComponentVariable {
            variable_name: Some("ip".to_string()),
            ..Default::default()
        });
        assert!(!components.has_confident_role());

        components.instruction_pointer.as_mut().unwrap().confidence = Some(Confidence::High);
        assert!(components.has_confident_role());
    }
}

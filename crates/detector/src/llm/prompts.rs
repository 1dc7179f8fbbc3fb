//! Prompt construction for per-batch JSVMP analysis.

use crate::batch::Batch;
use crate::schemas::{Confidence, RegionType};

const SYSTEM_PROMPT: &str = r#"You are an expert JavaScript reverse engineer specializing in JSVMP (JavaScript Virtual Machine Protection) analysis.

JSVMP compiles original code into custom bytecode executed by an embedded interpreter. Your job is to locate the interpreter machinery so a human can place breakpoints.

PATTERNS TO DETECT:

1. SWITCH DISPATCHER
   - A loop whose body is a large switch over an opcode variable
   - Pattern: while/for loop -> opcode fetch -> switch (opcode) { many cases }

2. IF-ELSE DISPATCHER
   - The same structure expressed as a long if/else-if chain comparing the
     opcode against constants

3. INSTRUCTION ARRAY
   - A large numeric or string array holding the packed bytecode, usually
     indexed by an instruction pointer that only ever increments

For each detected region also try to identify the VM components:
- instruction_pointer: the index into the bytecode array, incremented per step
- stack_pointer: the index into the virtual stack
- virtual_stack: the array used with push/pop at the stack pointer
- bytecode_array: the array the instruction pointer reads from

And the debugging injection points:
- loop_entry_injection: the line just inside the dispatcher loop entry
- breakpoint_injection: the opcode-fetch statement itself

Only report regions you actually observe. Every line of the input is prefixed
with its line number; report line numbers exactly as prefixed."#;

/// Builds the (system, user) prompt pair for one batch. Batch content already
/// carries embedded line numbers, so the model can report positions in the
/// formatted coordinate space directly.
pub fn build_batch_prompt(batch: &Batch) -> (String, String) {
    let user_prompt = format!(
        r#"Analyze this JavaScript fragment (lines {start}-{end} of the beautified file) for JSVMP patterns.

```javascript
{content}
```

Return JSON only, in this shape:
{{
  "summary": {{
    "overall_description": "what VM machinery this fragment contains, or that it contains none",
    "debugging_recommendation": "where to break first and why"
  }},
  "global_bytecode": {{
    "variable_name": "name of the master bytecode array, if one is visible",
    "line_number": 0,
    "description": "why you believe this is the master array"
  }},
  "regions": [
    {{
      "start_line": 0,
      "end_line": 0,
      "type": "{types}",
      "confidence": "{confidences}",
      "description": "what the region is and how it behaves",
      "vm_components": {{
        "instruction_pointer": {{"variable_name": null, "line_number": 0, "confidence": "low", "reasoning": ""}},
        "stack_pointer": {{"variable_name": null, "line_number": 0, "confidence": "low", "reasoning": ""}},
        "virtual_stack": {{"variable_name": null, "line_number": 0, "confidence": "low", "reasoning": ""}},
        "bytecode_array": {{"variable_name": null, "line_number": 0, "confidence": "low", "reasoning": ""}}
      }},
      "loop_entry_injection": {{"line_number": 0, "description": ""}},
      "breakpoint_injection": {{"line_number": 0, "pattern": ""}}
    }}
  ]
}}

Omit "global_bytecode" when no master array is visible. Omit a vm_components
role's fields you cannot determine (set variable_name to null if the role is
not identified). Use only the listed type and confidence values. Report an
empty "regions" array when the fragment contains no VM machinery."#,
        start = batch.start_line,
        end = batch.end_line,
        content = batch.content,
        types = RegionType::ACCEPTED.join("|"),
        confidences = Confidence::ACCEPTED.join("|"),
    );

    (SYSTEM_PROMPT.to_string(), user_prompt)
}

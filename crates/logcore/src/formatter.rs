//! Formatter driver (§4.5): walks a message template and renders it against
//! a disjointed payload's ordered child buffers.

use crate::error::LogCoreError;
use crate::memory_manager::MemoryManager;
use crate::registry::{ContextWriterRegistry, WriteOutcome};
use crate::selflog::SelfLog;
use crate::template::{ArgumentInfo, TemplateParser, Token};
use std::any::TypeId;
use std::sync::Arc;

/// One already-retrieved context argument: its raw bytes and the `TypeId`
/// the producer tagged it with at enqueue time.
#[derive(Clone, Copy)]
pub struct ContextArgument<'a> {
    pub type_id: TypeId,
    pub bytes: &'a [u8],
}

/// Renders `template` against `arguments` into `out`, as a single pure
/// function over already-resolved inputs rather than reaching back into
/// `MemoryManager` itself (retrieval is the caller's job, per §4.5's input
/// list: "a template ... the ordered remaining child payloads, the output
/// buffer").
///
/// Returns `Ok(())` having appended to `out`, or the first unrecoverable
/// error encountered (the template itself being unavailable).
pub fn format_into(
    template: &str,
    arguments: &[ContextArgument<'_>],
    registry: &ContextWriterRegistry,
    self_log: &SelfLog,
    timestamp_ns: i64,
    out: &mut String,
) -> Result<(), LogCoreError> {
    let mut parser = TemplateParser::new(template);
    let mut positional = 0usize;

    while let Some((token, _span)) = parser.next_token() {
        match token {
            Token::Literal(text) => out.push_str(text),
            Token::EscapedOpenBrace => out.push('{'),
            Token::EscapedCloseBrace => out.push('}'),
            Token::Argument(info) => {
                render_argument(&info, arguments, registry, self_log, timestamp_ns, &mut positional, out);
            }
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn render_argument(
    info: &ArgumentInfo<'_>,
    arguments: &[ContextArgument<'_>],
    registry: &ContextWriterRegistry,
    self_log: &SelfLog,
    timestamp_ns: i64,
    positional: &mut usize,
    out: &mut String,
) {
    let display_name = hole_display_name(info);

    let index = match &info.reference {
        crate::template::ArgumentRef::Index(i) => *i as usize,
        crate::template::ArgumentRef::Name(_) => {
            let i = *positional;
            *positional += 1;
            i
        }
    };

    let Some(arg) = arguments.get(index) else {
        self_log.report(LogCoreError::UnableToRetrieveValidContextArgumentIndex, timestamp_ns);
        out.push('{');
        out.push_str(&display_name);
        out.push('}');
        return;
    };

    let mut rendered = String::new();
    match registry.write(arg.type_id, &mut rendered, arg.bytes) {
        WriteOutcome::Success => {}
        WriteOutcome::Failed => {
            self_log.report(LogCoreError::UnableToRetrieveContextArgument, timestamp_ns);
            rendered.clear();
            rendered.push('{');
            rendered.push_str(&display_name);
            rendered.push('}');
        }
        WriteOutcome::UnknownType => {
            self_log.report(LogCoreError::UnknownTypeId(type_id_hash(arg.type_id)), timestamp_ns);
            rendered.clear();
            rendered.push('{');
            rendered.push_str(&display_name);
            rendered.push('}');
        }
    }

    apply_alignment(&rendered, info.alignment, out);
}

/// `TypeId` carries no stable public integer form; hash it so SelfLog
/// diagnostics can still name a type by a consistent (if opaque) id.
fn type_id_hash(type_id: TypeId) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    type_id.hash(&mut hasher);
    hasher.finish()
}

fn hole_display_name(info: &ArgumentInfo<'_>) -> String {
    match &info.reference {
        crate::template::ArgumentRef::Name(n) => (*n).to_string(),
        crate::template::ArgumentRef::Index(i) => i.to_string(),
    }
}

fn apply_alignment(rendered: &str, alignment: Option<i32>, out: &mut String) {
    let Some(width) = alignment else {
        out.push_str(rendered);
        return;
    };
    let target = width.unsigned_abs() as usize;
    let len = rendered.chars().count();
    if len >= target {
        out.push_str(rendered);
        return;
    }
    let pad = target - len;
    if width > 0 {
        for _ in 0..pad {
            out.push(' ');
        }
        out.push_str(rendered);
    } else {
        out.push_str(rendered);
        for _ in 0..pad {
            out.push(' ');
        }
    }
}

/// Convenience wrapper retrieving the template and argument buffers for a
/// disjointed payload straight out of a [`MemoryManager`] (§4.5 step 1).
pub fn format_disjointed(
    manager: &MemoryManager,
    head: crate::handle::PayloadHandle,
    argument_type_ids: &[TypeId],
    registry: &ContextWriterRegistry,
    self_log: &Arc<SelfLog>,
    timestamp_ns: i64,
) -> Result<String, LogCoreError> {
    let template_bytes = manager.retrieve_disjointed_payload_buffer(head, 0).map_err(|_| {
        self_log.report(LogCoreError::UnableToRetrieveSimpleMessageBuffer, timestamp_ns);
        LogCoreError::UnableToRetrieveSimpleMessageBuffer
    })?;
    let template = std::str::from_utf8(&template_bytes).map_err(|_| {
        self_log.report(LogCoreError::UnableToRetrieveSimpleMessageBuffer, timestamp_ns);
        LogCoreError::UnableToRetrieveSimpleMessageBuffer
    })?;

    let mut buffers = Vec::with_capacity(argument_type_ids.len());
    for i in 0..argument_type_ids.len() {
        let bytes = manager.retrieve_disjointed_payload_buffer(head, i + 1).map_err(|_| {
            self_log.report(
                LogCoreError::UnableToRetrieveValidPayloadsFromDisjointedMessageBuffer,
                timestamp_ns,
            );
            LogCoreError::UnableToRetrieveValidPayloadsFromDisjointedMessageBuffer
        })?;
        buffers.push(bytes);
    }
    let arguments: Vec<ContextArgument<'_>> = buffers
        .iter()
        .zip(argument_type_ids)
        .map(|(bytes, type_id)| ContextArgument { type_id: *type_id, bytes })
        .collect();

    let mut out = String::new();
    format_into(template, &arguments, registry, self_log, timestamp_ns, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_positional_and_named_holes_deterministically() {
        let registry = ContextWriterRegistry::with_builtins();
        let self_log = SelfLog::new();
        let age_bytes = 30i32.to_le_bytes();
        let args = [ContextArgument {
            type_id: TypeId::of::<i32>(),
            bytes: &age_bytes,
        }];

        let mut first = String::new();
        let mut second = String::new();
        format_into("Age: {Age}", &args, &registry, &self_log, 0, &mut first).unwrap();
        format_into("Age: {Age}", &args, &registry, &self_log, 0, &mut second).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "Age: 30");
    }

    #[test]
    fn unknown_type_falls_back_to_name_literal_and_logs() {
        let registry = ContextWriterRegistry::empty();
        let self_log = SelfLog::new();
        self_log.set_mode(crate::selflog::SelfLogMode::InMemory);
        let bytes = [0u8; 4];
        let args = [ContextArgument {
            type_id: TypeId::of::<i32>(),
            bytes: &bytes,
        }];
        let mut out = String::new();
        format_into("{Count}", &args, &registry, &self_log, 0, &mut out).unwrap();
        assert_eq!(out, "{Count}");
        assert!(!self_log.entries().is_empty());
    }

    #[test]
    fn missing_index_falls_back_without_panicking() {
        let registry = ContextWriterRegistry::with_builtins();
        let self_log = SelfLog::new();
        let mut out = String::new();
        format_into("{0}", &[], &registry, &self_log, 0, &mut out).unwrap();
        assert_eq!(out, "{0}");
    }

    #[test]
    fn alignment_pads_left_and_right() {
        let registry = ContextWriterRegistry::with_builtins();
        let self_log = SelfLog::new();
        let value = 5i32.to_le_bytes();
        let args = [ContextArgument {
            type_id: TypeId::of::<i32>(),
            bytes: &value,
        }];
        let mut right = String::new();
        format_into("{0,4}", &args, &registry, &self_log, 0, &mut right).unwrap();
        assert_eq!(right, "   5");

        let mut left = String::new();
        format_into("{0,-4}", &args, &registry, &self_log, 0, &mut left).unwrap();
        assert_eq!(left, "5   ");
    }
}

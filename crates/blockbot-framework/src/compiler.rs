//! Block compiler.
//!
//! Turns an ordered block sequence into a [`HandlerSet`]. Compilation never
//! fails: a block that cannot be compiled is skipped and reported as a
//! [`CompileWarning`], and the remaining blocks are compiled as usual.
//!
//! ```text
//! blocks ──► BlockCompiler::compile ──► Compilation
//!   │                                    ├─ handlers: HandlerSet (block order)
//!   └─ variable blocks ──► Scope ──┐     └─ warnings: Vec<CompileWarning>
//!                                  └──► condition blocks compiled later
//! ```
//!
//! | block | matcher | action |
//! |---|---|---|
//! | `start` | command `/start` | send text |
//! | `command` | command `/<command>` | send text |
//! | `message` | trigger, or any non-command text | send text |
//! | `keyboard` | trigger, or any non-command text | send text with keyboard |
//! | `button` | callback data | answer callback, send text |
//! | `photo` | trigger, or any non-command text | send photo |
//! | `condition` | any message | send one of two texts |
//! | `variable` | none | bind a scope variable |

use serde_json::Value as JsonValue;
use tracing::{debug, trace, warn};

use blockbot_core::{Block, BlockKind, ButtonRows};

use crate::action::Action;
use crate::error::CompileWarning;
use crate::expr::{Expr, Scope, Value, is_variable_name};
use crate::handler::{Handler, HandlerKind, HandlerSet};
use crate::matcher::Matcher;

// ============================================================================
// Defaults
// ============================================================================

/// Greeting of a `start` block without a message.
pub const DEFAULT_GREETING: &str = "Hello! I am a bot built with the visual constructor.";
/// Command of a `command` block without one.
pub const DEFAULT_COMMAND: &str = "help";
/// Response of a `command` block without one.
pub const DEFAULT_COMMAND_RESPONSE: &str = "Help";
/// Response of a `message` block without one.
pub const DEFAULT_MESSAGE_RESPONSE: &str = "Response is not configured";
/// Prompt sent along with a keyboard.
pub const DEFAULT_KEYBOARD_TEXT: &str = "Choose an option:";
/// Callback data of a `button` block without one.
pub const DEFAULT_CALLBACK_DATA: &str = "button_click";
/// Response of a `button` block without one.
pub const DEFAULT_BUTTON_RESPONSE: &str = "Button pressed";
/// Condition of a `condition` block without one.
pub const DEFAULT_CONDITION: &str = "msg.text.length > 10";
/// Response sent when a condition holds.
pub const DEFAULT_TRUE_RESPONSE: &str = "Condition met";
/// Response sent when a condition does not hold.
pub const DEFAULT_FALSE_RESPONSE: &str = "Condition not met";
/// Name bound by a `variable` block without one.
pub const DEFAULT_VARIABLE_NAME: &str = "myVar";

/// The keyboard of a `keyboard` block without buttons.
pub fn default_buttons() -> ButtonRows {
    vec![vec!["Button 1".to_string(), "Button 2".to_string()]]
}

// ============================================================================
// Compilation
// ============================================================================

/// The result of compiling one block sequence.
#[derive(Debug, Clone)]
pub struct Compilation {
    /// Compiled handlers, in block order. Never empty.
    pub handlers: HandlerSet,
    /// One entry per skipped block, in block order.
    pub warnings: Vec<CompileWarning>,
}

impl Compilation {
    /// Returns `true` if every block compiled cleanly.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Compiles block sequences into handler sets.
///
/// The compiler is stateless; each call to [`compile`](Self::compile) starts
/// from an empty variable scope.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockCompiler;

impl BlockCompiler {
    /// Creates a compiler.
    pub fn new() -> Self {
        Self
    }

    /// Compiles `blocks` in order.
    ///
    /// An empty sequence, or one where every block is skipped with a
    /// warning, compiles to the fallback set. Any other sequence keeps its
    /// handlers as compiled, possibly none at all.
    pub fn compile(&self, blocks: &[Block]) -> Compilation {
        let mut scope = Scope::new();
        let mut handlers = Vec::with_capacity(blocks.len());
        let mut warnings = Vec::new();

        for block in blocks {
            match compile_block(block, &mut scope) {
                Ok(Some(handler)) => {
                    trace!(
                        block_id = %block.id,
                        kind = %block.kind,
                        matcher = %handler.matcher.describe(),
                        "Compiled block"
                    );
                    handlers.push(handler);
                }
                Ok(None) => {
                    trace!(block_id = %block.id, kind = %block.kind, "Block produced no handler");
                }
                Err(reason) => {
                    warn!(block_id = %block.id, kind = %block.kind, %reason, "Skipping block");
                    warnings.push(CompileWarning::new(block.id.clone(), reason));
                }
            }
        }

        let handlers = if warnings.len() == blocks.len() {
            HandlerSet::fallback()
        } else {
            HandlerSet::new(handlers)
        };
        debug!(
            blocks = blocks.len(),
            handlers = handlers.len(),
            warnings = warnings.len(),
            variables = scope.len(),
            fallback = handlers.is_fallback(),
            "Compiled block sequence"
        );

        Compilation { handlers, warnings }
    }
}

/// Compiles one block. `Ok(None)` means the block legitimately produces no
/// handler; `Err` carries the reason it was skipped.
fn compile_block(block: &Block, scope: &mut Scope) -> Result<Option<Handler>, String> {
    let handler = match &block.kind {
        BlockKind::Start => Handler::new(
            HandlerKind::Command,
            &block.id,
            Matcher::command("start"),
            Action::SendText(block.text_or("message", DEFAULT_GREETING)),
        ),

        BlockKind::Command => {
            let command = block.text_or("command", DEFAULT_COMMAND);
            let name = command.trim_start_matches('/');
            if name.is_empty() {
                return Err("command name is empty".to_string());
            }
            if name.chars().any(char::is_whitespace) {
                return Err(format!("command name {command:?} contains whitespace"));
            }
            Handler::new(
                HandlerKind::Command,
                &block.id,
                Matcher::command(name),
                Action::SendText(block.text_or("response", DEFAULT_COMMAND_RESPONSE)),
            )
        }

        BlockKind::Message => Handler::new(
            HandlerKind::Trigger,
            &block.id,
            text_rule(block)?,
            Action::SendText(block.text_or("response", DEFAULT_MESSAGE_RESPONSE)),
        ),

        BlockKind::Keyboard => {
            let rows = button_rows(block.field("buttons"))?;
            Handler::new(
                HandlerKind::Trigger,
                &block.id,
                text_rule(block)?,
                Action::SendKeyboard {
                    text: block.text_or("text", DEFAULT_KEYBOARD_TEXT),
                    rows,
                },
            )
        }

        BlockKind::Button => Handler::new(
            HandlerKind::CallbackData,
            &block.id,
            Matcher::CallbackData(block.text_or("callbackData", DEFAULT_CALLBACK_DATA)),
            Action::AnswerCallback(block.text_or("response", DEFAULT_BUTTON_RESPONSE)),
        ),

        BlockKind::Photo => {
            let Some(url) = block.text("photoUrl") else {
                return Ok(None);
            };
            Handler::new(
                HandlerKind::Trigger,
                &block.id,
                text_rule(block)?,
                Action::SendPhoto {
                    url,
                    caption: block.text_or("caption", ""),
                },
            )
        }

        BlockKind::Condition => {
            let source = block.text_or("condition", DEFAULT_CONDITION);
            let condition =
                Expr::parse(&source, scope).map_err(|e| format!("invalid condition: {e}"))?;
            Handler::new(
                HandlerKind::Trigger,
                &block.id,
                Matcher::AnyMessage,
                Action::Branch {
                    condition,
                    if_true: block.text_or("trueResponse", DEFAULT_TRUE_RESPONSE),
                    if_false: block.text_or("falseResponse", DEFAULT_FALSE_RESPONSE),
                },
            )
        }

        BlockKind::Variable => {
            let name = block.text_or("name", DEFAULT_VARIABLE_NAME);
            if !is_variable_name(&name) {
                return Err(format!("{name:?} is not a usable variable name"));
            }
            let value = block
                .field("value")
                .map_or_else(|| Value::Str(String::new()), Value::from_json);
            scope.bind(name, value);
            return Ok(None);
        }

        BlockKind::Unknown(name) => return Err(format!("unknown block type {name:?}")),
    };

    Ok(Some(handler))
}

fn text_rule(block: &Block) -> Result<Matcher, String> {
    Matcher::text_rule(block.text("trigger").as_deref())
        .map_err(|e| format!("invalid trigger: {e}"))
}

/// Reads the `buttons` field of a keyboard block.
///
/// Accepted shapes are an array of rows, each a non-empty array of labels
/// (strings or numbers), or the builder's text form with one row per line and
/// comma-separated labels. A missing, `null` or empty value yields the default
/// keyboard.
fn button_rows(field: Option<&JsonValue>) -> Result<ButtonRows, String> {
    match field {
        None | Some(JsonValue::Null) => Ok(default_buttons()),
        Some(JsonValue::Array(rows)) if rows.is_empty() => Ok(default_buttons()),
        Some(JsonValue::Array(rows)) => rows
            .iter()
            .enumerate()
            .map(|(i, row)| button_row(i, row))
            .collect(),
        Some(JsonValue::String(text)) => {
            let rows: ButtonRows = text
                .lines()
                .map(|line| {
                    line.split(',')
                        .map(str::trim)
                        .filter(|label| !label.is_empty())
                        .map(str::to_string)
                        .collect::<Vec<_>>()
                })
                .filter(|row| !row.is_empty())
                .collect();
            if rows.is_empty() {
                Ok(default_buttons())
            } else {
                Ok(rows)
            }
        }
        Some(other) => Err(format!("buttons must be a list of rows, got {other}")),
    }
}

fn button_row(index: usize, row: &JsonValue) -> Result<Vec<String>, String> {
    let JsonValue::Array(labels) = row else {
        return Err(format!("button row {index} is not a list"));
    };
    if labels.is_empty() {
        return Err(format!("button row {index} is empty"));
    }
    labels
        .iter()
        .map(|label| match label {
            JsonValue::String(s) if !s.is_empty() => Ok(s.clone()),
            JsonValue::Number(n) => Ok(n.to_string()),
            other => Err(format!("button row {index} has an invalid label {other}")),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockbot_core::InboundEvent;
    use serde_json::json;

    fn block(id: &str, kind: BlockKind, data: JsonValue) -> Block {
        let JsonValue::Object(data) = data else {
            panic!("block data must be an object");
        };
        Block {
            id: id.to_string(),
            kind,
            data,
        }
    }

    fn compile(blocks: &[Block]) -> Compilation {
        BlockCompiler::new().compile(blocks)
    }

    fn firing<'a>(c: &'a Compilation, event: &InboundEvent) -> Vec<&'a str> {
        c.handlers
            .iter()
            .filter(|h| h.matcher.matches(event))
            .filter_map(|h| h.block_id.as_deref())
            .collect()
    }

    #[test]
    fn test_empty_sequence_compiles_to_fallback() {
        let c = compile(&[]);
        assert_eq!(c.handlers.len(), 1);
        assert!(c.handlers.is_fallback());
        assert!(c.is_clean());

        let handler = c.handlers.iter().next().unwrap();
        assert_eq!(handler.kind, HandlerKind::Fallback);
        assert!(handler.matcher.matches(&InboundEvent::text(1, "anything")));
    }

    #[test]
    fn test_all_invalid_sequence_compiles_to_fallback_with_warnings() {
        let c = compile(&[
            block("a", BlockKind::Unknown("sticker".into()), json!({})),
            block("b", BlockKind::Condition, json!({ "condition": "process.exit()" })),
        ]);
        assert!(c.handlers.is_fallback());
        let ids: Vec<_> = c.warnings.iter().map(|w| w.block_id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert!(c.warnings[0].reason.contains("sticker"));
    }

    #[test]
    fn test_photo_without_url_is_skipped_silently() {
        let c = compile(&[
            block("p", BlockKind::Photo, json!({ "photoUrl": "", "trigger": "/photo" })),
            block("m", BlockKind::Message, json!({ "response": "ok" })),
        ]);
        assert!(c.is_clean());
        assert_eq!(c.handlers.len(), 1);
        assert_eq!(c.handlers.iter().next().unwrap().block_id.as_deref(), Some("m"));
    }

    #[test]
    fn test_silent_only_sequences_have_no_handlers() {
        let c = compile(&[block("p", BlockKind::Photo, json!({ "photoUrl": "" }))]);
        assert!(c.is_clean());
        assert!(c.handlers.is_empty());
        assert!(!c.handlers.is_fallback());

        let c = compile(&[block(
            "v",
            BlockKind::Variable,
            json!({ "name": "count", "value": "1" }),
        )]);
        assert!(c.is_clean());
        assert_eq!(c.handlers.len(), 0);
        assert!(firing(&c, &InboundEvent::text(1, "hello")).is_empty());
    }

    #[test]
    fn test_partly_invalid_sequence_keeps_no_fallback() {
        let c = compile(&[
            block("p", BlockKind::Photo, json!({ "photoUrl": "" })),
            block("x", BlockKind::Unknown("sticker".into()), json!({})),
        ]);
        assert_eq!(c.warnings.len(), 1);
        assert!(c.handlers.is_empty());
    }

    #[test]
    fn test_command_and_plain_text_do_not_overlap() {
        let c = compile(&[
            block("cmd", BlockKind::Command, json!({ "command": "start", "response": "Hi" })),
            block("echo", BlockKind::Message, json!({ "trigger": "", "response": "Echo" })),
        ]);
        assert_eq!(c.handlers.len(), 2);
        assert_eq!(firing(&c, &InboundEvent::text(1, "/start")), ["cmd"]);
        assert_eq!(firing(&c, &InboundEvent::text(1, "hello")), ["echo"]);
        assert_eq!(firing(&c, &InboundEvent::text(1, " /start")), ["echo"]);
    }

    #[test]
    fn test_keyboard_rows_keep_their_shape() {
        let c = compile(&[block(
            "kb",
            BlockKind::Keyboard,
            json!({ "trigger": "/poll", "buttons": [["Yes", "No"], ["Maybe"]] }),
        )]);
        let handler = c.handlers.iter().next().unwrap();
        assert!(handler.matcher.matches(&InboundEvent::text(1, "/poll")));
        let Action::SendKeyboard { text, rows } = &handler.action else {
            panic!("expected a keyboard action, got {:?}", handler.action);
        };
        assert_eq!(text, DEFAULT_KEYBOARD_TEXT);
        assert_eq!(rows, &vec![vec!["Yes", "No"], vec!["Maybe"]]);
    }

    #[test]
    fn test_keyboard_button_forms() {
        assert_eq!(button_rows(None).unwrap(), default_buttons());
        assert_eq!(button_rows(Some(&json!([]))).unwrap(), default_buttons());
        assert_eq!(
            button_rows(Some(&json!("Yes, No\n\nMaybe,"))).unwrap(),
            vec![vec!["Yes", "No"], vec!["Maybe"]]
        );
        assert_eq!(button_rows(Some(&json!([[1, "two"]]))).unwrap(), vec![vec!["1", "two"]]);
        assert!(button_rows(Some(&json!([[]]))).is_err());
        assert!(button_rows(Some(&json!([["ok", ""]]))).is_err());
        assert!(button_rows(Some(&json!(["flat"]))).is_err());
        assert!(button_rows(Some(&json!(42))).is_err());
    }

    #[test]
    fn test_trigger_metacharacters_are_literal() {
        let c = compile(&[block("m", BlockKind::Message, json!({ "trigger": "a.b*c" }))]);
        assert_eq!(firing(&c, &InboundEvent::text(1, "say A.B*C now")), ["m"]);
        assert!(firing(&c, &InboundEvent::text(1, "axbbbc")).is_empty());
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let c = compile(&[
            block("s", BlockKind::Start, json!({})),
            block("c", BlockKind::Command, json!({})),
            block("b", BlockKind::Button, json!({})),
        ]);
        let summaries = c.handlers.summaries();
        assert_eq!(summaries[0].matcher, "command /start");
        assert!(summaries[0].action.contains(DEFAULT_GREETING));
        assert_eq!(summaries[1].matcher, "command /help");
        assert!(summaries[2].matcher.contains(DEFAULT_CALLBACK_DATA));
        assert!(firing(&c, &InboundEvent::callback("q", 1, "button_click")) == ["b"]);
    }

    #[test]
    fn test_bad_command_names_are_warnings() {
        let c = compile(&[
            block("slash", BlockKind::Command, json!({ "command": "/" })),
            block("space", BlockKind::Command, json!({ "command": "two words" })),
            block("ok", BlockKind::Command, json!({ "command": "/menu" })),
        ]);
        assert_eq!(c.warnings.len(), 2);
        assert_eq!(c.handlers.len(), 1);
        assert_eq!(firing(&c, &InboundEvent::text(1, "/menu")), ["ok"]);
    }

    #[test]
    fn test_variables_are_visible_only_to_later_conditions() {
        let condition = json!({ "condition": "msg.text == secret" });
        let c = compile(&[
            block("early", BlockKind::Condition, condition.clone()),
            block("var", BlockKind::Variable, json!({ "name": "secret", "value": "open" })),
            block("late", BlockKind::Condition, condition),
        ]);
        assert_eq!(c.warnings.len(), 1);
        assert_eq!(c.warnings[0].block_id, "early");
        assert_eq!(c.handlers.len(), 1);

        let handler = c.handlers.iter().next().unwrap();
        let Action::Branch { condition, .. } = &handler.action else {
            panic!("expected a branch action");
        };
        assert!(condition.evaluate("open"));
        assert!(!condition.evaluate("closed"));
    }

    #[test]
    fn test_variable_values_and_names() {
        let c = compile(&[
            block("n", BlockKind::Variable, json!({ "name": "limit", "value": 3 })),
            block("bad", BlockKind::Variable, json!({ "name": "msg", "value": 1 })),
            block("cond", BlockKind::Condition, json!({ "condition": "msg.text.length > limit" })),
        ]);
        assert_eq!(c.warnings.len(), 1);
        assert_eq!(c.warnings[0].block_id, "bad");
        let Action::Branch { condition, .. } = &c.handlers.iter().next().unwrap().action else {
            panic!("expected a branch action");
        };
        assert!(condition.evaluate("four"));
        assert!(!condition.evaluate("abc"));
    }

    #[test]
    fn test_condition_matches_every_message() {
        let c = compile(&[block("cond", BlockKind::Condition, json!({}))]);
        assert!(c.is_clean());
        assert_eq!(firing(&c, &InboundEvent::text(1, "/start")), ["cond"]);
        assert!(firing(&c, &InboundEvent::callback("q", 1, "x")).is_empty());
    }
}

//! Standard host capabilities.
//!
//! The table the `mdscript` binary installs: array and object helpers,
//! string helpers, Markdown output, the document title, and an asynchronous
//! clipboard write.  Output and document state accumulate in a [`HostState`]
//! shared with the caller.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::OnceLock;

use log::trace;
use regex::Regex;

use crate::script::capability::{
    arg, arg_array, arg_index, arg_object, arg_str, Arity, Capabilities, Capability,
    CapabilityError, CapabilityResult,
};
use crate::script::value::{Object, Value};

/// Everything the standard capabilities write to.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HostState {
    /// Markdown lines appended by `markdownPrint`.
    pub output: Vec<String>,
    pub title: Option<String>,
    /// Last text written by `windowClipboardWrite`.
    pub clipboard: Option<String>,
}

pub type SharedHost = Rc<RefCell<HostState>>;

#[derive(Debug, Default, Clone)]
pub struct HostOptions {
    /// Also write clipboard text to this file.
    pub clipboard_file: Option<PathBuf>,
}

/// Build the standard capability table over `state`.
pub fn standard(state: &SharedHost, options: &HostOptions) -> Capabilities {
    let mut caps = Capabilities::new();

    // ── Arrays ────────────────────────────────────────────────────────────────

    caps.register(Capability::sync("arrayNew", Arity::VARIADIC, |args| {
        Ok(Value::new_array(args))
    }));
    caps.register(Capability::sync("arrayLength", Arity::Exact(1), |args| {
        let array = arg_array(&args, 0)?;
        let len = array.borrow().len();
        Ok(Value::Number(len as f64))
    }));
    caps.register(Capability::sync("arrayGet", Arity::Exact(2), |args| {
        let array = arg_array(&args, 0)?;
        let index = arg_index(&args, 1)?;
        let items = array.borrow();
        items.get(index).cloned().ok_or_else(|| out_of_range(index, items.len()))
    }));
    caps.register(Capability::sync("arraySet", Arity::Exact(3), |args| {
        let array = arg_array(&args, 0)?;
        let index = arg_index(&args, 1)?;
        let value = arg(&args, 2).clone();
        let mut items = array.borrow_mut();
        let len = items.len();
        let slot = items.get_mut(index).ok_or_else(|| out_of_range(index, len))?;
        *slot = value.clone();
        Ok(value)
    }));
    caps.register(Capability::sync("arrayPush", Arity::at_least(1), |mut args| {
        let array = arg_array(&args, 0)?;
        array.borrow_mut().extend(args.drain(1..));
        Ok(Value::Array(array))
    }));
    caps.register(Capability::sync("arrayJoin", Arity::Exact(2), |args| {
        let array = arg_array(&args, 0)?;
        let separator = arg_str(&args, 1)?;
        let joined = array
            .borrow()
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(separator);
        Ok(Value::Str(joined))
    }));

    // ── Objects ───────────────────────────────────────────────────────────────

    caps.register(Capability::sync("objectNew", Arity::VARIADIC, |args| {
        if args.len() % 2 != 0 {
            return Err(CapabilityError::new("expected key/value pairs"));
        }
        let mut object = Object::new();
        for (i, pair) in args.chunks(2).enumerate() {
            let key = arg_str(&args, i * 2)?;
            object.insert(key, pair[1].clone());
        }
        Ok(Value::new_object(object))
    }));
    caps.register(Capability::sync("objectKeys", Arity::Exact(1), |args| {
        let object = arg_object(&args, 0)?;
        let keys = object.borrow().keys().map(Value::from).collect();
        Ok(Value::new_array(keys))
    }));
    caps.register(Capability::sync(
        "objectGet",
        Arity::Range {
            min: 2,
            max: Some(3),
        },
        |args| {
            let object = arg_object(&args, 0)?;
            let key = arg_str(&args, 1)?;
            let found = object.borrow().get(key).cloned();
            Ok(found.unwrap_or_else(|| arg(&args, 2).clone()))
        },
    ));
    caps.register(Capability::sync("objectSet", Arity::Exact(3), |args| {
        let object = arg_object(&args, 0)?;
        let key = arg_str(&args, 1)?;
        let value = arg(&args, 2).clone();
        object.borrow_mut().insert(key, value.clone());
        Ok(value)
    }));
    caps.register(Capability::sync("objectHas", Arity::Exact(2), |args| {
        let object = arg_object(&args, 0)?;
        let key = arg_str(&args, 1)?;
        let has = object.borrow().contains_key(key);
        Ok(Value::Bool(has))
    }));

    // ── Strings ───────────────────────────────────────────────────────────────

    caps.register(Capability::sync("stringLength", Arity::Exact(1), |args| {
        let s = arg_str(&args, 0)?;
        Ok(Value::Number(s.chars().count() as f64))
    }));
    caps.register(Capability::sync("stringNew", Arity::Exact(1), |args| {
        Ok(Value::Str(arg(&args, 0).to_string()))
    }));

    // ── Markdown and document ─────────────────────────────────────────────────

    let host = Rc::clone(state);
    caps.register(Capability::sync("markdownPrint", Arity::VARIADIC, move |args| {
        let mut host = host.borrow_mut();
        for value in &args {
            match value {
                Value::Array(items) => {
                    host.output.extend(items.borrow().iter().map(Value::to_string));
                }
                other => host.output.push(other.to_string()),
            }
        }
        Ok(Value::Null)
    }));
    caps.register(Capability::sync("markdownEscape", Arity::Exact(1), |args| {
        let text = arg_str(&args, 0)?;
        Ok(Value::Str(escape_markdown(text)?))
    }));
    let host = Rc::clone(state);
    caps.register(Capability::sync("documentSetTitle", Arity::Exact(1), move |args| {
        host.borrow_mut().title = Some(arg(&args, 0).to_string());
        Ok(Value::Null)
    }));

    // ── Window ────────────────────────────────────────────────────────────────

    let host = Rc::clone(state);
    let clipboard_file = options.clipboard_file.clone();
    caps.register(Capability::asynchronous(
        "windowClipboardWrite",
        Arity::Exact(1),
        move |args| {
            let host = Rc::clone(&host);
            let path = clipboard_file.clone();
            let text = arg(&args, 0).to_string();
            clipboard_write(host, path, text)
        },
    ));

    caps
}

async fn clipboard_write(host: SharedHost, path: Option<PathBuf>, text: String) -> CapabilityResult {
    match &path {
        Some(path) => {
            trace!("clipboard: writing {} bytes to {}", text.len(), path.display());
            tokio::fs::write(path, &text)
                .await
                .map_err(|e| CapabilityError::new(format!("{}: {e}", path.display())))?;
        }
        None => tokio::task::yield_now().await,
    }
    host.borrow_mut().clipboard = Some(text);
    Ok(Value::Null)
}

fn out_of_range(index: usize, len: usize) -> CapabilityError {
    CapabilityError::new(format!("index {index} out of range for array of length {len}"))
}

/// Backslash-escape every Markdown metacharacter in `text`.
pub fn escape_markdown(text: &str) -> Result<String, CapabilityError> {
    static METACHARS: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    let re = METACHARS
        .get_or_init(|| Regex::new(r#"([\\\[\]()<>"'*_~`#=+|-])"#))
        .as_ref()
        .map_err(|e| CapabilityError::new(e.to_string()))?;
    Ok(re.replace_all(text, r"\$1").into_owned())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

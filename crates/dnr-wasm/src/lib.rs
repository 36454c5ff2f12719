//! WebAssembly bindings for dnr-forge
//!
//! Lets the extension compile downloaded lists in its background worker and
//! hand the batches straight to the declarative rule API.

use wasm_bindgen::prelude::*;

use dnr_compiler::{compile_lists, looks_like_filter_list, CompilerConfig, FilterList};

/// Compile lists into `{ batches, cosmetic, stats, fingerprint }`.
///
/// `names` and `texts` are parallel string arrays; `whitelist` is an array of
/// domains (may be empty).
#[wasm_bindgen]
pub fn compile_filter_lists(
    names: JsValue,
    texts: JsValue,
    whitelist: JsValue,
    batch_size: Option<u32>,
) -> Result<JsValue, JsValue> {
    let names = string_array(&names, "List name")?;
    let texts = string_array(&texts, "List text")?;
    if names.len() != texts.len() {
        return Err(JsValue::from_str(&format!(
            "Got {} list names but {} list texts",
            names.len(),
            texts.len()
        )));
    }
    if texts.is_empty() {
        return Err(JsValue::from_str("No list texts provided"));
    }

    let whitelist = if whitelist.is_undefined() || whitelist.is_null() {
        Vec::new()
    } else {
        string_array(&whitelist, "Whitelist entry")?
    };
    let config = build_config(whitelist, batch_size).map_err(|e| JsValue::from_str(&e))?;

    let lists: Vec<FilterList<'_>> = names
        .iter()
        .zip(&texts)
        .map(|(name, text)| FilterList::new(name, text))
        .collect();
    let ruleset = compile_lists(&lists, &config);

    let json = serde_json::to_string(&ruleset)
        .map_err(|e| JsValue::from_str(&format!("Failed to serialize rules: {}", e)))?;
    js_sys::JSON::parse(&json)
}

/// Sanity check for a freshly downloaded list before it replaces the cached copy.
#[wasm_bindgen]
pub fn is_filter_list(text: &str) -> bool {
    looks_like_filter_list(text)
}

fn string_array(value: &JsValue, what: &str) -> Result<Vec<String>, JsValue> {
    js_sys::Array::from(value)
        .iter()
        .map(|item| {
            item.as_string()
                .ok_or_else(|| JsValue::from_str(&format!("{what} must be a string")))
        })
        .collect()
}

fn build_config(whitelist: Vec<String>, batch_size: Option<u32>) -> Result<CompilerConfig, String> {
    let mut config = CompilerConfig {
        whitelist,
        ..CompilerConfig::default()
    };
    if let Some(size) = batch_size {
        config.batch_size = size as usize;
    }
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

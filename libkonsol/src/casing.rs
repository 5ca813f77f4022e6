// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The wire speaks lowerCamelCase, everything behind the server loop
//! speaks snake_case. These two transforms are applied exactly once per
//! direction, at the loop's read and write sites; nothing below the
//! loop ever sees a camelCase key.

use serde_json::Value;

/// Re-encodes every object key from lowerCamelCase to snake_case.
/// Applied to inbound messages.
pub fn keys_to_snake(value: Value) -> Value {
    map_keys(value, &camel_to_snake)
}

/// Re-encodes every object key from snake_case to lowerCamelCase.
/// Applied to outbound messages.
pub fn keys_to_camel(value: Value) -> Value {
    map_keys(value, &snake_to_camel)
}

fn map_keys(value: Value, key_fn: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, value)| (key_fn(&key), map_keys(value, key_fn)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|item| map_keys(item, key_fn)).collect())
        }
        scalar => scalar,
    }
}

fn camel_to_snake(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn snake_to_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut capitalize_next = false;
    for ch in key.chars() {
        if ch == '_' {
            if capitalize_next {
                // A run of underscores: only the last one marks a
                // segment boundary, the rest pass through so the
                // inverse transform can restore them.
                out.push('_');
            }
            capitalize_next = true;
        } else if capitalize_next {
            out.push(ch.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            out.push(ch);
        }
    }
    if capitalize_next {
        out.push('_');
    }
    out
}

// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Display-name lookup through Contacts.app.
//!
//! Lookups are slow (a full AppleScript scan of the address book), so
//! every answer is cached for the process lifetime, misses included.

use std::collections::HashMap;
use std::sync::Mutex;

use tapback_core::{ContactResolver, normalize_handle};
use tracing::debug;

use crate::applescript::{escape_applescript, run_osascript_blocking};

/// [`ContactResolver`] backed by Contacts.app.
pub struct ContactsApp {
    osascript: String,
    cache: Mutex<HashMap<String, Option<String>>>,
}

impl ContactsApp {
    pub fn new(osascript: impl Into<String>) -> Self {
        Self {
            osascript: osascript.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Number of cached handles, hits and misses alike.
    pub fn cached_len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn lookup(&self, key: &str) -> Option<String> {
        let script = lookup_script(key);
        match run_osascript_blocking(&self.osascript, &script) {
            Ok(output) if output.status.success() => {
                let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
                (!name.is_empty()).then_some(name)
            }
            Ok(output) => {
                debug!(status = %output.status, "contacts lookup failed");
                None
            }
            Err(e) => {
                debug!(error = %e, "contacts lookup could not run");
                None
            }
        }
    }
}

impl ContactResolver for ContactsApp {
    fn display_name(&self, handle: &str) -> Option<String> {
        let key = normalize_handle(handle);
        if key.is_empty() {
            return None;
        }
        if let Ok(cache) = self.cache.lock()
            && let Some(hit) = cache.get(&key)
        {
            return hit.clone();
        }

        let name = self.lookup(&key);
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, name.clone());
        }
        name
    }
}

/// AppleScript that scans people for a matching phone (digits only) or email.
fn lookup_script(key: &str) -> String {
    format!(
        r#"on digitsOf(s)
    set t to s as text
    set out to ""
    repeat with i from 1 to count of t
        set ch to character i of t
        if ch is in "+0123456789" then set out to out & ch
    end repeat
    return out
end digitsOf

set target to "{key}"
set targetDigits to digitsOf(target)
set foundName to ""
tell application "Contacts"
    repeat with p in people
        repeat with ph in (phones of p)
            try
                set v to my digitsOf(value of ph as text)
                if v is not "" and v is equal to targetDigits then
                    set foundName to name of p as text
                    exit repeat
                end if
            end try
        end repeat
        if foundName is not "" then exit repeat
        repeat with em in (emails of p)
            try
                if (value of em as text) is equal to target then
                    set foundName to name of p as text
                    exit repeat
                end if
            end try
        end repeat
        if foundName is not "" then exit repeat
    end repeat
end tell
return foundName"#,
        key = escape_applescript(key)
    )
}

//! OAuth scope names and the scope sets each tool requests.

/// Read-only access to Gmail.
pub const GMAIL_READONLY: &str = "https://www.googleapis.com/auth/gmail.readonly";
/// Read/write access to Gmail, without permanent deletion.
pub const GMAIL_MODIFY: &str = "https://www.googleapis.com/auth/gmail.modify";
/// Full Gmail access.
pub const GMAIL_FULL: &str = "https://mail.google.com/";
/// Read-only access to calendars.
pub const CALENDAR_READONLY: &str = "https://www.googleapis.com/auth/calendar.readonly";
/// Full calendar access.
pub const CALENDAR: &str = "https://www.googleapis.com/auth/calendar";

/// Pairs of (broad, narrow) scopes where holding `broad` grants `narrow`.
const IMPLIED: [(&str, &str); 4] = [
    (GMAIL_MODIFY, GMAIL_READONLY),
    (GMAIL_FULL, GMAIL_READONLY),
    (GMAIL_FULL, GMAIL_MODIFY),
    (CALENDAR, CALENDAR_READONLY),
];

/// Scopes requested by `gcalendar`.
///
/// Includes `gmail.modify` so the token it writes also serves `gmail-today`.
pub fn calendar_defaults() -> Vec<String> {
    vec![
        GMAIL_MODIFY.to_string(),
        CALENDAR_READONLY.to_string(),
        CALENDAR.to_string(),
    ]
}

/// Scopes requested by `gmail-today`.
pub fn gmail_defaults() -> Vec<String> {
    vec![GMAIL_READONLY.to_string()]
}

/// Returns true if the `granted` scope gives at least `required` access.
pub fn covers(granted: &str, required: &str) -> bool {
    granted == required
        || IMPLIED
            .iter()
            .any(|(broad, narrow)| granted == *broad && required == *narrow)
}

/// Returns true if every required scope is covered by some granted scope.
pub fn satisfies(granted: &[String], required: &[String]) -> bool {
    required
        .iter()
        .all(|req| granted.iter().any(|g| covers(g, req)))
}

/// Returns the scope set in canonical order, for use as a lookup key.
pub fn canonical(scopes: &[String]) -> Vec<String> {
    let mut key = scopes.to_vec();
    key.sort();
    key.dedup();
    key
}

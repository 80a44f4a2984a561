//! Prompt helpers.

use std::io::Write;

use crate::session::SessionSnapshot;

/// Prompt text for the current user and group, e.g. `Alice@lobby> `
pub fn prompt_for(snapshot: &SessionSnapshot) -> String {
    let user = if snapshot.user_name.is_empty() {
        "anonymous"
    } else {
        snapshot.user_name.as_str()
    };
    match snapshot.joined_group.as_deref() {
        Some(group) => format!("{}@{}> ", user, group),
        None => format!("{}> ", user),
    }
}

/// Redisplay the prompt after printing output
pub fn redisplay_prompt(prompt: &str) {
    print!("{}", prompt);
    std::io::stdout().flush().ok();
}

//! Input validation for user-provided values

/// Maximum length for a single outgoing message. Generous, but keeps a
/// runaway paste from becoming a megabyte request body.
const MAX_MESSAGE_LEN: usize = 8000;
const MAX_NAME_LEN: usize = 30;

/// Validates a display name before login
pub fn validate_user_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Name cannot be empty".to_string());
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(format!("Name too long (max {} characters)", MAX_NAME_LEN));
    }

    // Names cannot contain control characters
    if name.contains(|c: char| c.is_control()) {
        return Err("Name contains invalid characters".to_string());
    }

    Ok(())
}

/// Validates an outgoing chat message
pub fn validate_message(msg: &str) -> Result<(), String> {
    if msg.trim().is_empty() {
        return Err("Message cannot be empty".to_string());
    }

    if msg.chars().count() > MAX_MESSAGE_LEN {
        return Err(format!(
            "Message too long (max {} characters)",
            MAX_MESSAGE_LEN
        ));
    }

    Ok(())
}

/// Sanitizes a message by stripping control characters (newlines and tabs
/// stay, they carry formatting) and truncating to the length limit
pub fn sanitize_message(msg: &str) -> String {
    msg.chars()
        .filter(|&c| !c.is_control() || c == '\n' || c == '\t')
        .take(MAX_MESSAGE_LEN)
        .collect()
}

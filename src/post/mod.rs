//! Promotional post formatting.
//!
//! Renders the fixed-layout post that is sent as the photo caption. The
//! layout is part of the bot's public behavior and must not drift, so the
//! tests pin it byte for byte.

use thiserror::Error;

/// Errors produced while formatting a post.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PostError {
    /// The bot's display name could not be retrieved.
    #[error("bot display name is missing")]
    MissingDisplayName,
}

/// Renders the promotional post for a bot.
///
/// `username` may be passed with or without the leading `@`; the post always
/// renders it without.
///
/// # Errors
///
/// Returns [`PostError::MissingDisplayName`] if `display_name` is empty, so
/// callers can report "could not retrieve name" instead of emitting a
/// malformed post.
pub fn format_post(
    display_name: &str,
    username: &str,
    language: &str,
    group: &str,
    description: &str,
) -> Result<String, PostError> {
    if display_name.trim().is_empty() {
        return Err(PostError::MissingDisplayName);
    }

    let username = username.trim_start_matches('@');

    Ok(format!(
        "**{display_name}**\n\
         ━━━━━━━━━━\n\
         ➧ Username: @{username}\n\
         ➧ Idioma: {language}\n\
         ➧ Grupo: {group}\n\
         ➧ Tags:\n\
         \n\
         **ℹ️ Descrição:**\n\
         {description}\n\
         ━━━━━━━━━━\n\
         **Link:** T.me/{username}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_matches_template_exactly() {
        let post = format_post(
            "TestBot",
            "testbot",
            "English",
            "Test Group",
            "This is a test description.",
        )
        .unwrap();

        let expected = "**TestBot**\n\
                        ━━━━━━━━━━\n\
                        ➧ Username: @testbot\n\
                        ➧ Idioma: English\n\
                        ➧ Grupo: Test Group\n\
                        ➧ Tags:\n\
                        \n\
                        **ℹ️ Descrição:**\n\
                        This is a test description.\n\
                        ━━━━━━━━━━\n\
                        **Link:** T.me/testbot";
        assert_eq!(post, expected);
    }

    #[test]
    fn test_username_prefix_is_stripped() {
        let post = format_post("Name", "@samplebot", "Inglês", "g", "d").unwrap();
        assert!(post.contains("➧ Username: @samplebot\n"));
        assert!(post.ends_with("**Link:** T.me/samplebot"));
        // No double @ anywhere.
        assert!(!post.contains("@@"));
    }

    #[test]
    fn test_empty_display_name_is_an_error() {
        assert_eq!(
            format_post("", "testbot", "l", "g", "d"),
            Err(PostError::MissingDisplayName)
        );
        assert_eq!(
            format_post("   ", "testbot", "l", "g", "d"),
            Err(PostError::MissingDisplayName)
        );
    }

    #[test]
    fn test_tags_line_is_left_blank() {
        let post = format_post("Name", "bot", "l", "g", "d").unwrap();
        assert!(post.contains("➧ Tags:\n\n**ℹ️ Descrição:**"));
    }
}

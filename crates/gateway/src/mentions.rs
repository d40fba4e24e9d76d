//! Mention parsing for message content: `@everyone`, `<@role:ID>`,
//! `<@user:ID>`, `#channel:ID`. Kept deliberately simple — this is a
//! server-side re-derivation of whatever markup the (unspecified) client
//! renders, not a full markdown parser.

use uuid::Uuid;

#[derive(Debug, Default, Clone)]
pub struct ParsedMentions {
    pub mention_everyone: bool,
    pub roles: Vec<Uuid>,
    pub users: Vec<Uuid>,
}

/// Extracts `<@role:UUID>`, `<@user:UUID>` tokens and an `@everyone`
/// literal from raw message content. Honoring `mention_everyone` /
/// `roles` for notification purposes is the caller's job (gated on
/// `MENTION_EVERYONE`); this function always reports what's *present* in
/// the text.
pub fn parse(content: &str) -> ParsedMentions {
    let mut out = ParsedMentions { mention_everyone: content.contains("@everyone"), ..Default::default() };

    for token in content.split_whitespace() {
        if let Some(rest) = token.strip_prefix("<@role:").and_then(|s| s.strip_suffix('>')) {
            if let Ok(id) = Uuid::parse_str(rest) {
                out.roles.push(id);
            }
        } else if let Some(rest) = token.strip_prefix("<@user:").and_then(|s| s.strip_suffix('>')) {
            if let Ok(id) = Uuid::parse_str(rest) {
                out.users.push(id);
            }
        }
    }
    out.roles.sort();
    out.roles.dedup();
    out.users.sort();
    out.users.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_has_no_mentions() {
        let parsed = parse("just saying hello");
        assert!(!parsed.mention_everyone);
        assert!(parsed.roles.is_empty());
        assert!(parsed.users.is_empty());
    }

    #[test]
    fn detects_everyone_literal() {
        let parsed = parse("@everyone heads up");
        assert!(parsed.mention_everyone);
    }

    #[test]
    fn parses_role_and_user_tokens() {
        let role = Uuid::new_v4();
        let user = Uuid::new_v4();
        let content = format!("hey <@role:{role}> and <@user:{user}> check this out");
        let parsed = parse(&content);
        assert_eq!(parsed.roles, vec![role]);
        assert_eq!(parsed.users, vec![user]);
        assert!(!parsed.mention_everyone);
    }

    #[test]
    fn duplicate_tokens_are_deduped_and_sorted() {
        let role = Uuid::new_v4();
        let content = format!("<@role:{role}> <@role:{role}>");
        let parsed = parse(&content);
        assert_eq!(parsed.roles, vec![role]);
    }

    #[test]
    fn malformed_uuid_inside_token_is_ignored() {
        let parsed = parse("<@user:not-a-uuid>");
        assert!(parsed.users.is_empty());
    }
}

//! Replay commands as read from CSV and their parsed form.

use crate::amount::TokenAmount;
use crate::{PostId, UserId};
use serde::Deserialize;
use std::str::FromStr;

/// Raw command record as read from CSV.
///
/// Header: `type,user,post,reshare_of,amount`. Columns a command does not use
/// are left empty.
#[derive(Debug, Deserialize)]
pub struct CommandRecord {
    /// Command type: register, post, like, unlike, purchase, reward
    #[serde(rename = "type")]
    pub cmd_type: String,

    /// Acting user
    pub user: UserId,

    /// Post being created, liked or unliked
    pub post: Option<PostId>,

    /// Original post when `post` is a reshare
    pub reshare_of: Option<PostId>,

    /// Token amount (purchase only)
    pub amount: Option<String>,
}

impl CommandRecord {
    /// Parses the raw CSV record into a typed command.
    ///
    /// Returns `None` if the record is invalid (unknown type, missing post or amount).
    pub fn parse(&self) -> Option<ParsedCommand> {
        let kind = match self.cmd_type.trim().to_lowercase().as_str() {
            "register" => CommandKind::Register,
            "post" => CommandKind::Post {
                post: self.post?,
                reshare_of: self.reshare_of,
            },
            "like" => CommandKind::Like(self.post?),
            "unlike" => CommandKind::Unlike(self.post?),
            "purchase" => CommandKind::Purchase(self.parse_amount()?),
            "reward" => CommandKind::Reward,
            _ => return None,
        };

        Some(ParsedCommand {
            user: self.user,
            kind,
        })
    }

    fn parse_amount(&self) -> Option<TokenAmount> {
        let trimmed = self.amount.as_ref()?.trim();
        if trimmed.is_empty() {
            return None;
        }
        TokenAmount::from_str(trimmed).ok()
    }
}

/// A parsed command ready for replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub user: UserId,
    pub kind: CommandKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    /// Open the user's account with the starting balance.
    Register,

    /// Publish a post authored by the user, optionally resharing another post.
    Post {
        post: PostId,
        reshare_of: Option<PostId>,
    },

    /// Like a post, paying the fee to its (original) author.
    Like(PostId),

    /// Withdraw a like. The fee stays with the author.
    Unlike(PostId),

    /// Buy tokens.
    Purchase(TokenAmount),

    /// Claim the daily reward.
    Reward,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        cmd_type: &str,
        post: Option<PostId>,
        reshare_of: Option<PostId>,
        amount: Option<&str>,
    ) -> CommandRecord {
        CommandRecord {
            cmd_type: cmd_type.to_string(),
            user: 1,
            post,
            reshare_of,
            amount: amount.map(str::to_string),
        }
    }

    #[test]
    fn test_parse_like_and_unlike() {
        let parsed = record("like", Some(7), None, None).parse().unwrap();
        assert_eq!(parsed.user, 1);
        assert_eq!(parsed.kind, CommandKind::Like(7));

        let parsed = record("unlike", Some(7), None, None).parse().unwrap();
        assert_eq!(parsed.kind, CommandKind::Unlike(7));
    }

    #[test]
    fn test_parse_reshare() {
        let parsed = record("post", Some(8), Some(7), None).parse().unwrap();
        assert_eq!(
            parsed.kind,
            CommandKind::Post {
                post: 8,
                reshare_of: Some(7)
            }
        );
    }

    #[test]
    fn test_parse_purchase() {
        let parsed = record("purchase", None, None, Some(" 2.5 ")).parse().unwrap();
        match parsed.kind {
            CommandKind::Purchase(amount) => assert_eq!(amount.to_string(), "2.5000"),
            other => panic!("Expected Purchase, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_handles_case_and_whitespace() {
        let parsed = record("  Register ", None, None, None).parse().unwrap();
        assert_eq!(parsed.kind, CommandKind::Register);
    }

    #[test]
    fn test_parse_rejects_incomplete_records() {
        assert!(record("like", None, None, None).parse().is_none());
        assert!(record("post", None, Some(7), None).parse().is_none());
        assert!(record("purchase", None, None, None).parse().is_none());
        assert!(record("purchase", None, None, Some("")).parse().is_none());
        assert!(record("purchase", None, None, Some("lots")).parse().is_none());
        assert!(record("tip", Some(7), None, None).parse().is_none());
    }
}

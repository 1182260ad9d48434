//! Post ownership directory used by the replay host.
//!
//! The ledger never owns post data; this directory stands in for the post
//! repository and answers who should be paid when a post is liked.

use crate::error::{LedgerError, Result};
use crate::{PostId, UserId};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostRecord {
    pub author: UserId,
    pub reshare_of: Option<PostId>,
}

#[derive(Debug, Default)]
pub struct PostDirectory {
    posts: HashMap<PostId, PostRecord>,
}

impl PostDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a post. Returns `false` if the id is already taken.
    pub fn publish(&mut self, post_id: PostId, author: UserId, reshare_of: Option<PostId>) -> bool {
        if self.posts.contains_key(&post_id) {
            return false;
        }
        self.posts.insert(post_id, PostRecord { author, reshare_of });
        true
    }

    pub fn get(&self, post_id: PostId) -> Option<&PostRecord> {
        self.posts.get(&post_id)
    }

    /// The user credited when `post_id` is liked.
    ///
    /// Likes on a reshare pay the author of the original post; if the
    /// original is unknown the resharer is paid instead.
    pub fn credit_recipient(&self, post_id: PostId) -> Result<UserId> {
        let post = self
            .posts
            .get(&post_id)
            .ok_or(LedgerError::UnknownPost { post_id })?;

        let original_author = post
            .reshare_of
            .and_then(|original| self.posts.get(&original))
            .map(|original| original.author);

        Ok(original_author.unwrap_or(post.author))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_post_pays_author() {
        let mut posts = PostDirectory::new();
        assert!(posts.publish(10, 2, None));
        assert_eq!(posts.credit_recipient(10).unwrap(), 2);
    }

    #[test]
    fn test_reshare_pays_original_author() {
        let mut posts = PostDirectory::new();
        posts.publish(10, 2, None);
        posts.publish(11, 3, Some(10));
        assert_eq!(posts.credit_recipient(11).unwrap(), 2);
    }

    #[test]
    fn test_reshare_of_unknown_post_pays_resharer() {
        let mut posts = PostDirectory::new();
        posts.publish(11, 3, Some(99));
        assert_eq!(posts.credit_recipient(11).unwrap(), 3);
    }

    #[test]
    fn test_duplicate_and_unknown_posts() {
        let mut posts = PostDirectory::new();
        assert!(posts.publish(10, 2, None));
        assert!(!posts.publish(10, 3, None));
        assert_eq!(posts.get(10).unwrap().author, 2);

        assert!(matches!(
            posts.credit_recipient(42),
            Err(LedgerError::UnknownPost { post_id: 42 })
        ));
    }
}

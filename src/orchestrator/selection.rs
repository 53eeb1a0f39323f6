//! The "currently selected guild" as one owned value.
//!
//! Every change bumps an epoch. A fetch run carries the token it was started
//! with, and its result is only applied while that token is still current.

use parking_lot::RwLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionToken {
    guild_id: String,
    epoch: u64,
}

impl SelectionToken {
    pub fn guild_id(&self) -> &str {
        &self.guild_id
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

#[derive(Debug, Default)]
struct Inner {
    guild_id: Option<String>,
    epoch: u64,
}

#[derive(Debug, Default)]
pub struct ActiveGuild {
    inner: RwLock<Inner>,
}

impl ActiveGuild {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a guild. Re-selecting the current guild still starts a new epoch
    /// since module state is reloaded from scratch.
    pub fn select(&self, guild_id: &str) -> SelectionToken {
        let mut inner = self.inner.write();
        inner.epoch += 1;
        inner.guild_id = Some(guild_id.to_string());
        SelectionToken {
            guild_id: guild_id.to_string(),
            epoch: inner.epoch,
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.epoch += 1;
        inner.guild_id = None;
    }

    pub fn current(&self) -> Option<String> {
        self.inner.read().guild_id.clone()
    }

    /// Token for the current selection, e.g. for a manual refresh
    pub fn token(&self) -> Option<SelectionToken> {
        let inner = self.inner.read();
        inner.guild_id.as_ref().map(|id| SelectionToken {
            guild_id: id.clone(),
            epoch: inner.epoch,
        })
    }

    pub fn is_current(&self, token: &SelectionToken) -> bool {
        let inner = self.inner.read();
        inner.epoch == token.epoch && inner.guild_id.as_deref() == Some(token.guild_id.as_str())
    }
}

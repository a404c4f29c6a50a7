//! Route filters.
//!
//! A [`Filter`] is a pure predicate over the [`Context`]. Filters must be
//! total: an update that lacks the field a filter looks at makes the filter
//! return `false`, never panic.
//!
//! Filters compose with [`and`], [`or`] and [`not`] (or the `&`, `|` and `!`
//! operators). Composition evaluates left to right and short-circuits, so a
//! cheap guard placed first protects the more specific checks after it.
//!
//! ```rust,ignore
//! use parley_framework::filter::{self, command, has_message, text_contains};
//!
//! router.on(command("start"), start);
//! router.on(has_message() & !text_contains("spam"), chat);
//! router.on(filter::or([command("help"), command("h")]), help);
//! ```

use std::fmt;
use std::ops::{BitAnd, BitOr, Not};
use std::sync::Arc;

use parley_core::ChatKind;

use crate::context::Context;

/// A cloneable, type-erased predicate over a [`Context`].
#[derive(Clone)]
pub struct Filter(Arc<dyn Fn(&Context) -> bool + Send + Sync>);

impl Filter {
    /// Creates a filter from a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Evaluates the filter.
    pub fn check(&self, ctx: &Context) -> bool {
        (self.0)(ctx)
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Filter")
    }
}

impl BitAnd for Filter {
    type Output = Filter;

    fn bitand(self, rhs: Filter) -> Filter {
        and([self, rhs])
    }
}

impl BitOr for Filter {
    type Output = Filter;

    fn bitor(self, rhs: Filter) -> Filter {
        or([self, rhs])
    }
}

impl Not for Filter {
    type Output = Filter;

    fn not(self) -> Filter {
        not(self)
    }
}

// =============================================================================
// Combinators
// =============================================================================

/// Matches when every filter matches. An empty list matches everything.
pub fn and(filters: impl IntoIterator<Item = Filter>) -> Filter {
    let filters: Vec<Filter> = filters.into_iter().collect();
    Filter::new(move |ctx| filters.iter().all(|f| f.check(ctx)))
}

/// Matches when any filter matches. An empty list matches nothing.
pub fn or(filters: impl IntoIterator<Item = Filter>) -> Filter {
    let filters: Vec<Filter> = filters.into_iter().collect();
    Filter::new(move |ctx| filters.iter().any(|f| f.check(ctx)))
}

/// Inverts a filter.
pub fn not(filter: Filter) -> Filter {
    Filter::new(move |ctx| !filter.check(ctx))
}

/// Matches every update.
pub fn any() -> Filter {
    Filter::new(|_| true)
}

// =============================================================================
// Message filters
// =============================================================================

/// Matches updates that carry a message.
pub fn has_message() -> Filter {
    Filter::new(|ctx| ctx.message().is_some())
}

/// Matches messages whose text is exactly `text`.
pub fn text_equals(text: impl Into<String>) -> Filter {
    let text = text.into();
    Filter::new(move |ctx| ctx.text() == Some(text.as_str()))
}

/// Matches messages whose text contains `needle`.
pub fn text_contains(needle: impl Into<String>) -> Filter {
    let needle = needle.into();
    Filter::new(move |ctx| ctx.text().is_some_and(|t| t.contains(needle.as_str())))
}

/// Matches messages whose text starts with `prefix`.
pub fn text_starts_with(prefix: impl Into<String>) -> Filter {
    let prefix = prefix.into();
    Filter::new(move |ctx| ctx.text().is_some_and(|t| t.starts_with(prefix.as_str())))
}

/// Matches the bot command `/name`.
///
/// The command must be followed by the end of the text, whitespace, or an
/// `@botname` mention: `/start`, `/start now` and `/start@my_bot` match
/// `command("start")`, `/startup` does not. Use [`command_prefix`] for plain
/// prefix matching.
pub fn command(name: impl Into<String>) -> Filter {
    let trigger = format!("/{}", name.into());
    Filter::new(move |ctx| {
        let Some(rest) = ctx.text().and_then(|t| t.strip_prefix(trigger.as_str())) else {
            return false;
        };
        rest.chars()
            .next()
            .is_none_or(|c| c.is_whitespace() || c == '@')
    })
}

/// Matches any message whose text starts with `/name`, including longer
/// commands sharing the prefix (`/startup` matches `command_prefix("start")`).
pub fn command_prefix(name: impl Into<String>) -> Filter {
    and([has_message(), text_starts_with(format!("/{}", name.into()))])
}

/// Matches messages sent in a chat of the given kind.
pub fn chat_kind(kind: ChatKind) -> Filter {
    Filter::new(move |ctx| ctx.message().is_some_and(|m| m.chat.kind == kind))
}

// =============================================================================
// Callback query filters
// =============================================================================

/// Matches updates that carry a callback query.
pub fn has_callback_query() -> Filter {
    Filter::new(|ctx| ctx.callback_query().is_some())
}

/// Matches callback queries whose data is exactly `data`.
pub fn callback_data_equals(data: impl Into<String>) -> Filter {
    let data = data.into();
    Filter::new(move |ctx| {
        ctx.callback_query()
            .and_then(|q| q.data.as_deref())
            .is_some_and(|d| d == data)
    })
}

/// Matches callback queries whose data starts with `prefix`.
pub fn callback_data_starts_with(prefix: impl Into<String>) -> Filter {
    let prefix = prefix.into();
    Filter::new(move |ctx| {
        ctx.callback_query()
            .and_then(|q| q.data.as_deref())
            .is_some_and(|d| d.starts_with(prefix.as_str()))
    })
}

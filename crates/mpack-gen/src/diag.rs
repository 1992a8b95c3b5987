//! Hierarchical diagnostics.
//!
//! Warnings and progress lines carry the chain of scopes they were emitted
//! under ("TypeName: field: message"), so a dropped field can be traced to
//! its declaration without positions.

use std::cell::RefCell;

use colored::Colorize;

thread_local! {
    static SCOPES: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// A pushed diagnostic scope; pops itself when dropped.
pub struct Scope(());

/// Pushes `name` onto the scope stack for the lifetime of the returned guard.
pub fn scope(name: &str) -> Scope {
    SCOPES.with(|s| s.borrow_mut().push(name.to_string()));
    Scope(())
}

impl Drop for Scope {
    fn drop(&mut self) {
        SCOPES.with(|s| {
            s.borrow_mut().pop();
        });
    }
}

fn in_context(msg: &str) -> String {
    SCOPES.with(|s| {
        let mut parts = s.borrow().clone();
        parts.push(msg.to_string());
        parts.join(": ")
    })
}

pub fn info(msg: &str) {
    log::info!("{}", in_context(msg).green());
}

pub fn warn(msg: &str) {
    log::warn!("{}", in_context(msg).yellow());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_nest_and_pop() {
        let _a = scope("outer");
        {
            let _b = scope("inner");
            assert_eq!(in_context("m"), "outer: inner: m");
        }
        assert_eq!(in_context("m"), "outer: m");
    }
}

//! Command routing.
//!
//! A `Router` is a node in a prefix tree that exists only at registration
//! time: every node shares one flat handler table, and `set_handle` folds
//! the full middleware chain around the handler before inserting it under
//! the fully-composed command string. Dispatch is a single map lookup.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::errors::RouterError;
use crate::request::Request;
use crate::response::Response;

/// Terminal request handler.
#[async_trait]
pub trait Handler<S>: Send + Sync {
    async fn handle(&self, req: &Request<S>, resp: &Response);
}

/// Wraps a handler; may run code before and after `next`, or skip it
/// entirely (e.g. reject and reply without forwarding).
#[async_trait]
pub trait Middleware<S>: Send + Sync {
    async fn handle(&self, next: &dyn Handler<S>, req: &Request<S>, resp: &Response);
}

type HandlerTable<S> = Arc<Mutex<HashMap<String, Arc<dyn Handler<S>>>>>;

/// Registration node. `group` derives children with a longer prefix and a
/// longer inherited middleware chain; all nodes feed one shared table.
pub struct Router<S> {
    table: HandlerTable<S>,
    prefix: String,
    middleware: Vec<Arc<dyn Middleware<S>>>,
}

impl<S> Clone for Router<S> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            prefix: self.prefix.clone(),
            middleware: self.middleware.clone(),
        }
    }
}

impl<S: Send + Sync + 'static> Default for Router<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Send + Sync + 'static> Router<S> {
    pub fn new() -> Self {
        Self {
            table: Arc::new(Mutex::new(HashMap::new())),
            prefix: String::new(),
            middleware: Vec::new(),
        }
    }

    /// Derive a child node. Its effective prefix is this node's prefix
    /// plus `prefix` (plain concatenation, no separator is inserted), and
    /// its middleware chain is this node's chain plus `middleware`.
    ///
    /// The chain is captured by value: middleware added to the parent
    /// afterward does not reach the child.
    pub fn group(&self, prefix: &str, middleware: Vec<Arc<dyn Middleware<S>>>) -> Router<S> {
        let mut chain = self.middleware.clone();
        chain.extend(middleware);
        Router {
            table: Arc::clone(&self.table),
            prefix: format!("{}{}", self.prefix, prefix),
            middleware: chain,
        }
    }

    /// Append middleware to this node. Affects only registrations (and
    /// groups) made after this call.
    pub fn use_middleware(&mut self, middleware: Arc<dyn Middleware<S>>) {
        self.middleware.push(middleware);
    }

    /// Register `handler` under this node's prefix plus `command`, wrapped
    /// in the inherited chain plus `middleware` (inherited first). The
    /// chain is composed here, once; dispatch pays nothing for it.
    pub fn set_handle(
        &self,
        command: &str,
        handler: Arc<dyn Handler<S>>,
        middleware: Vec<Arc<dyn Middleware<S>>>,
    ) -> Result<(), RouterError> {
        let full = format!("{}{}", self.prefix, command);

        let mut chain = self.middleware.clone();
        chain.extend(middleware);
        let mut composed = handler;
        for mw in chain.into_iter().rev() {
            composed = Arc::new(Composed {
                middleware: mw,
                next: composed,
            });
        }

        let mut table = self.table.lock();
        if table.contains_key(&full) {
            return Err(RouterError::DuplicateCommand { command: full });
        }
        let _ = table.insert(full, composed);
        Ok(())
    }

    /// Look up the composed handler for a full command string.
    pub fn resolve(&self, command: &str) -> Option<Arc<dyn Handler<S>>> {
        self.table.lock().get(command).cloned()
    }

    /// Number of registered commands (table-wide, not per node).
    pub fn command_count(&self) -> usize {
        self.table.lock().len()
    }
}

/// One middleware layer bound to its inner handler.
struct Composed<S> {
    middleware: Arc<dyn Middleware<S>>,
    next: Arc<dyn Handler<S>>,
}

#[async_trait]
impl<S: Send + Sync + 'static> Handler<S> for Composed<S> {
    async fn handle(&self, req: &Request<S>, resp: &Response) {
        self.middleware.handle(self.next.as_ref(), req, resp).await;
    }
}

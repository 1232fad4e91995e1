use std::fmt;
use std::sync::{Arc, Mutex};

use super::{ParserKind, Tokenizer};

/// Default number of idle tokenizers a pool keeps around.
pub const DEFAULT_POOL_CAPACITY: usize = 1000;

/// Fixed capacity free list of tokenizers.
///
/// Checkout and give back are paired with a connection's start and teardown,
/// never with individual messages. The pool handle is cheap to clone and is the
/// one resource shared between connections.
///
/// ```
/// use h1_mux::parser::{H1Tokenizer, ParserKind, ParserPool};
///
/// let pool: ParserPool<H1Tokenizer> = ParserPool::with_capacity(2);
/// let p = pool.checkout(ParserKind::Request);
/// pool.give_back(p);
/// assert_eq!(pool.idle(), 1);
/// ```
pub struct ParserPool<P> {
    inner: Arc<Mutex<Inner<P>>>,
}

struct Inner<P> {
    free: Vec<P>,
    capacity: usize,
    checked_out: usize,
}

impl<P> Clone for ParserPool<P> {
    fn clone(&self) -> Self {
        ParserPool {
            inner: self.inner.clone(),
        }
    }
}

impl<P: Tokenizer + Default> Default for ParserPool<P> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_POOL_CAPACITY)
    }
}

impl<P: Tokenizer + Default> ParserPool<P> {
    /// Pool keeping at most `capacity` idle tokenizers.
    pub fn with_capacity(capacity: usize) -> Self {
        ParserPool {
            inner: Arc::new(Mutex::new(Inner {
                free: Vec::new(),
                capacity,
                checked_out: 0,
            })),
        }
    }

    /// Take a tokenizer, reinitialized for `kind`.
    pub fn checkout(&self, kind: ParserKind) -> P {
        let reused = self.with_inner(|inner| {
            inner.checked_out += 1;
            inner.free.pop()
        });
        let mut parser = reused.unwrap_or_default();
        parser.reinitialize(kind);
        parser
    }
}

impl<P> ParserPool<P> {
    /// Return a tokenizer. Dropped if the pool is full.
    pub fn give_back(&self, parser: P) {
        self.with_inner(|inner| {
            inner.checked_out = inner.checked_out.saturating_sub(1);
            if inner.free.len() < inner.capacity {
                inner.free.push(parser);
            }
        });
    }

    /// Number of idle tokenizers.
    pub fn idle(&self) -> usize {
        self.with_inner(|inner| inner.free.len())
    }

    /// Number of tokenizers currently held by connections.
    pub fn checked_out(&self) -> usize {
        self.with_inner(|inner| inner.checked_out)
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut Inner<P>) -> R) -> R {
        // A panic while holding the lock leaves a free list that is still valid.
        let mut lock = match self.inner.lock() {
            Ok(v) => v,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut lock)
    }
}

impl<P> fmt::Debug for ParserPool<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserPool").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::H1Tokenizer;

    #[test]
    fn checkout_and_give_back_pair() {
        let pool: ParserPool<H1Tokenizer> = ParserPool::with_capacity(1);
        let a = pool.checkout(ParserKind::Request);
        let b = pool.checkout(ParserKind::Response);
        assert_eq!(pool.checked_out(), 2);

        pool.give_back(a);
        pool.give_back(b);
        assert_eq!(pool.checked_out(), 0);
        // capacity 1, second one dropped
        assert_eq!(pool.idle(), 1);

        let _c = pool.checkout(ParserKind::Request);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn clones_share_the_free_list() {
        let pool: ParserPool<H1Tokenizer> = ParserPool::default();
        let other = pool.clone();
        let p = pool.checkout(ParserKind::Request);
        other.give_back(p);
        assert_eq!(pool.idle(), 1);
    }
}

//! Immutable method-to-handler bindings.
//!
//! A service exposes its handlers as a capability set: a list of
//! `(name, handler)` pairs where each name follows the `on_<action>`
//! convention. The registry binds `on_add` to the method `add`, treats
//! `on_message` as the fallback for methods nothing else claims, and rejects
//! any other name when it is built. Once built the registry never changes,
//! so worker threads share it through an [`Arc`] without locking.

mod errors;
mod handler;

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;

pub use self::errors::RegistryError;
pub use self::handler::{
    Handler, HandlerFailure, HandlerResult, InternalFailure, MessageContext, RemoteError,
    handler_fn,
};

/// Prefix every capability name carries.
pub const HANDLER_PREFIX: &str = "on_";

/// Capability name bound to the fallback slot.
pub const FALLBACK_CAPABILITY: &str = "on_message";

/// A named handler offered by a capability set.
#[derive(Clone)]
pub struct Capability {
    name: String,
    handler: Arc<dyn Handler>,
}

impl Capability {
    /// Pairs a capability name with its handler.
    pub fn new<H>(name: impl Into<String>, handler: H) -> Self
    where
        H: Handler + 'static,
    {
        Self {
            name: name.into(),
            handler: Arc::new(handler),
        }
    }

    /// Pairs a capability name with an already shared handler.
    pub fn shared(name: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }

    /// The capability name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Capability")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A set of handlers named by the `on_<action>` convention.
pub trait Capabilities {
    /// Lists every capability the set offers.
    fn capabilities(self) -> Vec<Capability>;
}

impl Capabilities for Vec<Capability> {
    fn capabilities(self) -> Vec<Capability> {
        self
    }
}

/// Method-to-handler bindings with an optional fallback.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    bindings: HashMap<String, Arc<dyn Handler>>,
    fallback: Option<Arc<dyn Handler>>,
}

impl HandlerRegistry {
    /// Binds every capability in `set` by naming convention.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when a name lacks the `on_` prefix, has an
    /// empty or dotted action, or when an action or the fallback is bound
    /// twice.
    pub fn from_capabilities<C: Capabilities>(set: C) -> Result<Self, RegistryError> {
        let mut builder = HandlerRegistryBuilder::new();
        for capability in set.capabilities() {
            builder = if capability.name == FALLBACK_CAPABILITY {
                builder.shared_fallback(capability.handler)
            } else {
                let action = capability
                    .name
                    .strip_prefix(HANDLER_PREFIX)
                    .ok_or_else(|| RegistryError::invalid_name(&capability.name))?;
                if action.is_empty() {
                    return Err(RegistryError::empty_action(&capability.name));
                }
                builder.shared(action, capability.handler)
            };
        }
        builder.build()
    }

    /// Finds the handler for `method`, falling back to `on_message`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::MethodNotFound`] when nothing is bound to
    /// the method and no fallback exists.
    pub fn lookup(&self, method: &str) -> Result<&Arc<dyn Handler>, RegistryError> {
        self.bindings
            .get(method)
            .or(self.fallback.as_ref())
            .ok_or_else(|| RegistryError::method_not_found(method))
    }

    /// Bound method names in lexical order.
    #[must_use]
    pub fn methods(&self) -> Vec<&str> {
        let mut methods: Vec<&str> = self.bindings.keys().map(String::as_str).collect();
        methods.sort_unstable();
        methods
    }

    /// Returns `true` when an `on_message` fallback is bound.
    #[must_use]
    pub const fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Number of specifically bound methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` when nothing at all is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty() && self.fallback.is_none()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("HandlerRegistry")
            .field("methods", &self.methods())
            .field("fallback", &self.has_fallback())
            .finish()
    }
}

/// Explicit registration producing a [`HandlerRegistry`].
#[derive(Default)]
pub struct HandlerRegistryBuilder {
    bindings: Vec<(String, Arc<dyn Handler>)>,
    fallbacks: Vec<Arc<dyn Handler>>,
}

impl HandlerRegistryBuilder {
    /// Starts an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `handler` to the method `action`.
    #[must_use]
    pub fn on<H>(self, action: impl Into<String>, handler: H) -> Self
    where
        H: Handler + 'static,
    {
        self.shared(action, Arc::new(handler))
    }

    /// Binds an already shared handler to the method `action`.
    #[must_use]
    pub fn shared(mut self, action: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        self.bindings.push((action.into(), handler));
        self
    }

    /// Sets the handler used for methods nothing else claims.
    #[must_use]
    pub fn fallback<H>(self, handler: H) -> Self
    where
        H: Handler + 'static,
    {
        self.shared_fallback(Arc::new(handler))
    }

    /// Sets an already shared fallback handler.
    #[must_use]
    pub fn shared_fallback(mut self, handler: Arc<dyn Handler>) -> Self {
        self.fallbacks.push(handler);
        self
    }

    /// Validates the bindings and freezes them.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] for an empty or dotted action, a duplicate
    /// action, or more than one fallback.
    pub fn build(self) -> Result<HandlerRegistry, RegistryError> {
        let mut bindings = HashMap::with_capacity(self.bindings.len());
        for (action, handler) in self.bindings {
            if action.is_empty() {
                return Err(RegistryError::empty_action(format!("{HANDLER_PREFIX}{action}")));
            }
            if action.contains('.') {
                return Err(RegistryError::invalid_name(format!("{HANDLER_PREFIX}{action}")));
            }
            match bindings.entry(action) {
                Entry::Occupied(entry) => {
                    return Err(RegistryError::duplicate_action(entry.key().clone()));
                }
                Entry::Vacant(entry) => {
                    entry.insert(handler);
                }
            }
        }

        let mut fallbacks = self.fallbacks.into_iter();
        let fallback = fallbacks.next();
        if fallbacks.next().is_some() {
            return Err(RegistryError::DuplicateFallback);
        }

        Ok(HandlerRegistry { bindings, fallback })
    }
}

impl fmt::Debug for HandlerRegistryBuilder {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("HandlerRegistryBuilder")
            .field(
                "actions",
                &self.bindings.iter().map(|(action, _)| action).collect::<Vec<_>>(),
            )
            .field("fallbacks", &self.fallbacks.len())
            .finish()
    }
}

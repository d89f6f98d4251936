//! Module configuration: bindings, registered types, and reported errors.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::panic::Location;
use std::sync::Arc;

use crate::aggregate::Failure;
use crate::cause::Cause;
use crate::container::types::{Instance, TypeSpec};
use crate::container::ProvisionContext;
use crate::frame::ContextFrame;
use crate::key::Key;
use crate::record::{ErrorKind, ErrorRecord};

/// Supplies instances on demand.
pub trait Provider: Send + Sync {
    fn get(&self, ctx: &mut ProvisionContext<'_>) -> Result<Instance, Failure>;
}

impl<F> Provider for F
where
    F: Fn(&mut ProvisionContext<'_>) -> Result<Instance, Failure> + Send + Sync,
{
    fn get(&self, ctx: &mut ProvisionContext<'_>) -> Result<Instance, Failure> {
        self(ctx)
    }
}

/// Pins a closure to the [`Provider`] call signature.
pub fn provider_fn<F>(f: F) -> F
where
    F: Fn(&mut ProvisionContext<'_>) -> Result<Instance, Failure> + Send + Sync,
{
    f
}

/// Instance shape a provider type must produce to back a provider-key binding.
pub struct ProviderHandle(pub Arc<dyn Provider>);

impl ProviderHandle {
    pub fn new(provider: impl Provider + 'static) -> Self {
        Self(Arc::new(provider))
    }
}

/// A unit of configuration.
pub trait Module {
    fn configure(&self, binder: &mut Binder);
}

impl<F> Module for F
where
    F: Fn(&mut Binder),
{
    fn configure(&self, binder: &mut Binder) {
        self(binder)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scoping {
    #[default]
    Unscoped,
    Singleton,
}

#[derive(Clone)]
pub(crate) enum Target {
    /// Construct the key's own registered type.
    Untargetted,
    Linked(Key),
    ProviderInstance {
        provider_type: String,
        provider: Arc<dyn Provider>,
    },
    ProviderKey(Key),
    /// A provider function declared in a module.
    ProviderMethod(Arc<dyn Provider>),
    Instance(Instance),
}

#[derive(Clone)]
pub(crate) struct Binding {
    pub(crate) key: Key,
    pub(crate) target: Target,
    pub(crate) scoping: Scoping,
    pub(crate) source: String,
}

fn caller_source(location: &Location<'_>) -> String {
    format!("{}:{}", location.file(), location.line())
}

/// Collects configuration from modules.
#[derive(Default)]
pub struct Binder {
    pub(crate) bindings: HashMap<Key, Binding>,
    pub(crate) order: Vec<Key>,
    pub(crate) types: HashMap<Key, Arc<TypeSpec>>,
    pub(crate) errors: Vec<ErrorRecord>,
}

impl Binder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Makes `spec` available for just-in-time constructor bindings.
    pub fn register(&mut self, spec: TypeSpec) -> &mut Self {
        self.types.insert(spec.key(), Arc::new(spec));
        self
    }

    #[track_caller]
    pub fn bind(&mut self, key: Key) -> BindingBuilder<'_> {
        let source = caller_source(Location::caller());
        let binding = Binding {
            key: key.clone(),
            target: Target::Untargetted,
            scoping: Scoping::Unscoped,
            source: source.clone(),
        };
        let slot = match self.bindings.entry(key) {
            Entry::Occupied(mut occupied) => {
                self.errors.push(
                    ErrorRecord::new(format!(
                        "A binding to {} was already configured at {}.",
                        occupied.key(),
                        occupied.get().source
                    ))
                    .with_frame(ContextFrame::user_code(source)),
                );
                occupied.insert(binding);
                occupied.into_mut()
            }
            Entry::Vacant(vacant) => {
                self.order.push(vacant.key().clone());
                vacant.insert(binding)
            }
        };
        BindingBuilder { binding: slot }
    }

    /// Declares a provider function for `key`, like a `@Provides` method.
    #[track_caller]
    pub fn provides<P>(&mut self, key: Key, scoping: Scoping, provider: P)
    where
        P: Provider + 'static,
    {
        let builder = self.bind(key);
        builder.binding.target = Target::ProviderMethod(Arc::new(provider));
        builder.binding.scoping = scoping;
    }

    /// Reports a throwable from inside a module.
    #[track_caller]
    pub fn add_error(&mut self, cause: Cause) {
        let source = caller_source(Location::caller());
        self.errors.push(
            ErrorRecord::from_cause(ErrorKind::ErrorInUserCode, cause)
                .with_frame(ContextFrame::user_code(source)),
        );
    }

    /// Reports a plain message from inside a module.
    #[track_caller]
    pub fn add_message(&mut self, message: impl Into<String>) {
        let source = caller_source(Location::caller());
        self.errors
            .push(ErrorRecord::new(message).with_frame(ContextFrame::user_code(source)));
    }
}

/// Refines the binding created by [`Binder::bind`].
pub struct BindingBuilder<'a> {
    binding: &'a mut Binding,
}

impl BindingBuilder<'_> {
    pub fn to(self, target: Key) -> Self {
        self.binding.target = Target::Linked(target);
        self
    }

    pub fn to_provider<P>(self, provider_type: impl Into<String>, provider: P) -> Self
    where
        P: Provider + 'static,
    {
        self.binding.target = Target::ProviderInstance {
            provider_type: provider_type.into(),
            provider: Arc::new(provider),
        };
        self
    }

    /// Binds to whatever provider the container builds for `provider_key`.
    pub fn to_provider_key(self, provider_key: Key) -> Self {
        self.binding.target = Target::ProviderKey(provider_key);
        self
    }

    pub fn to_instance(self, instance: Instance) -> Self {
        self.binding.target = Target::Instance(instance);
        self
    }

    pub fn in_singleton(self) -> Self {
        self.binding.scoping = Scoping::Singleton;
        self
    }
}

//! A small dynamic injector that drives the reporting engine end to end.
//!
//! It resolves bindings, constructs instances and injects members just far
//! enough to exercise every failure path: each layer that unwinds adds its
//! frame, the top-level request wraps exactly once, and container builds
//! aggregate every configuration-time error.

pub mod binder;
pub mod scope;
pub mod types;

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::trace;

use crate::aggregate::{ConfigurationError, CreationError, InjectError, ProvisionError};
use crate::attempt::{begin_top_level_attempt, end_attempt, report_failure, report_unwinding, Attempt};
use crate::chain::Unwinding;
use crate::collector::Report;
use crate::config::{EngineConfig, Stage};
use crate::error::EngineError;
use crate::frame::ContextFrame;
use crate::guard::{absorb, decide, pass_through, WrapDecision};
use crate::key::Key;
use crate::record::{ErrorKind, ErrorRecord};

pub use binder::{provider_fn, Binder, BindingBuilder, Module, Provider, ProviderHandle, Scoping};
pub use scope::{ScopeFailure, SingletonScope};
pub use types::{Dependency, FieldSpec, Instance, MethodSpec, Nesting, TypeSpec};

use binder::{Binding, Target};

/// Collects modules and configuration, then builds an [`Injector`].
#[derive(Default)]
pub struct InjectorBuilder {
    config: EngineConfig,
    modules: Vec<Box<dyn Module>>,
}

impl InjectorBuilder {
    pub fn stage(mut self, stage: Stage) -> Self {
        self.config.stage = stage;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn module<F>(mut self, module: F) -> Self
    where
        F: Fn(&mut Binder) + 'static,
    {
        self.modules.push(Box::new(module));
        self
    }

    pub fn install(mut self, module: Box<dyn Module>) -> Self {
        self.modules.push(module);
        self
    }

    /// Runs every module and, in production, every singleton.
    ///
    /// All errors found along the way are reported together.
    pub fn build(self) -> Result<Injector, CreationError> {
        let render = self.config.render.clone();
        let mut attempt = begin_top_level_attempt();
        let mut binder = Binder::new();
        for module in &self.modules {
            module.configure(&mut binder);
        }

        let records = std::mem::take(&mut binder.errors);
        let injector = Injector {
            bindings: binder.bindings,
            order: binder.order,
            types: binder.types,
            singletons: SingletonScope::new(),
            config: self.config,
        };

        let outcome = (|| -> Result<Option<Report>, EngineError> {
            for record in records {
                report_failure(&mut attempt, record)?;
            }
            if injector.config.stage == Stage::Production {
                injector.create_eager_singletons(&mut attempt)?;
            }
            end_attempt(attempt)
        })();

        match outcome {
            Ok(None) => Ok(injector),
            Ok(Some(report)) => Err(CreationError::from_records(report.into_records(), &render)),
            Err(defect) => Err(CreationError::from_records(vec![engine_defect(defect)], &render)),
        }
    }
}

fn circular_dependency<'k>(key: &Key, path: impl Iterator<Item = &'k Key>) -> Unwinding {
    let path: Vec<String> = path.map(Key::to_string).collect();
    Unwinding::new(
        ErrorRecord::new(format!(
            "Found a circular dependency involving {key}: {}.",
            path.join(" -> ")
        ))
        .with_kind(ErrorKind::CircularDependency),
    )
}

fn engine_defect(err: EngineError) -> ErrorRecord {
    ErrorRecord::new(format!("Internal error while reporting failures: {err}"))
}

/// Resolves keys to instances.
pub struct Injector {
    bindings: HashMap<Key, Binding>,
    order: Vec<Key>,
    types: HashMap<Key, Arc<types::TypeSpec>>,
    singletons: SingletonScope,
    config: EngineConfig,
}

impl Injector {
    pub fn builder() -> InjectorBuilder {
        InjectorBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Top-level request for `key`.
    ///
    /// Structural problems in the reachable graph surface as a
    /// [`ConfigurationError`] before any user code runs; runtime failures as
    /// exactly one [`ProvisionError`].
    pub fn get_instance(&self, key: &Key) -> Result<Instance, InjectError> {
        self.validate(key)?;
        let mut attempt = begin_top_level_attempt();
        let mut ctx = ProvisionContext::new(self);
        let outcome = ctx.provision(key);
        self.finish_attempt(attempt_with(&mut attempt, outcome, key), attempt)
    }

    /// Typed variant of [`Injector::get_instance`].
    pub fn get<T: Any + Send + Sync>(&self, key: &Key) -> Result<Arc<T>, InjectError> {
        let instance = self.get_instance(key)?;
        instance.downcast::<T>().map_err(|_| {
            let record = ErrorRecord::new(format!("Instance bound to {key} is not a {}.", Key::of::<T>()))
                .with_frame(ContextFrame::locating(key.clone()));
            InjectError::Provision(ProvisionError::from_records(vec![record], &self.config.render))
        })
    }

    fn finish_attempt(
        &self,
        outcome: Result<Option<Instance>, EngineError>,
        attempt: Attempt,
    ) -> Result<Instance, InjectError> {
        let render = &self.config.render;
        let ended = outcome.and_then(|instance| end_attempt(attempt).map(|report| (instance, report)));
        match ended {
            Ok((Some(instance), None)) => Ok(instance),
            Ok((_, Some(report))) => Err(ProvisionError::from_records(report.into_records(), render).into()),
            Ok((None, None)) => Err(ProvisionError::from_records(
                vec![engine_defect(EngineError::IllegalState(
                    "provisioning failed without recording an error".to_string(),
                ))],
                render,
            )
            .into()),
            Err(defect) => Err(ProvisionError::from_records(vec![engine_defect(defect)], render).into()),
        }
    }

    fn create_eager_singletons(&self, attempt: &mut Attempt) -> Result<(), EngineError> {
        for key in &self.order {
            let Some(binding) = self.bindings.get(key) else {
                continue;
            };
            if binding.scoping != Scoping::Singleton {
                continue;
            }
            trace!(%key, "eagerly creating singleton");
            let mut ctx = ProvisionContext::new(self);
            if let Err(unwinding) = ctx.provision(key) {
                report_unwinding(attempt, unwinding.with_frame(ContextFrame::locating(key.clone())))?;
            }
        }
        Ok(())
    }

    fn binding_for(&self, key: &Key) -> Option<Binding> {
        if let Some(binding) = self.bindings.get(key) {
            return Some(binding.clone());
        }
        self.types.get(key).map(|spec| Binding {
            key: key.clone(),
            target: Target::Untargetted,
            scoping: Scoping::Unscoped,
            source: spec.name.clone(),
        })
    }

    fn validate(&self, root: &Key) -> Result<(), ConfigurationError> {
        let mut records = Vec::new();
        let mut visited = HashSet::new();
        let mut path = Vec::new();
        self.validate_key(root, &mut visited, &mut path, &mut records);
        if records.is_empty() {
            Ok(())
        } else {
            Err(ConfigurationError::from_records(records, &self.config.render))
        }
    }

    fn validate_key(
        &self,
        key: &Key,
        visited: &mut HashSet<Key>,
        path: &mut Vec<Key>,
        records: &mut Vec<ErrorRecord>,
    ) {
        if !visited.insert(key.clone()) {
            return;
        }
        path.push(key.clone());

        match self.binding_for(key) {
            None => records.push(locating(
                ErrorRecord::new(format!("No implementation for {key} was bound."))
                    .with_kind(ErrorKind::MissingImplementation),
                path.as_slice(),
            )),
            Some(binding) => match &binding.target {
                Target::Linked(target) | Target::ProviderKey(target) => {
                    self.validate_key(target, visited, path, records)
                }
                Target::Untargetted => match self.types.get(key) {
                    Some(spec) => {
                        for record in misplaced_annotations(spec) {
                            records.push(locating(record, path.as_slice()));
                        }
                        for dep in spec.dependency_keys() {
                            self.validate_key(dep, visited, path, records);
                        }
                    }
                    None => records.push(locating(
                        ErrorRecord::new(format!("No implementation for {key} was bound."))
                            .with_kind(ErrorKind::MissingImplementation),
                        path.as_slice(),
                    )),
                },
                Target::ProviderInstance { .. } | Target::ProviderMethod(_) | Target::Instance(_) => {}
            },
        }
        path.pop();
    }
}

/// Adds one locating frame per key on the path, innermost first.
fn locating(record: ErrorRecord, path: &[Key]) -> ErrorRecord {
    path.iter()
        .rev()
        .fold(record, |r, k| r.with_frame(ContextFrame::locating(k.clone())))
}

fn attempt_with(
    attempt: &mut Attempt,
    outcome: Result<Instance, Unwinding>,
    key: &Key,
) -> Result<Option<Instance>, EngineError> {
    match outcome {
        Ok(instance) => Ok(Some(instance)),
        Err(unwinding) => {
            report_unwinding(attempt, unwinding.with_frame(ContextFrame::locating(key.clone())))?;
            Ok(None)
        }
    }
}

/// Binding annotations belong on parameters, not on constructors or methods.
///
/// A method that shares its name with an annotated field is an accessor and
/// is left alone.
fn misplaced_annotations(spec: &types::TypeSpec) -> Vec<ErrorRecord> {
    let mut out = Vec::new();
    if let Some(annotation) = &spec.constructor_annotation {
        out.push(
            ErrorRecord::new(format!(
                "{}.<init>() is annotated with @{annotation}(), but binding annotations should be applied to its parameters instead.",
                spec.name
            ))
            .with_kind(ErrorKind::MisplacedBindingAnnotation)
            .with_frame(ContextFrame::constructor(spec.name.clone())),
        );
    }
    for method in &spec.methods {
        let Some(annotation) = &method.annotation else {
            continue;
        };
        let accessor = spec
            .fields
            .iter()
            .any(|f| f.name == method.name && f.key.annotation().is_some());
        if accessor {
            continue;
        }
        out.push(
            ErrorRecord::new(format!(
                "{}.{}() is annotated with @{annotation}(), but binding annotations should be applied to its parameters instead.",
                spec.name, method.name
            ))
            .with_kind(ErrorKind::MisplacedBindingAnnotation)
            .with_frame(ContextFrame::member(spec.name.clone(), method.name.clone())),
        );
    }
    out
}

/// Explicit handle for one in-flight top-level request.
///
/// Providers receive it and use [`ProvisionContext::get_instance`] for
/// nested lookups, so nested failures stay part of the same request.
pub struct ProvisionContext<'a> {
    injector: &'a Injector,
    in_flight: Vec<Key>,
}

impl<'a> ProvisionContext<'a> {
    fn new(injector: &'a Injector) -> Self {
        Self {
            injector,
            in_flight: Vec::new(),
        }
    }

    /// True while provisioning the key the top-level request asked for.
    pub fn is_top_level(&self) -> bool {
        self.in_flight.len() <= 1
    }

    /// Nested lookup from inside user code.
    ///
    /// The returned error is already wrapped and passes through the
    /// enclosing provider untouched when propagated with `?`.
    pub fn get_instance(&mut self, key: &Key) -> Result<Instance, ProvisionError> {
        self.provision(key).map_err(|unwinding| {
            ProvisionError::from_records(
                unwinding.with_frame(ContextFrame::locating(key.clone())).into_records(),
                &self.injector.config.render,
            )
        })
    }

    fn provision(&mut self, key: &Key) -> Result<Instance, Unwinding> {
        if self.in_flight.contains(key) {
            return Err(circular_dependency(key, self.in_flight.iter().chain([key])));
        }
        let binding = self.injector.binding_for(key).ok_or_else(|| {
            Unwinding::new(
                ErrorRecord::new(format!("No implementation for {key} was bound."))
                    .with_kind(ErrorKind::MissingImplementation),
            )
        })?;

        trace!(%key, depth = self.in_flight.len(), "provisioning");
        self.in_flight.push(key.clone());
        let injector = self.injector;
        let result = match binding.scoping {
            Scoping::Singleton => injector
                .singletons
                .get_or_create(key, || self.provision_binding(&binding)),
            Scoping::Unscoped => self.provision_binding(&binding).map_err(ScopeFailure::Create),
        };
        let result = result.map_err(|failure| match failure {
            ScopeFailure::Create(unwinding) => unwinding,
            // Another thread holds one of our keys while we wait on one of its.
            ScopeFailure::Cycle(held) => {
                circular_dependency(key, self.in_flight.iter().chain(held.iter().skip(1)))
            }
        });
        self.in_flight.pop();
        result
    }

    fn provision_binding(&mut self, binding: &Binding) -> Result<Instance, Unwinding> {
        match &binding.target {
            Target::Instance(instance) => Ok(Arc::clone(instance)),
            Target::Linked(target) => self
                .provision(target)
                .map_err(|u| u.with_frame(ContextFrame::locating(target.clone()))),
            Target::ProviderKey(provider_key) => {
                let located = |u: Unwinding| u.with_frame(ContextFrame::locating(provider_key.clone()));
                let instance = self.provision(provider_key).map_err(located)?;
                let handle = instance.downcast_ref::<ProviderHandle>().ok_or_else(|| {
                    located(Unwinding::new(
                        ErrorRecord::new(format!("{provider_key} does not build a provider."))
                            .with_kind(ErrorKind::MissingImplementation),
                    ))
                })?;
                let provider = Arc::clone(&handle.0);
                provider
                    .get(self)
                    .map_err(|failure| located(absorb(failure, ErrorKind::ErrorInCustomProvider)))
            }
            Target::ProviderInstance {
                provider_type,
                provider,
            } => {
                let frame = ContextFrame::custom_provider(provider_type.clone(), Some(binding.source.clone()));
                self.call_provider(provider, ErrorKind::ErrorInCustomProvider, frame)
            }
            Target::ProviderMethod(provider) => {
                let frame = ContextFrame::user_code(binding.source.clone());
                self.call_provider(provider, ErrorKind::ErrorInUserCode, frame)
            }
            Target::Untargetted => match self.injector.types.get(&binding.key) {
                Some(spec) => {
                    let spec = Arc::clone(spec);
                    self.construct(&spec)
                }
                None => Err(Unwinding::new(
                    ErrorRecord::new(format!("No implementation for {} was bound.", binding.key))
                        .with_kind(ErrorKind::MissingImplementation),
                )),
            },
        }
    }

    fn call_provider(
        &mut self,
        provider: &Arc<dyn Provider>,
        kind: ErrorKind,
        frame: ContextFrame,
    ) -> Result<Instance, Unwinding> {
        let provider = Arc::clone(provider);
        provider.get(self).map_err(|failure| match decide(self.is_top_level(), &failure) {
            WrapDecision::Wrap => absorb(failure, kind).with_frame(frame),
            WrapDecision::PassThrough => pass_through(failure, kind, frame),
        })
    }

    fn construct(&mut self, spec: &types::TypeSpec) -> Result<Instance, Unwinding> {
        if spec.nesting != Nesting::TopLevel {
            return Err(Unwinding::new(
                ErrorRecord::new("Injecting into inner classes is not supported.")
                    .with_kind(ErrorKind::InjectInnerClass),
            ));
        }

        let mut args = Vec::with_capacity(spec.params.len());
        for (index, param) in spec.params.iter().enumerate() {
            let arg = self.provision(&param.key).map_err(|u| {
                u.with_frame(ContextFrame::parameter(spec.name.clone(), "<init>", index, param.name.clone()))
            })?;
            args.push(arg);
        }
        let instance = (spec.construct)(args).map_err(|failure| {
            absorb(failure, ErrorKind::ErrorInjectingConstructor)
                .with_frame(ContextFrame::constructor(spec.name.clone()))
        })?;

        for field in &spec.fields {
            let dep = self
                .provision(&field.key)
                .map_err(|u| u.with_frame(ContextFrame::field(spec.name.clone(), field.name.clone())))?;
            (field.inject)(&instance, vec![dep]).map_err(|failure| {
                absorb(failure, ErrorKind::ErrorInjectingField)
                    .with_frame(ContextFrame::member(spec.name.clone(), field.name.clone()))
            })?;
        }

        for method in &spec.methods {
            let mut args = Vec::with_capacity(method.params.len());
            for (index, param) in method.params.iter().enumerate() {
                let arg = self.provision(&param.key).map_err(|u| {
                    u.with_frame(ContextFrame::parameter(
                        spec.name.clone(),
                        method.name.clone(),
                        index,
                        param.name.clone(),
                    ))
                })?;
                args.push(arg);
            }
            (method.invoke)(&instance, args).map_err(|failure| {
                absorb(failure, ErrorKind::ErrorInjectingMethod)
                    .with_frame(ContextFrame::member(spec.name.clone(), method.name.clone()))
            })?;
        }

        Ok(instance)
    }
}

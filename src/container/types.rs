//! Hand-written descriptions of injectable types.
//!
//! These stand in for reflection: each [`TypeSpec`] lists a constructor,
//! injectable fields and injectable methods, along with the closures that
//! actually run them.

use std::any::Any;
use std::sync::Arc;

use crate::aggregate::Failure;
use crate::key::Key;

/// A provisioned value.
pub type Instance = Arc<dyn Any + Send + Sync>;

pub type ConstructFn = Arc<dyn Fn(Vec<Instance>) -> Result<Instance, Failure> + Send + Sync>;
pub type MemberFn = Arc<dyn Fn(&Instance, Vec<Instance>) -> Result<(), Failure> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Nesting {
    #[default]
    TopLevel,
    /// A type that needs an enclosing instance, which the container cannot supply.
    Inner,
    /// A type declared inside a function body.
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A named dependency slot: constructor/method parameter or field.
pub struct Dependency {
    pub name: String,
    pub key: Key,
}

#[derive(Clone)]
pub struct FieldSpec {
    pub(crate) name: String,
    pub(crate) key: Key,
    pub(crate) inject: MemberFn,
}

impl FieldSpec {
    pub fn new<F>(name: impl Into<String>, key: Key, inject: F) -> Self
    where
        F: Fn(&Instance, Instance) -> Result<(), Failure> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            key,
            inject: Arc::new(move |target: &Instance, mut deps: Vec<Instance>| match deps.pop() {
                Some(dep) => inject(target, dep),
                None => Ok(()),
            }),
        }
    }
}

#[derive(Clone)]
pub struct MethodSpec {
    pub(crate) name: String,
    pub(crate) params: Vec<Dependency>,
    pub(crate) annotation: Option<String>,
    pub(crate) invoke: MemberFn,
}

impl MethodSpec {
    pub fn new<F>(name: impl Into<String>, invoke: F) -> Self
    where
        F: Fn(&Instance, Vec<Instance>) -> Result<(), Failure> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            params: Vec::new(),
            annotation: None,
            invoke: Arc::new(invoke),
        }
    }

    pub fn param(mut self, name: impl Into<String>, key: Key) -> Self {
        self.params.push(Dependency {
            name: name.into(),
            key,
        });
        self
    }

    /// Puts a binding annotation on the method itself.
    pub fn annotated(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = Some(annotation.into());
        self
    }
}

#[derive(Clone)]
pub struct TypeSpec {
    pub(crate) name: String,
    pub(crate) nesting: Nesting,
    pub(crate) params: Vec<Dependency>,
    pub(crate) constructor_annotation: Option<String>,
    pub(crate) construct: ConstructFn,
    pub(crate) fields: Vec<FieldSpec>,
    pub(crate) methods: Vec<MethodSpec>,
}

impl TypeSpec {
    pub fn new<F>(name: impl Into<String>, construct: F) -> Self
    where
        F: Fn(Vec<Instance>) -> Result<Instance, Failure> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            nesting: Nesting::TopLevel,
            params: Vec::new(),
            constructor_annotation: None,
            construct: Arc::new(construct),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn key(&self) -> Key {
        Key::named(self.name.clone())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a constructor parameter.
    pub fn param(mut self, name: impl Into<String>, key: Key) -> Self {
        self.params.push(Dependency {
            name: name.into(),
            key,
        });
        self
    }

    pub fn nesting(mut self, nesting: Nesting) -> Self {
        self.nesting = nesting;
        self
    }

    /// Puts a binding annotation on the constructor itself.
    pub fn constructor_annotated(mut self, annotation: impl Into<String>) -> Self {
        self.constructor_annotation = Some(annotation.into());
        self
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn method(mut self, method: MethodSpec) -> Self {
        self.methods.push(method);
        self
    }

    /// Keys of every constructor, field and method dependency.
    pub(crate) fn dependency_keys(&self) -> impl Iterator<Item = &Key> {
        self.params
            .iter()
            .map(|d| &d.key)
            .chain(self.fields.iter().map(|f| &f.key))
            .chain(self.methods.iter().flat_map(|m| m.params.iter().map(|d| &d.key)))
    }
}

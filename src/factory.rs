//! Construction of units from object lines such as `osc~ 440`.

use alloc::boxed::Box;

use hashbrown::HashMap;

use crate::error::GraphError;
use crate::message::{Atom, Message};
use crate::node::MessageUnit;
use crate::nodes::{Abs, Float, Osc, Pack, Poly, Sig, TabPlay};
use crate::resources::Resources;

/// Builds a unit from its creation arguments.
pub type Constructor = fn(&Message, &mut Resources) -> Box<dyn MessageUnit>;

/// Maps object labels to constructors.
#[derive(Clone, Default)]
pub struct ObjectFactory {
    constructors: HashMap<String, Constructor>,
}

impl ObjectFactory {
    /// A factory that knows no objects.
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory with every built-in unit registered.
    pub fn standard() -> Self {
        let mut factory = Self::new();
        factory.register("osc~", |init, res| Box::new(Osc::from_init(init, res.cosine_table())));
        factory.register("sig~", |init, _| Box::new(Sig::from_init(init)));
        factory.register("tabplay~", |init, _| Box::new(TabPlay::from_init(init)));
        factory.register("poly", |init, _| Box::new(Poly::from_init(init)));
        factory.register("float", |init, _| Box::new(Float::from_init(init)));
        factory.register("f", |init, _| Box::new(Float::from_init(init)));
        factory.register("abs", |_, _| Box::new(Abs::new()));
        factory.register("pack", |init, _| Box::new(Pack::from_init(init)));
        factory
    }

    /// Register `constructor` under `label`, returning the one it replaces.
    pub fn register(&mut self, label: impl Into<String>, constructor: Constructor) -> Option<Constructor> {
        self.constructors.insert(label.into(), constructor)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.constructors.contains_key(label)
    }

    /// Registered labels, in no particular order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Build the unit registered as `label`.
    pub fn create(
        &self,
        label: &str,
        init: &Message,
        resources: &mut Resources,
    ) -> Result<Box<dyn MessageUnit>, GraphError> {
        let constructor = self
            .constructors
            .get(label)
            .ok_or_else(|| GraphError::UnknownObject(label.to_string()))?;
        tracing::debug!(label, %init, "creating object");
        Ok(constructor(init, resources))
    }

    /// Build a unit from an object line: a label followed by its creation
    /// arguments, separated by whitespace.
    pub fn create_from_line(
        &self,
        line: &str,
        resources: &mut Resources,
    ) -> Result<Box<dyn MessageUnit>, GraphError> {
        let parsed = Message::parse(0.0, line);
        let (head, args) = parsed.atoms().split_first().ok_or(GraphError::EmptyDefinition)?;
        let label = match head {
            Atom::Symbol(s) => s.clone(),
            other => return Err(GraphError::UnknownObject(other.to_string())),
        };
        self.create(&label, &Message::new(0.0, args.to_vec()), resources)
    }
}

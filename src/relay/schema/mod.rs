//! XML Schema support.
//!
//! Loads one XSD file into an immutable [`Schema`] that is shared by every
//! invocation. The loader understands a documented subset of XSD 1.0 and
//! refuses, at load time, any construct outside it.

mod automaton;
mod builtins;
mod error;
mod facets;
mod model;
mod parser;

pub use builtins::XSD_NAMESPACE;
pub use error::SchemaError;

pub(crate) use automaton::ChildMatch;
pub(crate) use builtins::{Builtin, Primitive, WhiteSpace};
pub(crate) use facets::{Facets, compare};
pub(crate) use model::{
    AllGroup, AttributeDecl, AttributeUseKind, ComplexType, ContentModel, ElementDecl,
    ElementDeclId, ProcessContents, SimpleType, TypeDef, TypeId, ValueConstraint,
};

use crate::relay::domain::QName;
use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use std::collections::HashMap;
use tracing::info;

/// A compiled XML Schema.
///
/// Immutable after loading; share it between invocations through an
/// [`std::sync::Arc`].
#[derive(Debug)]
pub struct Schema {
    target_namespace: Option<String>,
    types: Vec<TypeDef>,
    elements: Vec<ElementDecl>,
    attributes: Vec<AttributeDecl>,
    global_elements: HashMap<QName, ElementDeclId>,
    global_attributes: HashMap<QName, usize>,
}

/// Where a simple-type derivation chain ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChainBase {
    Atomic(Builtin),
    List(TypeId),
}

/// A simple type flattened into its base and the facets of every
/// restriction step, most derived first.
#[derive(Debug)]
pub(crate) struct SimpleChain<'s> {
    pub(crate) base: ChainBase,
    pub(crate) facets: Vec<&'s Facets>,
}

impl SimpleChain<'_> {
    pub(crate) fn white_space(&self) -> WhiteSpace {
        self.facets
            .iter()
            .find_map(|facets| facets.white_space)
            .unwrap_or(match self.base {
                ChainBase::Atomic(builtin) => builtin.white_space(),
                ChainBase::List(_) => WhiteSpace::Collapse,
            })
    }
}

impl Schema {
    /// Parses XSD text.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] when the text is not a schema, references an
    /// unknown component, or uses an unsupported construct.
    pub fn parse(text: &str) -> Result<Self, SchemaError> {
        parser::build(text)
    }

    /// Reads and compiles the schema file at `path`, and checks that it is
    /// bound to `expected_namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Io`] when the file cannot be read,
    /// [`SchemaError::NamespaceMismatch`] when its `targetNamespace` differs,
    /// and any error of [`Schema::parse`].
    pub fn load(path: &Utf8Path, expected_namespace: &str) -> Result<Self, SchemaError> {
        let text = read_schema_file(path)?;
        let schema = Self::parse(&text)?;
        schema.ensure_namespace(expected_namespace)?;
        info!(
            path = %path,
            namespace = expected_namespace,
            global_elements = schema.global_elements.len(),
            "schema loaded"
        );
        Ok(schema)
    }

    /// Returns the namespace the schema declares components in.
    #[must_use]
    pub fn target_namespace(&self) -> Option<&str> {
        self.target_namespace.as_deref()
    }

    /// Checks the schema's namespace binding.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::NamespaceMismatch`] when the schema's
    /// `targetNamespace` is not `expected`.
    pub fn ensure_namespace(&self, expected: &str) -> Result<(), SchemaError> {
        if self.target_namespace() == Some(expected) {
            return Ok(());
        }
        Err(SchemaError::NamespaceMismatch {
            expected: expected.to_owned(),
            found: self.target_namespace.clone(),
        })
    }

    /// Names of the elements allowed as document element.
    pub fn global_element_names(&self) -> impl Iterator<Item = &QName> {
        self.global_elements.keys()
    }

    pub(crate) fn type_def(&self, id: TypeId) -> Option<&TypeDef> {
        self.types.get(id.0)
    }

    pub(crate) fn element_decl(&self, id: ElementDeclId) -> Option<&ElementDecl> {
        self.elements.get(id.0)
    }

    pub(crate) fn global_element(&self, name: &QName) -> Option<(ElementDeclId, &ElementDecl)> {
        let id = *self.global_elements.get(name)?;
        self.element_decl(id).map(|decl| (id, decl))
    }

    pub(crate) fn global_attribute(&self, name: &QName) -> Option<&AttributeDecl> {
        self.global_attributes
            .get(name)
            .and_then(|index| self.attributes.get(*index))
    }

    /// Flattens the derivation chain of a simple type.
    ///
    /// Bounded by the number of types, so a cycle is reported rather than
    /// followed.
    pub(crate) fn simple_chain(&self, id: TypeId) -> Result<SimpleChain<'_>, SchemaError> {
        let mut facets = Vec::new();
        let mut current = id;
        for _ in 0..=self.types.len() {
            match self.type_def(current) {
                Some(TypeDef::Simple(SimpleType::Builtin(builtin))) => {
                    return Ok(SimpleChain {
                        base: ChainBase::Atomic(*builtin),
                        facets,
                    });
                }
                Some(TypeDef::Simple(SimpleType::List { item })) => {
                    return Ok(SimpleChain {
                        base: ChainBase::List(*item),
                        facets,
                    });
                }
                Some(TypeDef::Simple(SimpleType::Restriction { base, facets: step })) => {
                    facets.push(step);
                    current = *base;
                }
                Some(TypeDef::Complex(_)) => {
                    return Err(SchemaError::unsupported(
                        "simple type derived from a complex type",
                    ));
                }
                None => {
                    return Err(SchemaError::Unresolved {
                        kind: "type",
                        name: format!("#{}", current.0),
                    });
                }
            }
        }
        Err(SchemaError::CircularDerivation(format!("type #{}", id.0)))
    }

    /// Load-time checks that need every component in place.
    fn check_derivations(&self) -> Result<(), SchemaError> {
        for (index, definition) in self.types.iter().enumerate() {
            match definition {
                TypeDef::Simple(_) => self.check_simple(TypeId(index))?,
                TypeDef::Complex(complex) => {
                    if let ContentModel::Simple(base) = complex.content {
                        self.check_simple(base)?;
                    }
                    for attribute in &complex.attributes {
                        self.check_simple(attribute.decl.type_id)?;
                    }
                }
            }
        }
        for attribute in &self.attributes {
            self.check_simple(attribute.type_id)?;
        }
        Ok(())
    }

    fn check_simple(&self, id: TypeId) -> Result<(), SchemaError> {
        let chain = self.simple_chain(id)?;
        let (primitive, is_list) = match chain.base {
            ChainBase::Atomic(builtin) => (builtin.primitive(), false),
            ChainBase::List(item) => {
                if matches!(self.simple_chain(item)?.base, ChainBase::List(_)) {
                    return Err(SchemaError::unsupported("list of lists"));
                }
                (Primitive::String, true)
            }
        };
        for facets in chain.facets {
            facets.check_applicable(primitive, is_list)?;
        }
        Ok(())
    }
}

fn read_schema_file(path: &Utf8Path) -> Result<String, SchemaError> {
    let directory = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path.file_name().ok_or_else(|| {
        SchemaError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
        )
    })?;
    let dir = Dir::open_ambient_dir(directory, ambient_authority())
        .map_err(|err| SchemaError::io(path, err))?;
    dir.read_to_string(file_name)
        .map_err(|err| SchemaError::io(path, err))
}

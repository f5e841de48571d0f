//! Compiled schema components.
//!
//! Components reference each other through arena indices so that forward
//! references and recursive content models need no shared ownership.

use super::automaton::ContentAutomaton;
use super::builtins::Builtin;
use super::facets::Facets;
use crate::relay::domain::QName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TypeId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ElementDeclId(pub(crate) usize);

#[derive(Debug)]
pub(crate) enum TypeDef {
    Simple(SimpleType),
    Complex(ComplexType),
}

#[derive(Debug)]
pub(crate) enum SimpleType {
    Builtin(Builtin),
    Restriction { base: TypeId, facets: Facets },
    List { item: TypeId },
}

#[derive(Debug)]
pub(crate) struct ComplexType {
    pub(crate) mixed: bool,
    pub(crate) content: ContentModel,
    pub(crate) attributes: Vec<AttributeUse>,
    pub(crate) any_attribute: Option<Wildcard>,
}

#[derive(Debug)]
pub(crate) enum ContentModel {
    Empty,
    Simple(TypeId),
    Elements(ContentAutomaton),
    All(AllGroup),
}

/// Members of an `xs:all` group, each allowed at most once in any order.
#[derive(Debug)]
pub(crate) struct AllGroup {
    pub(crate) optional: bool,
    pub(crate) members: Vec<AllMember>,
}

#[derive(Debug)]
pub(crate) struct AllMember {
    pub(crate) element: ElementDeclId,
    pub(crate) required: bool,
}

#[derive(Debug, Clone)]
pub(crate) enum ValueConstraint {
    Default(String),
    Fixed(String),
}

impl ValueConstraint {
    pub(crate) fn value(&self) -> &str {
        match self {
            Self::Default(value) | Self::Fixed(value) => value,
        }
    }
}

#[derive(Debug)]
pub(crate) struct ElementDecl {
    pub(crate) name: QName,
    pub(crate) type_id: TypeId,
    pub(crate) nillable: bool,
    pub(crate) value_constraint: Option<ValueConstraint>,
}

#[derive(Debug, Clone)]
pub(crate) struct AttributeDecl {
    pub(crate) name: QName,
    pub(crate) type_id: TypeId,
    pub(crate) value_constraint: Option<ValueConstraint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttributeUseKind {
    Required,
    Optional,
    Prohibited,
}

#[derive(Debug, Clone)]
pub(crate) struct AttributeUse {
    pub(crate) decl: AttributeDecl,
    pub(crate) kind: AttributeUseKind,
}

/// Occurrence bounds of a particle; `max: None` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Occurs {
    pub(crate) min: u32,
    pub(crate) max: Option<u32>,
}

impl Occurs {
    pub(crate) const ONCE: Self = Self {
        min: 1,
        max: Some(1),
    };
}

#[derive(Debug, Clone)]
pub(crate) struct Particle {
    pub(crate) occurs: Occurs,
    pub(crate) term: Term,
}

#[derive(Debug, Clone)]
pub(crate) enum Term {
    Element { id: ElementDeclId, name: QName },
    Sequence(Vec<Particle>),
    Choice(Vec<Particle>),
    Any(Wildcard),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessContents {
    Strict,
    Lax,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NamespaceConstraint {
    Any,
    /// Any namespace except the given one; unqualified names never match.
    Not(Option<String>),
    Set(Vec<Option<String>>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Wildcard {
    pub(crate) namespaces: NamespaceConstraint,
    pub(crate) process: ProcessContents,
}

impl Wildcard {
    pub(crate) fn allows(&self, namespace: Option<&str>) -> bool {
        match &self.namespaces {
            NamespaceConstraint::Any => true,
            NamespaceConstraint::Not(excluded) => {
                namespace.is_some() && namespace != excluded.as_deref()
            }
            NamespaceConstraint::Set(allowed) => {
                allowed.iter().any(|entry| entry.as_deref() == namespace)
            }
        }
    }

    pub(crate) fn describe(&self) -> String {
        match &self.namespaces {
            NamespaceConstraint::Any => "any element".to_owned(),
            NamespaceConstraint::Not(_) => "an element from another namespace".to_owned(),
            NamespaceConstraint::Set(allowed) => {
                let names: Vec<&str> = allowed
                    .iter()
                    .map(|entry| entry.as_deref().unwrap_or("no namespace"))
                    .collect();
                format!("an element from {}", names.join(" or "))
            }
        }
    }
}

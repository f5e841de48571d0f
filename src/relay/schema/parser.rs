//! Reads an XSD document into the component model.
//!
//! Global components are registered before any body is built, so
//! references may point forward. Anything outside the supported subset is
//! rejected with [`SchemaError::Unsupported`].

use super::Schema;
use super::automaton::ContentAutomaton;
use super::builtins::{Builtin, WhiteSpace, XSD_NAMESPACE};
use super::error::SchemaError;
use super::facets::{Facets, Pattern};
use super::model::{
    AllGroup, AllMember, AttributeDecl, AttributeUse, AttributeUseKind, ComplexType, ContentModel,
    ElementDecl, ElementDeclId, NamespaceConstraint, Occurs, Particle, ProcessContents,
    SimpleType, Term, TypeDef, TypeId, ValueConstraint, Wildcard,
};
use crate::relay::domain::QName;
use roxmltree::Node;
use std::collections::HashMap;

pub(super) fn build(text: &str) -> Result<Schema, SchemaError> {
    let document =
        roxmltree::Document::parse(text).map_err(|err| SchemaError::Malformed(err.to_string()))?;
    let root = document.root_element();
    if !is_xs(root, "schema") {
        return Err(SchemaError::NotASchema {
            found: QName::new(root.tag_name().namespace(), root.tag_name().name()).to_string(),
        });
    }

    let mut builder = SchemaBuilder::new(root)?;
    let globals = schema_children(root)?;
    builder.register_globals(&globals)?;
    builder.build_globals(&globals)?;
    builder.finish()
}

struct SchemaBuilder {
    target_namespace: Option<String>,
    elements_qualified: bool,
    attributes_qualified: bool,
    types: Vec<Option<TypeDef>>,
    elements: Vec<Option<ElementDecl>>,
    attributes: Vec<Option<AttributeDecl>>,
    global_types: HashMap<QName, TypeId>,
    global_elements: HashMap<QName, ElementDeclId>,
    global_attributes: HashMap<QName, usize>,
    builtin_types: HashMap<Builtin, TypeId>,
    any_type: TypeId,
}

impl SchemaBuilder {
    fn new(root: Node<'_, '_>) -> Result<Self, SchemaError> {
        let target_namespace = root
            .attribute("targetNamespace")
            .filter(|namespace| !namespace.is_empty())
            .map(str::to_owned);
        let elements_qualified = form_default(root, "elementFormDefault")?;
        let attributes_qualified = form_default(root, "attributeFormDefault")?;

        let mut builder = Self {
            target_namespace,
            elements_qualified,
            attributes_qualified,
            types: Vec::new(),
            elements: Vec::new(),
            attributes: Vec::new(),
            global_types: HashMap::new(),
            global_elements: HashMap::new(),
            global_attributes: HashMap::new(),
            builtin_types: HashMap::new(),
            any_type: TypeId(0),
        };
        builder.any_type = builder.add_type(TypeDef::Complex(any_type()?));
        Ok(builder)
    }

    fn register_globals(&mut self, globals: &[Node<'_, '_>]) -> Result<(), SchemaError> {
        for node in globals {
            let local = node.tag_name().name();
            if !matches!(local, "element" | "complexType" | "simpleType" | "attribute") {
                return Err(SchemaError::unsupported(format!("top-level xs:{local}")));
            }
            let name = QName::new(self.target_namespace.clone(), required(*node, "name")?);
            let duplicate = match local {
                "element" => {
                    self.elements.push(None);
                    let id = ElementDeclId(self.elements.len() - 1);
                    self.global_elements.insert(name.clone(), id).is_some()
                }
                "attribute" => {
                    self.attributes.push(None);
                    let index = self.attributes.len() - 1;
                    self.global_attributes.insert(name.clone(), index).is_some()
                }
                _ => {
                    self.types.push(None);
                    let id = TypeId(self.types.len() - 1);
                    self.global_types.insert(name.clone(), id).is_some()
                }
            };
            if duplicate {
                let kind = match local {
                    "element" => "element",
                    "attribute" => "attribute",
                    _ => "type",
                };
                return Err(SchemaError::Duplicate {
                    kind,
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }

    fn build_globals(&mut self, globals: &[Node<'_, '_>]) -> Result<(), SchemaError> {
        // Attribute bodies first: `ref` uses copy them.
        for node in globals.iter().filter(|node| is_xs(**node, "attribute")) {
            let decl = self.attribute_decl(*node, true)?;
            if let Some(slot) = self
                .global_attributes
                .get(&decl.name)
                .and_then(|index| self.attributes.get_mut(*index))
            {
                *slot = Some(decl);
            }
        }

        for node in globals {
            let name = QName::new(self.target_namespace.clone(), required(*node, "name")?);
            match node.tag_name().name() {
                "element" => {
                    let decl = self.element_decl(*node, name.clone())?;
                    if let Some(slot) = self
                        .global_elements
                        .get(&name)
                        .and_then(|id| self.elements.get_mut(id.0))
                    {
                        *slot = Some(decl);
                    }
                }
                "complexType" | "simpleType" => {
                    let definition = if is_xs(*node, "complexType") {
                        TypeDef::Complex(self.complex_type(*node, &name.to_string())?)
                    } else {
                        TypeDef::Simple(self.simple_type(*node)?)
                    };
                    if let Some(slot) = self
                        .global_types
                        .get(&name)
                        .and_then(|id| self.types.get_mut(id.0))
                    {
                        *slot = Some(definition);
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<Schema, SchemaError> {
        let schema = Schema {
            target_namespace: self.target_namespace,
            types: filled(self.types, "type")?,
            elements: filled(self.elements, "element")?,
            attributes: filled(self.attributes, "attribute")?,
            global_elements: self.global_elements,
            global_attributes: self.global_attributes,
        };
        schema.check_derivations()?;
        Ok(schema)
    }

    fn add_type(&mut self, definition: TypeDef) -> TypeId {
        self.types.push(Some(definition));
        TypeId(self.types.len() - 1)
    }

    fn builtin(&mut self, builtin: Builtin) -> TypeId {
        if let Some(id) = self.builtin_types.get(&builtin) {
            return *id;
        }
        let id = self.add_type(TypeDef::Simple(SimpleType::Builtin(builtin)));
        self.builtin_types.insert(builtin, id);
        id
    }

    fn resolve_type(&mut self, node: Node<'_, '_>, reference: &str) -> Result<TypeId, SchemaError> {
        let name = resolve_qname(node, reference)?;
        if name.namespace() == Some(XSD_NAMESPACE) {
            if name.local_name() == "anyType" {
                return Ok(self.any_type);
            }
            let builtin = Builtin::from_local_name(name.local_name()).ok_or_else(|| {
                SchemaError::unsupported(format!("built-in type xs:{}", name.local_name()))
            })?;
            return Ok(self.builtin(builtin));
        }
        self.global_types
            .get(&name)
            .copied()
            .ok_or_else(|| SchemaError::Unresolved {
                kind: "type",
                name: name.to_string(),
            })
    }

    fn local_name(&self, node: Node<'_, '_>, qualified_default: bool) -> Result<QName, SchemaError> {
        let local = required(node, "name")?;
        let qualified = match node.attribute("form") {
            None => qualified_default,
            Some("qualified") => true,
            Some("unqualified") => false,
            Some(other) => return Err(invalid(node, "form", other)),
        };
        let namespace = if qualified {
            self.target_namespace.clone()
        } else {
            None
        };
        Ok(QName::new(namespace, local))
    }

    fn element_decl(&mut self, node: Node<'_, '_>, name: QName) -> Result<ElementDecl, SchemaError> {
        if node.has_attribute("substitutionGroup") {
            return Err(SchemaError::unsupported("substitution groups"));
        }
        if parse_bool(node, "abstract")? {
            return Err(SchemaError::unsupported("abstract elements"));
        }

        let mut inline = None;
        for child in schema_children(node)? {
            match child.tag_name().name() {
                "complexType" | "simpleType" if inline.is_none() => inline = Some(child),
                "key" | "keyref" | "unique" => {
                    return Err(SchemaError::unsupported("identity constraints"));
                }
                other => {
                    return Err(SchemaError::unsupported(format!("xs:{other} in xs:element")));
                }
            }
        }

        let type_id = match (node.attribute("type"), inline) {
            (Some(reference), None) => self.resolve_type(node, reference)?,
            (None, Some(child)) => self.anonymous_type(child, &name.to_string())?,
            (None, None) => self.any_type,
            (Some(reference), Some(_)) => return Err(invalid(node, "type", reference)),
        };

        Ok(ElementDecl {
            name,
            type_id,
            nillable: parse_bool(node, "nillable")?,
            value_constraint: value_constraint(node)?,
        })
    }

    fn anonymous_type(&mut self, node: Node<'_, '_>, context: &str) -> Result<TypeId, SchemaError> {
        let definition = if is_xs(node, "complexType") {
            TypeDef::Complex(self.complex_type(node, context)?)
        } else {
            TypeDef::Simple(self.simple_type(node)?)
        };
        Ok(self.add_type(definition))
    }

    fn element_particle(&mut self, node: Node<'_, '_>) -> Result<Particle, SchemaError> {
        let occurs = occurs(node)?;
        if let Some(reference) = node.attribute("ref") {
            let name = resolve_qname(node, reference)?;
            let id = self
                .global_elements
                .get(&name)
                .copied()
                .ok_or_else(|| SchemaError::Unresolved {
                    kind: "element",
                    name: name.to_string(),
                })?;
            return Ok(Particle {
                occurs,
                term: Term::Element { id, name },
            });
        }

        let name = self.local_name(node, self.elements_qualified)?;
        let decl = self.element_decl(node, name.clone())?;
        self.elements.push(Some(decl));
        let id = ElementDeclId(self.elements.len() - 1);
        Ok(Particle {
            occurs,
            term: Term::Element { id, name },
        })
    }

    fn complex_type(&mut self, node: Node<'_, '_>, context: &str) -> Result<ComplexType, SchemaError> {
        let mixed = parse_bool(node, "mixed")?;
        let mut content = None;
        let mut attributes: Vec<AttributeUse> = Vec::new();
        let mut any_attribute = None;

        for child in schema_children(node)? {
            let local = child.tag_name().name();
            let model = match local {
                "sequence" | "choice" => {
                    let particle = self.group_particle(child)?;
                    Some(ContentModel::Elements(ContentAutomaton::compile(&particle, context)?))
                }
                "all" => Some(ContentModel::All(self.all_group(child)?)),
                "simpleContent" => {
                    let (base, extension_attributes, extension_wildcard) =
                        self.simple_content(child)?;
                    attributes.extend(extension_attributes);
                    any_attribute = extension_wildcard.or(any_attribute);
                    Some(ContentModel::Simple(base))
                }
                "attribute" => {
                    attributes.push(self.attribute_use(child)?);
                    None
                }
                "anyAttribute" => {
                    any_attribute = Some(self.wildcard(child)?);
                    None
                }
                "complexContent" => {
                    return Err(SchemaError::unsupported("xs:complexContent derivation"));
                }
                other => {
                    return Err(SchemaError::unsupported(format!("xs:{other} in xs:complexType")));
                }
            };
            if let Some(model) = model {
                if content.is_some() {
                    return Err(SchemaError::unsupported(format!(
                        "more than one content model in {context}"
                    )));
                }
                content = Some(model);
            }
        }

        check_unique_attributes(&attributes)?;
        Ok(ComplexType {
            mixed,
            content: content.unwrap_or(ContentModel::Empty),
            attributes,
            any_attribute,
        })
    }

    fn simple_content(
        &mut self,
        node: Node<'_, '_>,
    ) -> Result<(TypeId, Vec<AttributeUse>, Option<Wildcard>), SchemaError> {
        let children = schema_children(node)?;
        let [extension] = children.as_slice() else {
            return Err(SchemaError::unsupported(
                "xs:simpleContent without exactly one xs:extension",
            ));
        };
        if !is_xs(*extension, "extension") {
            return Err(SchemaError::unsupported(format!(
                "xs:{} in xs:simpleContent",
                extension.tag_name().name()
            )));
        }
        let base = self.resolve_type(*extension, required(*extension, "base")?)?;
        let mut attributes = Vec::new();
        let mut any_attribute = None;
        for child in schema_children(*extension)? {
            match child.tag_name().name() {
                "attribute" => attributes.push(self.attribute_use(child)?),
                "anyAttribute" => any_attribute = Some(self.wildcard(child)?),
                other => {
                    return Err(SchemaError::unsupported(format!("xs:{other} in xs:extension")));
                }
            }
        }
        Ok((base, attributes, any_attribute))
    }

    fn group_particle(&mut self, node: Node<'_, '_>) -> Result<Particle, SchemaError> {
        let group_occurs = occurs(node)?;
        let mut particles = Vec::new();
        for child in schema_children(node)? {
            let particle = match child.tag_name().name() {
                "element" => self.element_particle(child)?,
                "sequence" | "choice" => self.group_particle(child)?,
                "any" => Particle {
                    occurs: occurs(child)?,
                    term: Term::Any(self.wildcard(child)?),
                },
                "all" => {
                    return Err(SchemaError::unsupported("xs:all inside another model group"));
                }
                "group" => return Err(SchemaError::unsupported("xs:group references")),
                other => {
                    return Err(SchemaError::unsupported(format!("xs:{other} in a model group")));
                }
            };
            particles.push(particle);
        }
        let term = if is_xs(node, "sequence") {
            Term::Sequence(particles)
        } else {
            Term::Choice(particles)
        };
        Ok(Particle {
            occurs: group_occurs,
            term,
        })
    }

    fn all_group(&mut self, node: Node<'_, '_>) -> Result<AllGroup, SchemaError> {
        let group_occurs = occurs(node)?;
        if group_occurs.max != Some(1) {
            return Err(SchemaError::unsupported("xs:all with maxOccurs other than 1"));
        }
        let mut members = Vec::new();
        for child in schema_children(node)? {
            if !is_xs(child, "element") {
                return Err(SchemaError::unsupported(format!(
                    "xs:{} in xs:all",
                    child.tag_name().name()
                )));
            }
            let particle = self.element_particle(child)?;
            let Term::Element { id, .. } = particle.term else {
                return Err(SchemaError::unsupported("non-element member of xs:all"));
            };
            if particle.occurs.max != Some(1) {
                return Err(SchemaError::unsupported("xs:all member with maxOccurs other than 1"));
            }
            members.push(AllMember {
                element: id,
                required: particle.occurs.min > 0,
            });
        }
        Ok(AllGroup {
            optional: group_occurs.min == 0,
            members,
        })
    }

    fn wildcard(&self, node: Node<'_, '_>) -> Result<Wildcard, SchemaError> {
        let namespaces = match node.attribute("namespace").map(str::trim) {
            None | Some("##any") => NamespaceConstraint::Any,
            Some("##other") => NamespaceConstraint::Not(self.target_namespace.clone()),
            Some(list) => NamespaceConstraint::Set(
                list.split_ascii_whitespace()
                    .map(|token| match token {
                        "##targetNamespace" => self.target_namespace.clone(),
                        "##local" => None,
                        uri => Some(uri.to_owned()),
                    })
                    .collect(),
            ),
        };
        let process = match node.attribute("processContents") {
            None | Some("strict") => ProcessContents::Strict,
            Some("lax") => ProcessContents::Lax,
            Some("skip") => ProcessContents::Skip,
            Some(other) => return Err(invalid(node, "processContents", other)),
        };
        Ok(Wildcard {
            namespaces,
            process,
        })
    }

    fn attribute_decl(&mut self, node: Node<'_, '_>, global: bool) -> Result<AttributeDecl, SchemaError> {
        let name = self.local_name(node, global || self.attributes_qualified)?;
        let mut inline = None;
        for child in schema_children(node)? {
            if is_xs(child, "simpleType") && inline.is_none() {
                inline = Some(child);
            } else {
                return Err(SchemaError::unsupported(format!(
                    "xs:{} in xs:attribute",
                    child.tag_name().name()
                )));
            }
        }
        let type_id = match (node.attribute("type"), inline) {
            (Some(reference), None) => self.resolve_type(node, reference)?,
            (None, Some(child)) => {
                let definition = self.simple_type(child)?;
                self.add_type(TypeDef::Simple(definition))
            }
            (None, None) => self.builtin(Builtin::AnySimpleType),
            (Some(reference), Some(_)) => return Err(invalid(node, "type", reference)),
        };
        Ok(AttributeDecl {
            name,
            type_id,
            value_constraint: value_constraint(node)?,
        })
    }

    fn attribute_use(&mut self, node: Node<'_, '_>) -> Result<AttributeUse, SchemaError> {
        let kind = match node.attribute("use") {
            None | Some("optional") => AttributeUseKind::Optional,
            Some("required") => AttributeUseKind::Required,
            Some("prohibited") => AttributeUseKind::Prohibited,
            Some(other) => return Err(invalid(node, "use", other)),
        };
        let decl = if let Some(reference) = node.attribute("ref") {
            let name = resolve_qname(node, reference)?;
            let mut decl = self
                .global_attributes
                .get(&name)
                .and_then(|index| self.attributes.get(*index))
                .and_then(Clone::clone)
                .ok_or_else(|| SchemaError::Unresolved {
                    kind: "attribute",
                    name: name.to_string(),
                })?;
            if let Some(constraint) = value_constraint(node)? {
                decl.value_constraint = Some(constraint);
            }
            decl
        } else {
            self.attribute_decl(node, false)?
        };
        Ok(AttributeUse { decl, kind })
    }

    fn simple_type(&mut self, node: Node<'_, '_>) -> Result<SimpleType, SchemaError> {
        let children = schema_children(node)?;
        let [derivation] = children.as_slice() else {
            return Err(SchemaError::unsupported(
                "xs:simpleType without exactly one derivation",
            ));
        };
        match derivation.tag_name().name() {
            "restriction" => self.restriction(*derivation),
            "list" => self.list(*derivation),
            "union" => Err(SchemaError::unsupported("xs:union")),
            other => Err(SchemaError::unsupported(format!("xs:{other} in xs:simpleType"))),
        }
    }

    fn restriction(&mut self, node: Node<'_, '_>) -> Result<SimpleType, SchemaError> {
        let mut base = node
            .attribute("base")
            .map(|reference| self.resolve_type(node, reference))
            .transpose()?;
        let mut facets = Facets::default();
        let mut patterns = Vec::new();

        for child in schema_children(node)? {
            let facet = child.tag_name().name();
            if facet == "simpleType" {
                if base.is_some() {
                    return Err(invalid(node, "base", "both attribute and inline type"));
                }
                let definition = self.simple_type(child)?;
                base = Some(self.add_type(TypeDef::Simple(definition)));
                continue;
            }
            let value = required(child, "value")?;
            match facet {
                "enumeration" => facets.enumeration.push(value.to_owned()),
                "pattern" => patterns.push(value.to_owned()),
                "length" => facets.length = Some(parse_count(facet, value)?),
                "minLength" => facets.min_length = Some(parse_count(facet, value)?),
                "maxLength" => facets.max_length = Some(parse_count(facet, value)?),
                "minInclusive" => facets.min_inclusive = Some(value.trim().to_owned()),
                "maxInclusive" => facets.max_inclusive = Some(value.trim().to_owned()),
                "minExclusive" => facets.min_exclusive = Some(value.trim().to_owned()),
                "maxExclusive" => facets.max_exclusive = Some(value.trim().to_owned()),
                "totalDigits" => facets.total_digits = Some(parse_digits(facet, value)?),
                "fractionDigits" => facets.fraction_digits = Some(parse_digits(facet, value)?),
                "whiteSpace" => {
                    facets.white_space = Some(WhiteSpace::from_keyword(value.trim()).ok_or_else(
                        || SchemaError::invalid_facet(facet, format!("unknown mode '{value}'")),
                    )?);
                }
                other => return Err(SchemaError::unsupported(format!("facet xs:{other}"))),
            }
        }

        if !patterns.is_empty() {
            facets.pattern = Some(Pattern::compile(patterns)?);
        }
        let base = base.ok_or_else(|| SchemaError::MissingAttribute {
            component: "restriction".to_owned(),
            attribute: "base",
        })?;
        Ok(SimpleType::Restriction { base, facets })
    }

    fn list(&mut self, node: Node<'_, '_>) -> Result<SimpleType, SchemaError> {
        let children = schema_children(node)?;
        let item = match (node.attribute("itemType"), children.as_slice()) {
            (Some(reference), []) => self.resolve_type(node, reference)?,
            (None, [inline]) if is_xs(*inline, "simpleType") => {
                let definition = self.simple_type(*inline)?;
                self.add_type(TypeDef::Simple(definition))
            }
            _ => {
                return Err(SchemaError::unsupported(
                    "xs:list without exactly one item type",
                ));
            }
        };
        Ok(SimpleType::List { item })
    }
}

fn any_type() -> Result<ComplexType, SchemaError> {
    let wildcard = Wildcard {
        namespaces: NamespaceConstraint::Any,
        process: ProcessContents::Lax,
    };
    let particle = Particle {
        occurs: Occurs { min: 0, max: None },
        term: Term::Any(wildcard.clone()),
    };
    Ok(ComplexType {
        mixed: true,
        content: ContentModel::Elements(ContentAutomaton::compile(&particle, "xs:anyType")?),
        attributes: Vec::new(),
        any_attribute: Some(wildcard),
    })
}

fn filled<T>(slots: Vec<Option<T>>, kind: &'static str) -> Result<Vec<T>, SchemaError> {
    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.ok_or_else(|| SchemaError::Unresolved {
                kind,
                name: format!("#{index}"),
            })
        })
        .collect()
}

fn is_xs(node: Node<'_, '_>, local: &str) -> bool {
    node.tag_name().namespace() == Some(XSD_NAMESPACE) && node.tag_name().name() == local
}

/// Element children of a schema component, without annotations.
fn schema_children<'a, 'input>(node: Node<'a, 'input>) -> Result<Vec<Node<'a, 'input>>, SchemaError> {
    let mut children = Vec::new();
    for child in node.children().filter(Node::is_element) {
        if child.tag_name().namespace() != Some(XSD_NAMESPACE) {
            return Err(SchemaError::unsupported(format!(
                "foreign element {} in xs:{}",
                QName::new(child.tag_name().namespace(), child.tag_name().name()),
                node.tag_name().name()
            )));
        }
        if child.tag_name().name() != "annotation" {
            children.push(child);
        }
    }
    Ok(children)
}

fn required<'a>(node: Node<'a, '_>, attribute: &'static str) -> Result<&'a str, SchemaError> {
    node.attribute(attribute)
        .ok_or_else(|| SchemaError::MissingAttribute {
            component: node.tag_name().name().to_owned(),
            attribute,
        })
}

fn invalid(node: Node<'_, '_>, attribute: &'static str, value: &str) -> SchemaError {
    SchemaError::InvalidAttribute {
        component: node.tag_name().name().to_owned(),
        attribute,
        value: value.to_owned(),
    }
}

fn resolve_qname(node: Node<'_, '_>, reference: &str) -> Result<QName, SchemaError> {
    let trimmed = reference.trim();
    let (prefix, local) = match trimmed.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, trimmed),
    };
    let namespace = node.lookup_namespace_uri(prefix);
    if prefix.is_some() && namespace.is_none() {
        return Err(SchemaError::Unresolved {
            kind: "prefix",
            name: trimmed.to_owned(),
        });
    }
    Ok(QName::new(namespace, local))
}

fn form_default(root: Node<'_, '_>, attribute: &'static str) -> Result<bool, SchemaError> {
    match root.attribute(attribute) {
        None | Some("unqualified") => Ok(false),
        Some("qualified") => Ok(true),
        Some(other) => Err(invalid(root, attribute, other)),
    }
}

fn parse_bool(node: Node<'_, '_>, attribute: &'static str) -> Result<bool, SchemaError> {
    match node.attribute(attribute).map(str::trim) {
        None | Some("false" | "0") => Ok(false),
        Some("true" | "1") => Ok(true),
        Some(other) => Err(invalid(node, attribute, other)),
    }
}

fn parse_u32(node: Node<'_, '_>, attribute: &'static str, value: &str) -> Result<u32, SchemaError> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| invalid(node, attribute, value))
}

fn occurs(node: Node<'_, '_>) -> Result<Occurs, SchemaError> {
    let min = match node.attribute("minOccurs") {
        None => 1,
        Some(value) => parse_u32(node, "minOccurs", value)?,
    };
    let max = match node.attribute("maxOccurs").map(str::trim) {
        None => Some(1),
        Some("unbounded") => None,
        Some(value) => Some(parse_u32(node, "maxOccurs", value)?),
    };
    if max.is_some_and(|max| max < min) {
        return Err(invalid(
            node,
            "maxOccurs",
            node.attribute("maxOccurs").unwrap_or_default(),
        ));
    }
    Ok(Occurs { min, max })
}

fn value_constraint(node: Node<'_, '_>) -> Result<Option<ValueConstraint>, SchemaError> {
    match (node.attribute("default"), node.attribute("fixed")) {
        (None, None) => Ok(None),
        (Some(value), None) => Ok(Some(ValueConstraint::Default(value.to_owned()))),
        (None, Some(value)) => Ok(Some(ValueConstraint::Fixed(value.to_owned()))),
        (Some(_), Some(value)) => Err(invalid(node, "fixed", value)),
    }
}

fn parse_count(facet: &str, value: &str) -> Result<usize, SchemaError> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| SchemaError::invalid_facet(facet, format!("'{value}' is not a count")))
}

fn parse_digits(facet: &str, value: &str) -> Result<u32, SchemaError> {
    value
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|digits| facet == "fractionDigits" || *digits > 0)
        .ok_or_else(|| SchemaError::invalid_facet(facet, format!("'{value}' is not a digit count")))
}

fn check_unique_attributes(attributes: &[AttributeUse]) -> Result<(), SchemaError> {
    for (index, attribute) in attributes.iter().enumerate() {
        let repeated = attributes
            .iter()
            .skip(index + 1)
            .any(|other| other.decl.name == attribute.decl.name);
        if repeated {
            return Err(SchemaError::Duplicate {
                kind: "attribute use",
                name: attribute.decl.name.to_string(),
            });
        }
    }
    Ok(())
}

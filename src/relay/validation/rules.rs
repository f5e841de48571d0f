//! Instance rules: one pass over the document tree.
//!
//! Elements are visited from an explicit work stack, each paired with the
//! declaration (or lax context) its parent assigned to it. Every finding is
//! collected; nothing stops the pass early.

use super::simple;
use crate::relay::domain::{Diagnostic, Document, Element, ElementId, QName};
use crate::relay::schema::{
    AllGroup, AttributeDecl, AttributeUseKind, ChildMatch, ComplexType, ContentModel, ElementDecl,
    ElementDeclId, ProcessContents, Schema, TypeDef, TypeId, ValueConstraint,
};
use std::collections::{HashMap, HashSet};

/// Namespace of the `xsi:*` instance attributes.
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

#[derive(Debug, Clone, Copy)]
enum Context {
    Declared(ElementDeclId),
    /// Matched by a lax wildcard with no global declaration.
    Lax,
}

pub(super) struct Validation<'a> {
    schema: &'a Schema,
    document: &'a Document,
    parents: HashMap<ElementId, ElementId>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Validation<'a> {
    pub(super) fn new(schema: &'a Schema, document: &'a Document) -> Self {
        Self {
            schema,
            document,
            parents: HashMap::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Runs the pass and returns every diagnostic in document order.
    pub(super) fn run(mut self) -> Vec<Diagnostic> {
        let document = self.document;
        let root = document.root();
        let Some((decl_id, _)) = self.schema.global_element(root.name()) else {
            let allowed: Vec<String> = self
                .schema
                .global_element_names()
                .map(ToString::to_string)
                .collect();
            self.error(
                ElementId::ROOT,
                format!(
                    "no declaration for document element {}; expected {}",
                    root.name(),
                    allowed.join(" or ")
                ),
            );
            return self.diagnostics;
        };

        let mut pending = vec![(ElementId::ROOT, Context::Declared(decl_id))];
        while let Some((id, context)) = pending.pop() {
            let Some(element) = document.element(id) else {
                continue;
            };
            for child in element.child_element_ids() {
                self.parents.insert(child, id);
            }
            let children = match context {
                Context::Declared(decl_id) => self.declared_element(id, element, decl_id),
                Context::Lax => self.lax_element(id, element),
            };
            pending.extend(children.into_iter().rev());
        }
        self.diagnostics
    }

    fn declared_element(
        &mut self,
        id: ElementId,
        element: &Element,
        decl_id: ElementDeclId,
    ) -> Vec<(ElementId, Context)> {
        let schema = self.schema;
        let Some(decl) = schema.element_decl(decl_id) else {
            return Vec::new();
        };
        self.check_instance_attributes(id, element);
        let definition = schema.type_def(decl.type_id);

        if self.is_nilled(id, element, decl) {
            if let Some(TypeDef::Complex(complex)) = definition {
                self.check_attributes(id, element, complex);
            }
            return Vec::new();
        }

        match definition {
            Some(TypeDef::Simple(_)) => {
                self.simple_element(id, element, decl, decl.type_id);
                Vec::new()
            }
            Some(TypeDef::Complex(complex)) => self.complex_element(id, element, decl, complex),
            None => Vec::new(),
        }
    }

    fn lax_element(&mut self, id: ElementId, element: &Element) -> Vec<(ElementId, Context)> {
        let schema = self.schema;
        for attribute in element.attributes() {
            if is_instance_attribute(attribute.name()) {
                continue;
            }
            if let Some(decl) = schema.global_attribute(attribute.name()) {
                self.check_attribute_value(id, decl, attribute.value());
            }
        }
        let document = self.document;
        document
            .child_elements(id)
            .map(|(child_id, child)| {
                let context = schema
                    .global_element(child.name())
                    .map_or(Context::Lax, |(decl_id, _)| Context::Declared(decl_id));
                (child_id, context)
            })
            .collect()
    }

    /// `xsi:type` is refused and location hints are reported as warnings.
    fn check_instance_attributes(&mut self, id: ElementId, element: &Element) {
        for attribute in element.attributes() {
            if !is_instance_attribute(attribute.name()) {
                continue;
            }
            match attribute.name().local_name() {
                "nil" => {}
                "type" => self.error(id, "xsi:type is not supported"),
                local @ ("schemaLocation" | "noNamespaceSchemaLocation") => {
                    self.warning(
                        id,
                        format!("xsi:{local} is ignored; the configured schema is used"),
                    );
                }
                other => self.error(id, format!("unknown instance attribute xsi:{other}")),
            }
        }
    }

    fn is_nilled(&mut self, id: ElementId, element: &Element, decl: &ElementDecl) -> bool {
        let Some(raw) = element.attribute(&QName::namespaced(XSI_NAMESPACE, "nil")) else {
            return false;
        };
        let nil = match raw.trim() {
            "true" | "1" => true,
            "false" | "0" => false,
            other => {
                self.error(id, format!("'{other}' is not a valid xsi:nil value"));
                return false;
            }
        };
        if !nil {
            return false;
        }
        if !decl.nillable {
            self.error(id, "xsi:nil is not allowed: the element is not nillable");
            return false;
        }
        if element.child_element_ids().next().is_some() || element.has_significant_text() {
            self.error(id, "an element with xsi:nil=\"true\" must be empty");
        }
        if matches!(decl.value_constraint, Some(ValueConstraint::Fixed(_))) {
            self.error(id, "an element with a fixed value cannot be nil");
        }
        true
    }

    fn simple_element(
        &mut self,
        id: ElementId,
        element: &Element,
        decl: &ElementDecl,
        type_id: TypeId,
    ) {
        for attribute in element.attributes() {
            if !is_instance_attribute(attribute.name()) {
                self.error(id, format!("attribute {} is not allowed", attribute.name()));
            }
        }
        self.check_text_value(id, element, decl, type_id);
    }

    /// Checks the text of a simple-typed or simple-content element.
    fn check_text_value(
        &mut self,
        id: ElementId,
        element: &Element,
        decl: &ElementDecl,
        type_id: TypeId,
    ) {
        if element.child_element_ids().next().is_some() {
            self.error(id, "child elements are not allowed in simple content");
            return;
        }
        let text = element.text();
        let value = match (&decl.value_constraint, text.is_empty()) {
            (Some(constraint), true) => constraint.value().to_owned(),
            _ => text,
        };
        if let Err(reason) = simple::check(self.schema, type_id, &value) {
            self.error(id, reason);
            return;
        }
        if let Some(ValueConstraint::Fixed(fixed)) = &decl.value_constraint
            && !simple::same_value(self.schema, type_id, &value, fixed)
        {
            self.error(
                id,
                format!("'{}' does not match the fixed value '{fixed}'", value.trim()),
            );
        }
    }

    fn complex_element(
        &mut self,
        id: ElementId,
        element: &Element,
        decl: &ElementDecl,
        complex: &'a ComplexType,
    ) -> Vec<(ElementId, Context)> {
        self.check_attributes(id, element, complex);
        let document = self.document;
        match &complex.content {
            ContentModel::Empty => {
                if element.child_element_ids().next().is_some() {
                    self.error(id, "the element must be empty");
                } else if !complex.mixed && element.has_significant_text() {
                    self.error(id, "text content is not allowed");
                }
                Vec::new()
            }
            ContentModel::Simple(type_id) => {
                self.check_text_value(id, element, decl, *type_id);
                Vec::new()
            }
            ContentModel::Elements(automaton) => {
                self.check_element_only_text(id, element, complex);
                let mut matcher = automaton.matcher();
                let mut next = Vec::new();
                for (child_id, child) in document.child_elements(id) {
                    match matcher.step(child.name()) {
                        Some(ChildMatch::Element(child_decl)) => {
                            next.push((child_id, Context::Declared(child_decl)));
                        }
                        Some(ChildMatch::Wildcard(wildcard)) => {
                            if let Some(context) =
                                self.wildcard_context(child_id, child, wildcard.process)
                            {
                                next.push((child_id, context));
                            }
                        }
                        None => {
                            let expected = describe_expected(&matcher.expected());
                            self.error(
                                child_id,
                                format!("unexpected element {}; expected {expected}", child.name()),
                            );
                        }
                    }
                }
                if !matcher.is_complete() {
                    let expected = describe_expected(&matcher.expected());
                    self.error(id, format!("content is incomplete; expected {expected}"));
                }
                next
            }
            ContentModel::All(group) => {
                self.check_element_only_text(id, element, complex);
                self.all_content(id, group)
            }
        }
    }

    fn check_element_only_text(&mut self, id: ElementId, element: &Element, complex: &ComplexType) {
        if !complex.mixed && element.has_significant_text() {
            self.error(id, "text content is not allowed in element-only content");
        }
    }

    fn all_content(&mut self, id: ElementId, group: &AllGroup) -> Vec<(ElementId, Context)> {
        let schema = self.schema;
        let document = self.document;
        let members: Vec<(ElementDeclId, &ElementDecl, bool)> = group
            .members
            .iter()
            .filter_map(|member| {
                schema
                    .element_decl(member.element)
                    .map(|decl| (member.element, decl, member.required))
            })
            .collect();

        let mut seen = HashSet::new();
        let mut next = Vec::new();
        let mut any_child = false;
        for (child_id, child) in document.child_elements(id) {
            any_child = true;
            let Some((decl_id, decl, _)) = members
                .iter()
                .find(|(_, decl, _)| decl.name == *child.name())
            else {
                let names: Vec<String> = members
                    .iter()
                    .filter(|(decl_id, _, _)| !seen.contains(decl_id))
                    .map(|(_, decl, _)| decl.name.local_name().to_owned())
                    .collect();
                let expected = describe_expected(&names);
                self.error(
                    child_id,
                    format!("unexpected element {}; expected {expected}", child.name()),
                );
                continue;
            };
            if !seen.insert(*decl_id) {
                self.error(
                    child_id,
                    format!("element {} may appear at most once", decl.name.local_name()),
                );
                continue;
            }
            next.push((child_id, Context::Declared(*decl_id)));
        }

        if any_child || !group.optional {
            for (decl_id, decl, required) in &members {
                if *required && !seen.contains(decl_id) {
                    self.error(
                        id,
                        format!("missing required element {}", decl.name.local_name()),
                    );
                }
            }
        }
        next
    }

    fn wildcard_context(
        &mut self,
        id: ElementId,
        element: &Element,
        process: ProcessContents,
    ) -> Option<Context> {
        let global = self.schema.global_element(element.name());
        match (process, global) {
            (ProcessContents::Skip, _) => None,
            (_, Some((decl_id, _))) => Some(Context::Declared(decl_id)),
            (ProcessContents::Lax, None) => Some(Context::Lax),
            (ProcessContents::Strict, None) => {
                self.error(
                    id,
                    format!("no declaration for {} matched by a strict wildcard", element.name()),
                );
                None
            }
        }
    }

    fn check_attributes(&mut self, id: ElementId, element: &Element, complex: &ComplexType) {
        let schema = self.schema;
        let mut present = HashSet::new();

        for attribute in element.attributes() {
            let name = attribute.name();
            if is_instance_attribute(name) {
                continue;
            }
            if let Some((index, attribute_use)) = complex
                .attributes
                .iter()
                .enumerate()
                .find(|(_, attribute_use)| attribute_use.decl.name == *name)
            {
                present.insert(index);
                if attribute_use.kind == AttributeUseKind::Prohibited {
                    self.attribute_error(id, name, "the attribute is prohibited");
                } else {
                    self.check_attribute_value(id, &attribute_use.decl, attribute.value());
                }
                continue;
            }
            let Some(wildcard) = complex
                .any_attribute
                .as_ref()
                .filter(|wildcard| wildcard.allows(name.namespace()))
            else {
                self.attribute_error(id, name, "the attribute is not allowed");
                continue;
            };
            match (wildcard.process, schema.global_attribute(name)) {
                (ProcessContents::Skip, _) | (ProcessContents::Lax, None) => {}
                (_, Some(decl)) => self.check_attribute_value(id, decl, attribute.value()),
                (ProcessContents::Strict, None) => {
                    self.attribute_error(id, name, "no declaration for a strict attribute wildcard");
                }
            }
        }

        for (index, attribute_use) in complex.attributes.iter().enumerate() {
            if attribute_use.kind == AttributeUseKind::Required && !present.contains(&index) {
                self.error(
                    id,
                    format!(
                        "missing required attribute {}",
                        attribute_use.decl.name.local_name()
                    ),
                );
            }
        }
    }

    fn check_attribute_value(&mut self, id: ElementId, decl: &AttributeDecl, value: &str) {
        if let Err(reason) = simple::check(self.schema, decl.type_id, value) {
            self.attribute_error(id, &decl.name, &reason);
            return;
        }
        if let Some(ValueConstraint::Fixed(fixed)) = &decl.value_constraint
            && !simple::same_value(self.schema, decl.type_id, value, fixed)
        {
            self.attribute_error(
                id,
                &decl.name,
                &format!("'{value}' does not match the fixed value '{fixed}'"),
            );
        }
    }

    fn error(&mut self, id: ElementId, message: impl Into<String>) {
        let path = self.path(id);
        self.diagnostics.push(Diagnostic::error(path, message));
    }

    fn warning(&mut self, id: ElementId, message: impl Into<String>) {
        let path = self.path(id);
        self.diagnostics.push(Diagnostic::warning(path, message));
    }

    fn attribute_error(&mut self, id: ElementId, name: &QName, message: &str) {
        let path = format!("{}/@{}", self.path(id), name.local_name());
        self.diagnostics.push(Diagnostic::error(path, message));
    }

    /// Builds `/a/b/c` by following parent links up to the root.
    fn path(&self, id: ElementId) -> String {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(element_id) = current {
            if let Some(element) = self.document.element(element_id) {
                names.push(element.name().local_name());
            }
            current = self.parents.get(&element_id).copied();
        }
        names.iter().rev().fold(String::new(), |mut path, name| {
            path.push('/');
            path.push_str(name);
            path
        })
    }
}

fn is_instance_attribute(name: &QName) -> bool {
    name.namespace() == Some(XSI_NAMESPACE)
}

fn describe_expected(names: &[String]) -> String {
    match names {
        [] => "no further elements".to_owned(),
        [single] => single.clone(),
        _ => format!("one of {}", names.join(", ")),
    }
}

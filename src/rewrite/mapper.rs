//! Read-only name lookups over the resolved tree.
//!
//! Once resolution has fixed every output name, the rewriter needs one
//! question answered over and over: *what is this identifier called now?*
//! [`NameMapper`] answers it for classes, members (walking the inheritance
//! chain, since a pool reference may name an inherited member through a
//! subclass), descriptors, and generic signatures. `None` always means
//! "unchanged" - external names, special methods, and anything the tree does
//! not know fall through untouched.

use crate::classfile::descriptor;
use crate::rename::oracle::{OracleCache, TypeOracle};
use crate::tree::{ClassId, ClassTree, SuperHandle};

/// The rewriter's view of the resolved tree plus the external-type cache.
pub struct NameMapper<'a, O: TypeOracle> {
    tree: &'a ClassTree,
    oracle: &'a OracleCache<O>,
}

impl<'a, O: TypeOracle> NameMapper<'a, O> {
    /// A mapper over a resolved tree.
    pub fn new(tree: &'a ClassTree, oracle: &'a OracleCache<O>) -> NameMapper<'a, O> {
        NameMapper { tree, oracle }
    }

    /// The tree this mapper reads.
    pub fn tree(&self) -> &ClassTree {
        self.tree
    }

    /// New qualified name for `original`, or `None` if unchanged or unknown.
    /// Array descriptors (`[La/B;`) are handled by element rewriting.
    pub fn map_class(&self, original: &str) -> Option<String> {
        if original.starts_with('[') {
            let mapped = descriptor::map_descriptor(original, &|name| self.map_class(name));
            return (mapped != original).then_some(mapped);
        }
        let id = self.tree.class_by_name(original)?;
        let output = self.tree.output_qualified_name(id);
        (output != original).then_some(output)
    }

    /// New name for the method `(name, descriptor)` reached through `class`,
    /// walking up the hierarchy to the declaring class.
    pub fn map_method(&self, class: &str, name: &str, descriptor: &str) -> Option<String> {
        let start = self.tree.class_by_name(class)?;
        let id = self.find_method(start, name, descriptor)?;
        let node = self.tree.method(id);
        let output = node.base.effective_name();
        (output != name).then(|| output.to_string())
    }

    /// New name for the field `name` reached through `class`.
    pub fn map_field(&self, class: &str, name: &str) -> Option<String> {
        let start = self.tree.class_by_name(class)?;
        let id = self.find_field(start, name)?;
        let node = self.tree.field(id);
        let output = node.base.effective_name();
        (output != name).then(|| output.to_string())
    }

    /// New name for an annotation element, resolved against the annotation
    /// class's zero-argument methods.
    pub fn map_annotation_element(&self, annotation_class: &str, name: &str) -> Option<String> {
        let id = self.tree.class_by_name(annotation_class)?;
        let method = self
            .tree
            .class(id)
            .methods
            .iter()
            .copied()
            .find(|&method| {
                let node = self.tree.method(method);
                node.base.original_name == name && node.descriptor.starts_with("()")
            })?;
        let output = self.tree.method(method).base.effective_name();
        (output != name).then(|| output.to_string())
    }

    /// Rewrite every class name embedded in a descriptor.
    pub fn map_descriptor(&self, original: &str) -> String {
        descriptor::map_descriptor(original, &|name| self.map_class(name))
    }

    /// Rewrite every class reference of a generic signature.
    pub fn map_signature(&self, original: &str) -> String {
        descriptor::map_signature(original, &|name| self.map_class(name))
    }

    /// Locate the declaring class of `(name, descriptor)` starting at `id`.
    /// Special methods resolve only on the named class itself; the walk
    /// stops at external ancestors.
    fn find_method(&self, id: ClassId, name: &str, descriptor: &str) -> Option<crate::tree::MethodId> {
        if name == "<init>" || name == "<clinit>" {
            return self
                .tree
                .class(id)
                .special_methods
                .iter()
                .copied()
                .find(|&method| {
                    let node = self.tree.method(method);
                    node.base.original_name == name && node.descriptor == descriptor
                });
        }
        let mut stack = vec![id];
        let mut seen = std::collections::HashSet::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            if let Some(method) = self.tree.method_of(current, name, descriptor) {
                return Some(method);
            }
            for handle in &self.tree.class(current).up_links {
                // External ancestors freeze the name; nothing to map there.
                if let SuperHandle::Internal(up) = handle {
                    stack.push(*up);
                }
            }
        }
        None
    }

    fn find_field(&self, id: ClassId, name: &str) -> Option<crate::tree::FieldId> {
        let mut stack = vec![id];
        let mut seen = std::collections::HashSet::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            if let Some(field) = self.tree.field_of(current, name) {
                return Some(field);
            }
            for handle in &self.tree.class(current).up_links {
                if let SuperHandle::Internal(up) = handle {
                    stack.push(*up);
                }
            }
        }
        None
    }
}

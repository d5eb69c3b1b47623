//! Reachability sweep for dead-code trimming.
//!
//! Trimming is a mark phase over the tree followed by record removal in the
//! rewriter. Every node starts `NotChecked`; the worklist is seeded with the
//! script-retained nodes and with members whose override root lies outside
//! the analyzed set (they can be called by code we never see). Marking then
//! follows the references a running program could: a kept class pins its
//! supertype chain, its `<clinit>`, and its internal-override members; a
//! kept member pins everything its bytecode touches; a kept static member
//! pins its owning class. Whatever stays `NotChecked` is marked `Trim` and
//! dropped from the output.
//!
//! Closure property: no kept node's reference list reaches a trimmed node.

use std::collections::HashSet;

use crate::tree::{ClassId, ClassTree, MethodId, NodeRef, SuperHandle, TrimMark, TrimRef};

/// Run the sweep, leaving every node marked `Keep` or `Trim`.
pub fn sweep(tree: &mut ClassTree) {
    for id in tree.class_ids() {
        tree.class_mut(id).base.trim = TrimMark::NotChecked;
    }
    for id in tree.method_ids() {
        tree.method_mut(id).base.trim = TrimMark::NotChecked;
    }
    for id in tree.field_ids() {
        tree.field_mut(id).base.trim = TrimMark::NotChecked;
    }

    let mut worklist: Vec<NodeRef> = Vec::new();
    for id in tree.class_ids() {
        if tree.class(id).base.from_script {
            worklist.push(NodeRef::Class(id));
        }
    }
    for id in tree.method_ids() {
        let method = tree.method(id);
        if method.base.from_script || method.external_root {
            worklist.push(NodeRef::Method(id));
        }
    }
    for id in tree.field_ids() {
        let field = tree.field(id);
        if field.base.from_script || field.external_root {
            worklist.push(NodeRef::Field(id));
        }
    }

    while let Some(node) = worklist.pop() {
        match node {
            NodeRef::Class(id) => {
                if tree.class(id).base.trim == TrimMark::Keep {
                    continue;
                }
                tree.class_mut(id).base.trim = TrimMark::Keep;
                let class = tree.class(id);
                for handle in &class.up_links {
                    if let SuperHandle::Internal(up) = handle {
                        worklist.push(NodeRef::Class(*up));
                    }
                }
                for &special in &class.special_methods {
                    if tree.method(special).base.original_name == "<clinit>" {
                        worklist.push(NodeRef::Method(special));
                    }
                }
                // Overrides ride along with their class: they are reachable
                // exactly when something can hold an instance of it.
                for &method in &class.methods {
                    if tree.method(method).is_override {
                        worklist.push(NodeRef::Method(method));
                    }
                }
            }
            NodeRef::Method(id) => {
                if tree.method(id).base.trim == TrimMark::Keep {
                    continue;
                }
                tree.method_mut(id).base.trim = TrimMark::Keep;
                let method = tree.method(id);
                if method.is_static() {
                    worklist.push(NodeRef::Class(method.owner));
                }
                push_resolved_refs(tree, &method.trim_refs.clone(), &mut worklist);
            }
            NodeRef::Field(id) => {
                if tree.field(id).base.trim == TrimMark::Keep {
                    continue;
                }
                tree.field_mut(id).base.trim = TrimMark::Keep;
                if tree.field(id).is_static() {
                    let owner = tree.field(id).owner;
                    worklist.push(NodeRef::Class(owner));
                }
            }
            NodeRef::Package(_) => {}
        }
    }

    for id in tree.class_ids() {
        if tree.class(id).base.trim == TrimMark::NotChecked {
            tree.class_mut(id).base.trim = TrimMark::Trim;
        }
    }
    for id in tree.method_ids() {
        if tree.method(id).base.trim == TrimMark::NotChecked {
            tree.method_mut(id).base.trim = TrimMark::Trim;
        }
    }
    for id in tree.field_ids() {
        if tree.field(id).base.trim == TrimMark::NotChecked {
            tree.field_mut(id).base.trim = TrimMark::Trim;
        }
    }
}

/// Resolve one member's recorded bytecode references against the tree and
/// push what they pin. References into external types resolve to nothing.
fn push_resolved_refs(tree: &ClassTree, refs: &[TrimRef], worklist: &mut Vec<NodeRef>) {
    for reference in refs {
        match reference {
            TrimRef::Class(name) => {
                if let Some(id) = tree.class_by_name(name) {
                    worklist.push(NodeRef::Class(id));
                }
            }
            TrimRef::Field { class, name } => {
                if let Some(class_id) = tree.class_by_name(class) {
                    worklist.push(NodeRef::Class(class_id));
                    if let Some(field) = find_field(tree, class_id, name) {
                        worklist.push(NodeRef::Field(field));
                    }
                }
            }
            TrimRef::Method {
                class,
                name,
                descriptor,
            } => {
                if let Some(class_id) = tree.class_by_name(class) {
                    worklist.push(NodeRef::Class(class_id));
                    if let Some(method) = find_method(tree, class_id, name, descriptor) {
                        worklist.push(NodeRef::Method(method));
                    }
                }
            }
        }
    }
}

/// Hierarchy-walking method lookup, special methods included on the named
/// class itself.
fn find_method(tree: &ClassTree, start: ClassId, name: &str, descriptor: &str) -> Option<MethodId> {
    if name == "<init>" || name == "<clinit>" {
        return tree
            .class(start)
            .special_methods
            .iter()
            .copied()
            .find(|&method| {
                let node = tree.method(method);
                node.base.original_name == name && node.descriptor == descriptor
            });
    }
    let mut stack = vec![start];
    let mut seen = HashSet::new();
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        if let Some(method) = tree.method_of(id, name, descriptor) {
            return Some(method);
        }
        for handle in &tree.class(id).up_links {
            if let SuperHandle::Internal(up) = handle {
                stack.push(*up);
            }
        }
    }
    None
}

fn find_field(tree: &ClassTree, start: ClassId, name: &str) -> Option<crate::tree::FieldId> {
    let mut stack = vec![start];
    let mut seen = HashSet::new();
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        if let Some(field) = tree.field_of(id, name) {
            return Some(field);
        }
        for handle in &tree.class(id).up_links {
            if let SuperHandle::Internal(up) = handle {
                stack.push(*up);
            }
        }
    }
    None
}

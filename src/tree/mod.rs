//! Whole-program symbol tree.
//!
//! Every class file loaded into a session lands in one [`ClassTree`]: an
//! arena-based forest of packages, classes, methods, and fields addressed by
//! typed ids. The tree is what makes renaming a *whole-program* decision -
//! override chains, namespace groups, and trim reachability are all walks
//! over it rather than over individual files.
//!
//! # Architecture
//!
//! Nodes live in four flat `Vec` arenas and point at each other through
//! [`PackageId`]/[`ClassId`]/[`MethodId`]/[`FieldId`] indices, so links stay
//! valid across mutation and there is no `Rc` cycle to manage. Classes whose
//! outer class has not been seen yet are entered as *placeholders* and
//! promoted in place when the real record arrives; inner classes loaded
//! first keep their links.
//!
//! # Key Components
//!
//! - [`ClassTree`] - the arena and every structural operation over it.
//! - [`node`] - the node types and typed ids.
//! - [`wildcard`] - the `*`/`**` class-name patterns used by retain
//!   directives.
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use classcloak::classfile::ClassFile;
//! use classcloak::tree::ClassTree;
//!
//! let bytes = std::fs::read("Greeter.class")?;
//! let mut tree = ClassTree::new();
//! let id = tree.add_class_file(&ClassFile::decode(&bytes)?)?;
//! assert_eq!(tree.class_qualified_name(id), "demo/Greeter");
//! # Ok::<(), classcloak::Error>(())
//! ```

use std::collections::HashMap;

use crate::classfile::access::{ClassAccess, FieldAccess, MethodAccess};
use crate::classfile::{attributes, code, ClassFile, ConstantPool, PoolEntry};
use crate::{Error, Result};

pub mod node;
pub mod wildcard;

pub use node::{
    ClassId, ClassNode, FieldId, MemberNode, MethodId, NodeBase, NodeRef, PackageId, PackageNode,
    SuperHandle, TrimMark, TrimRef,
};
pub use wildcard::WildcardPattern;

/// Pre-order visitor over the tree. Every method has an empty default, so
/// implementors override only what they care about.
pub trait TreeVisitor {
    /// Called for every package except the unnamed root.
    fn visit_package(&mut self, tree: &ClassTree, id: PackageId) {
        let _ = (tree, id);
    }
    /// Called for every class, placeholders included.
    fn visit_class(&mut self, tree: &ClassTree, id: ClassId) {
        let _ = (tree, id);
    }
    /// Called for every field of a visited class.
    fn visit_field(&mut self, tree: &ClassTree, id: FieldId) {
        let _ = (tree, id);
    }
    /// Called for every method (special methods included) of a visited class.
    fn visit_method(&mut self, tree: &ClassTree, id: MethodId) {
        let _ = (tree, id);
    }
}

/// The arena forest over everything the session has loaded.
#[derive(Debug)]
pub struct ClassTree {
    packages: Vec<PackageNode>,
    classes: Vec<ClassNode>,
    methods: Vec<MemberNode>,
    fields: Vec<MemberNode>,
    /// Qualified binary name (original) to class id.
    class_index: HashMap<String, ClassId>,
}

impl Default for ClassTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassTree {
    /// An empty tree holding only the unnamed root package.
    #[must_use]
    pub fn new() -> ClassTree {
        ClassTree {
            packages: vec![PackageNode::new("", None)],
            classes: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            class_index: HashMap::new(),
        }
    }

    /// The unnamed root package.
    #[must_use]
    pub fn root(&self) -> PackageId {
        PackageId(0)
    }

    /// Package node by id.
    #[must_use]
    pub fn package(&self, id: PackageId) -> &PackageNode {
        &self.packages[id.index()]
    }

    /// Mutable package node by id.
    pub fn package_mut(&mut self, id: PackageId) -> &mut PackageNode {
        &mut self.packages[id.index()]
    }

    /// Class node by id.
    #[must_use]
    pub fn class(&self, id: ClassId) -> &ClassNode {
        &self.classes[id.index()]
    }

    /// Mutable class node by id.
    pub fn class_mut(&mut self, id: ClassId) -> &mut ClassNode {
        &mut self.classes[id.index()]
    }

    /// Method node by id.
    #[must_use]
    pub fn method(&self, id: MethodId) -> &MemberNode {
        &self.methods[id.index()]
    }

    /// Mutable method node by id.
    pub fn method_mut(&mut self, id: MethodId) -> &mut MemberNode {
        &mut self.methods[id.index()]
    }

    /// Field node by id.
    #[must_use]
    pub fn field(&self, id: FieldId) -> &MemberNode {
        &self.fields[id.index()]
    }

    /// Mutable field node by id.
    pub fn field_mut(&mut self, id: FieldId) -> &mut MemberNode {
        &mut self.fields[id.index()]
    }

    /// All package ids, root first, in creation order.
    pub fn package_ids(&self) -> impl Iterator<Item = PackageId> {
        (0..self.packages.len() as u32).map(PackageId)
    }

    /// All class ids in creation order.
    pub fn class_ids(&self) -> impl Iterator<Item = ClassId> {
        (0..self.classes.len() as u32).map(ClassId)
    }

    /// All method ids in creation order.
    pub fn method_ids(&self) -> impl Iterator<Item = MethodId> {
        (0..self.methods.len() as u32).map(MethodId)
    }

    /// All field ids in creation order.
    pub fn field_ids(&self) -> impl Iterator<Item = FieldId> {
        (0..self.fields.len() as u32).map(FieldId)
    }

    /// Number of non-placeholder classes.
    #[must_use]
    pub fn class_count(&self) -> usize {
        self.classes.iter().filter(|c| !c.is_placeholder).count()
    }

    /// Look a class up by its original qualified binary name.
    #[must_use]
    pub fn class_by_name(&self, name: &str) -> Option<ClassId> {
        self.class_index.get(name).copied()
    }

    /// Find a regular method of `class` by name and descriptor. Special
    /// methods (`<init>`/`<clinit>`) are not searched.
    #[must_use]
    pub fn method_of(&self, class: ClassId, name: &str, descriptor: &str) -> Option<MethodId> {
        self.class(class).methods.iter().copied().find(|&id| {
            let method = self.method(id);
            method.base.original_name == name && method.descriptor == descriptor
        })
    }

    /// Find a field of `class` by name.
    #[must_use]
    pub fn field_of(&self, class: ClassId, name: &str) -> Option<FieldId> {
        self.class(class)
            .fields
            .iter()
            .copied()
            .find(|&id| self.field(id).base.original_name == name)
    }

    /// All non-placeholder classes whose original qualified name matches
    /// `pattern`, in creation order.
    pub fn wildcard_lookup(&self, pattern: &str) -> Result<Vec<ClassId>> {
        let compiled = WildcardPattern::compile(pattern)?;
        Ok(self
            .class_ids()
            .filter(|&id| !self.class(id).is_placeholder)
            .filter(|&id| compiled.matches(&self.class_qualified_name(id)))
            .collect())
    }

    /// Enter one decoded class file into the tree.
    ///
    /// The qualified name is split on `/` (packages) and `$` (nested
    /// classes); intermediate packages and not-yet-seen outer classes are
    /// created on the fly, outers as placeholders. A placeholder is promoted
    /// in place when its real record arrives.
    ///
    /// # Errors
    /// Fails with [`Error::InconsistentReference`] when the same class is
    /// defined twice, or when a member collection repeats a key (method
    /// `name+descriptor`, field `name`).
    pub fn add_class_file(&mut self, file: &ClassFile) -> Result<ClassId> {
        let qualified = file.class_name()?.to_string();
        let id = self.ensure_class(&qualified);
        if !self.class(id).is_placeholder {
            return Err(Error::InconsistentReference(format!(
                "class '{qualified}' defined twice"
            )));
        }

        let super_name = file.super_name()?.map(str::to_string);
        let interface_names: Vec<String> = file
            .interface_names()?
            .into_iter()
            .map(str::to_string)
            .collect();

        {
            let class = self.class_mut(id);
            class.is_placeholder = false;
            class.super_name = super_name;
            class.interface_names = interface_names;
            class.is_interface =
                ClassAccess::from_raw(file.access_flags).contains(ClassAccess::INTERFACE);
        }

        for field in &file.fields {
            let name = field.name(&file.pool)?.to_string();
            let descriptor = field.descriptor(&file.pool)?.to_string();
            if self.field_of(id, &name).is_some() {
                return Err(Error::InconsistentReference(format!(
                    "field '{name}' defined twice on '{qualified}'"
                )));
            }
            let synthetic = FieldAccess::from_raw(field.access_flags)
                .contains(FieldAccess::SYNTHETIC)
                || attributes::find_by_name(&field.attributes, &file.pool, "Synthetic")?.is_some();
            let node = MemberNode::new(name, id, descriptor, field.access_flags, synthetic);
            let field_id = FieldId(self.fields.len() as u32);
            self.fields.push(node);
            self.class_mut(id).fields.push(field_id);
        }

        for method in &file.methods {
            let name = method.name(&file.pool)?.to_string();
            let descriptor = method.descriptor(&file.pool)?.to_string();
            let special = name == "<init>" || name == "<clinit>";
            if !special && self.method_of(id, &name, &descriptor).is_some() {
                return Err(Error::InconsistentReference(format!(
                    "method '{name}{descriptor}' defined twice on '{qualified}'"
                )));
            }
            let synthetic = MethodAccess::from_raw(method.access_flags)
                .contains(MethodAccess::SYNTHETIC)
                || attributes::find_by_name(&method.attributes, &file.pool, "Synthetic")?.is_some();
            let mut node = MemberNode::new(name, id, descriptor, method.access_flags, synthetic);
            if special {
                // Constructors and class initializers keep their names.
                node.base.keep_original();
            }
            node.trim_refs = collect_trim_refs(&file.pool, &method.attributes)?;
            let method_id = MethodId(self.methods.len() as u32);
            self.methods.push(node);
            let class = self.class_mut(id);
            if special {
                class.special_methods.push(method_id);
            } else {
                class.methods.push(method_id);
            }
        }

        Ok(id)
    }

    /// Rebuild every class's `down_links` from the declared supertype names.
    /// Must run before any resolution pass; external supertypes contribute
    /// nothing here.
    pub fn build_down_links(&mut self) {
        for class in &mut self.classes {
            class.down_links.clear();
        }
        for id in self.class_ids() {
            let mut supers: Vec<ClassId> = Vec::new();
            {
                let class = self.class(id);
                if let Some(super_name) = &class.super_name {
                    if let Some(super_id) = self.class_by_name(super_name) {
                        supers.push(super_id);
                    }
                }
                for interface in &class.interface_names {
                    if let Some(interface_id) = self.class_by_name(interface) {
                        supers.push(interface_id);
                    }
                }
            }
            for super_id in supers {
                self.class_mut(super_id).down_links.push(id);
            }
        }
    }

    /// Reset the one-shot `scanned`/`resolved` flags and namespace stamps.
    pub fn reset_resolution_flags(&mut self) {
        for class in &mut self.classes {
            class.scanned = false;
            class.resolved = false;
            class.namespace = None;
        }
    }

    /// Original qualified path of a package (`""` for the root).
    #[must_use]
    pub fn package_path(&self, id: PackageId) -> String {
        let node = self.package(id);
        match node.parent {
            None => String::new(),
            Some(parent) => {
                let prefix = self.package_path(parent);
                if prefix.is_empty() {
                    node.base.original_name.clone()
                } else {
                    format!("{prefix}/{}", node.base.original_name)
                }
            }
        }
    }

    /// Output path of a package, honoring fixed names and repackaging. A
    /// repackaged package's single flat segment replaces its whole path.
    #[must_use]
    pub fn output_package_path(&self, id: PackageId) -> String {
        let node = self.package(id);
        if node.repackaged {
            return node.base.effective_name().to_string();
        }
        match node.parent {
            None => String::new(),
            Some(parent) => {
                let prefix = self.output_package_path(parent);
                if prefix.is_empty() {
                    node.base.effective_name().to_string()
                } else {
                    format!("{prefix}/{}", node.base.effective_name())
                }
            }
        }
    }

    /// Original qualified binary name of a class.
    #[must_use]
    pub fn class_qualified_name(&self, id: ClassId) -> String {
        let class = self.class(id);
        match class.outer {
            Some(outer) => format!(
                "{}${}",
                self.class_qualified_name(outer),
                class.base.original_name
            ),
            None => {
                let path = self.package_path(class.package);
                if path.is_empty() {
                    class.base.original_name.clone()
                } else {
                    format!("{path}/{}", class.base.original_name)
                }
            }
        }
    }

    /// Output qualified binary name of a class, honoring fixed names and
    /// repackaged packages.
    #[must_use]
    pub fn output_qualified_name(&self, id: ClassId) -> String {
        let class = self.class(id);
        match class.outer {
            Some(outer) => format!(
                "{}${}",
                self.output_qualified_name(outer),
                class.base.effective_name()
            ),
            None => {
                let path = self.output_package_path(class.package);
                if path.is_empty() {
                    class.base.effective_name().to_string()
                } else {
                    format!("{path}/{}", class.base.effective_name())
                }
            }
        }
    }

    /// Pre-order walk: package, sub-packages, then per class: class, fields,
    /// methods, inner classes. Iteration follows insertion order.
    pub fn walk(&self, visitor: &mut impl TreeVisitor) {
        self.walk_package(self.root(), visitor);
    }

    fn walk_package(&self, id: PackageId, visitor: &mut impl TreeVisitor) {
        if id != self.root() {
            visitor.visit_package(self, id);
        }
        let node = self.package(id);
        for &sub in &node.sub_packages {
            self.walk_package(sub, visitor);
        }
        for &class in &node.classes {
            self.walk_class(class, visitor);
        }
    }

    fn walk_class(&self, id: ClassId, visitor: &mut impl TreeVisitor) {
        visitor.visit_class(self, id);
        let class = self.class(id);
        for &field in &class.fields {
            visitor.visit_field(self, field);
        }
        for &method in class.methods.iter().chain(&class.special_methods) {
            visitor.visit_method(self, method);
        }
        for &inner in &class.inner_classes {
            self.walk_class(inner, visitor);
        }
    }

    /// Resolve-or-create the package at `path` (`""` is the root).
    fn ensure_package(&mut self, path: &str) -> PackageId {
        let mut current = self.root();
        if path.is_empty() {
            return current;
        }
        for segment in path.split('/') {
            let existing = self
                .package(current)
                .sub_packages
                .iter()
                .copied()
                .find(|&sub| self.package(sub).base.original_name == segment);
            current = match existing {
                Some(id) => id,
                None => {
                    let id = PackageId(self.packages.len() as u32);
                    self.packages.push(PackageNode::new(segment, Some(current)));
                    self.package_mut(current).sub_packages.push(id);
                    id
                }
            };
        }
        current
    }

    /// Resolve-or-create the class at `qualified`, creating intermediate
    /// packages and placeholder outer classes as needed.
    pub(crate) fn ensure_class(&mut self, qualified: &str) -> ClassId {
        if let Some(id) = self.class_index.get(qualified) {
            return *id;
        }
        let (package_path, local) = match qualified.rsplit_once('/') {
            Some((path, local)) => (path, local),
            None => ("", qualified),
        };
        let package = self.ensure_package(package_path);

        // `$` nests classes; a name with an empty `$`-segment (compiler
        // artifacts like `$Proxy0`) is treated as one flat name.
        let chain: Vec<&str> = if local.split('$').any(str::is_empty) {
            vec![local]
        } else {
            local.split('$').collect()
        };

        let mut outer: Option<ClassId> = None;
        let mut qualified_so_far = if package_path.is_empty() {
            String::new()
        } else {
            format!("{package_path}/")
        };
        for (depth, simple) in chain.iter().enumerate() {
            if depth > 0 {
                qualified_so_far.push('$');
            }
            qualified_so_far.push_str(simple);
            let id = match self.class_index.get(&qualified_so_far) {
                Some(id) => *id,
                None => {
                    let id = ClassId(self.classes.len() as u32);
                    self.classes
                        .push(ClassNode::placeholder(*simple, package, outer));
                    self.class_index.insert(qualified_so_far.clone(), id);
                    match outer {
                        Some(outer_id) => self.class_mut(outer_id).inner_classes.push(id),
                        None => self.package_mut(package).classes.push(id),
                    }
                    id
                }
            };
            outer = Some(id);
        }
        outer.unwrap_or_else(|| unreachable!("class chain is never empty"))
    }
}

/// Pull the trim-relevant pool references out of a method's `Code` payload:
/// bytecode operand sites plus exception-table catch types, recorded by name.
fn collect_trim_refs(
    pool: &ConstantPool,
    attrs: &[attributes::AttributeInfo],
) -> Result<Vec<TrimRef>> {
    let Some(code_attr) = attributes::find_by_name(attrs, pool, "Code")? else {
        return Ok(Vec::new());
    };
    let code = code::CodeAttribute::decode(&code_attr.info)?;
    let mut refs: Vec<TrimRef> = Vec::new();
    let mut push = |refs: &mut Vec<TrimRef>, r: TrimRef| {
        if !refs.contains(&r) {
            refs.push(r);
        }
    };

    for site in code::pool_sites(&code.code)? {
        match pool.get(site.index)? {
            PoolEntry::Class { name_index } => {
                let name = pool.utf8_at(*name_index)?;
                push(&mut refs, TrimRef::Class(name.to_string()));
            }
            PoolEntry::Fieldref {
                class_index,
                name_and_type_index,
            } => {
                let class = pool.class_name_at(*class_index)?.to_string();
                let (name, _) = pool.name_and_type_at(*name_and_type_index)?;
                let name = name.to_string();
                push(&mut refs, TrimRef::Field { class, name });
            }
            PoolEntry::Methodref {
                class_index,
                name_and_type_index,
            }
            | PoolEntry::InterfaceMethodref {
                class_index,
                name_and_type_index,
            } => {
                let class = pool.class_name_at(*class_index)?.to_string();
                let (name, descriptor) = pool.name_and_type_at(*name_and_type_index)?;
                let (name, descriptor) = (name.to_string(), descriptor.to_string());
                push(
                    &mut refs,
                    TrimRef::Method {
                        class,
                        name,
                        descriptor,
                    },
                );
            }
            PoolEntry::InvokeDynamic {
                name_and_type_index,
                ..
            } => {
                // The call site's descriptor pins the classes it mentions.
                let (_, descriptor) = pool.name_and_type_at(*name_and_type_index)?;
                for class in crate::classfile::descriptor::class_names(descriptor) {
                    push(&mut refs, TrimRef::Class(class.to_string()));
                }
            }
            _ => {}
        }
    }
    for entry in &code.exception_table {
        if entry.catch_type != 0 {
            let name = pool.class_name_at(entry.catch_type)?.to_string();
            push(&mut refs, TrimRef::Class(name));
        }
    }
    Ok(refs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::constantpool::ConstantPool;
    use crate::file::push_be;

    fn class_bytes(name: &str, super_name: &str) -> Vec<u8> {
        let mut pool = ConstantPool::new();
        let this_name = pool.add_utf8(name).unwrap();
        let this_class = pool
            .append_or_reuse(PoolEntry::Class {
                name_index: this_name,
            })
            .unwrap();
        let super_utf8 = pool.add_utf8(super_name).unwrap();
        let super_class = pool
            .append_or_reuse(PoolEntry::Class {
                name_index: super_utf8,
            })
            .unwrap();

        let mut sink = Vec::new();
        push_be(&mut sink, crate::classfile::MAGIC);
        push_be(&mut sink, 0u16);
        push_be(&mut sink, 52u16);
        pool.encode(&mut sink);
        push_be(&mut sink, 0x0021u16);
        push_be(&mut sink, this_class);
        push_be(&mut sink, super_class);
        push_be(&mut sink, 0u16);
        push_be(&mut sink, 0u16);
        push_be(&mut sink, 0u16);
        push_be(&mut sink, 0u16);
        sink
    }

    fn add(tree: &mut ClassTree, name: &str) -> ClassId {
        let bytes = class_bytes(name, "java/lang/Object");
        tree.add_class_file(&ClassFile::decode(&bytes).unwrap())
            .unwrap()
    }

    #[test]
    fn packages_are_created_on_demand() {
        let mut tree = ClassTree::new();
        let id = add(&mut tree, "a/b/C");
        assert_eq!(tree.class_qualified_name(id), "a/b/C");
        let package = tree.class(id).package;
        assert_eq!(tree.package_path(package), "a/b");
        assert_eq!(tree.package(tree.root()).sub_packages.len(), 1);
    }

    #[test]
    fn inner_class_first_creates_placeholder_then_promotes() {
        let mut tree = ClassTree::new();
        let inner = add(&mut tree, "a/Outer$In");
        let outer = tree.class_by_name("a/Outer").unwrap();
        assert!(tree.class(outer).is_placeholder);
        assert_eq!(tree.class(outer).inner_classes, vec![inner]);

        let promoted = add(&mut tree, "a/Outer");
        assert_eq!(promoted, outer, "promotion happens in place");
        assert!(!tree.class(outer).is_placeholder);
        assert_eq!(tree.class(outer).inner_classes, vec![inner]);
        assert_eq!(tree.class_qualified_name(inner), "a/Outer$In");
    }

    #[test]
    fn duplicate_class_fails() {
        let mut tree = ClassTree::new();
        add(&mut tree, "a/B");
        let bytes = class_bytes("a/B", "java/lang/Object");
        assert!(matches!(
            tree.add_class_file(&ClassFile::decode(&bytes).unwrap()),
            Err(Error::InconsistentReference(_))
        ));
    }

    #[test]
    fn down_links_follow_declared_supers() {
        let mut tree = ClassTree::new();
        let base = add(&mut tree, "a/Base");
        let bytes = class_bytes("a/Derived", "a/Base");
        let derived = tree
            .add_class_file(&ClassFile::decode(&bytes).unwrap())
            .unwrap();
        tree.build_down_links();
        assert_eq!(tree.class(base).down_links, vec![derived]);
        assert!(tree.class(derived).down_links.is_empty());
    }

    #[test]
    fn output_names_compose() {
        let mut tree = ClassTree::new();
        let id = add(&mut tree, "a/b/C");
        let package = tree.class(id).package;
        tree.class_mut(id).base.output_name = Some("x".to_string());
        assert_eq!(tree.output_qualified_name(id), "a/b/x");

        tree.package_mut(package).repackaged = true;
        tree.package_mut(package).base.output_name = Some("p".to_string());
        assert_eq!(tree.output_qualified_name(id), "p/x");
    }

    #[test]
    fn dollar_artifacts_stay_flat() {
        let mut tree = ClassTree::new();
        let id = add(&mut tree, "a/$Proxy0");
        assert_eq!(tree.class_qualified_name(id), "a/$Proxy0");
        assert!(tree.class(id).outer.is_none());
    }

    #[test]
    fn walk_visits_in_insertion_order() {
        struct Names(Vec<String>);
        impl TreeVisitor for Names {
            fn visit_class(&mut self, tree: &ClassTree, id: ClassId) {
                self.0.push(tree.class_qualified_name(id));
            }
        }
        let mut tree = ClassTree::new();
        add(&mut tree, "a/One");
        add(&mut tree, "a/Two");
        add(&mut tree, "b/Three");
        let mut names = Names(Vec::new());
        tree.walk(&mut names);
        assert_eq!(names.0, ["a/One", "a/Two", "b/Three"]);
    }

    #[test]
    fn wildcard_lookup_filters_by_qualified_name() {
        let mut tree = ClassTree::new();
        let one = add(&mut tree, "a/One");
        let two = add(&mut tree, "a/Two");
        add(&mut tree, "b/Three");
        assert_eq!(tree.wildcard_lookup("a/*").unwrap(), vec![one, two]);
        assert_eq!(tree.wildcard_lookup("**").unwrap().len(), 3);
    }
}

//! The two-pass name-resolution engine.
//!
//! Renaming identifiers in a class-file set is a whole-program constraint
//! problem: an override chain must end up with one name on every link, a
//! fresh name must not collide with anything an external ancestor makes
//! visible, and a name fixed by a directive must stay put. The [`Resolver`]
//! solves it in two passes over inheritance-connected groups of classes
//! (*namespaces*):
//!
//! 1. **Namespace discovery** - from any unscanned class, recursively visit
//!    superclass, superinterfaces, self, and every subtype, skipping only the
//!    immediately-invoking neighbor; one-shot `scanned` flags terminate
//!    diamonds. The pass stamps the group with a namespace id and collects
//!    its avoid-set: already-fixed member output names plus every member
//!    simple name any external ancestor contributes.
//! 2. **Name assignment** - supers strictly before subtypes. A non-private
//!    method is resolved together with its whole override group (every
//!    declaration some class inherits alongside it, including both arms of
//!    an interface diamond): an external ancestor forces the original name,
//!    a fixed member donates its name, otherwise the group draws one fresh
//!    name from the namespace's generator table, keyed by the argument
//!    shape of the descriptor. A field looks for an already-fixed
//!    reservation below it, then above it, and only then draws fresh.
//!
//! Packages and classes are renamed per sibling group before member
//! resolution; the optional repackage pre-pass flattens every non-fixed
//! package to a single root-level segment first. Resolution never fails: an
//! unknown external type degrades to "no reservation", and a second pass
//! over an already-resolved tree changes nothing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::classfile::descriptor::argument_shape;
use crate::rename::generator::{FrequencyTable, NameGenerator, DEVICE_WORDS};
use crate::rename::oracle::{OracleCache, TypeOracle};
use crate::tree::{ClassId, ClassTree, FieldId, MethodId, PackageId, SuperHandle};

/// Per-namespace resolution state.
struct NamespaceState {
    /// Names fresh names must not collide with, regardless of kind or shape.
    avoid: HashSet<String>,
    /// One method-name stream per argument shape.
    method_generators: HashMap<String, NameGenerator>,
    /// One untyped field-name stream.
    field_generator: NameGenerator,
}

impl NamespaceState {
    fn new(frequencies: &Arc<FrequencyTable>) -> NamespaceState {
        NamespaceState {
            avoid: HashSet::new(),
            method_generators: HashMap::new(),
            field_generator: NameGenerator::new().with_frequencies(Arc::clone(frequencies)),
        }
    }
}

/// What the super-side reservation query found.
enum Reservation {
    /// An internal ancestor already fixed this member; adopt its name.
    Adopt(String),
    /// An external ancestor declares the member; the original name is forced.
    External,
}

/// Drives package, class, and member renaming over one tree.
pub struct Resolver<'a, O: TypeOracle> {
    tree: &'a mut ClassTree,
    oracle: &'a OracleCache<O>,
    frequencies: Arc<FrequencyTable>,
    repackage: bool,
    namespaces: Vec<NamespaceState>,
}

impl<'a, O: TypeOracle> Resolver<'a, O> {
    /// A resolver over `tree` using `oracle` for external types.
    pub fn new(
        tree: &'a mut ClassTree,
        oracle: &'a OracleCache<O>,
        frequencies: Arc<FrequencyTable>,
        repackage: bool,
    ) -> Resolver<'a, O> {
        Resolver {
            tree,
            oracle,
            frequencies,
            repackage,
            namespaces: Vec::new(),
        }
    }

    /// Assign an output name to every package, class, and member that does
    /// not have one yet. Idempotent: fixed names are never touched.
    pub fn resolve_all(&mut self) {
        self.tree.build_down_links();
        self.tree.reset_resolution_flags();

        // Placeholders are classes we never saw defined; their names are not
        // ours to change.
        for id in self.tree.class_ids() {
            if self.tree.class(id).is_placeholder {
                self.tree.class_mut(id).base.keep_original();
            }
        }

        if self.repackage {
            self.repackage_packages();
        }
        self.rename_package_contents(self.tree.root());
        tracing::debug!("top-level renaming complete");

        for id in self.tree.class_ids() {
            if !self.tree.class(id).scanned {
                let namespace = self.namespaces.len() as u32;
                self.namespaces.push(NamespaceState::new(&self.frequencies));
                self.scan(id, None, namespace);
            }
        }
        tracing::debug!(namespaces = self.namespaces.len(), "namespace discovery complete");

        for id in self.tree.class_ids() {
            self.resolve_class(id);
        }
        tracing::debug!("member name assignment complete");
    }

    /// Assign every non-fixed package a single flat root-level segment.
    fn repackage_packages(&mut self) {
        let root = self.tree.root();
        let mut taken: HashSet<String> = self
            .tree
            .package(root)
            .sub_packages
            .iter()
            .filter(|&&id| self.tree.package(id).base.is_fixed())
            .map(|&id| self.tree.package(id).base.effective_name().to_string())
            .collect();
        let mut generator = self.fresh_class_generator();
        for id in self.tree.package_ids() {
            if id == root || self.tree.package(id).base.is_fixed() {
                continue;
            }
            let name = generator.next(&taken);
            taken.insert(name.clone());
            let package = self.tree.package_mut(id);
            package.base.output_name = Some(name);
            package.repackaged = true;
        }
    }

    /// Rename the sub-package and class sibling groups of `id`, then recurse.
    fn rename_package_contents(&mut self, id: PackageId) {
        let subs = self.tree.package(id).sub_packages.clone();
        self.rename_package_group(&subs);
        for sub in subs {
            self.rename_package_contents(sub);
        }

        let classes = self.tree.package(id).classes.clone();
        self.rename_class_group(&classes);
        for class in classes {
            self.rename_inner_classes(class);
        }
    }

    /// Rename the inner-class sibling group of `id`, recursing inward.
    fn rename_inner_classes(&mut self, id: ClassId) {
        let inners = self.tree.class(id).inner_classes.clone();
        self.rename_class_group(&inners);
        for inner in inners {
            self.rename_inner_classes(inner);
        }
    }

    /// Rename one package sibling group: the generator is seeded against the
    /// fixed siblings, and every assignment extends the seed.
    fn rename_package_group(&mut self, ids: &[PackageId]) {
        let mut taken: HashSet<String> = ids
            .iter()
            .map(|&id| &self.tree.package(id).base)
            .filter(|base| base.is_fixed())
            .map(|base| base.effective_name().to_string())
            .collect();
        let mut generator = self.fresh_class_generator();
        for &id in ids {
            if self.tree.package(id).base.is_fixed() {
                continue;
            }
            let name = generator.next(&taken);
            taken.insert(name.clone());
            self.tree.package_mut(id).base.output_name = Some(name);
        }
    }

    /// Rename one class sibling group (top-level classes of a package, or
    /// inner classes of one class).
    fn rename_class_group(&mut self, ids: &[ClassId]) {
        let mut taken: HashSet<String> = ids
            .iter()
            .map(|&id| &self.tree.class(id).base)
            .filter(|base| base.is_fixed())
            .map(|base| base.effective_name().to_string())
            .collect();
        let mut generator = self.fresh_class_generator();
        for &id in ids {
            if self.tree.class(id).base.is_fixed() {
                continue;
            }
            let name = generator.next(&taken);
            taken.insert(name.clone());
            self.tree.class_mut(id).base.output_name = Some(name);
        }
    }

    /// Class and package names become file names, so the filesystem-reserved
    /// device words are off limits.
    fn fresh_class_generator(&self) -> NameGenerator {
        NameGenerator::new()
            .with_forbidden(DEVICE_WORDS.iter().copied())
            .with_frequencies(Arc::clone(&self.frequencies))
    }

    /// Namespace discovery from `id`, skipping only `ignore`.
    fn scan(&mut self, id: ClassId, ignore: Option<ClassId>, namespace: u32) {
        if self.tree.class(id).scanned {
            return;
        }
        {
            let class = self.tree.class_mut(id);
            class.scanned = true;
            class.namespace = Some(namespace);
        }

        // Resolve the declared supertypes into up-links, collecting external
        // member names into the avoid-set as we go.
        let declared: Vec<String> = {
            let class = self.tree.class(id);
            class
                .super_name
                .iter()
                .chain(&class.interface_names)
                .cloned()
                .collect()
        };
        let mut up_links = Vec::with_capacity(declared.len());
        for name in &declared {
            if let Some(internal) = self.tree.class_by_name(name) {
                up_links.push(SuperHandle::Internal(internal));
            } else if let Some(info) = self.oracle.get(name) {
                let avoid = &mut self.namespaces[namespace as usize].avoid;
                for member in info.all_member_names() {
                    avoid.insert(member.to_string());
                }
                up_links.push(SuperHandle::External(info));
            }
            // Unknown externals degrade to "no reservation".
        }
        self.tree.class_mut(id).up_links = up_links.clone();

        // Already-fixed member output names are off limits for fresh names.
        {
            let class = self.tree.class(id);
            let fixed: Vec<String> = class
                .methods
                .iter()
                .map(|&m| &self.tree.method(m).base)
                .chain(class.fields.iter().map(|&f| &self.tree.field(f).base))
                .filter(|base| base.is_fixed())
                .map(|base| base.effective_name().to_string())
                .collect();
            self.namespaces[namespace as usize].avoid.extend(fixed);
        }

        for handle in up_links {
            if let SuperHandle::Internal(up) = handle {
                if ignore != Some(up) {
                    self.scan(up, Some(id), namespace);
                }
            }
        }
        let downs = self.tree.class(id).down_links.clone();
        for down in downs {
            if ignore != Some(down) {
                self.scan(down, Some(id), namespace);
            }
        }
    }

    /// Name assignment for one class, supers strictly first.
    fn resolve_class(&mut self, id: ClassId) {
        if self.tree.class(id).resolved {
            return;
        }
        self.tree.class_mut(id).resolved = true;

        let ups: Vec<ClassId> = self
            .tree
            .class(id)
            .up_links
            .iter()
            .filter_map(|handle| match handle {
                SuperHandle::Internal(up) => Some(*up),
                SuperHandle::External(_) => None,
            })
            .collect();
        for up in ups {
            self.resolve_class(up);
        }

        let Some(namespace) = self.tree.class(id).namespace else {
            return; // discovery stamps every class; defensive only for tests
        };

        let methods = self.tree.class(id).methods.clone();
        for method in methods {
            self.resolve_method(id, method, namespace);
        }
        let fields = self.tree.class(id).fields.clone();
        for field in fields {
            self.resolve_field(id, field, namespace);
        }

        let downs = self.tree.class(id).down_links.clone();
        for down in downs {
            self.resolve_class(down);
        }
    }

    fn resolve_method(&mut self, class: ClassId, id: MethodId, namespace: u32) {
        let (name, descriptor, private) = {
            let method = self.tree.method(id);
            if method.base.is_fixed() {
                let fixed = method.base.effective_name().to_string();
                self.namespaces[namespace as usize].avoid.insert(fixed);
                return;
            }
            (
                method.base.original_name.clone(),
                method.descriptor.clone(),
                method.is_private(),
            )
        };

        if private {
            let fresh = self.fresh_method_name(&descriptor, namespace);
            self.tree.method_mut(id).base.output_name = Some(fresh);
            return;
        }

        // Every declaration linked to this one through overriding gets the
        // same name in one step; a first-found adoption would leave the other
        // arm of an interface diamond under a divergent name.
        let (group, external) = self.method_override_group(class, &name, &descriptor);

        if external {
            for &member in &group {
                let method = self.tree.method_mut(member);
                if !method.base.from_script {
                    method.base.keep_original();
                }
                method.is_override = true;
                method.external_root = true;
            }
            self.namespaces[namespace as usize].avoid.insert(name);
            return;
        }

        let fixed = group.iter().find_map(|&member| {
            let base = &self.tree.method(member).base;
            if base.from_script && base.is_fixed() {
                Some(base.effective_name().to_string())
            } else {
                None
            }
        });
        let fixed = fixed.or_else(|| {
            group.iter().find_map(|&member| {
                let base = &self.tree.method(member).base;
                if base.is_fixed() {
                    Some(base.effective_name().to_string())
                } else {
                    None
                }
            })
        });

        let chosen = match fixed {
            Some(chosen) => {
                self.namespaces[namespace as usize]
                    .avoid
                    .insert(chosen.clone());
                chosen
            }
            None => self.fresh_method_name(&descriptor, namespace),
        };

        let linked = group.len() > 1;
        for &member in &group {
            let method = self.tree.method_mut(member);
            if !method.base.from_script {
                method.base.output_name = Some(chosen.clone());
            }
            if linked {
                method.is_override = true;
            }
        }
    }

    /// Draw the next name from the namespace's per-argument-shape stream.
    fn fresh_method_name(&mut self, descriptor: &str, namespace: u32) -> String {
        let shape = argument_shape(descriptor).to_string();
        let frequencies = Arc::clone(&self.frequencies);
        let state = &mut self.namespaces[namespace as usize];
        let generator = state
            .method_generators
            .entry(shape)
            .or_insert_with(|| NameGenerator::new().with_frequencies(frequencies));
        generator.next(&state.avoid)
    }

    /// Every internal declaration of `(name, descriptor)` override-linked to
    /// the one at `class`, plus whether some external ancestor in the group
    /// makes the member visible (which forces the original name).
    ///
    /// Two declarations are linked when some class inherits both: a joined
    /// class pulls in all of its subtypes, and any ancestor of a joined class
    /// that declares the member joins the group in turn. The walk reaches a
    /// fixpoint over that relation, so both arms of an interface diamond land
    /// in one group through their common implementor.
    fn method_override_group(
        &self,
        class: ClassId,
        name: &str,
        descriptor: &str,
    ) -> (Vec<MethodId>, bool) {
        let mut group = Vec::new();
        let mut external = false;
        let mut joins = vec![class];
        let mut joined = HashSet::new();
        let mut declared = HashSet::new();
        while let Some(join) = joins.pop() {
            if !joined.insert(join) {
                continue;
            }
            joins.extend(self.tree.class(join).down_links.iter().copied());

            let mut ups = vec![join];
            let mut visited = HashSet::new();
            while let Some(up) = ups.pop() {
                if !visited.insert(up) {
                    continue;
                }
                if let Some(method) = self.tree.method_of(up, name, descriptor) {
                    if !self.tree.method(method).is_private() && declared.insert(up) {
                        group.push(method);
                        joins.push(up);
                    }
                }
                for handle in &self.tree.class(up).up_links {
                    match handle {
                        SuperHandle::Internal(internal) => ups.push(*internal),
                        SuperHandle::External(info) => {
                            if info.visible_methods.contains(name) {
                                external = true;
                            }
                        }
                    }
                }
            }
        }
        (group, external)
    }

    fn resolve_field(&mut self, class: ClassId, id: FieldId, namespace: u32) {
        let (name, private) = {
            let field = self.tree.field(id);
            if field.base.is_fixed() {
                let fixed = field.base.effective_name().to_string();
                self.namespaces[namespace as usize].avoid.insert(fixed);
                return;
            }
            (field.base.original_name.clone(), field.is_private())
        };

        if !private {
            if let Some(adopted) = self.derived_field_reservation(class, &name) {
                let field = self.tree.field_mut(id);
                field.base.output_name = Some(adopted.clone());
                field.is_override = true;
                self.namespaces[namespace as usize].avoid.insert(adopted);
                return;
            }
            match self.super_field_reservation(class, &name) {
                Some(Reservation::Adopt(adopted)) => {
                    let field = self.tree.field_mut(id);
                    field.base.output_name = Some(adopted.clone());
                    field.is_override = true;
                    self.namespaces[namespace as usize].avoid.insert(adopted);
                    return;
                }
                Some(Reservation::External) => {
                    let field = self.tree.field_mut(id);
                    field.base.keep_original();
                    field.is_override = true;
                    field.external_root = true;
                    self.namespaces[namespace as usize].avoid.insert(name);
                    return;
                }
                None => {}
            }
        }

        let fresh = {
            let state = &mut self.namespaces[namespace as usize];
            state.field_generator.next(&state.avoid)
        };
        self.tree.field_mut(id).base.output_name = Some(fresh);
    }

    /// A fixed field reservation for `name` somewhere below `class`.
    fn derived_field_reservation(&self, class: ClassId, name: &str) -> Option<String> {
        let mut stack = self.tree.class(class).down_links.clone();
        let mut seen = HashSet::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(field) = self.tree.field_of(id, name) {
                let node = self.tree.field(field);
                if !node.is_private() && node.base.is_fixed() {
                    return Some(node.base.effective_name().to_string());
                }
            }
            stack.extend(self.tree.class(id).down_links.iter().copied());
        }
        None
    }

    fn super_field_reservation(&self, class: ClassId, name: &str) -> Option<Reservation> {
        let mut stack = self.tree.class(class).up_links.clone();
        let mut seen = HashSet::new();
        while let Some(handle) = stack.pop() {
            match handle {
                SuperHandle::Internal(id) => {
                    if !seen.insert(id) {
                        continue;
                    }
                    if let Some(field) = self.tree.field_of(id, name) {
                        let node = self.tree.field(field);
                        if !node.is_private() && node.base.is_fixed() {
                            return Some(Reservation::Adopt(
                                node.base.effective_name().to_string(),
                            ));
                        }
                    }
                    stack.extend(self.tree.class(id).up_links.iter().cloned());
                }
                SuperHandle::External(info) => {
                    if info.visible_fields.contains(name) {
                        return Some(Reservation::External);
                    }
                }
            }
        }
        None
    }
}

//! Node types and typed ids for the symbol tree arena.

use std::sync::Arc;

use crate::rename::oracle::ExternalTypeInfo;

macro_rules! arena_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub(crate) u32);

        impl $name {
            #[inline]
            pub(crate) fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

arena_id!(
    /// Index of a [`PackageNode`] in the tree arena.
    PackageId
);
arena_id!(
    /// Index of a [`ClassNode`] in the tree arena.
    ClassId
);
arena_id!(
    /// Index of a method [`MemberNode`] in the tree arena.
    MethodId
);
arena_id!(
    /// Index of a field [`MemberNode`] in the tree arena.
    FieldId
);

/// A reference to any node kind in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    /// A package node.
    Package(PackageId),
    /// A class node.
    Class(ClassId),
    /// A method node.
    Method(MethodId),
    /// A field node.
    Field(FieldId),
}

/// Reachability verdict assigned by the trim sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrimMark {
    /// Not yet visited by a sweep; treated as trimmable until proven kept.
    #[default]
    NotChecked,
    /// Reached from a retention root; survives into the output.
    Keep,
    /// Unreached; omitted from the output.
    Trim,
}

/// Fields shared by every node kind.
#[derive(Debug, Clone)]
pub struct NodeBase {
    /// The simple (unqualified) name as it appeared in the input. Immutable.
    pub original_name: String,
    /// The assigned output name. Once set the node is *fixed*: no later pass
    /// may change it.
    pub output_name: Option<String>,
    /// Set when a retain directive matched this node.
    pub from_script: bool,
    /// Set when a map directive assigned this node's output name.
    pub from_script_map: bool,
    /// Reachability verdict of the trim sweep.
    pub trim: TrimMark,
}

impl NodeBase {
    pub(crate) fn new(original_name: impl Into<String>) -> NodeBase {
        NodeBase {
            original_name: original_name.into(),
            output_name: None,
            from_script: false,
            from_script_map: false,
            trim: TrimMark::default(),
        }
    }

    /// `true` once an output name has been assigned.
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        self.output_name.is_some()
    }

    /// The output name if fixed, the original name otherwise.
    #[must_use]
    pub fn effective_name(&self) -> &str {
        self.output_name.as_deref().unwrap_or(&self.original_name)
    }

    /// Fix this node to its original name (retain semantics).
    pub fn keep_original(&mut self) {
        if self.output_name.is_none() {
            self.output_name = Some(self.original_name.clone());
        }
    }
}

/// A package node. Index 0 of the arena is the unnamed root package.
#[derive(Debug, Clone)]
pub struct PackageNode {
    /// Shared node fields; `original_name` is one path segment.
    pub base: NodeBase,
    /// Parent package, `None` only for the root.
    pub parent: Option<PackageId>,
    /// Direct sub-packages, in insertion order.
    pub sub_packages: Vec<PackageId>,
    /// Top-level classes of this package, in insertion order.
    pub classes: Vec<ClassId>,
    /// Set by the repackage pre-pass: the output name is a single flat
    /// root-level segment that replaces the whole original path.
    pub repackaged: bool,
}

impl PackageNode {
    pub(crate) fn new(name: impl Into<String>, parent: Option<PackageId>) -> PackageNode {
        PackageNode {
            base: NodeBase::new(name),
            parent,
            sub_packages: Vec::new(),
            classes: Vec::new(),
            repackaged: false,
        }
    }
}

/// How a class connects upward to one supertype.
#[derive(Debug, Clone)]
pub enum SuperHandle {
    /// The supertype is part of the analyzed set.
    Internal(ClassId),
    /// The supertype lives outside the analyzed set; what the oracle knows
    /// about it.
    External(Arc<ExternalTypeInfo>),
}

/// A class node.
///
/// Created either from a decoded class file or as a *placeholder* when an
/// inner class arrives before its outer class; the placeholder is promoted in
/// place when the real record shows up, so links to it stay valid.
#[derive(Debug, Clone)]
pub struct ClassNode {
    /// Shared node fields; `original_name` is the simple name (the part
    /// after the last `/` and `$`).
    pub base: NodeBase,
    /// Owning package.
    pub package: PackageId,
    /// Enclosing class for nested classes.
    pub outer: Option<ClassId>,
    /// Declared superclass, fully qualified; `None` for `java/lang/Object`.
    pub super_name: Option<String>,
    /// Declared superinterfaces, fully qualified.
    pub interface_names: Vec<String>,
    /// Regular methods (everything except `<init>`/`<clinit>`).
    pub methods: Vec<MethodId>,
    /// `<init>` and `<clinit>`; these never participate in overriding and
    /// are never renamed.
    pub special_methods: Vec<MethodId>,
    /// Declared fields.
    pub fields: Vec<FieldId>,
    /// Nested classes, in insertion order.
    pub inner_classes: Vec<ClassId>,
    /// Direct internal subtypes; rebuilt by `build_down_links` before any
    /// resolution pass.
    pub down_links: Vec<ClassId>,
    /// Resolved supertype handles (superclass first, then interfaces);
    /// filled during resolution.
    pub up_links: Vec<SuperHandle>,
    /// Declared `ACC_INTERFACE`.
    pub is_interface: bool,
    /// `true` while only referenced as an outer class, never defined.
    pub is_placeholder: bool,
    /// One-shot namespace-discovery flag.
    pub scanned: bool,
    /// One-shot name-assignment flag.
    pub resolved: bool,
    /// Namespace stamp assigned by discovery.
    pub namespace: Option<u32>,
}

impl ClassNode {
    pub(crate) fn placeholder(
        name: impl Into<String>,
        package: PackageId,
        outer: Option<ClassId>,
    ) -> ClassNode {
        ClassNode {
            base: NodeBase::new(name),
            package,
            outer,
            super_name: None,
            interface_names: Vec::new(),
            methods: Vec::new(),
            special_methods: Vec::new(),
            fields: Vec::new(),
            inner_classes: Vec::new(),
            down_links: Vec::new(),
            up_links: Vec::new(),
            is_interface: false,
            is_placeholder: true,
            scanned: false,
            resolved: false,
            namespace: None,
        }
    }
}

/// One pool reference recorded from a member's `Code` payload, stored by
/// name and resolved against the tree by the trim sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrimRef {
    /// A bare class reference (`new`, `checkcast`, `instanceof`, ...).
    Class(String),
    /// A field access.
    Field {
        /// Qualified name of the class the reference goes through.
        class: String,
        /// Simple field name.
        name: String,
    },
    /// A method invocation.
    Method {
        /// Qualified name of the class the reference goes through.
        class: String,
        /// Simple method name.
        name: String,
        /// Method descriptor.
        descriptor: String,
    },
}

/// A method or field node; the two arenas share this layout.
#[derive(Debug, Clone)]
pub struct MemberNode {
    /// Shared node fields; `original_name` is the simple member name.
    pub base: NodeBase,
    /// Declaring class.
    pub owner: ClassId,
    /// Field or method descriptor.
    pub descriptor: String,
    /// Raw access flags.
    pub access: u16,
    /// Compiler-generated; fixed to its original name at creation.
    pub is_synthetic: bool,
    /// The output name was adopted from a super- or sub-type reservation.
    pub is_override: bool,
    /// The override root lies outside the analyzed set; the member keeps its
    /// original name and is a trim-sweep seed.
    pub external_root: bool,
    /// References collected from the member's `Code` payload.
    pub trim_refs: Vec<TrimRef>,
}

impl MemberNode {
    pub(crate) fn new(
        name: impl Into<String>,
        owner: ClassId,
        descriptor: impl Into<String>,
        access: u16,
        is_synthetic: bool,
    ) -> MemberNode {
        let mut base = NodeBase::new(name);
        if is_synthetic {
            base.keep_original();
        }
        MemberNode {
            base,
            owner,
            descriptor: descriptor.into(),
            access,
            is_synthetic,
            is_override: false,
            external_root: false,
            trim_refs: Vec::new(),
        }
    }

    /// `ACC_PRIVATE`; private members never participate in override matching.
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.access & 0x0002 != 0
    }

    /// `ACC_STATIC`.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.access & 0x0008 != 0
    }
}

//! Typed script directives.
//!
//! The script *syntax* lives outside this crate; what arrives here is an
//! ordered feed of already-parsed [`Directive`] values, consumed exactly once
//! before resolution. Directives mutate the symbol tree's fixedness and
//! provenance flags directly (retain and map rules) or accumulate run-wide
//! side effects (retained attributes, suppressed warnings, option flags)
//! into a [`ScriptEffects`] record the session folds into its options.
//!
//! A directive naming an entity absent from the tree fails with
//! [`crate::Error::UnresolvedScriptEntry`]; the session logs the failure and
//! continues with the next directive. Map directives deliberately overwrite
//! an output name fixed by an earlier retain - last writer wins within the
//! one ordered feed.

use std::collections::HashSet;

use strum::{Display, EnumIter};

use crate::tree::{ClassId, ClassTree, PackageId};
use crate::Result;

/// Which member records a [`Directive::RetainClass`] extends to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum MemberKind {
    /// Methods only.
    Methods,
    /// Fields only.
    Fields,
    /// Methods and fields.
    Both,
}

/// Access filter applied to the members a retain-class rule touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum MemberFilter {
    /// Every declared member.
    All,
    /// `public` and `protected` members plus package-private ones.
    NonPrivate,
    /// `public` members only.
    Public,
}

/// Run-wide toggles a script can flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum OptionFlag {
    /// Flatten renamed packages into fresh root-level segments.
    Repackage,
    /// Drop unreachable members and classes.
    Trim,
    /// Drop attributes outside the keep-set.
    TrimAttributes,
    /// Rewrite `Class.forName` string constants.
    RemapReflection,
}

/// One parsed script rule.
///
/// Class names are in internal (slash-qualified) form. Patterns follow the
/// wildcard grammar of [`crate::tree::WildcardPattern`]: `*` matches one
/// path segment, `**` any number of segments.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Directive {
    /// Fix the matched classes (and their package chains) to their original
    /// names, optionally extending to their members.
    RetainClass {
        /// Wildcard class pattern.
        pattern: String,
        /// `None` retains the class name only.
        member_filter: Option<MemberFilter>,
        /// Which member records the filter applies to.
        member_kind: MemberKind,
    },
    /// Fix one method (or every overload of a name) to its original name.
    RetainMethod {
        /// Exact class name.
        class: String,
        /// Method simple name.
        name: String,
        /// `None` retains every overload of `name`.
        descriptor: Option<String>,
    },
    /// Fix one field to its original name.
    RetainField {
        /// Exact class name.
        class: String,
        /// Field simple name.
        name: String,
    },
    /// Map a class to a literal output name.
    MapClass {
        /// Exact class name.
        class: String,
        /// Output name, simple or slash-qualified.
        output: String,
    },
    /// Map a method to a literal output name.
    MapMethod {
        /// Exact class name.
        class: String,
        /// Method simple name.
        name: String,
        /// Method descriptor.
        descriptor: String,
        /// Output simple name.
        output: String,
    },
    /// Map a field to a literal output name.
    MapField {
        /// Exact class name.
        class: String,
        /// Field simple name.
        name: String,
        /// Output simple name.
        output: String,
    },
    /// Keep an attribute (by name) that the attribute-trim stage would
    /// otherwise drop.
    RetainAttribute(String),
    /// Suppress a named warning category in the report.
    SuppressWarnings(String),
    /// Flip a run-wide option.
    Option(OptionFlag),
}

/// Side effects of the directive feed that do not live in the tree.
#[derive(Debug, Default, Clone)]
pub struct ScriptEffects {
    /// Attribute names retained beyond the baseline keep-set.
    pub retained_attributes: HashSet<String>,
    /// Suppressed warning categories.
    pub suppressed_warnings: HashSet<String>,
    /// `.option Repackage` seen.
    pub repackage: bool,
    /// `.option Trim` seen.
    pub trim: bool,
    /// `.option TrimAttributes` seen.
    pub trim_attributes: bool,
    /// `.option RemapReflection` seen.
    pub remap_reflection: bool,
}

/// Apply one directive to the tree and the accumulated effects.
///
/// Returns [`crate::Error::UnresolvedScriptEntry`] when the named entity (or
/// any match for a pattern) is absent; the tree is left untouched in that
/// case and the caller decides whether the run continues.
pub fn apply(directive: &Directive, tree: &mut ClassTree, effects: &mut ScriptEffects) -> Result<()> {
    match directive {
        Directive::RetainClass {
            pattern,
            member_filter,
            member_kind,
        } => {
            let matches = tree.wildcard_lookup(pattern)?;
            if matches.is_empty() {
                return Err(crate::Error::UnresolvedScriptEntry(format!(
                    "retain class: no class matches `{pattern}`"
                )));
            }
            for class in matches {
                retain_class(tree, class, *member_filter, *member_kind);
            }
            Ok(())
        }
        Directive::RetainMethod {
            class,
            name,
            descriptor,
        } => {
            let class_id = lookup_class(tree, class)?;
            let targets: Vec<_> = tree
                .class(class_id)
                .methods
                .iter()
                .copied()
                .filter(|&method| {
                    let node = tree.method(method);
                    node.base.original_name == *name
                        && descriptor
                            .as_deref()
                            .is_none_or(|desc| node.descriptor == desc)
                })
                .collect();
            if targets.is_empty() {
                return Err(crate::Error::UnresolvedScriptEntry(format!(
                    "retain method: `{class}.{name}` not found"
                )));
            }
            for method in targets {
                let node = tree.method_mut(method);
                node.base.from_script = true;
                node.base.keep_original();
            }
            Ok(())
        }
        Directive::RetainField { class, name } => {
            let class_id = lookup_class(tree, class)?;
            let field = tree.field_of(class_id, name).ok_or_else(|| {
                crate::Error::UnresolvedScriptEntry(format!(
                    "retain field: `{class}.{name}` not found"
                ))
            })?;
            let node = tree.field_mut(field);
            node.base.from_script = true;
            node.base.keep_original();
            Ok(())
        }
        Directive::MapClass { class, output } => {
            let class_id = lookup_class(tree, class)?;
            map_class(tree, class_id, output);
            Ok(())
        }
        Directive::MapMethod {
            class,
            name,
            descriptor,
            output,
        } => {
            let class_id = lookup_class(tree, class)?;
            let method = tree.method_of(class_id, name, descriptor).ok_or_else(|| {
                crate::Error::UnresolvedScriptEntry(format!(
                    "map method: `{class}.{name}{descriptor}` not found"
                ))
            })?;
            let node = tree.method_mut(method);
            node.base.output_name = Some(output.clone());
            node.base.from_script_map = true;
            Ok(())
        }
        Directive::MapField {
            class,
            name,
            output,
        } => {
            let class_id = lookup_class(tree, class)?;
            let field = tree.field_of(class_id, name).ok_or_else(|| {
                crate::Error::UnresolvedScriptEntry(format!(
                    "map field: `{class}.{name}` not found"
                ))
            })?;
            let node = tree.field_mut(field);
            node.base.output_name = Some(output.clone());
            node.base.from_script_map = true;
            Ok(())
        }
        Directive::RetainAttribute(name) => {
            effects.retained_attributes.insert(name.clone());
            Ok(())
        }
        Directive::SuppressWarnings(category) => {
            effects.suppressed_warnings.insert(category.clone());
            Ok(())
        }
        Directive::Option(flag) => {
            match flag {
                OptionFlag::Repackage => effects.repackage = true,
                OptionFlag::Trim => effects.trim = true,
                OptionFlag::TrimAttributes => effects.trim_attributes = true,
                OptionFlag::RemapReflection => effects.remap_reflection = true,
            }
            Ok(())
        }
    }
}

fn lookup_class(tree: &ClassTree, name: &str) -> Result<ClassId> {
    tree.class_by_name(name)
        .ok_or_else(|| crate::Error::UnresolvedScriptEntry(format!("class `{name}` not found")))
}

/// Retain one class: fix its name, its enclosing package chain, and the
/// members selected by the filter.
fn retain_class(
    tree: &mut ClassTree,
    class: ClassId,
    member_filter: Option<MemberFilter>,
    member_kind: MemberKind,
) {
    let package = {
        let node = tree.class_mut(class);
        node.base.from_script = true;
        node.base.keep_original();
        node.package
    };
    fix_package_chain(tree, package);

    let Some(filter) = member_filter else {
        return;
    };
    let methods: Vec<_> = tree.class(class).methods.clone();
    let fields: Vec<_> = tree.class(class).fields.clone();

    if matches!(member_kind, MemberKind::Methods | MemberKind::Both) {
        for method in methods {
            if member_passes(tree.method(method).access, filter) {
                let node = tree.method_mut(method);
                node.base.from_script = true;
                node.base.keep_original();
            }
        }
    }
    if matches!(member_kind, MemberKind::Fields | MemberKind::Both) {
        for field in fields {
            if member_passes(tree.field(field).access, filter) {
                let node = tree.field_mut(field);
                node.base.from_script = true;
                node.base.keep_original();
            }
        }
    }
}

fn member_passes(access: u16, filter: MemberFilter) -> bool {
    const ACC_PUBLIC: u16 = 0x0001;
    const ACC_PRIVATE: u16 = 0x0002;
    match filter {
        MemberFilter::All => true,
        MemberFilter::NonPrivate => access & ACC_PRIVATE == 0,
        MemberFilter::Public => access & ACC_PUBLIC != 0,
    }
}

/// A renamed class would otherwise drag its package along; a retained class
/// must pin every segment above it.
fn fix_package_chain(tree: &mut ClassTree, leaf: PackageId) {
    let mut current = leaf;
    loop {
        let node = tree.package_mut(current);
        let Some(parent) = node.parent else {
            break; // root package carries no name
        };
        node.base.from_script = true;
        node.base.keep_original();
        current = parent;
    }
}

/// Apply a map-class directive. A qualified output renames the package
/// chain too, when its segment count matches; otherwise only the simple
/// name is applied.
fn map_class(tree: &mut ClassTree, class: ClassId, output: &str) {
    let segments: Vec<&str> = output.split('/').collect();
    let (package_segments, simple) = segments.split_at(segments.len() - 1);

    {
        let node = tree.class_mut(class);
        node.base.output_name = Some(simple[0].to_string());
        node.base.from_script_map = true;
    }

    if package_segments.is_empty() {
        return;
    }
    // Walk the chain leaf-to-root; the output segments are root-to-leaf.
    let mut chain = Vec::new();
    let mut current = tree.class(class).package;
    while let Some(parent) = tree.package(current).parent {
        chain.push(current);
        current = parent;
    }
    chain.reverse();
    if chain.len() != package_segments.len() {
        tracing::warn!(
            output,
            "map class: package depth mismatch, renaming the class only"
        );
        return;
    }
    for (&package, &segment) in chain.iter().zip(package_segments) {
        let node = tree.package_mut(package);
        node.base.output_name = Some(segment.to_string());
        node.base.from_script_map = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> ClassTree {
        let mut tree = ClassTree::new();
        let class = tree.ensure_class("com/example/Foo");
        tree.class_mut(class).is_placeholder = false;
        tree
    }

    #[test]
    fn retain_class_fixes_package_chain() {
        let mut tree = sample_tree();
        let mut effects = ScriptEffects::default();
        apply(
            &Directive::RetainClass {
                pattern: "com/example/Foo".into(),
                member_filter: None,
                member_kind: MemberKind::Both,
            },
            &mut tree,
            &mut effects,
        )
        .unwrap();

        let class = tree.class_by_name("com/example/Foo").unwrap();
        let node = tree.class(class);
        assert!(node.base.from_script);
        assert_eq!(node.base.effective_name(), "Foo");

        let mut package = node.package;
        while let Some(parent) = tree.package(package).parent {
            assert!(tree.package(package).base.is_fixed());
            package = parent;
        }
    }

    #[test]
    fn absent_entity_is_reported() {
        let mut tree = sample_tree();
        let mut effects = ScriptEffects::default();
        let result = apply(
            &Directive::RetainField {
                class: "com/example/Foo".into(),
                name: "missing".into(),
            },
            &mut tree,
            &mut effects,
        );
        assert!(matches!(
            result,
            Err(crate::Error::UnresolvedScriptEntry(_))
        ));
    }

    #[test]
    fn map_overrides_earlier_retain() {
        let mut tree = sample_tree();
        let mut effects = ScriptEffects::default();
        apply(
            &Directive::RetainClass {
                pattern: "com/example/*".into(),
                member_filter: None,
                member_kind: MemberKind::Both,
            },
            &mut tree,
            &mut effects,
        )
        .unwrap();
        apply(
            &Directive::MapClass {
                class: "com/example/Foo".into(),
                output: "Bar".into(),
            },
            &mut tree,
            &mut effects,
        )
        .unwrap();

        let class = tree.class_by_name("com/example/Foo").unwrap();
        assert_eq!(tree.class(class).base.effective_name(), "Bar");
        assert!(tree.class(class).base.from_script_map);
    }

    #[test]
    fn option_flags_accumulate() {
        let mut tree = sample_tree();
        let mut effects = ScriptEffects::default();
        apply(&Directive::Option(OptionFlag::Trim), &mut tree, &mut effects).unwrap();
        apply(
            &Directive::Option(OptionFlag::Repackage),
            &mut tree,
            &mut effects,
        )
        .unwrap();
        assert!(effects.trim);
        assert!(effects.repackage);
        assert!(!effects.trim_attributes);
    }
}

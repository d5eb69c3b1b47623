//! The per-file rewrite state machine.
//!
//! Once resolution has fixed every output name, each class file is rewritten
//! independently through a strictly ordered pipeline:
//!
//! 1. optional attribute trim (keep-set filtering, nested `Code` attributes
//!    included);
//! 2. optional member trim (records whose tree nodes are marked `Trim`);
//! 3. reference recount - from here on the counts are exact;
//! 4. member record name/descriptor remap;
//! 5. member-reference remap (`Fieldref`/`Methodref`/`InterfaceMethodref`,
//!    plus `MethodType` and the descriptor side of `Dynamic`/
//!    `InvokeDynamic`), cloning shared `NameAndType` entries copy-on-write;
//! 6. `Class` entries renamed in place - every referrer wants the same
//!    rename, and keeping indices stable is what spares `Code` bytecode and
//!    `StackMapTable` payloads from ever being patched;
//! 7. embedded metadata: `Signature`, the annotation attributes,
//!    `InnerClasses` inner names, `EnclosingMethod`, kept local-variable
//!    tables;
//! 8. optional reflective-string remap;
//! 9. dead-`Utf8` payload drop.
//!
//! Stages 4-5 read class names out of the pool, so they must run before
//! stage 6 renames them; stage 7 works from a snapshot of the original
//! `Class`-entry names taken before stage 6.

use std::collections::{HashMap, HashSet};

use crate::classfile::attributes::{self, AnnotationSite, AttributeInfo, BASELINE_KEEP};
use crate::classfile::code::CodeAttribute;
use crate::classfile::descriptor;
use crate::classfile::{ClassFile, ConstantPool, PoolEntry};
use crate::file::read_be_at;
use crate::rename::oracle::TypeOracle;
use crate::rewrite::{mapper::NameMapper, reflect};
use crate::tree::{ClassId, ClassTree, MethodId, TrimMark};
use crate::Result;

/// Which optional pipeline stages run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RewriteOptions {
    /// Remove members (and whole classes, handled by the session) marked
    /// `Trim`.
    pub trim: bool,
    /// Drop attributes outside the keep-set.
    pub trim_attributes: bool,
    /// Rewrite `Class.forName` string constants.
    pub remap_reflection: bool,
}

/// Rewrites one decoded file against the resolved tree.
pub struct Rewriter<'a, O: TypeOracle> {
    mapper: &'a NameMapper<'a, O>,
    options: RewriteOptions,
    /// Attribute names retained beyond [`BASELINE_KEEP`] by directives.
    retained: &'a HashSet<String>,
}

impl<'a, O: TypeOracle> Rewriter<'a, O> {
    /// A rewriter over the given mapper and options.
    pub fn new(
        mapper: &'a NameMapper<'a, O>,
        options: RewriteOptions,
        retained: &'a HashSet<String>,
    ) -> Rewriter<'a, O> {
        Rewriter {
            mapper,
            options,
            retained,
        }
    }

    /// Run the full pipeline over `file`. The caller is responsible for
    /// skipping files whose class node is marked `Trim`.
    pub fn rewrite(&self, file: &mut ClassFile) -> Result<()> {
        let class_name = file.class_name()?.to_string();

        if self.options.trim_attributes {
            self.trim_attributes(file)?;
        }
        if self.options.trim {
            self.trim_members(file, &class_name)?;
        }
        file.recount_pool()?;

        // Original Class-entry names, needed by stage 7 after stage 6 has
        // renamed the entries in place.
        let mut original_class_names: HashMap<u16, String> = HashMap::new();
        for index in file.pool.indices().collect::<Vec<_>>() {
            if let PoolEntry::Class { name_index } = file.pool.get(index)? {
                original_class_names
                    .insert(index, file.pool.utf8_at(*name_index)?.to_string());
            }
        }

        self.remap_member_records(file, &class_name)?;
        self.remap_member_refs(file)?;
        self.remap_class_entries(file)?;
        self.remap_metadata(file, &original_class_names)?;
        if self.options.remap_reflection {
            reflect::remap_reflective_strings(file, self.mapper)?;
        }
        file.pool.drop_unreferenced_utf8();
        Ok(())
    }

    fn keeps_attribute(&self, pool: &ConstantPool, attr: &AttributeInfo) -> Result<bool> {
        let name = pool.utf8_at(attr.name_index)?;
        Ok(BASELINE_KEEP.contains(&name) || self.retained.contains(name))
    }

    /// Stage 1: drop attributes outside the keep-set, at every level.
    fn trim_attributes(&self, file: &mut ClassFile) -> Result<()> {
        let pool = &file.pool;
        filter_attributes(pool, &mut file.attributes, |pool, attr| {
            self.keeps_attribute(pool, attr)
        })?;
        for field in &mut file.fields {
            filter_attributes(pool, &mut field.attributes, |pool, attr| {
                self.keeps_attribute(pool, attr)
            })?;
        }
        for method in &mut file.methods {
            filter_attributes(pool, &mut method.attributes, |pool, attr| {
                self.keeps_attribute(pool, attr)
            })?;
            // Nested attributes ride inside the kept Code payload.
            for attr in &mut method.attributes {
                if pool.utf8_at(attr.name_index)? != "Code" {
                    continue;
                }
                let mut code = CodeAttribute::decode(&attr.info)?;
                filter_attributes(pool, &mut code.attributes, |pool, attr| {
                    self.keeps_attribute(pool, attr)
                })?;
                attr.info = code.encode();
            }
        }
        Ok(())
    }

    /// Stage 2: delete member records whose tree nodes are marked `Trim`.
    fn trim_members(&self, file: &mut ClassFile, class_name: &str) -> Result<()> {
        let tree = self.mapper.tree();
        let Some(class_id) = tree.class_by_name(class_name) else {
            return Ok(());
        };

        let mut index = 0;
        while index < file.fields.len() {
            let name = file.fields[index].name(&file.pool)?;
            let trimmed = tree
                .field_of(class_id, name)
                .is_some_and(|id| tree.field(id).base.trim == TrimMark::Trim);
            if trimmed {
                file.remove_field(index);
            } else {
                index += 1;
            }
        }

        let mut index = 0;
        while index < file.methods.len() {
            let name = file.methods[index].name(&file.pool)?.to_string();
            let desc = file.methods[index].descriptor(&file.pool)?;
            let trimmed = declared_method(tree, class_id, &name, desc)
                .is_some_and(|id| tree.method(id).base.trim == TrimMark::Trim);
            if trimmed {
                file.remove_method(index);
            } else {
                index += 1;
            }
        }
        Ok(())
    }

    /// Stage 4: rename the member records' own name/descriptor pointers.
    fn remap_member_records(&self, file: &mut ClassFile, class_name: &str) -> Result<()> {
        let tree = self.mapper.tree();
        let class_id = tree.class_by_name(class_name);

        for index in 0..file.fields.len() {
            let name_index = file.fields[index].name_index;
            let desc_index = file.fields[index].descriptor_index;
            let name = file.pool.utf8_at(name_index)?.to_string();
            let desc = file.pool.utf8_at(desc_index)?.to_string();

            if let Some(class_id) = class_id {
                if let Some(field) = tree.field_of(class_id, &name) {
                    let output = tree.field(field).base.effective_name().to_string();
                    if output != name {
                        let new = file.pool.add_utf8(&output)?;
                        file.pool.retarget(name_index, new)?;
                        file.fields[index].name_index = new;
                    }
                }
            }
            let mapped = self.mapper.map_descriptor(&desc);
            if mapped != desc {
                let new = file.pool.add_utf8(&mapped)?;
                file.pool.retarget(desc_index, new)?;
                file.fields[index].descriptor_index = new;
            }
        }

        for index in 0..file.methods.len() {
            let name_index = file.methods[index].name_index;
            let desc_index = file.methods[index].descriptor_index;
            let name = file.pool.utf8_at(name_index)?.to_string();
            let desc = file.pool.utf8_at(desc_index)?.to_string();

            if let Some(class_id) = class_id {
                if let Some(method) = declared_method(tree, class_id, &name, &desc) {
                    let output = tree.method(method).base.effective_name().to_string();
                    if output != name {
                        let new = file.pool.add_utf8(&output)?;
                        file.pool.retarget(name_index, new)?;
                        file.methods[index].name_index = new;
                    }
                }
            }
            let mapped = self.mapper.map_descriptor(&desc);
            if mapped != desc {
                let new = file.pool.add_utf8(&mapped)?;
                file.pool.retarget(desc_index, new)?;
                file.methods[index].descriptor_index = new;
            }
        }
        Ok(())
    }

    /// Stage 5: remap the pool's member-reference entries.
    fn remap_member_refs(&self, file: &mut ClassFile) -> Result<()> {
        let indices: Vec<u16> = file.pool.indices().collect();
        for index in indices {
            if !file.pool.is_live(index)? {
                continue;
            }
            match file.pool.get(index)?.clone() {
                PoolEntry::Fieldref {
                    class_index,
                    name_and_type_index,
                } => {
                    let class = file.pool.class_name_at(class_index)?.to_string();
                    let (name, desc) = owned_nat(&file.pool, name_and_type_index)?;
                    let new_name = self
                        .mapper
                        .map_field(&class, &name)
                        .unwrap_or_else(|| name.clone());
                    let new_desc = self.mapper.map_descriptor(&desc);
                    self.update_nat(file, index, name_and_type_index, &name, &desc, &new_name, &new_desc)?;
                }
                PoolEntry::Methodref {
                    class_index,
                    name_and_type_index,
                }
                | PoolEntry::InterfaceMethodref {
                    class_index,
                    name_and_type_index,
                } => {
                    let class = file.pool.class_name_at(class_index)?.to_string();
                    let (name, desc) = owned_nat(&file.pool, name_and_type_index)?;
                    let new_name = self
                        .mapper
                        .map_method(&class, &name, &desc)
                        .unwrap_or_else(|| name.clone());
                    let new_desc = self.mapper.map_descriptor(&desc);
                    self.update_nat(file, index, name_and_type_index, &name, &desc, &new_name, &new_desc)?;
                }
                PoolEntry::MethodType { descriptor_index } => {
                    let desc = file.pool.utf8_at(descriptor_index)?.to_string();
                    let mapped = self.mapper.map_descriptor(&desc);
                    if mapped != desc {
                        let new = file.pool.add_utf8(&mapped)?;
                        file.pool.redirect_method_type(index, new)?;
                    }
                }
                PoolEntry::Dynamic {
                    name_and_type_index,
                    ..
                }
                | PoolEntry::InvokeDynamic {
                    name_and_type_index,
                    ..
                } => {
                    // The name is bootstrap-defined; only the descriptor
                    // embeds class names.
                    let (name, desc) = owned_nat(&file.pool, name_and_type_index)?;
                    let new_desc = self.mapper.map_descriptor(&desc);
                    self.update_nat(file, index, name_and_type_index, &name, &desc, &name.clone(), &new_desc)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Apply a name/descriptor change to the `NameAndType` behind one
    /// referring entry, copy-on-write when the `NameAndType` is shared.
    #[allow(clippy::too_many_arguments)]
    fn update_nat(
        &self,
        file: &mut ClassFile,
        ref_index: u16,
        nat_index: u16,
        name: &str,
        desc: &str,
        new_name: &str,
        new_desc: &str,
    ) -> Result<()> {
        if new_name == name && new_desc == desc {
            return Ok(());
        }
        if file.pool.count_of(nat_index)? > 1 {
            // Shared: other referrers may want a different mapping.
            let name_utf8 = file.pool.add_utf8(new_name)?;
            let desc_utf8 = file.pool.add_utf8(new_desc)?;
            let clone = file.pool.append_or_reuse(PoolEntry::NameAndType {
                name_index: name_utf8,
                descriptor_index: desc_utf8,
            })?;
            file.pool.redirect_name_and_type(ref_index, clone)?;
        } else {
            if new_name != name {
                let utf8 = file.pool.add_utf8(new_name)?;
                file.pool.redirect_nat_name(nat_index, utf8)?;
            }
            if new_desc != desc {
                let utf8 = file.pool.add_utf8(new_desc)?;
                file.pool.redirect_nat_descriptor(nat_index, utf8)?;
            }
        }
        Ok(())
    }

    /// Stage 6: rename `Class` entries in place, keeping indices stable.
    fn remap_class_entries(&self, file: &mut ClassFile) -> Result<()> {
        let indices: Vec<u16> = file.pool.indices().collect();
        for index in indices {
            if !file.pool.is_live(index)? {
                continue;
            }
            let PoolEntry::Class { name_index } = file.pool.get(index)? else {
                continue;
            };
            let name = file.pool.utf8_at(*name_index)?.to_string();
            if let Some(mapped) = self.mapper.map_class(&name) {
                let new = file.pool.add_utf8(&mapped)?;
                file.pool.redirect_name(index, new)?;
            }
        }
        Ok(())
    }

    /// Stage 7: remap identifiers embedded in attribute payloads.
    fn remap_metadata(
        &self,
        file: &mut ClassFile,
        original_class_names: &HashMap<u16, String>,
    ) -> Result<()> {
        // Class-level attributes.
        for attr_index in 0..file.attributes.len() {
            let name = file.pool.utf8_at(file.attributes[attr_index].name_index)?.to_string();
            let mut info = std::mem::take(&mut file.attributes[attr_index].info);
            self.remap_one_attribute(&name, &mut info, &mut file.pool, original_class_names)?;
            file.attributes[attr_index].info = info;
        }
        // Member-level attributes.
        for member_index in 0..file.fields.len() {
            for attr_index in 0..file.fields[member_index].attributes.len() {
                let attr = &file.fields[member_index].attributes[attr_index];
                let name = file.pool.utf8_at(attr.name_index)?.to_string();
                let mut info = std::mem::take(&mut file.fields[member_index].attributes[attr_index].info);
                self.remap_one_attribute(&name, &mut info, &mut file.pool, original_class_names)?;
                file.fields[member_index].attributes[attr_index].info = info;
            }
        }
        for member_index in 0..file.methods.len() {
            for attr_index in 0..file.methods[member_index].attributes.len() {
                let attr = &file.methods[member_index].attributes[attr_index];
                let name = file.pool.utf8_at(attr.name_index)?.to_string();
                let mut info = std::mem::take(&mut file.methods[member_index].attributes[attr_index].info);
                if name == "Code" {
                    self.remap_code_tables(&mut info, &mut file.pool)?;
                } else {
                    self.remap_one_attribute(&name, &mut info, &mut file.pool, original_class_names)?;
                }
                file.methods[member_index].attributes[attr_index].info = info;
            }
        }
        Ok(())
    }

    /// Dispatch one non-`Code` attribute payload.
    fn remap_one_attribute(
        &self,
        name: &str,
        info: &mut [u8],
        pool: &mut ConstantPool,
        original_class_names: &HashMap<u16, String>,
    ) -> Result<()> {
        match name {
            "Signature" => {
                let mut pos = 0usize;
                let index = read_be_at::<u16>(info, &mut pos)?;
                let signature = pool.utf8_at(index)?.to_string();
                let mapped = self.mapper.map_signature(&signature);
                if mapped != signature {
                    let new = pool.add_utf8(&mapped)?;
                    pool.retarget(index, new)?;
                    let mut at = 0usize;
                    crate::file::write_be_at(info, &mut at, new)?;
                }
            }
            "RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations" => {
                attributes::walk_annotations(info, &mut self.annotation_visitor(pool))?;
            }
            "RuntimeVisibleParameterAnnotations" | "RuntimeInvisibleParameterAnnotations" => {
                attributes::walk_parameter_annotations(info, &mut self.annotation_visitor(pool))?;
            }
            "AnnotationDefault" => {
                let mut pos = 0usize;
                attributes::walk_element_value(info, &mut pos, &mut self.annotation_visitor(pool))?;
            }
            "InnerClasses" => {
                self.remap_inner_classes(info, pool, original_class_names)?;
            }
            "EnclosingMethod" => {
                self.remap_enclosing_method(info, pool, original_class_names)?;
            }
            _ => {}
        }
        Ok(())
    }

    /// The shared annotation-site visitor: descriptors through the
    /// descriptor map, element names against the annotation class, enum
    /// constants against the enum class.
    fn annotation_visitor<'p>(
        &'p self,
        pool: &'p mut ConstantPool,
    ) -> impl FnMut(usize, AnnotationSite, u16) -> Result<Option<u16>> + 'p {
        move |_offset, site, index| match site {
            AnnotationSite::Type | AnnotationSite::EnumType | AnnotationSite::ClassInfo => {
                let desc = pool.utf8_at(index)?.to_string();
                let mapped = self.mapper.map_descriptor(&desc);
                if mapped == desc {
                    return Ok(None);
                }
                let new = pool.add_utf8(&mapped)?;
                pool.retarget(index, new)?;
                Ok(Some(new))
            }
            AnnotationSite::ElementName {
                annotation_type_index,
            } => {
                // The carried index predates any patching, so it still
                // names the original descriptor.
                let type_desc = pool.utf8_at(annotation_type_index)?.to_string();
                let Some(class) = descriptor::class_names(&type_desc).into_iter().next() else {
                    return Ok(None);
                };
                let element = pool.utf8_at(index)?.to_string();
                match self.mapper.map_annotation_element(class, &element) {
                    Some(new_name) => {
                        let new = pool.add_utf8(&new_name)?;
                        pool.retarget(index, new)?;
                        Ok(Some(new))
                    }
                    None => Ok(None),
                }
            }
            AnnotationSite::EnumConst { enum_type_index } => {
                let type_desc = pool.utf8_at(enum_type_index)?.to_string();
                let Some(class) = descriptor::class_names(&type_desc).into_iter().next() else {
                    return Ok(None);
                };
                let constant = pool.utf8_at(index)?.to_string();
                match self.mapper.map_field(class, &constant) {
                    Some(new_name) => {
                        let new = pool.add_utf8(&new_name)?;
                        pool.retarget(index, new)?;
                        Ok(Some(new))
                    }
                    None => Ok(None),
                }
            }
            AnnotationSite::Const => Ok(None),
        }
    }

    /// `InnerClasses`: the inner-name `Utf8` must follow the class rename.
    fn remap_inner_classes(
        &self,
        info: &mut [u8],
        pool: &mut ConstantPool,
        original_class_names: &HashMap<u16, String>,
    ) -> Result<()> {
        let tree = self.mapper.tree();
        let mut pos = 0usize;
        let count = read_be_at::<u16>(info, &mut pos)?;
        for _ in 0..count {
            let inner_info = read_be_at::<u16>(info, &mut pos)?;
            let _outer_info = read_be_at::<u16>(info, &mut pos)?;
            let name_offset = pos;
            let inner_name = read_be_at::<u16>(info, &mut pos)?;
            let _access = read_be_at::<u16>(info, &mut pos)?;
            if inner_name == 0 {
                continue; // anonymous
            }
            let Some(original) = original_class_names.get(&inner_info) else {
                continue;
            };
            let Some(class_id) = tree.class_by_name(original) else {
                continue;
            };
            let simple = tree.class(class_id).base.effective_name().to_string();
            if simple != pool.utf8_at(inner_name)? {
                let new = pool.add_utf8(&simple)?;
                pool.retarget(inner_name, new)?;
                let mut at = name_offset;
                crate::file::write_be_at(info, &mut at, new)?;
            }
        }
        Ok(())
    }

    /// `EnclosingMethod`: the `NameAndType` half follows the enclosing
    /// method's rename, copy-on-write when shared.
    fn remap_enclosing_method(
        &self,
        info: &mut [u8],
        pool: &mut ConstantPool,
        original_class_names: &HashMap<u16, String>,
    ) -> Result<()> {
        let mut pos = 0usize;
        let class_index = read_be_at::<u16>(info, &mut pos)?;
        let nat_offset = pos;
        let nat_index = read_be_at::<u16>(info, &mut pos)?;
        if nat_index == 0 {
            return Ok(());
        }
        let Some(class) = original_class_names.get(&class_index) else {
            return Ok(());
        };
        let (name, desc) = owned_nat(pool, nat_index)?;
        let new_name = self
            .mapper
            .map_method(class, &name, &desc)
            .unwrap_or_else(|| name.clone());
        let new_desc = self.mapper.map_descriptor(&desc);
        if new_name == name && new_desc == desc {
            return Ok(());
        }
        if pool.count_of(nat_index)? > 1 {
            let name_utf8 = pool.add_utf8(&new_name)?;
            let desc_utf8 = pool.add_utf8(&new_desc)?;
            let clone = pool.append_or_reuse(PoolEntry::NameAndType {
                name_index: name_utf8,
                descriptor_index: desc_utf8,
            })?;
            // The attribute itself is the referrer here; patch and move the
            // count by hand.
            pool.retarget(nat_index, clone)?;
            let mut at = nat_offset;
            crate::file::write_be_at(info, &mut at, clone)?;
        } else {
            if new_name != name {
                let utf8 = pool.add_utf8(&new_name)?;
                pool.redirect_nat_name(nat_index, utf8)?;
            }
            if new_desc != desc {
                let utf8 = pool.add_utf8(&new_desc)?;
                pool.redirect_nat_descriptor(nat_index, utf8)?;
            }
        }
        Ok(())
    }

    /// Kept `LocalVariableTable`/`LocalVariableTypeTable` entries inside
    /// `Code` carry descriptor/signature `Utf8` sites.
    fn remap_code_tables(&self, info: &mut Vec<u8>, pool: &mut ConstantPool) -> Result<()> {
        let mut code = CodeAttribute::decode(info)?;
        let mut touched = false;
        for attr in &mut code.attributes {
            let name = pool.utf8_at(attr.name_index)?.to_string();
            let type_table = match name.as_str() {
                "LocalVariableTable" => false,
                "LocalVariableTypeTable" => true,
                _ => continue,
            };
            let data = &mut attr.info;
            let mut pos = 0usize;
            let count = read_be_at::<u16>(data, &mut pos)?;
            for _ in 0..count {
                let _start = read_be_at::<u16>(data, &mut pos)?;
                let _length = read_be_at::<u16>(data, &mut pos)?;
                let _name_index = read_be_at::<u16>(data, &mut pos)?;
                let desc_offset = pos;
                let desc_index = read_be_at::<u16>(data, &mut pos)?;
                let _slot = read_be_at::<u16>(data, &mut pos)?;

                let text = pool.utf8_at(desc_index)?.to_string();
                let mapped = if type_table {
                    self.mapper.map_signature(&text)
                } else {
                    self.mapper.map_descriptor(&text)
                };
                if mapped != text {
                    let new = pool.add_utf8(&mapped)?;
                    pool.retarget(desc_index, new)?;
                    let mut at = desc_offset;
                    crate::file::write_be_at(data, &mut at, new)?;
                    touched = true;
                }
            }
        }
        if touched {
            *info = code.encode();
        }
        Ok(())
    }
}

/// Exact-class method lookup including the special methods.
fn declared_method(
    tree: &ClassTree,
    class: ClassId,
    name: &str,
    descriptor: &str,
) -> Option<MethodId> {
    if name == "<init>" || name == "<clinit>" {
        return tree
            .class(class)
            .special_methods
            .iter()
            .copied()
            .find(|&method| {
                let node = tree.method(method);
                node.base.original_name == name && node.descriptor == descriptor
            });
    }
    tree.method_of(class, name, descriptor)
}

fn owned_nat(pool: &ConstantPool, index: u16) -> Result<(String, String)> {
    let (name, desc) = pool.name_and_type_at(index)?;
    Ok((name.to_string(), desc.to_string()))
}

/// Keep the attributes the predicate approves, preserving order.
fn filter_attributes(
    pool: &ConstantPool,
    attrs: &mut Vec<AttributeInfo>,
    keep: impl Fn(&ConstantPool, &AttributeInfo) -> Result<bool>,
) -> Result<()> {
    let mut kept = Vec::with_capacity(attrs.len());
    for attr in attrs.drain(..) {
        if keep(pool, &attr)? {
            kept.push(attr);
        }
    }
    *attrs = kept;
    Ok(())
}

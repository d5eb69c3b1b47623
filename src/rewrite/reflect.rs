//! Reflective class-name string remapping.
//!
//! `Class.forName("com.example.Foo")` defeats structural renaming: the class
//! name travels as string characters, not as a `Class` entry. This pass
//! recognizes the one pattern that can be rewritten safely - an `ldc`/`ldc_w`
//! of a `String` constant *immediately* followed by `invokestatic
//! java/lang/Class.forName(Ljava/lang/String;)Ljava/lang/Class;` - and
//! rewrites those constants to the new names.
//!
//! A constant used both reflectively and as plain data cannot be edited in
//! place without corrupting the plain uses, so mixed-use constants are
//! duplicated: the reflective `ldc` sites are repointed at the new copy and
//! everything else keeps the original. A plain `ldc` whose replacement index
//! would not fit its one-byte operand is left unpatched (and logged); the
//! class keeps working, just under its old reflective name.

use std::collections::HashMap;

use crate::classfile::code::{pool_sites, CodeAttribute, OP_INVOKESTATIC, OP_LDC, OP_LDC_W};
use crate::classfile::descriptor::is_plausible_class_name;
use crate::classfile::{ClassFile, PoolEntry};
use crate::rename::oracle::TypeOracle;
use crate::rewrite::mapper::NameMapper;
use crate::{file::write_be_at, Result};

/// One `ldc`/`ldc_w` site feeding `Class.forName`.
struct ReflectiveSite {
    /// Index of the method record holding the `Code` attribute.
    method: usize,
    /// Index of the `Code` attribute within that method's attribute list.
    attr: usize,
    /// Instruction offset within the code array.
    offset: usize,
    /// `OP_LDC` or `OP_LDC_W`.
    opcode: u8,
}

/// Remap reflective class-name strings in one file. Pool counts must be
/// accurate (a recount has run) so mixed use can be told from pure
/// reflective use.
pub fn remap_reflective_strings<O: TypeOracle>(
    file: &mut ClassFile,
    mapper: &NameMapper<'_, O>,
) -> Result<()> {
    let mut sites_by_string: HashMap<u16, Vec<ReflectiveSite>> = HashMap::new();

    for (method_index, method) in file.methods.iter().enumerate() {
        for (attr_index, attr) in method.attributes.iter().enumerate() {
            if file.pool.utf8_at(attr.name_index)? != "Code" {
                continue;
            }
            let code = CodeAttribute::decode(&attr.info)?;
            let sites = pool_sites(&code.code)?;
            for pair in sites.windows(2) {
                let (load, call) = (&pair[0], &pair[1]);
                let width = match load.opcode {
                    OP_LDC => 2,
                    OP_LDC_W => 3,
                    _ => continue,
                };
                if call.offset != load.offset + width || call.opcode != OP_INVOKESTATIC {
                    continue;
                }
                if !matches!(file.pool.get(load.index)?, PoolEntry::String { .. })
                    || !is_class_forname(file, call.index)?
                {
                    continue;
                }
                sites_by_string
                    .entry(load.index)
                    .or_default()
                    .push(ReflectiveSite {
                        method: method_index,
                        attr: attr_index,
                        offset: load.offset,
                        opcode: load.opcode,
                    });
            }
        }
    }

    let mut strings: Vec<u16> = sites_by_string.keys().copied().collect();
    strings.sort_unstable();

    for string_index in strings {
        let characters = match file.pool.get(string_index)? {
            PoolEntry::String { string_index } => file.pool.utf8_at(*string_index)?.to_string(),
            _ => continue,
        };
        // forName takes source-form dotted names; accept slashed too.
        let dotted = !characters.contains('/') && characters.contains('.');
        let slashed = if dotted {
            characters.replace('.', "/")
        } else {
            characters.clone()
        };
        if !is_plausible_class_name(&slashed) {
            continue;
        }
        let Some(mapped) = mapper.map_class(&slashed) else {
            continue;
        };
        let replacement = if dotted {
            mapped.replace('/', ".")
        } else {
            mapped
        };

        let sites = &sites_by_string[&string_index];
        let mixed = file.pool.count_of(string_index)? as usize > sites.len();

        if !mixed {
            let new_utf8 = file.pool.add_utf8(&replacement)?;
            file.pool.redirect_string_value(string_index, new_utf8)?;
            continue;
        }

        // Mixed use: duplicate the constant and patch only the reflective
        // load sites.
        let new_utf8 = file.pool.add_utf8(&replacement)?;
        let new_string = file
            .pool
            .append_or_reuse(PoolEntry::String {
                string_index: new_utf8,
            })?;
        for site in sites {
            let info = &mut file.methods[site.method].attributes[site.attr].info;
            // Code attribute layout: max_stack, max_locals, code_length,
            // then the code array.
            let operand_at = 8 + site.offset + 1;
            match site.opcode {
                OP_LDC if new_string > 0xFF => {
                    tracing::warn!(
                        string = %characters,
                        index = new_string,
                        "reflective ldc left unpatched, duplicate index exceeds one byte"
                    );
                    continue;
                }
                OP_LDC => info[operand_at] = new_string as u8,
                _ => {
                    let mut pos = operand_at;
                    write_be_at(info, &mut pos, new_string)?;
                }
            }
            file.pool.retarget(string_index, new_string)?;
        }
    }
    Ok(())
}

/// `true` if the pool entry at `index` is the `Class.forName(String)` method
/// reference.
fn is_class_forname(file: &ClassFile, index: u16) -> Result<bool> {
    match file.pool.get(index)? {
        PoolEntry::Methodref {
            class_index,
            name_and_type_index,
        } => Ok(file.pool.class_name_at(*class_index)? == "java/lang/Class"
            && matches!(
                file.pool.name_and_type_at(*name_and_type_index)?,
                ("forName", "(Ljava/lang/String;)Ljava/lang/Class;")
            )),
        _ => Ok(false),
    }
}

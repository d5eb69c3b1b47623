//! Shared test fixtures: a small class-file byte builder.
//!
//! Tests drive whole sessions over synthetic inputs; this builder produces
//! well-formed class-file bytes without pulling in a real compiler. Pool
//! entries are interned, so two members mentioning the same `Utf8` or
//! `NameAndType` genuinely share one entry - which is exactly what the
//! copy-on-write rewrite paths need exercised.

#![allow(dead_code)]

use std::collections::HashMap;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_SUPER: u16 = 0x0020;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;

/// Interning constant-pool builder. Indices are 1-based and stable once
/// handed out (append-only, no wide entries).
#[derive(Default)]
pub struct PoolBuilder {
    entries: Vec<Vec<u8>>,
    interned: HashMap<Vec<u8>, u16>,
}

impl PoolBuilder {
    fn intern(&mut self, bytes: Vec<u8>) -> u16 {
        if let Some(&index) = self.interned.get(&bytes) {
            return index;
        }
        self.entries.push(bytes.clone());
        let index = self.entries.len() as u16;
        self.interned.insert(bytes, index);
        index
    }

    pub fn utf8(&mut self, text: &str) -> u16 {
        let mut bytes = vec![1u8];
        bytes.extend((text.len() as u16).to_be_bytes());
        bytes.extend(text.as_bytes());
        self.intern(bytes)
    }

    pub fn class(&mut self, name: &str) -> u16 {
        let utf8 = self.utf8(name);
        let mut bytes = vec![7u8];
        bytes.extend(utf8.to_be_bytes());
        self.intern(bytes)
    }

    pub fn string(&mut self, value: &str) -> u16 {
        let utf8 = self.utf8(value);
        let mut bytes = vec![8u8];
        bytes.extend(utf8.to_be_bytes());
        self.intern(bytes)
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        let mut bytes = vec![12u8];
        bytes.extend(name.to_be_bytes());
        bytes.extend(descriptor.to_be_bytes());
        self.intern(bytes)
    }

    pub fn field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        self.member_ref(9, class, name, descriptor)
    }

    pub fn method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        self.member_ref(10, class, name, descriptor)
    }

    fn member_ref(&mut self, tag: u8, class: &str, name: &str, descriptor: &str) -> u16 {
        let class = self.class(class);
        let nat = self.name_and_type(name, descriptor);
        let mut bytes = vec![tag];
        bytes.extend(class.to_be_bytes());
        bytes.extend(nat.to_be_bytes());
        self.intern(bytes)
    }

    fn encode(&self, sink: &mut Vec<u8>) {
        sink.extend(((self.entries.len() + 1) as u16).to_be_bytes());
        for entry in &self.entries {
            sink.extend_from_slice(entry);
        }
    }
}

struct MemberRecord {
    access: u16,
    name_index: u16,
    descriptor_index: u16,
    attributes: Vec<(u16, Vec<u8>)>,
}

/// Builds one class file. Defaults: `public super`, extends
/// `java/lang/Object`, major version 52.
pub struct ClassFileBuilder {
    pub pool: PoolBuilder,
    access: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<MemberRecord>,
    methods: Vec<MemberRecord>,
    attributes: Vec<(u16, Vec<u8>)>,
}

impl ClassFileBuilder {
    pub fn new(name: &str) -> ClassFileBuilder {
        let mut pool = PoolBuilder::default();
        let this_class = pool.class(name);
        let super_class = pool.class("java/lang/Object");
        ClassFileBuilder {
            pool,
            access: ACC_PUBLIC | ACC_SUPER,
            this_class,
            super_class,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn access(&mut self, flags: u16) -> &mut Self {
        self.access = flags;
        self
    }

    pub fn extends(&mut self, name: &str) -> &mut Self {
        self.super_class = self.pool.class(name);
        self
    }

    pub fn implements(&mut self, name: &str) -> &mut Self {
        let class = self.pool.class(name);
        self.interfaces.push(class);
        self
    }

    pub fn field(&mut self, access: u16, name: &str, descriptor: &str) -> &mut Self {
        let name_index = self.pool.utf8(name);
        let descriptor_index = self.pool.utf8(descriptor);
        self.fields.push(MemberRecord {
            access,
            name_index,
            descriptor_index,
            attributes: Vec::new(),
        });
        self
    }

    pub fn method(&mut self, access: u16, name: &str, descriptor: &str) -> &mut Self {
        let name_index = self.pool.utf8(name);
        let descriptor_index = self.pool.utf8(descriptor);
        self.methods.push(MemberRecord {
            access,
            name_index,
            descriptor_index,
            attributes: Vec::new(),
        });
        self
    }

    /// A method carrying a `Code` attribute with the given bytecode. Pool
    /// indices the bytecode refers to must be created through [`Self::pool`]
    /// before this call.
    pub fn method_with_code(
        &mut self,
        access: u16,
        name: &str,
        descriptor: &str,
        code: &[u8],
    ) -> &mut Self {
        let name_index = self.pool.utf8(name);
        let descriptor_index = self.pool.utf8(descriptor);
        let attr_name = self.pool.utf8("Code");

        let mut payload = Vec::new();
        payload.extend(4u16.to_be_bytes()); // max_stack
        payload.extend(4u16.to_be_bytes()); // max_locals
        payload.extend((code.len() as u32).to_be_bytes());
        payload.extend_from_slice(code);
        payload.extend(0u16.to_be_bytes()); // exception table
        payload.extend(0u16.to_be_bytes()); // nested attributes

        self.methods.push(MemberRecord {
            access,
            name_index,
            descriptor_index,
            attributes: vec![(attr_name, payload)],
        });
        self
    }

    /// Attach a class-level attribute with a raw payload.
    pub fn attribute(&mut self, name: &str, payload: Vec<u8>) -> &mut Self {
        let attr_name = self.pool.utf8(name);
        self.attributes.push((attr_name, payload));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(0xCAFE_BABEu32.to_be_bytes());
        out.extend(0u16.to_be_bytes()); // minor
        out.extend(52u16.to_be_bytes()); // major
        self.pool.encode(&mut out);
        out.extend(self.access.to_be_bytes());
        out.extend(self.this_class.to_be_bytes());
        out.extend(self.super_class.to_be_bytes());
        out.extend((self.interfaces.len() as u16).to_be_bytes());
        for &interface in &self.interfaces {
            out.extend(interface.to_be_bytes());
        }
        encode_members(&mut out, &self.fields);
        encode_members(&mut out, &self.methods);
        encode_attributes(&mut out, &self.attributes);
        out
    }
}

fn encode_members(out: &mut Vec<u8>, members: &[MemberRecord]) {
    out.extend((members.len() as u16).to_be_bytes());
    for member in members {
        out.extend(member.access.to_be_bytes());
        out.extend(member.name_index.to_be_bytes());
        out.extend(member.descriptor_index.to_be_bytes());
        encode_attributes(out, &member.attributes);
    }
}

fn encode_attributes(out: &mut Vec<u8>, attrs: &[(u16, Vec<u8>)]) {
    out.extend((attrs.len() as u16).to_be_bytes());
    for (name_index, payload) in attrs {
        out.extend(name_index.to_be_bytes());
        out.extend((payload.len() as u32).to_be_bytes());
        out.extend_from_slice(payload);
    }
}

//! Two-pass orchestration of a whole obfuscation run.
//!
//! [`ObfuscationSession`] owns the symbol tree, the decoded class files, the
//! run options, and the oracle cache. The lifecycle is strictly ordered:
//!
//! 1. [`ObfuscationSession::load_class`] (or `load_container`) decodes each
//!    input and enters it into the tree - pass 1;
//! 2. [`ObfuscationSession::apply_directives`] consumes the script feed;
//! 3. [`ObfuscationSession::resolve`] runs the name resolver and, when
//!    trimming is enabled, the reachability sweep;
//! 4. [`ObfuscationSession::rewrite_all`] patches every file - pass 2, in
//!    parallel over the by-then read-only tree;
//! 5. [`ObfuscationSession::report`] dumps the outcome.
//!
//! The first [`crate::Error::CorruptFormat`] aborts the run: `load_class`
//! propagates it and the session makes no attempt to continue past damaged
//! input. A directive naming an absent entity is only a warning.
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use classcloak::prelude::*;
//!
//! let mut session = ObfuscationSession::new(FixtureOracle::with_core_types(), Options::default());
//! session.load_class("demo/Greeter.class", &std::fs::read("Greeter.class")?)?;
//! session.apply_directives([Directive::Option(OptionFlag::Repackage)])?;
//! session.resolve()?;
//! for (name, bytes) in session.rewrite_all()? {
//!     std::fs::write(name, bytes)?;
//! }
//! println!("{}", session.report());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;

use crate::classfile::ClassFile;
use crate::container::{self, ContainerReader, ContainerSink};
use crate::file::PhysicalFile;
use crate::rename::{FrequencyTable, OracleCache, Resolver, TypeOracle};
use crate::report::{self, Report};
use crate::rewrite::{trim, NameMapper, RewriteOptions, Rewriter};
use crate::script::{self, Directive, ScriptEffects};
use crate::tree::{ClassId, ClassTree, TrimMark};
use crate::Result;

/// Run-wide options; script `.option` directives OR into these.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// Flatten renamed packages into fresh root-level segments.
    pub repackage: bool,
    /// Drop unreachable members and classes.
    pub trim: bool,
    /// Drop attributes outside the keep-set.
    pub trim_attributes: bool,
    /// Rewrite `Class.forName` string constants.
    pub remap_reflection: bool,
}

/// One loaded input: its container entry name, the decoded record, and its
/// node in the tree.
struct LoadedFile {
    entry_name: String,
    file: ClassFile,
    class: ClassId,
}

/// Owns one whole obfuscation run. See the module docs for the lifecycle.
pub struct ObfuscationSession<O: TypeOracle> {
    tree: ClassTree,
    oracle: OracleCache<O>,
    options: Options,
    files: Vec<LoadedFile>,
    /// Non-class container entries, passed through verbatim.
    passthrough: Vec<(String, Vec<u8>)>,
    effects: ScriptEffects,
    frequencies: Arc<FrequencyTable>,
    resolved: bool,
}

impl<O: TypeOracle> ObfuscationSession<O> {
    /// A fresh session over `oracle` with the given options.
    pub fn new(oracle: O, options: Options) -> ObfuscationSession<O> {
        ObfuscationSession {
            tree: ClassTree::new(),
            oracle: OracleCache::new(oracle),
            options,
            files: Vec::new(),
            passthrough: Vec::new(),
            effects: ScriptEffects::default(),
            frequencies: Arc::new(FrequencyTable::new()),
            resolved: false,
        }
    }

    /// Decode one class file and enter it into the tree.
    ///
    /// `name` is the container entry name, kept for diagnostics; the output
    /// entry name is derived from the class's renamed qualified name.
    ///
    /// # Errors
    /// [`crate::Error::CorruptFormat`] on damaged input (fatal for the run),
    /// [`crate::Error::InconsistentReference`] on duplicate definitions.
    pub fn load_class(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        let file = ClassFile::decode(bytes)?;
        let class = self.tree.add_class_file(&file)?;
        tracing::debug!(entry = name, class = %self.tree.class_qualified_name(class), "loaded");
        self.files.push(LoadedFile {
            entry_name: name.to_string(),
            file,
            class,
        });
        Ok(())
    }

    /// Load a class file from disk through the memory-mapped reader.
    pub fn load_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let physical = PhysicalFile::open(path)?;
        let name = path.to_string_lossy().into_owned();
        self.load_class(&name, physical.data())
    }

    /// Load every entry of a container: class entries are decoded, anything
    /// else is recorded for verbatim pass-through.
    pub fn load_container(&mut self, reader: &mut impl ContainerReader) -> Result<()> {
        for (name, bytes) in reader.read_entries()? {
            if container::is_class_entry(&name) {
                self.load_class(&name, &bytes)?;
            } else {
                self.passthrough.push((name, bytes));
            }
        }
        Ok(())
    }

    /// Consume the script feed, in order.
    ///
    /// A directive naming an absent entity is logged and skipped; any other
    /// failure (a malformed wildcard pattern) aborts. Option flags OR into
    /// the session options.
    pub fn apply_directives(
        &mut self,
        directives: impl IntoIterator<Item = Directive>,
    ) -> Result<()> {
        for directive in directives {
            match script::apply(&directive, &mut self.tree, &mut self.effects) {
                Ok(()) => {}
                Err(crate::Error::UnresolvedScriptEntry(message)) => {
                    tracing::warn!(%directive, %message, "directive skipped");
                }
                Err(other) => return Err(other),
            }
        }
        self.options.repackage |= self.effects.repackage;
        self.options.trim |= self.effects.trim;
        self.options.trim_attributes |= self.effects.trim_attributes;
        self.options.remap_reflection |= self.effects.remap_reflection;
        Ok(())
    }

    /// Resolve every output name, then (when trimming) run the reachability
    /// sweep. Idempotent: fixed names are never reassigned.
    pub fn resolve(&mut self) -> Result<()> {
        let mut resolver = Resolver::new(
            &mut self.tree,
            &self.oracle,
            Arc::clone(&self.frequencies),
            self.options.repackage,
        );
        resolver.resolve_all();
        if self.options.trim {
            trim::sweep(&mut self.tree);
        }
        self.resolved = true;
        tracing::debug!(classes = self.tree.class_count(), "resolution complete");
        Ok(())
    }

    /// Rewrite every loaded file against the resolved tree.
    ///
    /// Runs in parallel; the tree is read-only from here on. Returns
    /// `(output entry name, encoded bytes)` pairs; classes removed by the
    /// trim sweep are omitted. Call once per session.
    pub fn rewrite_all(&mut self) -> Result<Vec<(String, Vec<u8>)>> {
        if !self.resolved {
            self.resolve()?;
        }
        let tree = &self.tree;
        let mapper = NameMapper::new(tree, &self.oracle);
        let rewrite_options = RewriteOptions {
            trim: self.options.trim,
            trim_attributes: self.options.trim_attributes,
            remap_reflection: self.options.remap_reflection,
        };
        let retained = &self.effects.retained_attributes;
        let trim_enabled = self.options.trim;

        let outputs: Vec<Option<(String, Vec<u8>)>> = self
            .files
            .par_iter_mut()
            .map(|loaded| {
                if trim_enabled && tree.class(loaded.class).base.trim == TrimMark::Trim {
                    tracing::debug!(entry = %loaded.entry_name, "trimmed whole class");
                    return Ok(None);
                }
                let rewriter = Rewriter::new(&mapper, rewrite_options, retained);
                rewriter.rewrite(&mut loaded.file)?;
                let name = format!("{}.class", tree.output_qualified_name(loaded.class));
                Ok(Some((name, loaded.file.encode())))
            })
            .collect::<Result<_>>()?;
        Ok(outputs.into_iter().flatten().collect())
    }

    /// Rewrite everything and stream it into `sink`: rewritten class
    /// entries first, then every non-class entry verbatim.
    pub fn write_container(&mut self, sink: &mut impl ContainerSink) -> Result<()> {
        for (name, bytes) in self.rewrite_all()? {
            sink.write_entry(&name, &bytes)?;
        }
        for (name, bytes) in &self.passthrough {
            sink.write_entry(name, bytes)?;
        }
        Ok(())
    }

    /// The post-run dump: fixed entities, rename map, frequency table.
    #[must_use]
    pub fn report(&self) -> Report {
        report::build(&self.tree, &self.frequencies)
    }

    /// The symbol tree (read-only), for inspection and tests.
    #[must_use]
    pub fn tree(&self) -> &ClassTree {
        &self.tree
    }
}

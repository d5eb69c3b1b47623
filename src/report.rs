//! Post-run reporting.
//!
//! After a session has resolved (and optionally rewritten) its input set,
//! [`build`] condenses the tree into a [`Report`]: every script-fixed
//! entity's original qualified name, every renamed entity's original →
//! output mapping with its trim status, and the name-frequency table the
//! generator accumulated, sorted by descending use count. Rendering goes
//! through [`std::fmt::Write`] so callers decide where the text lands.

use std::fmt;

use crate::rename::FrequencyTable;
use crate::tree::{ClassTree, TrimMark};

/// One original → output mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameRecord {
    /// Qualified original name (`pkg/Class`, `pkg/Class.member`).
    pub original: String,
    /// Qualified output name.
    pub output: String,
    /// `true` when the trim sweep removed the entity from the output.
    pub trimmed: bool,
}

/// The condensed outcome of one run.
#[derive(Debug, Clone, Default)]
pub struct Report {
    /// Original qualified names of script-fixed entities, in tree order.
    pub fixed: Vec<String>,
    /// Renamed entities, in tree order.
    pub renamed: Vec<RenameRecord>,
    /// `(name, use count)` pairs, descending by count.
    pub frequencies: Vec<(String, u64)>,
}

impl Report {
    /// Render the report as text into `out`.
    pub fn render(&self, out: &mut impl fmt::Write) -> fmt::Result {
        writeln!(out, "fixed by script ({})", self.fixed.len())?;
        for name in &self.fixed {
            writeln!(out, "  {name}")?;
        }
        writeln!(out, "renamed ({})", self.renamed.len())?;
        for record in &self.renamed {
            let marker = if record.trimmed { " [trimmed]" } else { "" };
            writeln!(out, "  {} -> {}{}", record.original, record.output, marker)?;
        }
        if !self.frequencies.is_empty() {
            writeln!(out, "name frequencies")?;
            for (name, count) in &self.frequencies {
                writeln!(out, "  {count:>8}  {name}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f)
    }
}

/// Condense the resolved tree and the generator's frequency table.
#[must_use]
pub fn build(tree: &ClassTree, frequencies: &FrequencyTable) -> Report {
    let mut report = Report {
        frequencies: frequencies.sorted(),
        ..Report::default()
    };

    for class_id in tree.class_ids() {
        let class = tree.class(class_id);
        if class.is_placeholder {
            continue;
        }
        let original = tree.class_qualified_name(class_id);
        let output = tree.output_qualified_name(class_id);
        let trimmed = class.base.trim == TrimMark::Trim;
        if class.base.from_script {
            report.fixed.push(original.clone());
        } else if output != original {
            report.renamed.push(RenameRecord {
                original: original.clone(),
                output: output.clone(),
                trimmed,
            });
        }

        for &method in class.methods.iter().chain(&class.special_methods) {
            let node = tree.method(method);
            let qualified = format!("{}.{}{}", original, node.base.original_name, node.descriptor);
            if node.base.from_script {
                report.fixed.push(qualified);
            } else if node.base.effective_name() != node.base.original_name {
                report.renamed.push(RenameRecord {
                    original: qualified,
                    output: format!("{}.{}{}", output, node.base.effective_name(), node.descriptor),
                    trimmed: node.base.trim == TrimMark::Trim,
                });
            }
        }
        for &field in &class.fields {
            let node = tree.field(field);
            let qualified = format!("{}.{}", original, node.base.original_name);
            if node.base.from_script {
                report.fixed.push(qualified);
            } else if node.base.effective_name() != node.base.original_name {
                report.renamed.push(RenameRecord {
                    original: qualified,
                    output: format!("{}.{}", output, node.base.effective_name()),
                    trimmed: node.base.trim == TrimMark::Trim,
                });
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_fixed_and_renamed_sections() {
        let mut tree = ClassTree::new();
        let fixed_class = tree.ensure_class("keep/Api");
        tree.class_mut(fixed_class).is_placeholder = false;
        tree.class_mut(fixed_class).base.from_script = true;
        tree.class_mut(fixed_class).base.keep_original();

        let renamed_class = tree.ensure_class("impl/Worker");
        tree.class_mut(renamed_class).is_placeholder = false;
        tree.class_mut(renamed_class).base.output_name = Some("a".into());

        let frequencies = FrequencyTable::new();
        frequencies.record("a");
        frequencies.record("a");

        let report = build(&tree, &frequencies);
        assert_eq!(report.fixed, vec!["keep/Api".to_string()]);
        assert_eq!(report.renamed.len(), 1);
        assert_eq!(report.renamed[0].original, "impl/Worker");
        assert_eq!(report.renamed[0].output, "impl/a");
        assert_eq!(report.frequencies, vec![("a".to_string(), 2)]);

        let text = report.to_string();
        assert!(text.contains("keep/Api"));
        assert!(text.contains("impl/Worker -> impl/a"));
    }
}

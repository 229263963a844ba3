//! Self-contained executable unit packaging.
//!
//! Remote hosts have a bare `python3` and no access to this crate or its
//! payload directory, so everything a remote procedure needs is concatenated
//! into one dependency-free source file before shipping. The packager scans
//! each fragment for import statements, verifies that every imported module
//! is part of the interpreter's standard library, deduplicates the import
//! block, and emits a single artifact with a manifest of the included
//! fragments in its header. A fragment importing anything foreign is a
//! packaging error — it would fail on the remote side in a much less
//! debuggable way.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::DeployError;

/// Python standard-library top-level module names the payload is allowed to
/// import. Checked against the top-level segment of each import, so
/// `urllib.request` resolves as `urllib`.
const PYTHON_STDLIB: &[&str] = &[
    "abc",
    "argparse",
    "base64",
    "builtins",
    "collections",
    "configparser",
    "contextlib",
    "copy",
    "csv",
    "datetime",
    "enum",
    "errno",
    "fnmatch",
    "functools",
    "getpass",
    "glob",
    "gzip",
    "hashlib",
    "io",
    "itertools",
    "json",
    "logging",
    "math",
    "os",
    "pathlib",
    "platform",
    "random",
    "re",
    "shlex",
    "shutil",
    "signal",
    "socket",
    "stat",
    "string",
    "subprocess",
    "sys",
    "tarfile",
    "tempfile",
    "textwrap",
    "time",
    "traceback",
    "types",
    "typing",
    "urllib",
    "uuid",
    "zipfile",
];

/// Returns whether `module` (possibly dotted) resolves inside the standard
/// library.
pub fn is_stdlib(module: &str) -> bool {
    let top = module.split('.').next().unwrap_or(module);
    PYTHON_STDLIB.contains(&top)
}

// ---------------------------------------------------------------------------
// Fragment
// ---------------------------------------------------------------------------

/// One source fragment destined for a unit. Fragments may reference symbols
/// defined by other fragments in the same unit, but may only *import* from
/// the standard library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub name: String,
    pub source: String,
}

impl Fragment {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Fragment {
            name: name.into(),
            source: source.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ExecutableUnit
// ---------------------------------------------------------------------------

/// A packaged, dependency-free source unit. Immutable once created;
/// repackaging the same fragment set yields byte-identical content.
#[derive(Debug, Clone)]
pub struct ExecutableUnit {
    name: String,
    manifest: Vec<String>,
    source: String,
}

impl ExecutableUnit {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of the fragments that went into this unit, in inclusion order.
    pub fn manifest(&self) -> &[String] {
        &self.manifest
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Write the unit to its deterministic location under `gen_dir`
    /// (`<gen_dir>/<name>.py`), creating the directory if needed.
    pub fn write_to(&self, gen_dir: &Path) -> Result<PathBuf, DeployError> {
        fs::create_dir_all(gen_dir).map_err(|e| DeployError::io(gen_dir, e))?;
        let path = gen_dir.join(format!("{}.py", self.name));
        fs::write(&path, &self.source).map_err(|e| DeployError::io(&path, e))?;
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// UnitPackager
// ---------------------------------------------------------------------------

/// Packages fragment sets into executable units.
pub struct UnitPackager;

impl UnitPackager {
    /// Concatenate `fragments` into one unit named `name`.
    ///
    /// The emitted layout is: header comment with the fragment manifest,
    /// the deduplicated (sorted) union of standard-library import
    /// statements, then each fragment body with its own import lines
    /// stripped. Fails with a packaging error on the first foreign import.
    pub fn package(name: &str, fragments: &[Fragment]) -> Result<ExecutableUnit, DeployError> {
        if fragments.is_empty() {
            return Err(DeployError::packaging(name, "no fragments given"));
        }

        let mut imports: BTreeSet<String> = BTreeSet::new();
        for fragment in fragments {
            for line in fragment.source.lines() {
                if let Some(statement) = parse_import(line) {
                    if !is_stdlib(&statement.module) {
                        return Err(DeployError::packaging(
                            &fragment.name,
                            format!("foreign import '{}'", statement.module),
                        ));
                    }
                    imports.insert(statement.normalized);
                }
            }
        }

        let mut out = String::new();
        out.push_str(&format!("# Generated unit '{}'. Do not edit.\n", name));
        out.push_str(&format!("# Contains {} fragments:\n", fragments.len()));
        for fragment in fragments {
            out.push_str(&format!("#   - {}\n", fragment.name));
        }
        out.push('\n');
        for import in &imports {
            out.push_str(import);
            out.push('\n');
        }
        for fragment in fragments {
            out.push_str(&format!("\n\n# --- fragment: {} ---\n", fragment.name));
            for line in fragment.source.lines() {
                if parse_import(line).is_none() {
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }

        Ok(ExecutableUnit {
            name: name.to_string(),
            manifest: fragments.iter().map(|f| f.name.clone()).collect(),
            source: out,
        })
    }
}

struct ImportStatement {
    /// The (possibly dotted) module being imported.
    module: String,
    /// Canonical statement text used for deduplication.
    normalized: String,
}

/// Parse a line as a Python import statement, if it is one.
/// Handles `import x[.y][ as z]` and `from x[.y] import a[, b][ as c]`.
fn parse_import(line: &str) -> Option<ImportStatement> {
    let trimmed = line.trim();
    if let Some(rest) = trimmed.strip_prefix("import ") {
        let rest = rest.trim();
        let module = rest.split_whitespace().next()?.to_string();
        return Some(ImportStatement {
            module,
            normalized: format!("import {}", rest),
        });
    }
    if let Some(rest) = trimmed.strip_prefix("from ") {
        let mut parts = rest.splitn(2, " import ");
        let module = parts.next()?.trim().to_string();
        let names = parts.next()?.trim().to_string();
        if module.is_empty() || names.is_empty() {
            return None;
        }
        return Some(ImportStatement {
            normalized: format!("from {} import {}", module, names),
            module,
        });
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

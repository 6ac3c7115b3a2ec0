// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Generates hermetic code-patching stubs
//!
//! A hermetic stub is an assembly function whose body is a single
//! `.code_patching.blob` directive.  The blob is sized to fit the largest of a
//! set of alternative implementations, one of which is copied over it when the
//! code is patched.  Each stub is tagged with a case ID (`CASE_ID_<NAME>`) so
//! that the patcher can find it, and may carry any number of alias symbols.
//!
//! Alongside the stub, we emit a makefile-style depfile listing every
//! alternative, so that the build system regenerates the stub whenever one of
//! them changes size.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// One entry in the alternatives metadata file
///
/// Only `path` is consumed; any other keys are ignored.
#[derive(Clone, Debug, Deserialize)]
pub struct Alternative {
    pub path: String,
}

/// Everything needed to produce a stub and its depfile
#[derive(Clone, Debug)]
pub struct Options {
    /// Name of the stub function
    pub name: String,
    /// Header defining the case ID constant
    pub header: String,
    /// JSON array of [`Alternative`] entries
    pub metadata_file: PathBuf,
    /// Symbols to alias to the stub function
    pub aliases: Vec<String>,
    pub depfile: PathBuf,
    pub outfile: PathBuf,
    /// Copyright year; the current local year if `None`
    pub year: Option<i32>,
}

/// Loads the alternatives listed in a metadata file
pub fn read_metadata(path: &Path) -> Result<Vec<Alternative>> {
    let text = std::fs::read_to_string(path).with_context(|| {
        format!("could not read metadata file {}", path.display())
    })?;
    let alternatives: Vec<Alternative> = serde_json::from_str(&text)
        .with_context(|| {
            format!("could not parse metadata file {}", path.display())
        })?;
    log::debug!(
        "loaded {} alternative(s) from {}",
        alternatives.len(),
        path.display()
    );
    Ok(alternatives)
}

/// Returns the size in bytes of the largest alternative, or 0 if there are
/// none
pub fn max_alternative_size(alternatives: &[Alternative]) -> Result<u64> {
    let mut max_size = 0;
    for alt in alternatives {
        let size = std::fs::metadata(&alt.path)
            .with_context(|| {
                format!("could not stat alternative {}", alt.path)
            })?
            .len();
        log::debug!("{}: {size} bytes", alt.path);
        max_size = max_size.max(size);
    }
    Ok(max_size)
}

/// Returns the case ID constant name for the given function
pub fn case_id(name: &str) -> String {
    format!("CASE_ID_{}", name.to_uppercase())
}

/// Renders a single-line makefile depfile, making `outfile` depend on every
/// alternative (in sorted order)
pub fn render_depfile(outfile: &Path, alternatives: &[Alternative]) -> String {
    let mut paths: Vec<&str> =
        alternatives.iter().map(|a| a.path.as_str()).collect();
    paths.sort_unstable();
    format!("{}: {}\n", outfile.display(), paths.join(" "))
}

/// A fully-resolved stub, ready to be rendered
#[derive(Clone, Debug)]
pub struct Stub<'a> {
    pub name: &'a str,
    pub header: &'a str,
    pub size: u64,
    pub aliases: &'a [String],
    pub year: i32,
}

impl Stub<'_> {
    pub fn case_id(&self) -> String {
        case_id(self.name)
    }

    /// Renders the stub as assembly source
    pub fn render(&self) -> String {
        let Stub {
            name,
            header,
            size,
            aliases,
            year,
        } = self;
        let case_id = self.case_id();

        let mut out = format!(
            "\
// Copyright {year} The Fuchsia Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

// GENERATED BY hermetic-stub.
// DO NOT EDIT.

#include <lib/arch/asm.h>
#include <lib/code-patching/asm.h>
#include <{header}>  // Defines {case_id}.

.text

.function {name}, global
  .code_patching.blob {size}, {case_id}
.end_function
"
        );
        for alias in aliases.iter() {
            out += &format!(
                "
.weak {alias}
.hidden {alias}
{alias} = {name}
"
            );
        }
        out
    }
}

/// Writes the depfile and the stub described by `opts`
///
/// The depfile is written first.  Nothing is written if the metadata can't be
/// loaded or an alternative is missing, but a failure while writing the stub
/// may leave the depfile behind.
pub fn generate(opts: &Options) -> Result<()> {
    if opts.name.is_empty() {
        bail!("stub function name must not be empty");
    }

    let mut seen = BTreeSet::new();
    for alias in &opts.aliases {
        if !seen.insert(alias.as_str()) {
            log::warn!(
                "alias '{alias}' for '{}' given more than once",
                opts.name
            );
        }
    }

    let alternatives = read_metadata(&opts.metadata_file)?;
    let size = max_alternative_size(&alternatives)?;

    let depfile = render_depfile(&opts.outfile, &alternatives);
    std::fs::write(&opts.depfile, depfile).with_context(|| {
        format!("could not write depfile {}", opts.depfile.display())
    })?;

    let stub = Stub {
        name: &opts.name,
        header: &opts.header,
        size,
        aliases: &opts.aliases,
        year: opts.year.unwrap_or_else(current_year),
    };
    log::debug!(
        "writing stub {} ({} bytes, {})",
        opts.outfile.display(),
        stub.size,
        stub.case_id()
    );
    std::fs::write(&opts.outfile, stub.render()).with_context(|| {
        format!("could not write stub {}", opts.outfile.display())
    })?;

    Ok(())
}

fn current_year() -> i32 {
    use chrono::Datelike;
    chrono::Local::now().year()
}

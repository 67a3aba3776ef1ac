use std::{fmt, io};

use tracing::info;

use crate::{
    ast::ParsedFile,
    error::Error,
    expand::{expand_blocks, expand_names, Block},
    validate::check_rule,
};

pub const PHONY_MARKER: &str = ".PHONY:";

/// The generated build file: every concrete rule name, then every block.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Makefile {
    pub phony: Vec<String>,
    pub blocks: Vec<Block>,
}

impl Makefile {
    /// Every variable must already hold at least one value.
    pub fn generate(file: &ParsedFile) -> Result<Self, Error> {
        let mut out = Self::default();
        for rule in file.rules.iter() {
            check_rule(&file.variables, rule)?;
            out.phony.extend(expand_names(&file.variables, rule)?);
            out.blocks.extend(expand_blocks(&file.variables, rule)?);
        }

        info!(
            rules = file.rules.len(),
            blocks = out.blocks.len(),
            "generated makefile"
        );
        Ok(out)
    }

    pub fn phony_line(&self) -> String {
        self.phony
            .iter()
            .fold(PHONY_MARKER.to_string(), |line, name| line + " " + name)
    }

    /// Output lines, without terminators.
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(self.phony_line()).chain(self.blocks.iter().flat_map(|b| {
            std::iter::once(b.header.clone()).chain(b.commands.iter().map(|c| format!("\t{}", c)))
        }))
    }

    pub fn write_to(&self, mut out: impl io::Write) -> io::Result<()> {
        for line in self.lines() {
            writeln!(out, "{}", line)?;
        }
        out.flush()
    }
}

impl fmt::Display for Makefile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.lines().try_for_each(|line| writeln!(f, "{}", line))
    }
}
